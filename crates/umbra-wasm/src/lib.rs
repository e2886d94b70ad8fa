//! # umbra-wasm
//!
//! Runtime color inversion for web pages, compiled to WebAssembly.
//!
//! ## Quick Start (JavaScript)
//!
//! ```javascript
//! import init, { InvertTheme } from 'umbra-wasm';
//!
//! await init();
//!
//! const theme = new InvertTheme();          // root "html", key "aiTutorThemeInverted"
//! theme.mount();                            // restores the saved choice after first paint
//! const id = theme.onChange((inverted) => button.classList.toggle('on', inverted));
//!
//! button.addEventListener('click', () => theme.toggle());
//! ```
//!
//! ## Available APIs
//!
//! - `new InvertTheme(rootSelector?, storageKey?)` - Bind the page
//! - `InvertTheme.fromConfig(json)` - Bind the page with a full JSON configuration
//! - `enable()`, `disable()`, `toggle()`, `isInverted()` - Theme state
//! - `mount()`, `unmount()` - Host lifecycle hooks
//! - `onChange(fn)`, `removeListener(id)` - State listeners
//! - `version()` - Module version

#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::new_without_default)]

pub mod document;
pub mod storage;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;
use umbra::config::InvertConfig;
use umbra::engine::{InversionEngine, ListenerId};
use umbra::watcher::MutationQueue;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, MutationObserver, Window};

pub use document::WebDocument;
pub use storage::LocalStore;

type WebEngine = InversionEngine<WebDocument, LocalStore>;

/// Initialize the module: installs the panic hook when enabled.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Module version information.
#[must_use]
#[wasm_bindgen(js_name = "version")]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// State shared between the JS handle and the observer callback.
struct Shared {
    engine: RefCell<WebEngine>,
    queue: RefCell<MutationQueue<Element>>,
    inverted: Rc<Cell<bool>>,
}

impl Shared {
    /// Run `f` on the engine unless it is already in use further up the
    /// stack (a listener calling back into the theme).
    fn with_engine<R>(&self, op: &str, f: impl FnOnce(&mut WebEngine) -> R) -> Option<R> {
        let Ok(mut engine) = self.engine.try_borrow_mut() else {
            warn!(umbra.op = op, "Inversion engine busy; call ignored");
            return None;
        };
        let out = f(&mut engine);
        self.queue.borrow_mut().drain(&mut engine);
        Some(out)
    }

    fn deliver(&self, records: &js_sys::Array) {
        self.queue
            .borrow_mut()
            .push(document::convert_records(records));
        if let Ok(mut engine) = self.engine.try_borrow_mut() {
            self.queue.borrow_mut().drain(&mut engine);
        }
    }
}

/// Color inversion bound to the current page.
#[wasm_bindgen]
pub struct InvertTheme {
    window: Window,
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl InvertTheme {
    /// Bind the page. Blank arguments fall back to the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        root_selector: Option<String>,
        storage_key: Option<String>,
    ) -> Result<InvertTheme, JsValue> {
        let mut config = InvertConfig::default();
        if let Some(selector) = root_selector {
            config = config.with_root_selector(selector);
        }
        if let Some(key) = storage_key {
            config = config.with_storage_key(key);
        }
        Self::with_config(config)
    }

    /// Bind the page using a JSON configuration.
    #[wasm_bindgen(js_name = "fromConfig")]
    pub fn from_config(json: &str) -> Result<InvertTheme, JsValue> {
        let config = InvertConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Self::with_config(config)
    }

    fn with_config(config: InvertConfig) -> Result<InvertTheme, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let doc = WebDocument::new(window.clone())?;
        let store = LocalStore::new(&window);
        if !store.is_available() {
            warn!(
                umbra.storage_key = %config.storage_key,
                "localStorage unavailable; inversion state will not persist"
            );
        }

        let mut engine = InversionEngine::new(doc, store, config);
        let inverted = Rc::new(Cell::new(engine.is_inverted()));
        let mirror = Rc::clone(&inverted);
        engine.on_change(move |value| mirror.set(value));

        let shared = Rc::new(Shared {
            engine: RefCell::new(engine),
            queue: RefCell::new(MutationQueue::new()),
            inverted,
        });

        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |records: js_sys::Array, _observer: MutationObserver| {
                if let Some(shared) = weak.upgrade() {
                    shared.deliver(&records);
                }
            },
        );
        shared
            .engine
            .borrow_mut()
            .document_mut()
            .set_observer_callback(callback);

        Ok(Self { window, shared })
    }

    pub fn enable(&self) {
        self.shared.with_engine("enable", WebEngine::enable);
    }

    pub fn disable(&self) {
        self.shared.with_engine("disable", WebEngine::disable);
    }

    pub fn toggle(&self) {
        self.shared.with_engine("toggle", WebEngine::toggle);
    }

    /// Current state. Safe to call from inside a change listener.
    #[wasm_bindgen(js_name = "isInverted")]
    pub fn is_inverted(&self) -> bool {
        self.shared.inverted.get()
    }

    /// Apply the saved choice on the next animation frame.
    pub fn mount(&self) -> Result<(), JsValue> {
        let weak = Rc::downgrade(&self.shared);
        let callback = Closure::once_into_js(move || {
            if let Some(shared) = weak.upgrade() {
                shared.with_engine("mount", WebEngine::mount);
            }
        });
        self.window
            .request_animation_frame(callback.unchecked_ref())
            .map(|_| ())
    }

    /// Stop watching the page.
    pub fn unmount(&self) {
        self.shared.with_engine("unmount", WebEngine::unmount);
    }

    /// Register `callback(inverted)`; returns an id for `removeListener`.
    #[wasm_bindgen(js_name = "onChange")]
    pub fn on_change(&self, callback: js_sys::Function) -> Option<f64> {
        self.shared
            .with_engine("onChange", |engine| {
                engine.on_change(move |value| {
                    if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_bool(value)) {
                        warn!(error = ?err, "Change listener threw");
                    }
                })
            })
            .map(|id| id.as_u64() as f64)
    }

    #[wasm_bindgen(js_name = "removeListener")]
    pub fn remove_listener(&self, id: f64) {
        if let Some(id) = listener_id(id) {
            self.shared
                .with_engine("removeListener", |engine| engine.remove_listener(id));
        }
    }
}

/// Parse a listener id handed back from JS.
fn listener_id(raw: f64) -> Option<ListenerId> {
    (raw.is_finite() && raw >= 1.0 && raw.fract() == 0.0).then(|| ListenerId::from_raw(raw as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }

    #[test]
    fn test_listener_id_parsing() {
        assert_eq!(listener_id(3.0), Some(ListenerId::from_raw(3)));
        assert_eq!(listener_id(0.0), None);
        assert_eq!(listener_id(1.5), None);
        assert_eq!(listener_id(f64::NAN), None);
    }
}
