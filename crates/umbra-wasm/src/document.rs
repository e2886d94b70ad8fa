//! [`Document`] over the browser DOM.

use std::cell::Cell;
use std::fmt;

use js_sys::{Array, Object, WeakMap};
use tracing::{debug, warn};
use umbra::dom::{Document, ElementId, NodeKind};
use umbra::property::StyleProperty;
use umbra::watcher::{MutationRecord, ObserveOptions};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CssStyleDeclaration, Element, HtmlElement, MutationObserver, MutationObserverInit, NodeList,
    SvgElement, Window,
};

/// Observer callback: `(records, observer)`.
pub type ObserverCallback = Closure<dyn FnMut(Array, MutationObserver)>;

/// A browser page.
///
/// Element ids live in a `WeakMap` keyed by the element, so identity never
/// keeps a detached element alive.
pub struct WebDocument {
    window: Window,
    document: web_sys::Document,
    ids: WeakMap,
    next_id: Cell<u64>,
    callback: Option<ObserverCallback>,
    observer: Option<MutationObserver>,
}

impl fmt::Debug for WebDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDocument")
            .field("next_id", &self.next_id.get())
            .field("has_callback", &self.callback.is_some())
            .field("observing", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl WebDocument {
    /// Bind the page behind `window`.
    ///
    /// # Errors
    /// Returns an error if the window has no document.
    pub fn new(window: Window) -> Result<Self, JsValue> {
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(Self {
            window,
            document,
            ids: WeakMap::new(),
            next_id: Cell::new(1),
            callback: None,
            observer: None,
        })
    }

    /// Install the function mutation batches are delivered to.
    pub fn set_observer_callback(&mut self, callback: ObserverCallback) {
        self.callback = Some(callback);
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn inline_declaration(element: &Element) -> Option<CssStyleDeclaration> {
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            Some(html.style())
        } else {
            element.dyn_ref::<SvgElement>().map(SvgElement::style)
        }
    }
}

impl Drop for WebDocument {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}

fn elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord<Element>> {
    let target = record.target()?.dyn_into::<Element>().ok()?;
    match record.type_().as_str() {
        "childList" => Some(MutationRecord::ChildList {
            target,
            added: elements(&record.added_nodes()),
            removed: elements(&record.removed_nodes()),
        }),
        "attributes" => Some(MutationRecord::Attributes {
            target,
            name: record.attribute_name()?,
        }),
        _ => None,
    }
}

/// Translate a batch handed to an observer callback.
pub fn convert_records(records: &Array) -> Vec<MutationRecord<Element>> {
    records
        .iter()
        .filter_map(|r| r.dyn_into::<web_sys::MutationRecord>().ok())
        .filter_map(|r| convert_record(&r))
        .collect()
}

impl Document for WebDocument {
    type Element = Element;

    fn query_selector(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn descendants(&self, element: &Element) -> Vec<Element> {
        element
            .query_selector_all("*")
            .map(|list| elements(&list))
            .unwrap_or_default()
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn node_kind(&self, element: &Element) -> NodeKind {
        if element.is_instance_of::<HtmlElement>() {
            NodeKind::Html
        } else if element.is_instance_of::<SvgElement>() {
            NodeKind::Svg
        } else {
            NodeKind::Other
        }
    }

    fn tag_name(&self, element: &Element) -> String {
        element.tag_name()
    }

    fn computed_style(&self, element: &Element, property: StyleProperty) -> String {
        self.window
            .get_computed_style(element)
            .ok()
            .flatten()
            .and_then(|decl| decl.get_property_value(property.css_name()).ok())
            .unwrap_or_default()
    }

    fn inline_style(&self, element: &Element, property: StyleProperty) -> String {
        Self::inline_declaration(element)
            .and_then(|decl| decl.get_property_value(property.css_name()).ok())
            .unwrap_or_default()
    }

    fn set_inline_style(&mut self, element: &Element, property: StyleProperty, value: &str) {
        let Some(decl) = Self::inline_declaration(element) else {
            return;
        };
        let result = if value.is_empty() {
            decl.remove_property(property.css_name()).map(|_| ())
        } else {
            decl.set_property(property.css_name(), value)
        };
        if let Err(err) = result {
            debug!(umbra.property = %property, error = ?err, "Inline style write rejected");
        }
    }

    fn closest(&self, element: &Element, selector: &str) -> bool {
        matches!(element.closest(selector), Ok(Some(_)))
    }

    fn element_id(&self, element: &Element) -> ElementId {
        let key: &Object = element.as_ref();
        if let Some(id) = self.ids.get(key).as_f64() {
            return ElementId(id as u64);
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.ids.set(key, &JsValue::from_f64(id as f64));
        ElementId(id)
    }

    fn observe(&mut self, root: &Element, options: &ObserveOptions) {
        let Some(callback) = &self.callback else {
            debug!("No observer callback installed");
            return;
        };
        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!(error = ?err, "Failed to create mutation observer");
                return;
            }
        };

        let init = MutationObserverInit::new();
        init.set_child_list(options.child_list);
        init.set_subtree(options.subtree);
        if options.attributes() {
            let filter: Array = options
                .attribute_filter
                .iter()
                .map(|name| JsValue::from_str(name))
                .collect();
            init.set_attribute_filter(&filter);
        }

        if let Err(err) = observer.observe_with_options(root, &init) {
            warn!(error = ?err, "Failed to observe document");
            return;
        }
        if let Some(previous) = self.observer.replace(observer) {
            previous.disconnect();
        }
    }

    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}
