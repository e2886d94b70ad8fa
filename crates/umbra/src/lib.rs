#![forbid(unsafe_code)]
// Allow these clippy lints for API ergonomics and color math
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::use_self)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::new_without_default)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::significant_drop_tightening)]

//! # Umbra
//!
//! Runtime color inversion for live document trees.
//!
//! Umbra turns a light page dark (and back) without a stylesheet of its own:
//! it reads the rendered colors of every element, inverts their HSL
//! lightness, corrects text contrast against the inverted background, and
//! writes the results as inline overrides. Original inline values are
//! snapshotted first, so disabling restores the page exactly.
//!
//! - **Color model**: [`Rgba`], [`Hsl`], lightness inversion and WCAG contrast
//! - **Extraction**: parsing and rewriting `rgb()`/`rgba()` tokens in style values
//! - **Snapshots**: per-element [`StyleEntry`]s, static or recomputed live
//! - **Engine**: [`InversionEngine`] with persisted state, change listeners
//!   and incremental handling of observed mutations
//!
//! The engine runs against the [`Document`] trait. [`MemoryDocument`] is an
//! in-memory implementation; the `umbra-wasm` crate binds a browser page.
//!
//! ## Quick Start
//!
//! ```rust
//! use umbra::prelude::*;
//!
//! let mut doc = MemoryDocument::new();
//! let body = doc.body().unwrap();
//! let text = doc.append(&body, "p");
//! doc.set_base_style(&text, StyleProperty::Color, "rgb(40, 40, 40)");
//!
//! let mut engine = InversionEngine::new(doc, MemoryStore::new(), InvertConfig::default());
//! engine.toggle();
//!
//! let inverted = engine.document().inline_style(&text, StyleProperty::Color);
//! let color = umbra::extract::parse(&inverted).unwrap();
//! assert!(color.luminance() > 0.5);
//! ```
//!
//! ## Color Math
//!
//! ```rust
//! use umbra::{Rgba, contrast_ratio, invert_lightness};
//!
//! let dark = invert_lightness(Rgba::rgb(250, 250, 250));
//! assert_eq!(dark, Rgba::rgb(5, 5, 5));
//! assert!(contrast_ratio(Rgba::WHITE.opaque(), dark.opaque()) > 19.0);
//! ```

pub mod cache;
pub mod color;
pub mod config;
pub mod context;
pub mod contrast;
pub mod dom;
pub mod engine;
pub mod extract;
pub mod memory;
pub mod property;
pub mod snapshot;
pub mod storage;
pub mod watcher;

pub use cache::{DynamicEntry, Override, StaticEntry, StyleCache, StyleEntry};
pub use color::{Hsl, Rgba, contrast_ratio, invert_lightness, relative_luminance};
pub use config::{
    ConfigError, ConfigValidationError, DEFAULT_ROOT_SELECTOR, DEFAULT_STORAGE_KEY,
    InversionPolicy, InvertConfig,
};
pub use context::{DynamicContext, effective_background};
pub use contrast::{ContrastSearch, DEFAULT_MIN_RATIO};
pub use dom::{Document, ElementId, NodeKind};
pub use engine::{EngineState, InversionEngine, ListenerId};
pub use memory::{MemoryDocument, NodeRef};
pub use property::StyleProperty;
pub use snapshot::{ApplyStats, Snapshotter};
#[cfg(feature = "native")]
pub use storage::FileStore;
pub use storage::{KeyValueStore, MemoryStore, NullStore, StorageError};
pub use watcher::{MutationQueue, MutationRecord, ObserveOptions};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::color::{Hsl, Rgba};
    pub use crate::config::{InversionPolicy, InvertConfig};
    pub use crate::context::DynamicContext;
    pub use crate::contrast::ContrastSearch;
    pub use crate::dom::{Document, ElementId, NodeKind};
    pub use crate::engine::{EngineState, InversionEngine, ListenerId};
    pub use crate::memory::{MemoryDocument, NodeRef};
    pub use crate::property::StyleProperty;
    #[cfg(feature = "native")]
    pub use crate::storage::FileStore;
    pub use crate::storage::{KeyValueStore, MemoryStore, NullStore};
    pub use crate::watcher::{MutationQueue, MutationRecord, ObserveOptions};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
