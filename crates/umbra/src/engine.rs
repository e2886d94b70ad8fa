//! The inversion engine: enable/disable lifecycle, full scans and
//! incremental re-application driven by mutation records.
//!
//! # Lifecycle
//!
//! ```text
//!   new() ──► Disabled ──enable()──► Enabled
//!                ▲                      │
//!                └──────disable()───────┘
//! ```
//!
//! A persisted "enabled" choice does not take effect in [`InversionEngine::new`];
//! it is held as a pending enable and run by [`InversionEngine::mount`], once
//! the host has rendered the tree.
//!
//! # Example
//!
//! ```rust
//! use umbra::prelude::*;
//!
//! let mut doc = MemoryDocument::new();
//! let body = doc.body().unwrap();
//! let card = doc.append(&body, "div");
//! doc.set_base_style(&card, StyleProperty::BackgroundColor, "rgb(255, 255, 255)");
//!
//! let mut engine = InversionEngine::new(doc, MemoryStore::new(), InvertConfig::default());
//! engine.enable();
//! assert!(engine.is_inverted());
//! assert_eq!(
//!     engine.document().inline_style(&card, StyleProperty::BackgroundColor),
//!     "rgb(0, 0, 0)"
//! );
//!
//! engine.disable();
//! assert_eq!(engine.document().inline_style(&card, StyleProperty::BackgroundColor), "");
//! assert_eq!(engine.store().value("aiTutorThemeInverted"), Some("0"));
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, info, trace, warn};

use crate::cache::StyleCache;
use crate::config::InvertConfig;
use crate::context::DynamicContext;
use crate::dom::{Document, ElementId};
use crate::snapshot::{ApplyStats, Snapshotter, restore_entry};
use crate::storage::{KeyValueStore, decode_flag, encode_flag};
use crate::watcher::{CLASS_ATTRIBUTE, MutationRecord, ObserveOptions};

/// Whether inversion is currently applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    #[default]
    Disabled,
    Enabled,
}

impl EngineState {
    pub const fn is_enabled(self) -> bool {
        matches!(self, EngineState::Enabled)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Disabled => f.write_str("disabled"),
            EngineState::Enabled => f.write_str("enabled"),
        }
    }
}

/// Identifier for a registered state listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Rebuild an id previously obtained from [`ListenerId::as_u64`].
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

type Listener = Box<dyn Fn(bool)>;

/// Applies and removes color inversion over one document.
///
/// The engine owns its document handle, persistence store and style cache.
/// All mutation of engine state goes through `&mut self`, so one call (for
/// example one [`handle_mutations`](Self::handle_mutations) batch) always
/// completes before the next begins.
pub struct InversionEngine<D: Document, S: KeyValueStore> {
    doc: D,
    store: S,
    config: InvertConfig,
    snapshotter: Snapshotter<D>,
    cache: StyleCache,
    state: EngineState,
    pending_enable: bool,
    observing: bool,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener_id: u64,
}

impl<D: Document, S: KeyValueStore> fmt::Debug for InversionEngine<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InversionEngine")
            .field("state", &self.state)
            .field("pending_enable", &self.pending_enable)
            .field("observing", &self.observing)
            .field("tracked", &self.cache.len())
            .field("listeners", &format!("{} listeners", self.listeners.len()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: Document, S: KeyValueStore> InversionEngine<D, S> {
    /// Create an engine in the Disabled state.
    ///
    /// If the store holds an "enabled" choice under the configured key, an
    /// enable is scheduled for [`mount`](Self::mount). A store that fails to
    /// read is treated as holding nothing.
    pub fn new(doc: D, store: S, config: InvertConfig) -> Self {
        let stored = match store.get(&config.storage_key) {
            Ok(raw) => raw.as_deref().and_then(decode_flag),
            Err(err) => {
                warn!(
                    umbra.storage_key = %config.storage_key,
                    error = %err,
                    "Failed to read persisted inversion state"
                );
                None
            }
        };
        debug!(
            umbra.storage_key = %config.storage_key,
            umbra.stored = ?stored,
            "Inversion engine created"
        );

        Self {
            doc,
            store,
            snapshotter: Snapshotter::new(&config),
            config,
            cache: StyleCache::new(),
            state: EngineState::Disabled,
            pending_enable: stored == Some(true),
            observing: false,
            listeners: BTreeMap::new(),
            next_listener_id: 1,
        }
    }

    /// Replace the dynamic-context classification derived from the config.
    ///
    /// Takes effect for entries built afterwards.
    pub fn with_dynamic_context(mut self, dynamic: DynamicContext<D>) -> Self {
        self.snapshotter.set_dynamic_context(dynamic);
        self
    }

    /// Run the enable scheduled from persisted state, if any.
    pub fn mount(&mut self) {
        if std::mem::take(&mut self.pending_enable) {
            debug!("Restoring persisted inversion");
            self.enable();
        }
    }

    /// Stop observing the document. Applied styles are left in place.
    pub fn unmount(&mut self) {
        self.pending_enable = false;
        self.stop_watching();
        debug!(umbra.state = %self.state, "Inversion engine unmounted");
    }

    /// Invert the document and keep it inverted as it changes.
    pub fn enable(&mut self) {
        self.pending_enable = false;
        let changed = self.state != EngineState::Enabled;
        self.state = EngineState::Enabled;
        self.persist(true);

        let stats = self.apply_all();
        self.start_watching();
        info!(
            umbra.elements = stats.elements,
            umbra.writes = stats.writes(),
            umbra.tracked = self.cache.len(),
            "Inversion enabled"
        );
        if changed {
            self.notify_listeners(true);
        }
    }

    /// Write back every original value and stop observing.
    ///
    /// Snapshots are kept so a later [`enable`](Self::enable) reuses them.
    pub fn disable(&mut self) {
        self.pending_enable = false;
        let changed = self.state != EngineState::Disabled;
        self.state = EngineState::Disabled;
        self.persist(false);

        self.stop_watching();
        let stats = self.restore_all();
        info!(
            umbra.elements = stats.elements,
            umbra.restored = stats.restored,
            "Inversion disabled"
        );
        if changed {
            self.notify_listeners(false);
        }
    }

    /// Flip between enabled and disabled.
    pub fn toggle(&mut self) {
        if self.is_inverted() {
            self.disable();
        } else {
            self.enable();
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.state.is_enabled()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Returns true while an observer is attached to the document.
    pub fn is_watching(&self) -> bool {
        self.observing
    }

    /// Register a callback invoked with the new value whenever the state flips.
    pub fn on_change<F>(&mut self, callback: F) -> ListenerId
    where
        F: Fn(bool) + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.insert(id, Box::new(callback));
        debug!(umbra.listener_id = id.0, "State listener registered");
        id
    }

    /// Remove a listener by id.
    pub fn remove_listener(&mut self, id: ListenerId) {
        if self.listeners.remove(&id).is_some() {
            debug!(umbra.listener_id = id.0, "State listener removed");
        }
    }

    /// Process one batch of observed mutations.
    ///
    /// Ignored while disabled. Removed subtrees are evicted from the cache,
    /// added subtrees are snapshotted and inverted, and a `class` change
    /// rebuilds the target's subtree from its restored style. Other
    /// attribute changes are ignored.
    pub fn handle_mutations(&mut self, records: &[MutationRecord<D::Element>]) {
        if !self.is_inverted() {
            trace!(umbra.records = records.len(), "Mutations ignored while disabled");
            return;
        }

        let mut stats = ApplyStats::default();
        let mut evicted = 0;
        for record in records {
            match record {
                MutationRecord::ChildList { added, removed, .. } => {
                    for node in removed {
                        evicted += self.evict_subtree(node);
                    }
                    for node in added {
                        // removed again later in the same batch
                        if !self.is_under_root(node) {
                            continue;
                        }
                        let elements = self.doc.subtree(node);
                        stats += self.track_and_apply(&elements);
                    }
                }
                MutationRecord::Attributes { target, name } if name == CLASS_ATTRIBUTE => {
                    if self.is_under_root(target) {
                        stats += self.rebuild_subtree(target);
                    } else {
                        trace!("Class change on detached element ignored");
                    }
                }
                MutationRecord::Attributes { name, .. } => {
                    trace!(umbra.attribute = %name, "Attribute change ignored");
                }
            }
        }

        debug!(
            umbra.records = records.len(),
            umbra.elements = stats.elements,
            umbra.writes = stats.writes(),
            umbra.evicted = evicted,
            "Mutation batch applied"
        );
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    /// Mutable access to the document, for hosts that drive it directly.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &StyleCache {
        &self.cache
    }

    pub fn config(&self) -> &InvertConfig {
        &self.config
    }

    /// Consume the engine, returning the document and store.
    pub fn into_parts(self) -> (D, S) {
        (self.doc, self.store)
    }

    /// Root element: the configured selector, else the document body.
    fn root(&self) -> Option<D::Element> {
        self.doc
            .query_selector(&self.config.root_selector)
            .or_else(|| self.doc.body())
    }

    fn is_under_root(&self, element: &D::Element) -> bool {
        let Some(root) = self.root() else {
            return false;
        };
        let root = self.doc.element_id(&root);
        self.doc
            .ancestors_inclusive(element)
            .iter()
            .any(|el| self.doc.element_id(el) == root)
    }

    fn persist(&mut self, enabled: bool) {
        if let Err(err) = self
            .store
            .set(&self.config.storage_key, encode_flag(enabled))
        {
            warn!(
                umbra.storage_key = %self.config.storage_key,
                error = %err,
                "Failed to persist inversion state"
            );
        }
    }

    fn start_watching(&mut self) {
        if self.observing {
            return;
        }
        let Some(root) = self.root() else {
            debug!(umbra.root = %self.config.root_selector, "No root to observe");
            return;
        };
        self.doc.observe(&root, &ObserveOptions::default());
        self.observing = true;
    }

    fn stop_watching(&mut self) {
        if self.observing {
            self.doc.disconnect();
            self.observing = false;
        }
    }

    /// Snapshot anything not yet tracked under the root, drop entries for
    /// elements no longer present, then invert everything.
    fn apply_all(&mut self) -> ApplyStats {
        let Some(root) = self.root() else {
            debug!(umbra.root = %self.config.root_selector, "No root to invert");
            return ApplyStats::default();
        };

        let elements = self.doc.subtree(&root);
        let seen: HashSet<ElementId> = elements.iter().map(|el| self.doc.element_id(el)).collect();
        let pruned = self.cache.retain(|id| seen.contains(&id));
        if pruned > 0 {
            debug!(umbra.evicted = pruned, "Pruned detached entries");
        }
        self.track_and_apply(&elements)
    }

    /// Write back originals for every tracked element under the root.
    fn restore_all(&mut self) -> ApplyStats {
        let Some(root) = self.root() else {
            debug!(umbra.root = %self.config.root_selector, "No root to restore");
            return ApplyStats::default();
        };

        let mut stats = ApplyStats::default();
        for el in self.doc.subtree(&root) {
            let id = self.doc.element_id(&el);
            if let Some(entry) = self.cache.get(id) {
                stats += restore_entry(&mut self.doc, &el, entry);
            }
        }
        stats
    }

    /// Build entries for untracked `elements`, then apply all of them.
    ///
    /// Every entry is built before any is applied so snapshots read the
    /// style in place before this pass.
    fn track_and_apply(&mut self, elements: &[D::Element]) -> ApplyStats {
        for el in elements {
            let id = self.doc.element_id(el);
            if self.cache.contains(id) {
                continue;
            }
            if let Some(entry) = self.snapshotter.build_entry(&self.doc, el, &self.cache) {
                self.cache.insert(id, entry);
            }
        }

        let mut stats = ApplyStats::default();
        for el in elements {
            stats += self.apply_element(el);
        }
        stats
    }

    fn apply_element(&mut self, element: &D::Element) -> ApplyStats {
        let id = self.doc.element_id(element);
        // taken out so the snapshotter can read the rest of the cache
        let Some(mut entry) = self.cache.remove(id) else {
            return ApplyStats::default();
        };
        let stats = self.snapshotter.apply_entry(
            &mut self.doc,
            element,
            &mut entry,
            self.state.is_enabled(),
            &self.cache,
        );
        self.cache.insert(id, entry);
        stats
    }

    /// Restore originals on `node` and its descendants, then drop their
    /// cache entries.
    ///
    /// A node still under the root was moved rather than removed; its
    /// entries stay, since its inline style already holds inverted values.
    /// A removed node leaves with its original style, so reinserting it
    /// snapshots the real colors again.
    fn evict_subtree(&mut self, node: &D::Element) -> usize {
        if self.is_under_root(node) {
            return 0;
        }
        let mut evicted = 0;
        for el in self.doc.subtree(node) {
            if let Some(entry) = self.cache.remove(self.doc.element_id(&el)) {
                restore_entry(&mut self.doc, &el, &entry);
                evicted += 1;
            }
        }
        evicted
    }

    /// Restore, discard, rebuild and reapply `target` and its descendants.
    fn rebuild_subtree(&mut self, target: &D::Element) -> ApplyStats {
        let elements = self.doc.subtree(target);
        let mut stats = ApplyStats::default();
        for el in &elements {
            if let Some(entry) = self.cache.remove(self.doc.element_id(el)) {
                stats += restore_entry(&mut self.doc, el, &entry);
            }
        }
        stats += self.track_and_apply(&elements);
        stats
    }

    fn notify_listeners(&self, inverted: bool) {
        for (id, listener) in &self.listeners {
            let result = catch_unwind(AssertUnwindSafe(|| listener(inverted)));
            if result.is_err() {
                warn!(
                    umbra.listener_id = id.0,
                    umbra.inverted = inverted,
                    "State listener panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::memory::MemoryDocument;
    use crate::property::StyleProperty;
    use crate::storage::MemoryStore;

    fn engine_with(store: MemoryStore) -> InversionEngine<MemoryDocument, MemoryStore> {
        InversionEngine::new(MemoryDocument::new(), store, InvertConfig::default())
    }

    #[test]
    fn test_new_engine_is_disabled() {
        let engine = engine_with(MemoryStore::new());
        assert_eq!(engine.state(), EngineState::Disabled);
        assert!(!engine.is_inverted());
        assert!(!engine.is_watching());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_persisted_enable_waits_for_mount() {
        let store = MemoryStore::new().with("aiTutorThemeInverted", "1");
        let mut engine = engine_with(store);
        assert!(!engine.is_inverted());

        engine.mount();
        assert!(engine.is_inverted());
        assert!(engine.is_watching());

        engine.disable();
        engine.mount();
        assert!(!engine.is_inverted());
    }

    #[test]
    fn test_toggle_persists_each_flip() {
        let mut engine = engine_with(MemoryStore::new());
        engine.toggle();
        assert_eq!(engine.store().value("aiTutorThemeInverted"), Some("1"));
        engine.toggle();
        assert_eq!(engine.store().value("aiTutorThemeInverted"), Some("0"));
        assert_eq!(engine.state(), EngineState::Disabled);
    }

    #[test]
    fn test_listeners_fire_on_state_change_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = engine_with(MemoryStore::new());
        let sink = Rc::clone(&seen);
        let id = engine.on_change(move |v| sink.borrow_mut().push(v));

        engine.enable();
        engine.enable();
        engine.disable();
        assert_eq!(*seen.borrow(), vec![true, false]);

        engine.remove_listener(id);
        engine.enable();
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let hits = Rc::new(RefCell::new(0));
        let mut engine = engine_with(MemoryStore::new());
        engine.on_change(|_| panic!("listener failure"));
        let sink = Rc::clone(&hits);
        engine.on_change(move |_| *sink.borrow_mut() += 1);

        engine.enable();
        assert_eq!(*hits.borrow(), 1);
        assert!(engine.is_inverted());
    }

    #[test]
    fn test_mutations_ignored_while_disabled() {
        let mut engine = engine_with(MemoryStore::new());
        let body = engine.document().body().expect("body");
        let el = engine.document_mut().append(&body, "div");
        engine.handle_mutations(&[MutationRecord::added(body, vec![el])]);
        assert!(engine.cache().is_empty());
        assert_eq!(engine.document().inline_style(&el, StyleProperty::Color), "");
    }

    #[test]
    fn test_moved_node_keeps_its_entry() {
        let mut engine = engine_with(MemoryStore::new());
        let body = engine.document().body().expect("body");
        let a = engine.document_mut().append(&body, "div");
        let b = engine.document_mut().append(&body, "div");
        engine.enable();
        let inverted = engine.document().inline_style(&b, StyleProperty::Color);

        engine.document_mut().append_child(&a, &b);
        let batch = engine.document_mut().take_records();
        assert_eq!(batch.len(), 2);
        engine.handle_mutations(&batch);

        assert_eq!(engine.document().inline_style(&b, StyleProperty::Color), inverted);
        engine.disable();
        assert_eq!(engine.document().inline_style(&b, StyleProperty::Color), "");
    }
}
