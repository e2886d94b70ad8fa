//! Per-element style snapshots.
//!
//! Each tracked element owns one [`StyleEntry`] recording, per overridden
//! property, the inline value it had before the engine touched it and the
//! value the engine writes when inverted. The [`StyleCache`] maps element
//! ids to entries and holds no element handles, so a detached element is
//! never kept alive by it; stale ids are evicted explicitly.

use std::collections::{BTreeMap, HashMap};

use crate::dom::ElementId;
use crate::property::StyleProperty;

/// An original inline value and its inverted replacement.
///
/// An empty `original` means the element had no inline value; writing it
/// back removes the override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub original: String,
    pub inverted: String,
}

impl Override {
    pub fn new(original: impl Into<String>, inverted: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            inverted: inverted.into(),
        }
    }
}

/// Values computed once and written verbatim on every apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticEntry {
    /// Solid-color properties.
    pub colors: Vec<(StyleProperty, Override)>,
    /// Composite properties whose rewrite changed the value.
    pub strings: Vec<(StyleProperty, Override)>,
    /// Filter for image-like elements.
    pub filter: Option<Override>,
}

impl StaticEntry {
    /// Number of properties this entry overrides.
    pub fn len(&self) -> usize {
        self.colors.len() + self.strings.len() + usize::from(self.filter.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the override recorded for `property`.
    pub fn get(&self, property: StyleProperty) -> Option<&Override> {
        if property == StyleProperty::Filter {
            return self.filter.as_ref();
        }
        self.colors
            .iter()
            .chain(self.strings.iter())
            .find(|(p, _)| *p == property)
            .map(|(_, o)| o)
    }

    /// Every `(property, original inline value)` pair.
    pub fn originals(&self) -> impl Iterator<Item = (StyleProperty, &str)> + '_ {
        self.colors
            .iter()
            .chain(self.strings.iter())
            .map(|(p, o)| (*p, o.original.as_str()))
            .chain(
                self.filter
                    .iter()
                    .map(|o| (StyleProperty::Filter, o.original.as_str())),
            )
    }
}

/// Original inline values of an element whose colors are recomputed live.
///
/// Originals are captured the first time a live pass writes a property and
/// kept until the entry is discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicEntry {
    originals: BTreeMap<StyleProperty, String>,
}

impl DynamicEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `original` for `property` unless one is already recorded.
    pub fn record(&mut self, property: StyleProperty, original: impl Into<String>) {
        self.originals
            .entry(property)
            .or_insert_with(|| original.into());
    }

    /// Returns true if an original has been recorded for `property`.
    pub fn has(&self, property: StyleProperty) -> bool {
        self.originals.contains_key(&property)
    }

    /// Every `(property, original inline value)` pair.
    pub fn originals(&self) -> impl Iterator<Item = (StyleProperty, &str)> + '_ {
        self.originals.iter().map(|(p, v)| (*p, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

/// Snapshot of one tracked element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleEntry {
    /// Outside any dynamic context: inverted values computed at build time.
    Static(StaticEntry),
    /// Inside a dynamic context: inverted values computed at apply time.
    Dynamic(DynamicEntry),
}

impl StyleEntry {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, StyleEntry::Dynamic(_))
    }

    /// Every `(property, original inline value)` pair recorded so far.
    pub fn originals(&self) -> Box<dyn Iterator<Item = (StyleProperty, &str)> + '_> {
        match self {
            StyleEntry::Static(entry) => Box::new(entry.originals()),
            StyleEntry::Dynamic(entry) => Box::new(entry.originals()),
        }
    }
}

/// Element id to entry map, owned by a single engine.
#[derive(Debug, Clone, Default)]
pub struct StyleCache {
    entries: HashMap<ElementId, StyleEntry>,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ElementId) -> Option<&StyleEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut StyleEntry> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Insert or replace the entry for `id`.
    pub fn insert(&mut self, id: ElementId, entry: StyleEntry) -> Option<StyleEntry> {
        self.entries.insert(id, entry)
    }

    /// Drop the entry for `id`.
    pub fn remove(&mut self, id: ElementId) -> Option<StyleEntry> {
        self.entries.remove(&id)
    }

    /// Keep only entries whose id satisfies `keep`; returns how many were evicted.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(ElementId) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|id, _| keep(*id));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries in dynamic contexts.
    pub fn dynamic_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_dynamic()).count()
    }
}
