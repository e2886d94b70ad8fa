//! Building, applying and restoring [`StyleEntry`] snapshots.
//!
//! The [`Snapshotter`] is the only code that writes inversion-related inline
//! style. It reads rendered style as its oracle, so whatever other writers
//! did to an element is picked up the next time an entry is built or a
//! dynamic entry is applied.

use std::ops::AddAssign;

use tracing::trace;

use crate::cache::{DynamicEntry, Override, StaticEntry, StyleCache, StyleEntry};
use crate::color::{Rgba, invert_lightness};
use crate::config::{InversionPolicy, InvertConfig};
use crate::context::{DynamicContext, effective_background, has_neutral_background};
use crate::contrast::ContrastSearch;
use crate::dom::Document;
use crate::extract;
use crate::property::{StyleProperty, inverted_filter, is_image_like};

/// Marker showing a filter already carries an inversion.
const INVERT_MARKER: &str = "invert(";

/// Counts of inline writes made by one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Elements visited.
    pub elements: usize,
    /// Solid-color properties written.
    pub colors: usize,
    /// Composite properties written.
    pub strings: usize,
    /// Image filters written.
    pub filters: usize,
    /// Original values written back.
    pub restored: usize,
}

impl ApplyStats {
    /// Total inline writes.
    pub fn writes(&self) -> usize {
        self.colors + self.strings + self.filters + self.restored
    }
}

impl AddAssign for ApplyStats {
    fn add_assign(&mut self, rhs: Self) {
        self.elements += rhs.elements;
        self.colors += rhs.colors;
        self.strings += rhs.strings;
        self.filters += rhs.filters;
        self.restored += rhs.restored;
    }
}

/// Inverted values computed from an element's current rendered style.
#[derive(Debug, Default)]
struct Computed {
    colors: Vec<(StyleProperty, String)>,
    strings: Vec<(StyleProperty, String)>,
}

/// Builds and applies style entries according to one configuration.
#[derive(Debug)]
pub struct Snapshotter<D: Document> {
    contrast: ContrastSearch,
    alpha_epsilon: f32,
    background_alpha_threshold: f32,
    policy: InversionPolicy,
    dynamic: DynamicContext<D>,
}

impl<D: Document> Snapshotter<D> {
    /// Snapshotter using the selectors from `config` for dynamic contexts.
    pub fn new(config: &InvertConfig) -> Self {
        Self {
            contrast: config.contrast,
            alpha_epsilon: config.alpha_epsilon,
            background_alpha_threshold: config.background_alpha_threshold,
            policy: config.policy,
            dynamic: DynamicContext::selectors(&config.dynamic_selectors),
        }
    }

    /// Replace the dynamic-context classification.
    pub fn with_dynamic_context(mut self, dynamic: DynamicContext<D>) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn set_dynamic_context(&mut self, dynamic: DynamicContext<D>) {
        self.dynamic = dynamic;
    }

    /// Returns true if `element` lives in a dynamic context.
    pub fn is_dynamic(&self, doc: &D, element: &D::Element) -> bool {
        self.dynamic.contains(doc, element)
    }

    /// Returns true if `color` is visible enough and admitted by the policy.
    pub fn invertible(&self, color: Rgba) -> bool {
        color.a > self.alpha_epsilon && self.policy.admits(color)
    }

    /// Create the entry for `element`, or `None` if it carries no style.
    ///
    /// Dynamic entries start empty; nothing is computed until they are
    /// applied. `cache` is consulted only to tell whether an ancestor's
    /// background is already inverted.
    pub fn build_entry(&self, doc: &D, element: &D::Element, cache: &StyleCache) -> Option<StyleEntry> {
        if !doc.node_kind(element).is_style_bearing() {
            return None;
        }

        if self.is_dynamic(doc, element) {
            trace!(umbra.element = %doc.element_id(element), "dynamic entry");
            return Some(StyleEntry::Dynamic(DynamicEntry::new()));
        }

        let computed = self.compute(doc, element, cache);
        let record = |(property, inverted): (StyleProperty, String)| {
            (
                property,
                Override::new(doc.inline_style(element, property), inverted),
            )
        };

        let filter = is_image_like(&doc.tag_name(element)).then(|| {
            let existing = doc.inline_style(element, StyleProperty::Filter);
            let inverted = inverted_filter(&existing);
            Override::new(existing, inverted)
        });

        let entry = StaticEntry {
            colors: computed.colors.into_iter().map(record).collect(),
            strings: computed.strings.into_iter().map(record).collect(),
            filter,
        };
        trace!(
            umbra.element = %doc.element_id(element),
            umbra.overrides = entry.len(),
            "static entry"
        );
        Some(StyleEntry::Static(entry))
    }

    /// Write `entry` to `element`: inverted values when `enabled`, recorded
    /// originals otherwise.
    pub fn apply_entry(
        &self,
        doc: &mut D,
        element: &D::Element,
        entry: &mut StyleEntry,
        enabled: bool,
        cache: &StyleCache,
    ) -> ApplyStats {
        if !enabled {
            return restore_entry(doc, element, entry);
        }

        match entry {
            StyleEntry::Static(entry) => apply_static(doc, element, entry),
            StyleEntry::Dynamic(entry) => self.apply_live(doc, element, entry, cache),
        }
    }

    /// Recompute a dynamic element from its current rendered style.
    fn apply_live(
        &self,
        doc: &mut D,
        element: &D::Element,
        entry: &mut DynamicEntry,
        cache: &StyleCache,
    ) -> ApplyStats {
        let mut stats = ApplyStats {
            elements: 1,
            ..ApplyStats::default()
        };

        // rendered style must not already include a previous live pass
        for (property, original) in entry.originals() {
            doc.set_inline_style(element, property, original);
        }

        let computed = self.compute(doc, element, cache);
        for (property, inverted) in &computed.colors {
            entry.record(*property, doc.inline_style(element, *property));
            doc.set_inline_style(element, *property, inverted);
            stats.colors += 1;
        }
        for (property, inverted) in &computed.strings {
            entry.record(*property, doc.inline_style(element, *property));
            doc.set_inline_style(element, *property, inverted);
            stats.strings += 1;
        }

        if is_image_like(&doc.tag_name(element)) {
            let existing = doc.inline_style(element, StyleProperty::Filter);
            if !existing.contains(INVERT_MARKER) {
                entry.record(StyleProperty::Filter, existing.clone());
                doc.set_inline_style(element, StyleProperty::Filter, &inverted_filter(&existing));
                stats.filters += 1;
            }
        }

        stats
    }

    /// Inverted values for every tracked property of `element`.
    fn compute(&self, doc: &D, element: &D::Element, cache: &StyleCache) -> Computed {
        let mut out = Computed::default();
        let background = self.inverted_background(doc, element, cache);
        let text_allowed = match self.policy {
            InversionPolicy::Lightness => true,
            InversionPolicy::NeutralOnly {
                saturation_threshold,
            } => has_neutral_background(
                doc,
                element,
                self.background_alpha_threshold,
                saturation_threshold,
            ),
        };

        for property in StyleProperty::SOLID {
            if property.is_text() && !text_allowed {
                continue;
            }
            let Some(color) = extract::parse(&doc.computed_style(element, property)) else {
                continue;
            };
            if !self.invertible(color) {
                continue;
            }

            let mut inverted = invert_lightness(color);
            if property.is_text() {
                inverted = self.contrast.adjust(inverted, background);
            }
            out.colors.push((property, extract::serialize(inverted)));
        }

        for property in StyleProperty::COMPOSITE {
            let current = doc.computed_style(element, property);
            if current.is_empty() || current == "none" {
                continue;
            }
            let next = extract::replace_embedded_colors(&current, |c| {
                self.invertible(c).then(|| invert_lightness(c))
            });
            if next != current {
                out.strings.push((property, next));
            }
        }

        out
    }

    /// The inverted form of the background text in `element` sits on.
    ///
    /// Found with [`effective_background`], but an ancestor whose background
    /// the engine has already inverted is taken as is instead of being
    /// inverted a second time.
    pub fn inverted_background(&self, doc: &D, element: &D::Element, cache: &StyleCache) -> Rgba {
        match effective_background(doc, element, self.background_alpha_threshold) {
            Some((el, bg)) if background_already_inverted(doc, &el, cache) => bg,
            Some((_, bg)) => invert_lightness(bg),
            None => invert_lightness(Rgba::WHITE),
        }
    }
}

/// Returns true if the inline background of `element` is one the engine wrote.
fn background_already_inverted<D: Document>(doc: &D, element: &D::Element, cache: &StyleCache) -> bool {
    let Some(entry) = cache.get(doc.element_id(element)) else {
        return false;
    };
    let inline = doc.inline_style(element, StyleProperty::BackgroundColor);
    match entry {
        StyleEntry::Static(entry) => entry
            .get(StyleProperty::BackgroundColor)
            .is_some_and(|o| !inline.is_empty() && inline == o.inverted),
        StyleEntry::Dynamic(entry) => entry
            .originals()
            .any(|(p, original)| p == StyleProperty::BackgroundColor && inline != original),
    }
}

fn apply_static<D: Document>(doc: &mut D, element: &D::Element, entry: &StaticEntry) -> ApplyStats {
    let mut stats = ApplyStats {
        elements: 1,
        ..ApplyStats::default()
    };
    for (property, o) in &entry.colors {
        doc.set_inline_style(element, *property, &o.inverted);
        stats.colors += 1;
    }
    for (property, o) in &entry.strings {
        doc.set_inline_style(element, *property, &o.inverted);
        stats.strings += 1;
    }
    if let Some(o) = &entry.filter {
        doc.set_inline_style(element, StyleProperty::Filter, &o.inverted);
        stats.filters += 1;
    }
    stats
}

/// Write back every original inline value recorded in `entry`.
pub fn restore_entry<D: Document>(doc: &mut D, element: &D::Element, entry: &StyleEntry) -> ApplyStats {
    let mut stats = ApplyStats {
        elements: 1,
        ..ApplyStats::default()
    };
    for (property, original) in entry.originals() {
        doc.set_inline_style(element, property, original);
        stats.restored += 1;
    }
    stats
}
