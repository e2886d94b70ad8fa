//! The document interface the engine runs against.
//!
//! The engine never touches a concrete DOM. Anything that can resolve a
//! root, walk elements, report rendered style, read and write inline style
//! and observe mutations can be themed: a browser document through
//! `umbra-wasm`, or [`MemoryDocument`](crate::memory::MemoryDocument) in
//! tests and native hosts.

use std::fmt;

use crate::property::StyleProperty;
use crate::watcher::ObserveOptions;

/// Opaque identity of a live element.
///
/// Handed out by [`Document::element_id`]; stable for as long as the element
/// lives. The style cache is keyed by this id and never holds the element
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an element is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An HTML-rendered element.
    Html,
    /// An SVG-rendered element.
    Svg,
    /// Anything without a style to read or write.
    Other,
}

impl NodeKind {
    /// Only HTML and SVG elements carry style the engine can override.
    pub const fn is_style_bearing(self) -> bool {
        matches!(self, NodeKind::Html | NodeKind::Svg)
    }
}

/// A DOM-like document.
pub trait Document {
    /// Handle to a live element.
    type Element: Clone + fmt::Debug;

    /// First element matching `selector`, if any.
    fn query_selector(&self, selector: &str) -> Option<Self::Element>;

    /// Fallback root when the configured selector matches nothing.
    fn body(&self) -> Option<Self::Element> {
        None
    }

    /// All descendants of `element` in document order, excluding itself.
    fn descendants(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// Parent element, if any.
    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Rendering namespace of the element.
    fn node_kind(&self, element: &Self::Element) -> NodeKind;

    /// Tag name, in whatever case the document reports it.
    fn tag_name(&self, element: &Self::Element) -> String;

    /// Rendered (post-cascade) value of a property.
    fn computed_style(&self, element: &Self::Element, property: StyleProperty) -> String;

    /// Inline value of a property; empty when unset.
    fn inline_style(&self, element: &Self::Element, property: StyleProperty) -> String;

    /// Write an inline value. An empty string removes the inline value.
    fn set_inline_style(&mut self, element: &Self::Element, property: StyleProperty, value: &str);

    /// Returns true if `element` or one of its ancestors matches `selector`.
    ///
    /// Invalid selectors match nothing.
    fn closest(&self, element: &Self::Element, selector: &str) -> bool;

    /// Stable identity of `element`.
    fn element_id(&self, element: &Self::Element) -> ElementId;

    /// Begin delivering mutation records for the subtree under `root`.
    fn observe(&mut self, root: &Self::Element, options: &ObserveOptions);

    /// Stop delivering mutation records.
    fn disconnect(&mut self);

    /// `element` followed by all of its descendants.
    fn subtree(&self, element: &Self::Element) -> Vec<Self::Element> {
        let mut all = vec![element.clone()];
        all.extend(self.descendants(element));
        all
    }

    /// `element` followed by its ancestors, nearest first.
    fn ancestors_inclusive(&self, element: &Self::Element) -> Vec<Self::Element> {
        let mut chain = vec![element.clone()];
        let mut cur = self.parent(element);
        while let Some(el) = cur {
            cur = self.parent(&el);
            chain.push(el);
        }
        chain
    }
}
