//! Classifying elements by where they sit in the document.

use std::fmt;

use crate::color::Rgba;
use crate::dom::Document;
use crate::extract;
use crate::property::StyleProperty;

/// Predicate deciding whether an element lives in a dynamic context.
pub type ContextPredicate<D> = Box<dyn Fn(&D, &<D as Document>::Element) -> bool>;

/// Decides which elements are in a dynamic context: a region whose highlight
/// colors change through class toggling, so its colors must be recomputed on
/// every apply instead of cached once.
pub enum DynamicContext<D: Document> {
    /// The element or an ancestor matches this selector list.
    Selectors(String),
    /// Caller-supplied predicate.
    Custom(ContextPredicate<D>),
    /// Nothing is dynamic.
    Never,
}

impl<D: Document> DynamicContext<D> {
    /// Match against a list of selectors. An empty list never matches.
    pub fn selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list: Vec<String> = selectors
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if list.is_empty() {
            DynamicContext::Never
        } else {
            DynamicContext::Selectors(list.join(","))
        }
    }

    /// Use an arbitrary predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&D, &D::Element) -> bool + 'static,
    {
        DynamicContext::Custom(Box::new(predicate))
    }

    /// Returns true if `element` is in a dynamic context.
    pub fn contains(&self, doc: &D, element: &D::Element) -> bool {
        match self {
            DynamicContext::Selectors(list) => doc.closest(element, list),
            DynamicContext::Custom(predicate) => predicate(doc, element),
            DynamicContext::Never => false,
        }
    }
}

impl<D: Document> fmt::Debug for DynamicContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicContext::Selectors(list) => f.debug_tuple("Selectors").field(list).finish(),
            DynamicContext::Custom(_) => f.write_str("Custom(<predicate>)"),
            DynamicContext::Never => f.write_str("Never"),
        }
    }
}

/// The background text inside `element` is painted on, and the element
/// painting it.
///
/// First of the element and its ancestors whose background color has alpha
/// above `alpha_threshold`. `None` means nothing is painted and text sits on
/// the default white page.
pub fn effective_background<D: Document>(
    doc: &D,
    element: &D::Element,
    alpha_threshold: f32,
) -> Option<(D::Element, Rgba)> {
    doc.ancestors_inclusive(element).into_iter().find_map(|el| {
        extract::parse(&doc.computed_style(&el, StyleProperty::BackgroundColor))
            .filter(|c| c.a > alpha_threshold)
            .map(|bg| (el, bg))
    })
}

/// Returns true if the element's own background is near-gray.
///
/// A visible solid background decides on its own; otherwise every color in
/// the background image must be near-gray. No background at all counts as
/// neutral.
pub fn has_neutral_background<D: Document>(
    doc: &D,
    element: &D::Element,
    alpha_threshold: f32,
    saturation_threshold: f32,
) -> bool {
    let solid = extract::parse(&doc.computed_style(element, StyleProperty::BackgroundColor));
    if let Some(bg) = solid.filter(|c| c.a > alpha_threshold) {
        return bg.saturation() <= saturation_threshold;
    }

    let image = doc.computed_style(element, StyleProperty::BackgroundImage);
    extract::embedded_colors(&image).all(|c| c.saturation() <= saturation_threshold)
}
