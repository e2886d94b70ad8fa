//! The style properties the engine reads and overrides.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A color-bearing style property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleProperty {
    Color,
    BackgroundColor,
    BorderTopColor,
    BorderRightColor,
    BorderBottomColor,
    BorderLeftColor,
    OutlineColor,
    CaretColor,
    Fill,
    Stroke,
    StopColor,
    BackgroundImage,
    BoxShadow,
    TextShadow,
    Filter,
}

impl StyleProperty {
    /// Properties holding a single solid color.
    pub const SOLID: [StyleProperty; 11] = [
        StyleProperty::Color,
        StyleProperty::BackgroundColor,
        StyleProperty::BorderTopColor,
        StyleProperty::BorderRightColor,
        StyleProperty::BorderBottomColor,
        StyleProperty::BorderLeftColor,
        StyleProperty::OutlineColor,
        StyleProperty::CaretColor,
        StyleProperty::Fill,
        StyleProperty::Stroke,
        StyleProperty::StopColor,
    ];

    /// Properties whose value is a composite string embedding colors.
    pub const COMPOSITE: [StyleProperty; 3] = [
        StyleProperty::BackgroundImage,
        StyleProperty::BoxShadow,
        StyleProperty::TextShadow,
    ];

    /// The hyphenated property name used by style declarations.
    pub const fn css_name(self) -> &'static str {
        match self {
            StyleProperty::Color => "color",
            StyleProperty::BackgroundColor => "background-color",
            StyleProperty::BorderTopColor => "border-top-color",
            StyleProperty::BorderRightColor => "border-right-color",
            StyleProperty::BorderBottomColor => "border-bottom-color",
            StyleProperty::BorderLeftColor => "border-left-color",
            StyleProperty::OutlineColor => "outline-color",
            StyleProperty::CaretColor => "caret-color",
            StyleProperty::Fill => "fill",
            StyleProperty::Stroke => "stroke",
            StyleProperty::StopColor => "stop-color",
            StyleProperty::BackgroundImage => "background-image",
            StyleProperty::BoxShadow => "box-shadow",
            StyleProperty::TextShadow => "text-shadow",
            StyleProperty::Filter => "filter",
        }
    }

    /// Look up a property by its hyphenated name.
    pub fn from_css_name(name: &str) -> Option<Self> {
        Self::SOLID
            .iter()
            .chain(Self::COMPOSITE.iter())
            .chain(std::iter::once(&StyleProperty::Filter))
            .copied()
            .find(|p| p.css_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Text-like properties get contrast correction after inversion.
    pub const fn is_text(self) -> bool {
        matches!(self, StyleProperty::Color | StyleProperty::CaretColor)
    }
}

impl fmt::Display for StyleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

/// Filter appended to image-like elements.
pub const IMAGE_FILTER: &str = "invert(1) hue-rotate(180deg)";

const IMAGE_LIKE_TAGS: [&str; 4] = ["IMG", "SVG", "VIDEO", "CANVAS"];

/// Raster images, inline vector graphics, video and canvas.
pub fn is_image_like(tag_name: &str) -> bool {
    IMAGE_LIKE_TAGS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(tag_name))
}

/// The inline filter to write on an image-like element whose current inline
/// filter is `existing`.
pub fn inverted_filter(existing: &str) -> String {
    let existing = existing.trim();
    if existing.is_empty() {
        IMAGE_FILTER.to_string()
    } else {
        format!("{existing} {IMAGE_FILTER}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_names_round_trip() {
        for p in StyleProperty::SOLID
            .iter()
            .chain(StyleProperty::COMPOSITE.iter())
        {
            assert_eq!(StyleProperty::from_css_name(p.css_name()), Some(*p));
        }
        assert_eq!(
            StyleProperty::from_css_name("Filter"),
            Some(StyleProperty::Filter)
        );
        assert_eq!(StyleProperty::from_css_name("margin"), None);
    }

    #[test]
    fn test_text_properties() {
        assert!(StyleProperty::Color.is_text());
        assert!(StyleProperty::CaretColor.is_text());
        assert!(!StyleProperty::BackgroundColor.is_text());
        assert!(!StyleProperty::BoxShadow.is_text());
    }

    #[test]
    fn test_image_like() {
        assert!(is_image_like("img"));
        assert!(is_image_like("SVG"));
        assert!(is_image_like("Canvas"));
        assert!(!is_image_like("div"));
        assert!(!is_image_like("picture"));
    }

    #[test]
    fn test_inverted_filter_appends() {
        assert_eq!(inverted_filter(""), IMAGE_FILTER);
        assert_eq!(
            inverted_filter("blur(2px)"),
            "blur(2px) invert(1) hue-rotate(180deg)"
        );
    }
}
