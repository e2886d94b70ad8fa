//! Reading and writing functional color tokens.
//!
//! Rendered styles serialize solid colors as `rgb(r, g, b)` or
//! `rgba(r, g, b, a)`, so those are the only forms recognized here. Hex,
//! named colors, `currentcolor`, `hsl(...)` and `none` are not colors to
//! invert and come back as `None`.
//!
//! Composite values (gradients, multi-layer shadows) embed any number of
//! such tokens; [`replace_embedded_colors`] rewrites each of them in place.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::color::Rgba;

static COLOR_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^rgba?\((\d+),(\d+),(\d+)(?:,([0-9.]+))?\)$").expect("valid color regex")
});

static EMBEDDED_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rgba?\([^)]+\)").expect("valid embedded color regex"));

/// Parse an `rgb(...)` / `rgba(...)` token.
///
/// Whitespace anywhere in the token is ignored. Channels above 255 are
/// clamped, alpha is clamped to `[0, 1]`.
pub fn parse(input: &str) -> Option<Rgba> {
    if input.is_empty() {
        return None;
    }
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = COLOR_FN.captures(&compact)?;

    let channel = |i: usize| -> Option<u8> {
        let v: u32 = caps.get(i)?.as_str().parse().ok()?;
        Some(v.min(255) as u8)
    };
    let r = channel(1)?;
    let g = channel(2)?;
    let b = channel(3)?;
    let a = match caps.get(4) {
        Some(m) => m.as_str().parse::<f32>().ok()?,
        None => 1.0,
    };

    Some(Rgba::rgba(r, g, b, a))
}

/// Serialize a color the way rendered styles do.
pub fn serialize(color: Rgba) -> String {
    if color.is_opaque() {
        format!("rgb({}, {}, {})", color.r, color.g, color.b)
    } else {
        format!("rgba({}, {}, {}, {})", color.r, color.g, color.b, color.a)
    }
}

/// Serialize without separators after commas: `rgb(1,2,3)`.
fn serialize_compact(color: Rgba) -> String {
    if color.is_opaque() {
        format!("rgb({},{},{})", color.r, color.g, color.b)
    } else {
        format!("rgba({},{},{},{})", color.r, color.g, color.b, color.a)
    }
}

/// Rewrite every functional color token embedded in `value`.
///
/// `transform` returns `None` to leave a token untouched. Tokens that do not
/// parse are also left as they are. Replacements keep the compact spelling
/// when the original token had no whitespace.
pub fn replace_embedded_colors<F>(value: &str, mut transform: F) -> String
where
    F: FnMut(Rgba) -> Option<Rgba>,
{
    if value.is_empty() || value == "none" {
        return value.to_string();
    }

    EMBEDDED_COLOR
        .replace_all(value, |caps: &Captures<'_>| {
            let token = &caps[0];
            match parse(token).and_then(&mut transform) {
                Some(next) if token.contains(char::is_whitespace) => serialize(next),
                Some(next) => serialize_compact(next),
                None => token.to_string(),
            }
        })
        .into_owned()
}

/// Iterate the colors embedded in a composite value.
pub fn embedded_colors(value: &str) -> impl Iterator<Item = Rgba> + '_ {
    EMBEDDED_COLOR
        .find_iter(value)
        .filter_map(|m| parse(m.as_str()))
}
