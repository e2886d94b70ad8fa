//! Color values and color-space math.
//!
//! Everything in this module is pure: no document access, no state.
//!
//! - [`Rgba`] - 8-bit channels plus a float alpha in `[0, 1]`
//! - [`Hsl`] - hue/saturation/lightness, used as the space lightness inversion runs in
//! - [`relative_luminance`] and [`contrast_ratio`] - the usual sRGB luminance
//!   and contrast formulas
//!
//! # Example
//!
//! ```rust
//! use umbra::color::{Rgba, contrast_ratio, invert_lightness};
//!
//! let light_blue = Rgba::rgb(173, 216, 230);
//! let dark_blue = invert_lightness(light_blue);
//! assert!(dark_blue.b > dark_blue.r);
//! assert!(contrast_ratio(dark_blue.opaque(), (255, 255, 255)) > 4.5);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized color: integer channels and a clamped float alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in `[0, 1]`.
    pub a: f32,
}

impl Rgba {
    /// Opaque white, the page background assumed when no ancestor paints one.
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    /// Opaque black.
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color with alpha. Alpha is clamped to `[0, 1]`; NaN becomes 0.
    pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self {
            r,
            g,
            b,
            a: clamp01(a),
        }
    }

    /// The channel triple with alpha dropped.
    pub const fn opaque(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Returns true if alpha is exactly 1.
    pub fn is_opaque(self) -> bool {
        self.a >= 1.0
    }

    /// Convert to hue/saturation/lightness.
    pub fn to_hsl(self) -> Hsl {
        rgb_to_hsl(self.r, self.g, self.b)
    }

    /// Build a color from HSL, keeping the given alpha.
    pub fn from_hsl(hsl: Hsl, a: f32) -> Self {
        let (r, g, b) = hsl.to_rgb();
        Self::rgba(r, g, b, a)
    }

    /// HSL saturation of this color.
    pub fn saturation(self) -> f32 {
        self.to_hsl().s
    }

    /// Relative luminance of the opaque channels.
    pub fn luminance(self) -> f32 {
        relative_luminance(self.opaque())
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<(u8, u8, u8)> for Rgba {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::rgb(r, g, b)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::extract::serialize(*self))
    }
}

/// Hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub const fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }

    /// Convert back to 8-bit channels, rounded to nearest and clamped.
    pub fn to_rgb(self) -> (u8, u8, u8) {
        hsl_to_rgb(self.h, self.s, self.l)
    }

    /// Same hue and saturation with a different lightness (clamped).
    pub fn with_lightness(self, l: f32) -> Self {
        Self {
            l: clamp01(l),
            ..self
        }
    }
}

/// Replace lightness `l` with `1 - l`, keeping hue, saturation and alpha.
///
/// Saturated colors stay the same hue: a pale blue becomes a deep blue
/// rather than drifting toward orange.
pub fn invert_lightness(color: Rgba) -> Rgba {
    let hsl = color.to_hsl();
    Rgba::from_hsl(hsl.with_lightness(1.0 - hsl.l), color.a)
}

/// sRGB relative luminance with the 0.2126/0.7152/0.0722 weights.
pub fn relative_luminance((r, g, b): (u8, u8, u8)) -> f32 {
    0.2126 * decode_srgb(r) + 0.7152 * decode_srgb(g) + 0.0722 * decode_srgb(b)
}

/// Contrast ratio between two opaque colors, in `[1, 21]`.
pub fn contrast_ratio(a: (u8, u8, u8), b: (u8, u8, u8)) -> f32 {
    let (lighter, darker) = {
        let la = relative_luminance(a);
        let lb = relative_luminance(b);
        if la >= lb { (la, lb) } else { (lb, la) }
    };
    (lighter + 0.05) / (darker + 0.05)
}

pub(crate) fn clamp01(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Decode an 8 bit sRGB value into linear light.
fn decode_srgb(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[allow(clippy::many_single_char_names)]
fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = f32::midpoint(max, min);

    if (max - min).abs() < f32::EPSILON {
        return Hsl::new(0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let mut h = if (max - r).abs() < f32::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f32::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    h *= 60.0;
    if h >= 360.0 {
        h -= 360.0;
    }
    Hsl::new(h, clamp01(s), clamp01(l))
}

#[allow(clippy::many_single_char_names, clippy::suboptimal_flops)]
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    let s = clamp01(s);
    let l = clamp01(l);

    if s == 0.0 {
        let v = to_u8(l);
        return (v, v, v);
    }

    let h = h.rem_euclid(360.0) / 360.0;
    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    (
        to_u8(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        to_u8(hue_to_rgb(p, q, h)),
        to_u8(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}
