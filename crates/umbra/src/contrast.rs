//! Contrast correction for inverted text colors.
//!
//! Inverting text and background independently usually keeps them apart,
//! but mid-tones collapse toward each other. [`ContrastSearch::adjust`]
//! walks the text lightness away from the background in fixed steps until
//! the target ratio is met or the step budget runs out, and returns the best
//! candidate it saw. It never fails and never returns something with less
//! contrast than its input.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::color::{Rgba, contrast_ratio, relative_luminance};

/// WCAG AA ratio for body text.
pub const DEFAULT_MIN_RATIO: f32 = 4.5;

/// Parameters of the lightness search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastSearch {
    /// Target contrast ratio.
    pub min_ratio: f32,
    /// Lightness added (or removed) per step.
    pub step: f32,
    /// Maximum number of steps tried.
    pub max_steps: u32,
}

impl Default for ContrastSearch {
    fn default() -> Self {
        Self {
            min_ratio: DEFAULT_MIN_RATIO,
            step: 0.03,
            max_steps: 20,
        }
    }
}

impl ContrastSearch {
    /// Search with a different target ratio.
    pub fn with_min_ratio(mut self, min_ratio: f32) -> Self {
        self.min_ratio = min_ratio;
        self
    }

    /// Nudge `text` lightness until it reaches `min_ratio` against `background`.
    ///
    /// Only the opaque channels take part in the ratio; the text alpha is
    /// carried through unchanged.
    pub fn adjust(&self, text: Rgba, background: Rgba) -> Rgba {
        let bg = background.opaque();
        let start = contrast_ratio(text.opaque(), bg);
        if start >= self.min_ratio {
            return text;
        }

        let hsl = text.to_hsl();
        let direction = if relative_luminance(bg) > 0.5 {
            -1.0
        } else {
            1.0
        };

        let mut best = text;
        let mut best_ratio = start;
        for i in 1..=self.max_steps {
            let offset = i as f32 * self.step * direction;
            let candidate = Rgba::from_hsl(hsl.with_lightness(hsl.l + offset), text.a);
            let ratio = contrast_ratio(candidate.opaque(), bg);
            if ratio > best_ratio {
                best_ratio = ratio;
                best = candidate;
            }
            if ratio >= self.min_ratio {
                trace!(umbra.steps = i, umbra.ratio = ratio, "contrast target reached");
                return candidate;
            }
        }

        trace!(
            umbra.ratio = best_ratio,
            umbra.target = self.min_ratio,
            "contrast budget exhausted"
        );
        best
    }
}

/// [`ContrastSearch::adjust`] with default step parameters.
pub fn adjust(text: Rgba, background: Rgba, min_ratio: f32) -> Rgba {
    ContrastSearch::default()
        .with_min_ratio(min_ratio)
        .adjust(text, background)
}
