//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object or TOML document is a
//! valid configuration.
//!
//! ```rust
//! use umbra::config::{InvertConfig, InversionPolicy};
//!
//! let config = InvertConfig::from_toml(r##"
//!     root_selector = "#app"
//!
//!     [contrast]
//!     min_ratio = 7.0
//!
//!     [policy]
//!     kind = "neutral-only"
//!     saturation_threshold = 0.3
//! "##).unwrap();
//!
//! assert_eq!(config.root_selector, "#app");
//! assert!(matches!(config.policy, InversionPolicy::NeutralOnly { .. }));
//! ```

#[cfg(feature = "native")]
use std::fs;
#[cfg(feature = "native")]
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Rgba;
use crate::contrast::ContrastSearch;

/// Storage key used when none is configured.
pub const DEFAULT_STORAGE_KEY: &str = "aiTutorThemeInverted";

/// Root selector used when none is configured.
pub const DEFAULT_ROOT_SELECTOR: &str = "html";

/// Selectors marking regions whose highlight colors change by class toggling.
pub const DEFAULT_DYNAMIC_SELECTORS: [&str; 9] = [
    // current conversation in the sidebar
    ".chat-item.active",
    ".chat-item.is-active",
    ".chat-item.selected",
    ".chat-item.is-selected",
    // radio controls
    ".el-radio.is-checked",
    ".el-radio__input.is-checked",
    ".el-radio-button.is-active",
    // generic active/checked states
    ".is-active",
    ".is-checked",
];

/// Which colors get inverted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InversionPolicy {
    /// Invert every visible color.
    #[default]
    Lightness,
    /// Invert only near-gray colors and leave saturated accents alone.
    NeutralOnly {
        #[serde(default = "default_saturation_threshold")]
        saturation_threshold: f32,
    },
}

fn default_saturation_threshold() -> f32 {
    0.45
}

impl InversionPolicy {
    /// Neutral-only policy with the default saturation threshold.
    pub fn neutral_only() -> Self {
        InversionPolicy::NeutralOnly {
            saturation_threshold: default_saturation_threshold(),
        }
    }

    /// Returns true if the policy lets `color` be inverted. Alpha is checked
    /// separately.
    pub fn admits(self, color: Rgba) -> bool {
        match self {
            InversionPolicy::Lightness => true,
            InversionPolicy::NeutralOnly {
                saturation_threshold,
            } => color.saturation() <= saturation_threshold,
        }
    }
}

/// Configuration for an [`InversionEngine`](crate::engine::InversionEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvertConfig {
    /// Selector of the subtree to theme.
    pub root_selector: String,
    /// Key the last choice is persisted under.
    pub storage_key: String,
    /// Contrast correction for text colors.
    pub contrast: ContrastSearch,
    /// Colors at or below this alpha are not worth inverting.
    pub alpha_epsilon: f32,
    /// Backgrounds at or below this alpha are skipped when looking for the
    /// background text sits on.
    pub background_alpha_threshold: f32,
    /// Selectors marking dynamic contexts.
    pub dynamic_selectors: Vec<String>,
    /// Which colors get inverted.
    pub policy: InversionPolicy,
}

impl Default for InvertConfig {
    fn default() -> Self {
        Self {
            root_selector: DEFAULT_ROOT_SELECTOR.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            contrast: ContrastSearch::default(),
            alpha_epsilon: 0.01,
            background_alpha_threshold: 0.05,
            dynamic_selectors: DEFAULT_DYNAMIC_SELECTORS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            policy: InversionPolicy::default(),
        }
    }
}

impl InvertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root selector. Blank input keeps the current one.
    pub fn with_root_selector(mut self, selector: impl Into<String>) -> Self {
        let selector = selector.into();
        if !selector.trim().is_empty() {
            self.root_selector = selector.trim().to_string();
        }
        self
    }

    /// Sets the storage key. Blank input keeps the current one.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.storage_key = key.trim().to_string();
        }
        self
    }

    /// Replaces the contrast search parameters.
    pub fn with_contrast(mut self, contrast: ContrastSearch) -> Self {
        self.contrast = contrast;
        self
    }

    /// Replaces the dynamic-context selectors.
    pub fn with_dynamic_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dynamic_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the inversion policy.
    pub fn with_policy(mut self, policy: InversionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    /// Returns `ConfigValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.root_selector.trim().is_empty() {
            return Err(ConfigValidationError::Empty("root_selector"));
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigValidationError::Empty("storage_key"));
        }
        if let Some(bad) = self.dynamic_selectors.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigValidationError::InvalidSelector(bad.clone()));
        }
        let c = &self.contrast;
        if !(1.0..=21.0).contains(&c.min_ratio) {
            return Err(ConfigValidationError::OutOfRange {
                field: "contrast.min_ratio",
                value: c.min_ratio,
            });
        }
        if !(c.step > 0.0 && c.step <= 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "contrast.step",
                value: c.step,
            });
        }
        if c.max_steps == 0 {
            return Err(ConfigValidationError::OutOfRange {
                field: "contrast.max_steps",
                value: 0.0,
            });
        }
        for (field, value) in [
            ("alpha_epsilon", self.alpha_epsilon),
            ("background_alpha_threshold", self.background_alpha_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::OutOfRange { field, value });
            }
        }
        if let InversionPolicy::NeutralOnly {
            saturation_threshold,
        } = self.policy
        {
            if !(0.0..=1.0).contains(&saturation_threshold) {
                return Err(ConfigValidationError::OutOfRange {
                    field: "policy.saturation_threshold",
                    value: saturation_threshold,
                });
            }
        }
        Ok(())
    }

    /// Load a configuration from JSON text.
    ///
    /// # Errors
    /// Returns `ConfigError` if JSON parsing or validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: InvertConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from TOML text.
    ///
    /// # Errors
    /// Returns `ConfigError` if TOML parsing or validation fails.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: InvertConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a file (format inferred by extension).
    ///
    /// # Errors
    /// Returns `ConfigError` if reading, parsing, or validation fails.
    ///
    /// # Availability
    /// This method is only available with the `native` feature (not on WASM).
    #[cfg(feature = "native")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.into())),
            None => Err(ConfigError::UnsupportedFormat("unknown".into())),
        }
    }

    /// Serialize this configuration to JSON.
    ///
    /// # Errors
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A configuration value that cannot be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("invalid dynamic selector {0:?}")]
    InvalidSelector(String),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

/// Error loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Validation error: {0}")]
    Validation(#[from] ConfigValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = InvertConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.root_selector, "html");
        assert_eq!(config.contrast.max_steps, 20);
        assert_eq!(config.dynamic_selectors.len(), 9);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = InvertConfig::from_json("{}").expect("empty object");
        assert_eq!(config, InvertConfig::default());
    }

    #[test]
    fn test_json_partial_override() {
        let config = InvertConfig::from_json(
            r#"{"storage_key":"k","contrast":{"step":0.05},"policy":{"kind":"neutral-only"}}"#,
        )
        .expect("parse");
        assert_eq!(config.storage_key, "k");
        assert!((config.contrast.step - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.contrast.max_steps, 20);
        assert_eq!(config.policy, InversionPolicy::neutral_only());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_ratio = InvertConfig::default().with_contrast(ContrastSearch {
            min_ratio: 0.5,
            ..ContrastSearch::default()
        });
        assert!(matches!(
            bad_ratio.validate(),
            Err(ConfigValidationError::OutOfRange {
                field: "contrast.min_ratio",
                ..
            })
        ));

        let bad_selector = InvertConfig::default().with_dynamic_selectors(["  "]);
        assert!(matches!(
            bad_selector.validate(),
            Err(ConfigValidationError::InvalidSelector(_))
        ));

        let err = InvertConfig::from_json(r#"{"alpha_epsilon": 3.0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_blank_builders_keep_defaults() {
        let config = InvertConfig::new()
            .with_root_selector("   ")
            .with_storage_key("");
        assert_eq!(config.root_selector, DEFAULT_ROOT_SELECTOR);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);

        let config = InvertConfig::new().with_storage_key("  custom ");
        assert_eq!(config.storage_key, "custom");
    }

    #[test]
    fn test_policy_admits() {
        let gray = Rgba::rgb(200, 200, 200);
        let blue = Rgba::rgb(0, 90, 255);
        assert!(InversionPolicy::Lightness.admits(blue));
        assert!(InversionPolicy::neutral_only().admits(gray));
        assert!(!InversionPolicy::neutral_only().admits(blue));
    }

    #[test]
    fn test_json_round_trip() {
        let config = InvertConfig::default().with_policy(InversionPolicy::neutral_only());
        let json = config.to_json().expect("serialize");
        assert_eq!(InvertConfig::from_json(&json).expect("parse"), config);
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let toml_path = dir.path().join("umbra.toml");
        std::fs::write(&toml_path, "storage_key = \"from-file\"\n").expect("write");
        let config = InvertConfig::from_file(&toml_path).expect("load toml");
        assert_eq!(config.storage_key, "from-file");

        let yaml_path = dir.path().join("umbra.yaml");
        std::fs::write(&yaml_path, "storage_key: x\n").expect("write");
        assert!(matches!(
            InvertConfig::from_file(&yaml_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
