//! Read-only view of the image describer's own JSON configuration.
//!
//! The workflow never writes this file. It only reads the default model
//! and prompt style to label run directories and to forward a
//! non-default prompt style to the describer.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Prompt style the describer uses when none is given.
pub const BUILTIN_PROMPT_STYLE: &str = "detailed";

#[derive(Debug, Clone, Default, Deserialize)]
struct ModelSettings {
    #[serde(default)]
    model: Option<String>,
}

/// The fields of the describer config the workflow cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriberConfig {
    #[serde(default)]
    model_settings: ModelSettings,
    #[serde(default)]
    default_prompt_style: Option<String>,
    #[serde(default)]
    prompt_variations: Map<String, Value>,
}

impl DescriberConfig {
    /// Load the describer config. Missing or unreadable files yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Could not parse describer config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Default model configured for the describer.
    pub fn model(&self) -> Option<&str> {
        self.model_settings
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
    }

    /// Default prompt style, if it names one of the configured variations.
    ///
    /// Falls back to `detailed` when the default is unset or unknown.
    pub fn default_prompt_style(&self) -> &str {
        match self.default_prompt_style.as_deref() {
            Some(style) if self.prompt_variations.contains_key(style) => style,
            _ => BUILTIN_PROMPT_STYLE,
        }
    }
}
