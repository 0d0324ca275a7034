//! Config manager for loading settings and writing files atomically.
//!
//! Key features:
//! - TOML by default, JSON for `.json` files
//! - Defaults for every missing section and key
//! - Validation on load
//! - Atomic writes (write to temp file, then rename)

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::settings::WorkflowSettings;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "workflow_config.toml";

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension (`.json` → JSON, else TOML).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Loads workflow configuration.
///
/// The loaded settings are handed out by value; callers freeze them
/// (typically in an `Arc`) before the run starts.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: WorkflowSettings,
    /// Whether the settings came from the file (false = built-in defaults).
    loaded_from_file: bool,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` or `load_or_default()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: WorkflowSettings::default(),
            loaded_from_file: false,
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Get a mutable reference to the current settings (for CLI overrides).
    pub fn settings_mut(&mut self) -> &mut WorkflowSettings {
        &mut self.settings
    }

    /// Consume the manager and return the settings.
    pub fn into_settings(self) -> WorkflowSettings {
        self.settings
    }

    /// Whether the settings were read from the config file.
    pub fn loaded_from_file(&self) -> bool {
        self.loaded_from_file
    }

    /// Load config from file.
    ///
    /// Returns error if the file doesn't exist or is invalid.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = parse_settings(&content, ConfigFormat::from_path(&self.config_path))?;
        self.loaded_from_file = true;

        tracing::debug!("Loaded workflow config from {}", self.config_path.display());
        Ok(())
    }

    /// Load config from file, falling back to defaults if it doesn't exist.
    ///
    /// An existing but invalid file is still an error.
    pub fn load_or_default(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            self.load()
        } else {
            tracing::debug!(
                "No config at {}, using built-in defaults",
                self.config_path.display()
            );
            self.settings = WorkflowSettings::default();
            self.loaded_from_file = false;
            Ok(())
        }
    }

    /// Save the current settings as TOML atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        atomic_write(&self.config_path, content.as_bytes())?;
        Ok(())
    }

    /// Generate config content with a header comment.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();
        output.push_str("# Image Description Toolkit - Workflow Configuration\n");
        output.push_str("# Missing keys fall back to built-in defaults.\n\n");
        output.push_str(&toml::to_string_pretty(&self.settings)?);
        Ok(output)
    }
}

/// Parse and validate settings content.
pub fn parse_settings(content: &str, format: ConfigFormat) -> ConfigResult<WorkflowSettings> {
    let settings: WorkflowSettings = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    settings.validate().map_err(ConfigError::Invalid)?;
    Ok(settings)
}

/// Write content to a file atomically.
///
/// Writes to a sibling temp file first, then renames over the target, so
/// readers never observe a partially written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("nope.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_or_default_uses_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(DEFAULT_CONFIG_FILE);

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_default().unwrap();

        assert!(!manager.loaded_from_file());
        assert_eq!(manager.settings(), &WorkflowSettings::default());
        // Defaults are never written back implicitly
        assert!(!config_path.exists());
    }

    #[test]
    fn load_preserves_custom_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(
            &config_path,
            "[workflow]\nbase_output_dir = \"my_runs\"\n\n[workflow.steps.image_description]\nmodel = \"llava:7b\"\n",
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load().unwrap();

        assert!(manager.loaded_from_file());
        assert_eq!(manager.settings().workflow.base_output_dir, "my_runs");
        assert_eq!(
            manager.settings().workflow.steps.image_description.model.as_deref(),
            Some("llava:7b")
        );
    }

    #[test]
    fn json_config_is_accepted() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("workflow_config.json");
        fs::write(
            &config_path,
            r#"{
                "workflow": {
                    "base_output_dir": "json_output",
                    "steps": { "image_conversion": { "quality": 70, "keep_metadata": false } }
                },
                "file_patterns": { "images": [".jpg"] }
            }"#,
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load().unwrap();

        let settings = manager.settings();
        assert_eq!(settings.workflow.base_output_dir, "json_output");
        assert_eq!(settings.workflow.steps.image_conversion.quality, 70);
        assert!(!settings.workflow.steps.image_conversion.keep_metadata);
        assert_eq!(settings.file_patterns.images, vec![".jpg".to_string()]);
        assert_eq!(settings.file_patterns.videos.len(), 8);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("bad.toml");
        fs::write(&config_path, "[workflow.steps.image_conversion]\nquality = 150\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        let err = manager.load_or_default().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("workflow.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.settings_mut().workflow.steps.html_generation.title = "Trip".to_string();
        manager.save().unwrap();

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().workflow.steps.html_generation.title, "Trip");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!dir.path().join("summary.json.tmp").exists());
    }
}
