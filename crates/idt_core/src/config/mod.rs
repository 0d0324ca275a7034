//! Configuration management for the workflow.
//!
//! This module provides:
//! - TOML-based configuration with logical sections (JSON accepted too)
//! - Defaults for every missing key
//! - Validation on load
//! - Atomic file writes (write to temp, then rename)
//!
//! Settings are loaded once at startup and then shared read-only with the
//! orchestrator and every step runner.
//!
//! # Example
//!
//! ```no_run
//! use idt_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new("workflow_config.toml");
//! config.load_or_default().unwrap();
//!
//! println!("Base output: {}", config.settings().workflow.base_output_dir);
//! ```

mod describer;
mod manager;
mod settings;

pub use describer::{DescriberConfig, BUILTIN_PROMPT_STYLE};
pub use manager::{
    atomic_write, parse_settings, ConfigError, ConfigFormat, ConfigManager, ConfigResult,
    DEFAULT_CONFIG_FILE,
};
pub use settings::{
    FilePatternRegistry, HtmlGenerationSettings, ImageConversionSettings,
    ImageDescriptionSettings, StepsSettings, ToolCommand, ToolSettings, VideoExtractionSettings,
    WorkflowSection, WorkflowSettings,
};
