//! Command-line arguments and run planning for the `workflow` binary.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Local};
use clap::Parser;

use idt_core::config::{
    ConfigManager, DescriberConfig, WorkflowSettings, BUILTIN_PROMPT_STYLE, DEFAULT_CONFIG_FILE,
};
use idt_core::layout::absolutize;
use idt_core::models::{parse_step_list, WorkflowStep};
use idt_core::naming::{run_dir_name, unique_dir};

/// Steps run when `--steps` is not given.
pub const DEFAULT_STEPS: &str = "video,convert,describe,html";

/// Model label used in directory names when none is configured anywhere.
const UNKNOWN_MODEL: &str = "unknown";

#[derive(Parser, Debug)]
#[command(name = "workflow")]
#[command(version, about = "Run the image description workflow: video frames, HEIC conversion, AI descriptions and an HTML report")]
pub struct Cli {
    /// Directory containing videos and/or images
    pub input_dir: PathBuf,

    /// Output directory (default: a timestamped directory in the current directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated steps to run: video, convert, describe, html
    #[arg(short, long, default_value = DEFAULT_STEPS, value_parser = parse_steps)]
    pub steps: StepList,

    /// Workflow configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the describer model
    #[arg(long)]
    pub model: Option<String>,

    /// Override the describer prompt style
    #[arg(long)]
    pub prompt_style: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Show what would run without running anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Parsed `--steps` value, kept in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepList(pub Vec<WorkflowStep>);

fn parse_steps(value: &str) -> Result<StepList, String> {
    parse_step_list(value).map(StepList)
}

/// Load settings from `--config`, or from the default file when present.
///
/// An explicit config file must exist; the default one is optional.
pub fn load_settings(cli: &Cli) -> Result<WorkflowSettings> {
    let mut manager = match cli.config {
        Some(ref path) => {
            let mut manager = ConfigManager::new(path);
            manager
                .load()
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            manager
        }
        None => {
            let mut manager = ConfigManager::new(DEFAULT_CONFIG_FILE);
            manager
                .load_or_default()
                .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_FILE))?;
            manager
        }
    };

    let describe = &mut manager.settings_mut().workflow.steps.image_description;
    if let Some(ref model) = cli.model {
        describe.model = Some(model.clone());
    }
    if let Some(ref style) = cli.prompt_style {
        describe.prompt_style = Some(style.clone());
    }
    Ok(manager.into_settings())
}

/// Model and prompt style that label the run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLabels {
    pub model: String,
    pub prompt_style: String,
}

impl RunLabels {
    /// Resolve from the settings (CLI overrides already applied), then
    /// the describer's own config file, then built-in fallbacks.
    pub fn resolve(settings: &WorkflowSettings) -> Self {
        let describe = &settings.workflow.steps.image_description;
        let describer = DescriberConfig::load(&settings.tools.resolve_path(&describe.config_file));

        let model = describe
            .model
            .clone()
            .or_else(|| describer.as_ref().and_then(|d| d.model().map(str::to_string)))
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        let prompt_style = describe.prompt_style.clone().unwrap_or_else(|| {
            describer
                .as_ref()
                .map(|d| d.default_prompt_style().to_string())
                .unwrap_or_else(|| BUILTIN_PROMPT_STYLE.to_string())
        });

        Self {
            model,
            prompt_style,
        }
    }
}

/// Output directory for the run. Nothing is created here.
pub fn resolve_output_dir(
    explicit: Option<&Path>,
    cwd: &Path,
    labels: &RunLabels,
    at: DateTime<Local>,
) -> PathBuf {
    match explicit {
        Some(dir) => absolutize(dir),
        None => unique_dir(cwd, &run_dir_name(&labels.model, &labels.prompt_style, at)),
    }
}

/// Print what a run would do.
pub fn print_plan(input_dir: &Path, output_dir: &Path, steps: &[WorkflowStep], labels: &RunLabels) {
    let names: Vec<&str> = steps.iter().map(|s| s.as_str()).collect();
    println!("Dry run - nothing will be executed");
    println!("  Input directory:  {}", input_dir.display());
    println!("  Output directory: {}", output_dir.display());
    println!("  Steps:            {}", names.join(", "));
    println!("  Model:            {}", labels.model);
    println!("  Prompt style:     {}", labels.prompt_style);
}
