//! Video step - extracts frames from video files.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::config::atomic_write;
use crate::models::{artifact, FileCategory, StepResult, WorkflowStep};
use crate::orchestrator::errors::StepError;
use crate::orchestrator::step::StepRunner;
use crate::orchestrator::types::{Context, RunState, StepInput};

/// Frame extraction step.
///
/// Hands the whole input directory to the frame extractor and counts the
/// images that landed in the frames directory afterwards.
#[derive(Debug, Default)]
pub struct VideoStep;

impl VideoStep {
    pub fn new() -> Self {
        Self
    }
}

impl StepRunner for VideoStep {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Video
    }

    fn description(&self) -> &str {
        "Extract frames from videos"
    }

    fn run(&self, ctx: &Context, input: &StepInput, _state: &RunState) -> Result<StepResult, StepError> {
        let input_dir = &input.current_input_dir;
        let videos = ctx.discovery.find_files(input_dir, FileCategory::Videos, true);

        if videos.is_empty() {
            ctx.logger
                .info(&format!("No video files found in {}", input_dir.display()));
            return Ok(StepResult::nothing_to_do(
                WorkflowStep::Video,
                ctx.layout.step_path(WorkflowStep::Video),
            ));
        }
        ctx.logger
            .info(&format!("Found {} video file(s) to process", videos.len()));

        let frames_dir = ctx.layout.step_dir(WorkflowStep::Video, true)?;
        let config_file = ctx.resolve_tool_path(&ctx.settings.workflow.steps.video_extraction.config_file);
        point_extractor_at(ctx, &config_file, &frames_dir);

        let args = vec![
            input_dir.display().to_string(),
            "--config".to_string(),
            config_file.display().to_string(),
            "--log-dir".to_string(),
            ctx.logs_dir().display().to_string(),
        ];
        ctx.run_tool(WorkflowStep::Video, args)?;

        let frames = ctx
            .discovery
            .find_files(&frames_dir, FileCategory::Images, true)
            .len();
        ctx.logger.info(&format!(
            "Extracted {} frame(s) to {}",
            frames,
            frames_dir.display()
        ));

        Ok(StepResult::completed(WorkflowStep::Video, videos.len(), frames_dir)
            .with_artifact(artifact::EXTRACTED_FRAMES, frames as u64))
    }
}

/// Set `output_directory` in the extractor's JSON config to `frames_dir`.
///
/// A missing or unusable config is only a warning; the extractor then
/// falls back to its own defaults.
fn point_extractor_at(ctx: &Context, config_file: &Path, frames_dir: &Path) {
    if !config_file.is_file() {
        ctx.logger.debug(&format!(
            "Extractor config {} not found, leaving output directory to the extractor",
            config_file.display()
        ));
        return;
    }

    if let Err(e) = update_output_directory(config_file, frames_dir) {
        ctx.logger.warn(&format!(
            "Could not update extractor config {}: {}",
            config_file.display(),
            e
        ));
    }
}

fn update_output_directory(config_file: &Path, frames_dir: &Path) -> Result<(), StepError> {
    let content = fs::read_to_string(config_file)
        .map_err(|e| StepError::io_error("reading extractor config", e))?;
    let mut config: Value = serde_json::from_str(&content)
        .map_err(|e| StepError::other(format!("invalid JSON: {}", e)))?;

    let Some(object) = config.as_object_mut() else {
        return Err(StepError::other("config is not a JSON object"));
    };
    object.insert(
        "output_directory".to_string(),
        Value::String(frames_dir.display().to_string()),
    );

    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| StepError::other(format!("serialize failed: {}", e)))?;
    atomic_write(config_file, json.as_bytes())
        .map_err(|e| StepError::io_error("writing extractor config", e))
}
