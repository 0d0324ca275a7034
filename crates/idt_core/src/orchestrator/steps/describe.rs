//! Describe step - generates AI descriptions for images.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DescriberConfig, BUILTIN_PROMPT_STYLE};
use crate::discovery::dir_has_entries;
use crate::models::{artifact, FileCategory, StepResult, WorkflowStep};
use crate::orchestrator::errors::StepError;
use crate::orchestrator::step::StepRunner;
use crate::orchestrator::types::{push_search_dir, Context, RunState, StepInput};

/// File the describer appends its entries to.
pub const DESCRIPTION_FILE_NAME: &str = "image_descriptions.txt";

/// Image description step.
///
/// Images may live in several places at once: the user's input, the
/// converted images and the extracted frames. The describer is run once
/// per directory that holds images, in that order, all appending to the
/// same description file. The first failing directory fails the step.
#[derive(Debug, Default)]
pub struct DescribeStep;

impl DescribeStep {
    pub fn new() -> Self {
        Self
    }

    fn search_dirs(ctx: &Context, input: &StepInput) -> Vec<PathBuf> {
        let mut dirs = vec![input.original_input_dir.clone()];
        push_search_dir(&mut dirs, input.current_input_dir.clone());

        for step in [WorkflowStep::Convert, WorkflowStep::Video] {
            let dir = ctx.layout.step_path(step);
            if dir_has_entries(&dir) {
                push_search_dir(&mut dirs, dir);
            }
        }
        dirs
    }

    /// Options forwarded after the per-directory arguments.
    fn describer_options(ctx: &Context) -> Vec<String> {
        let description = &ctx.settings.workflow.steps.image_description;
        let config_file = ctx.resolve_tool_path(&description.config_file);
        let mut args = Vec::new();

        let describer_config = if config_file.is_file() {
            args.push("--config".to_string());
            args.push(config_file.display().to_string());
            DescriberConfig::load(&config_file)
        } else {
            None
        };

        if let Some(ref model) = description.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        let prompt_style = match description.prompt_style {
            Some(ref style) => Some(style.clone()),
            None => describer_config
                .as_ref()
                .map(|c| c.default_prompt_style())
                .filter(|style| *style != BUILTIN_PROMPT_STYLE)
                .map(str::to_string),
        };
        if let Some(style) = prompt_style {
            args.push("--prompt-style".to_string());
            args.push(style);
        }

        args
    }

    fn describe_dir(ctx: &Context, dir: &Path, output_dir: &Path, options: &[String]) -> Result<(), StepError> {
        let mut args = vec![
            dir.display().to_string(),
            "--recursive".to_string(),
            "--output-dir".to_string(),
            output_dir.display().to_string(),
            "--log-dir".to_string(),
            ctx.logs_dir().display().to_string(),
        ];
        args.extend(options.iter().cloned());
        ctx.run_tool(WorkflowStep::Describe, args)?;
        Ok(())
    }
}

impl StepRunner for DescribeStep {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Describe
    }

    fn description(&self) -> &str {
        "Generate AI descriptions for images"
    }

    fn run(&self, ctx: &Context, input: &StepInput, _state: &RunState) -> Result<StepResult, StepError> {
        let mut work = Vec::new();
        for dir in Self::search_dirs(ctx, input) {
            let images = ctx.discovery.find_files(&dir, FileCategory::Images, true);
            if images.is_empty() {
                ctx.logger
                    .debug(&format!("No images in {}", dir.display()));
                continue;
            }
            ctx.logger.info(&format!(
                "Found {} image(s) in {}",
                images.len(),
                dir.display()
            ));
            work.push((dir, images.len()));
        }

        if work.is_empty() {
            ctx.logger.info("No image files found to describe");
            return Ok(StepResult::nothing_to_do(
                WorkflowStep::Describe,
                ctx.layout.step_path(WorkflowStep::Describe),
            ));
        }

        let output_dir = ctx.layout.step_dir(WorkflowStep::Describe, true)?;
        let options = Self::describer_options(ctx);

        let mut processed = 0;
        for (index, (dir, count)) in work.iter().enumerate() {
            ctx.logger.section(&format!(
                "Describing directory {}/{}: {}",
                index + 1,
                work.len(),
                dir.display()
            ));
            Self::describe_dir(ctx, dir, &output_dir, &options)?;
            processed += count;
        }

        let description_file = output_dir.join(DESCRIPTION_FILE_NAME);
        let size = match fs::metadata(&description_file) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(StepError::missing_output(format!(
                    "Description file was not created: {}",
                    description_file.display()
                )))
            }
        };
        ctx.logger.info(&format!(
            "Descriptions saved to {} ({} bytes)",
            description_file.display(),
            size
        ));

        let mut result = StepResult::completed(WorkflowStep::Describe, processed, output_dir)
            .with_artifact(artifact::DESCRIPTION_FILE_SIZE, size)
            .with_artifact(artifact::DIRECTORIES_PROCESSED, work.len() as u64);
        result.description_file = Some(description_file);
        Ok(result)
    }
}
