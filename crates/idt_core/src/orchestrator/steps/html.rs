//! HTML step - renders the description file as an HTML report.

use std::path::PathBuf;

use crate::discovery::find_files_with_suffixes;
use crate::models::{artifact, FileCategory, StepResult, WorkflowStep};
use crate::orchestrator::errors::StepError;
use crate::orchestrator::step::StepRunner;
use crate::orchestrator::types::{Context, RunState, StepInput};

/// Name of the generated report.
pub const HTML_FILE_NAME: &str = "image_descriptions.html";

/// HTML report step.
///
/// The description file is looked up in order: the explicitly configured
/// file, one found in the original input directory, the one in the
/// descriptions output directory, and finally the file recorded by a
/// describe step earlier in this run. No file means nothing to do.
#[derive(Debug, Default)]
pub struct HtmlStep {
    /// Explicit description file, tried first.
    description_file: Option<PathBuf>,
}

impl HtmlStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render this description file when it exists.
    pub fn with_description_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.description_file = Some(path.into());
        self
    }

    fn locate_description_file(
        &self,
        ctx: &Context,
        input: &StepInput,
        state: &RunState,
    ) -> Option<PathBuf> {
        if let Some(ref explicit) = self.description_file {
            if explicit.is_file() {
                return Some(explicit.clone());
            }
            ctx.logger.warn(&format!(
                "Description file {} does not exist, searching elsewhere",
                explicit.display()
            ));
        }

        let in_input = ctx
            .discovery
            .find_files(&input.original_input_dir, FileCategory::Descriptions, true);
        if let Some(found) = in_input.into_iter().next() {
            return Some(found);
        }

        let descriptions_dir = ctx.layout.step_path(WorkflowStep::Describe);
        let in_output = ctx
            .discovery
            .find_files(&descriptions_dir, FileCategory::Descriptions, false);
        if let Some(found) = in_output.into_iter().next() {
            return Some(found);
        }

        state
            .description_file()
            .filter(|p| p.is_file())
            .map(|p| p.to_path_buf())
    }
}

impl StepRunner for HtmlStep {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Html
    }

    fn description(&self) -> &str {
        "Create HTML report from descriptions"
    }

    fn run(&self, ctx: &Context, input: &StepInput, state: &RunState) -> Result<StepResult, StepError> {
        let Some(description_file) = self.locate_description_file(ctx, input, state) else {
            ctx.logger
                .info("No description file found, skipping HTML generation");
            return Ok(StepResult::nothing_to_do(
                WorkflowStep::Html,
                ctx.layout.step_path(WorkflowStep::Html),
            ));
        };
        ctx.logger.info(&format!(
            "Using description file {}",
            description_file.display()
        ));

        let html = &ctx.settings.workflow.steps.html_generation;
        let html_dir = ctx.layout.step_dir(WorkflowStep::Html, true)?;
        let html_file = html_dir.join(HTML_FILE_NAME);

        let mut args = vec![
            description_file.display().to_string(),
            html_file.display().to_string(),
            "--title".to_string(),
            html.title.clone(),
            "--log-dir".to_string(),
            ctx.logs_dir().display().to_string(),
        ];
        if html.include_details {
            args.push("--full".to_string());
        }
        ctx.run_tool(WorkflowStep::Html, args)?;

        if !html_file.is_file() {
            return Err(StepError::missing_output(format!(
                "HTML report was not created: {}",
                html_file.display()
            )));
        }

        let html_count = find_files_with_suffixes(&html_dir, &[".html"], false).len();
        ctx.logger
            .info(&format!("HTML report saved to {}", html_file.display()));

        let mut result = StepResult::completed(WorkflowStep::Html, 1, html_dir)
            .with_artifact(artifact::HTML_FILE_COUNT, html_count as u64);
        result.html_file = Some(html_file);
        Ok(result)
    }
}
