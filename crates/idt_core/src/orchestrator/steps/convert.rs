//! Convert step - converts HEIC images to JPG.

use std::path::{Path, PathBuf};

use crate::models::{artifact, FileCategory, StepResult, WorkflowStep};
use crate::orchestrator::errors::StepError;
use crate::orchestrator::step::StepRunner;
use crate::orchestrator::types::{push_search_dir, Context, RunState, StepInput};

/// HEIC conversion step.
///
/// Always searches the original input directory, plus the current input
/// when an earlier step replaced it. The converter runs once per
/// directory that holds HEIC files.
#[derive(Debug, Default)]
pub struct ConvertStep;

impl ConvertStep {
    pub fn new() -> Self {
        Self
    }

    fn search_dirs(input: &StepInput) -> Vec<PathBuf> {
        let mut dirs = vec![input.original_input_dir.clone()];
        push_search_dir(&mut dirs, input.current_input_dir.clone());
        dirs
    }

    fn converter_args(ctx: &Context, source: &Path, output_dir: &Path) -> Vec<String> {
        let conversion = &ctx.settings.workflow.steps.image_conversion;
        let mut args = vec![
            source.display().to_string(),
            "--output".to_string(),
            output_dir.display().to_string(),
            "--recursive".to_string(),
            "--quality".to_string(),
            conversion.quality.to_string(),
            "--log-dir".to_string(),
            ctx.logs_dir().display().to_string(),
        ];
        if !conversion.keep_metadata {
            args.push("--no-metadata".to_string());
        }
        args
    }
}

impl StepRunner for ConvertStep {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Convert
    }

    fn description(&self) -> &str {
        "Convert HEIC images to JPG"
    }

    fn run(&self, ctx: &Context, input: &StepInput, _state: &RunState) -> Result<StepResult, StepError> {
        let mut work = Vec::new();
        for dir in Self::search_dirs(input) {
            let heic = ctx.discovery.find_files(&dir, FileCategory::Heic, true);
            if !heic.is_empty() {
                ctx.logger.info(&format!(
                    "Found {} HEIC file(s) in {}",
                    heic.len(),
                    dir.display()
                ));
                work.push((dir, heic.len()));
            }
        }

        if work.is_empty() {
            ctx.logger.info("No HEIC files found to convert");
            return Ok(StepResult::nothing_to_do(
                WorkflowStep::Convert,
                ctx.layout.step_path(WorkflowStep::Convert),
            ));
        }

        let output_dir = ctx.layout.step_dir(WorkflowStep::Convert, true)?;
        let mut processed = 0;
        for (dir, count) in &work {
            let args = Self::converter_args(ctx, dir, &output_dir);
            ctx.run_tool(WorkflowStep::Convert, args)?;
            processed += count;
        }

        let converted = ctx
            .discovery
            .find_files(&output_dir, FileCategory::Images, true)
            .len();
        ctx.logger.info(&format!(
            "Converted {} image(s) into {}",
            converted,
            output_dir.display()
        ));

        Ok(StepResult::completed(WorkflowStep::Convert, processed, output_dir)
            .with_artifact(artifact::CONVERTED_IMAGES, converted as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowSettings;
    use crate::orchestrator::testing::{context, context_with, fail, flag_value, ok, touch, ScriptedTool};
    use tempfile::tempdir;

    /// Converter fake: one `.jpg` per `.heic` of the source directory.
    fn converting_tool() -> std::sync::Arc<ScriptedTool> {
        ScriptedTool::new(|inv| {
            let source = Path::new(&inv.args[1]);
            let output = Path::new(flag_value(inv, "--output").unwrap());
            for entry in std::fs::read_dir(source).unwrap() {
                let path = entry.unwrap().path();
                if path
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("heic") || e.eq_ignore_ascii_case("heif"))
                {
                    let stem = path.file_stem().unwrap().to_string_lossy().to_string();
                    touch(&output.join(format!("{}.jpg", stem)));
                }
            }
            ok()
        })
    }

    #[test]
    fn converts_heic_and_counts_output() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        touch(&input.path().join("a.heic"));
        touch(&input.path().join("b.HEIC"));
        touch(&input.path().join("c.heif"));
        let tool = converting_tool();
        let ctx = context(out.path(), tool.clone());

        let result = ConvertStep::new()
            .run(&ctx, &StepInput::new(input.path()), &RunState::new())
            .unwrap();

        assert!(result.success);
        assert_eq!(result.processed, 3);
        assert_eq!(result.output_dir, out.path().join("converted_images"));
        assert_eq!(result.artifact(artifact::CONVERTED_IMAGES), Some(3));

        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(flag_value(&calls[0], "--quality"), Some("95"));
        assert!(calls[0].args.contains(&"--recursive".to_string()));
        assert!(!calls[0].args.contains(&"--no-metadata".to_string()));
    }

    #[test]
    fn nothing_to_convert() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        touch(&input.path().join("a.jpg"));
        let tool = ScriptedTool::succeeding();
        let ctx = context(out.path(), tool.clone());

        let result = ConvertStep::new()
            .run(&ctx, &StepInput::new(input.path()), &RunState::new())
            .unwrap();

        assert!(result.success);
        assert_eq!(result.processed, 0);
        assert!(tool.calls().is_empty());
        assert!(!out.path().join("converted_images").exists());
    }

    #[test]
    fn searches_original_and_threaded_input() {
        let input = tempdir().unwrap();
        let frames = tempdir().unwrap();
        let out = tempdir().unwrap();
        touch(&input.path().join("a.heic"));
        touch(&frames.path().join("b.heic"));
        let tool = ScriptedTool::succeeding();

        let mut settings = WorkflowSettings::default();
        settings.workflow.steps.image_conversion.keep_metadata = false;
        let ctx = context_with(settings, out.path(), tool.clone());

        let mut step_input = StepInput::new(input.path());
        step_input.current_input_dir = frames.path().to_path_buf();

        let result = ConvertStep::new()
            .run(&ctx, &step_input, &RunState::new())
            .unwrap();

        assert_eq!(result.processed, 2);
        let calls = tool.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[1], input.path().display().to_string());
        assert_eq!(calls[1].args[1], frames.path().display().to_string());
        assert!(calls[0].args.contains(&"--no-metadata".to_string()));
    }

    #[test]
    fn converter_failure_carries_stderr() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        touch(&input.path().join("a.heic"));
        let ctx = context(out.path(), ScriptedTool::new(|_| fail(1, "pillow-heif not installed\n")));

        let err = ConvertStep::new()
            .run(&ctx, &StepInput::new(input.path()), &RunState::new())
            .unwrap_err();

        assert!(matches!(err, StepError::CommandFailed { exit_code: 1, .. }));
        assert!(err.to_string().contains("pillow-heif not installed"));
    }
}
