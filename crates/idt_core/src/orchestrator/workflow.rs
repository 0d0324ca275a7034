//! Workflow orchestrator that runs the requested steps in sequence.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;

use super::errors::{StepError, WorkflowError, WorkflowResult};
use super::step::StepRunner;
use super::steps::{ConvertStep, DescribeStep, HtmlStep, VideoStep};
use super::types::{Context, RunState, StepInput};
use crate::config::{atomic_write, WorkflowSettings};
use crate::layout::{absolutize, LayoutError, StepOutputLayout};
use crate::logging::{LogConfig, WorkflowLogger};
use crate::models::{StepResult, WorkflowReport, WorkflowStatistics, WorkflowStep};
use crate::runner::{CancelHandle, ExternalTool};

/// Summary file written into the output directory after a completed run.
pub const SUMMARY_FILE_NAME: &str = "workflow_summary.json";

/// Logger name shown in the log file header.
const LOGGER_NAME: &str = "workflow_orchestrator";

/// Runner map with one runner for each pipeline step.
pub fn standard_steps() -> BTreeMap<WorkflowStep, Box<dyn StepRunner>> {
    let runners: [Box<dyn StepRunner>; 4] = [
        Box::new(VideoStep::new()),
        Box::new(ConvertStep::new()),
        Box::new(DescribeStep::new()),
        Box::new(HtmlStep::new()),
    ];
    runners.into_iter().map(|r| (r.step(), r)).collect()
}

/// Runs the requested steps of one workflow.
///
/// Step failures are recorded and the run moves on to the next requested
/// step; a run always completes unless it is cancelled or cannot be set
/// up. An output step that produced files becomes the input of the steps
/// after it.
pub struct WorkflowOrchestrator {
    settings: Arc<WorkflowSettings>,
    layout: Arc<StepOutputLayout>,
    tool: Arc<dyn ExternalTool>,
    runners: BTreeMap<WorkflowStep, Box<dyn StepRunner>>,
    cancel: CancelHandle,
    log_config: LogConfig,
}

impl WorkflowOrchestrator {
    /// Create an orchestrator with the standard step runners.
    pub fn new(settings: Arc<WorkflowSettings>, tool: Arc<dyn ExternalTool>) -> Self {
        let layout = Arc::new(StepOutputLayout::new(&settings));
        Self {
            settings,
            layout,
            tool,
            runners: standard_steps(),
            cancel: CancelHandle::new(),
            log_config: LogConfig::default(),
        }
    }

    /// Replace the runner for its step (builder pattern).
    pub fn with_step<S: StepRunner + 'static>(mut self, runner: S) -> Self {
        self.runners.insert(runner.step(), Box::new(runner));
        self
    }

    /// Set the per-run log configuration (builder pattern).
    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// Use an externally owned cancellation flag (builder pattern).
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get a cancellation handle.
    ///
    /// Cancelling stops the run before the next step and kills a running
    /// tool.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Fix the base output directory before the run starts.
    pub fn set_base_output_dir(&self, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        self.layout.set_base_output_dir(path)
    }

    /// Run the requested steps in the given order.
    ///
    /// `output_dir` overrides the configured base output directory.
    /// Returns the report of a completed run, whatever the step outcomes.
    pub fn run_workflow(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        steps: &[WorkflowStep],
    ) -> WorkflowResult<WorkflowReport> {
        let input_dir = absolutize(input_dir);
        if !input_dir.is_dir() {
            return Err(WorkflowError::MissingInput(input_dir));
        }
        if let Some(dir) = output_dir {
            self.layout.set_base_output_dir(dir)?;
        }
        let output_dir = self.layout.base_output_dir().to_path_buf();

        let logs_dir = self.layout.logs_dir(true)?;
        let logger = WorkflowLogger::new(LOGGER_NAME, &logs_dir, self.log_config.clone(), None)
            .map_err(|e| WorkflowError::setup_failed(format!("cannot create log file: {}", e)))?;
        let logger = Arc::new(logger);

        let ctx = Context::new(
            Arc::clone(&self.settings),
            Arc::clone(&self.layout),
            Arc::clone(&logger),
            Arc::clone(&self.tool),
            self.cancel.clone(),
        );

        let step_names: Vec<&str> = steps.iter().map(|s| s.as_str()).collect();
        logger.info("Starting workflow");
        logger.info(&format!("Input directory: {}", input_dir.display()));
        logger.info(&format!("Output directory: {}", output_dir.display()));
        logger.info(&format!("Steps: {}", step_names.join(", ")));

        let start_time = Local::now();
        let started = Instant::now();

        let mut input = StepInput::new(&input_dir);
        let mut state = RunState::new();
        let mut statistics = WorkflowStatistics::default();
        let mut step_results = Vec::with_capacity(steps.len());

        for &step in steps {
            if self.cancel.is_cancelled() {
                logger.warn(&format!("Workflow cancelled before step '{}'", step));
                return Err(WorkflowError::Cancelled { step: Some(step) });
            }

            let result = self.run_step(&ctx, step, &input, &state)?;

            if result.success && step.produces_inputs() && result.processed > 0 {
                logger.info(&format!(
                    "Next steps will read from {}",
                    result.output_dir.display()
                ));
                input.current_input_dir = result.output_dir.clone();
            }

            statistics.record(&result);
            state.record(result.clone());
            step_results.push(result);
        }

        if self.cancel.is_cancelled() {
            logger.warn("Workflow cancelled before writing the summary");
            return Err(WorkflowError::Cancelled { step: None });
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        let report = WorkflowReport {
            success: statistics.steps_failed.is_empty(),
            input_dir,
            output_dir: output_dir.clone(),
            requested_steps: steps.to_vec(),
            step_results,
            files_per_second: statistics.throughput(elapsed_secs),
            statistics,
            start_time: start_time.to_rfc3339(),
            end_time: Local::now().to_rfc3339(),
            elapsed_secs,
            log_file: logger.log_path().map(Path::to_path_buf),
        };

        log_final_statistics(&logger, &report);
        write_summary(&logger, &output_dir.join(SUMMARY_FILE_NAME), &report);
        logger.flush();

        Ok(report)
    }

    /// Run one step, turning any step error into a failed result.
    fn run_step(
        &self,
        ctx: &Context,
        step: WorkflowStep,
        input: &StepInput,
        state: &RunState,
    ) -> WorkflowResult<StepResult> {
        let logger = &ctx.logger;
        let key = step.output_key();

        if !self.settings.workflow.steps.is_enabled(key) {
            logger.phase(step.as_str());
            logger.info(&format!("Step '{}' is disabled in configuration", step));
            return Ok(StepResult::nothing_to_do(step, self.layout.step_path(step)));
        }

        let Some(runner) = self.runners.get(&step) else {
            logger.error(&format!("No runner registered for step '{}'", step));
            return Ok(StepResult::failed(
                step,
                self.layout.step_path(step),
                format!("No runner registered for step '{}'", step),
            ));
        };

        logger.phase(&format!("{}: {}", step, runner.description()));
        let started = Instant::now();

        let mut result = match runner.run(ctx, input, state) {
            Ok(result) => result,
            Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                logger.warn(&format!("Step '{}' cancelled", step));
                return Err(WorkflowError::Cancelled { step: Some(step) });
            }
            Err(e) => failed_result(ctx, step, &e),
        };
        result.duration_secs = started.elapsed().as_secs_f64();

        if result.success {
            logger.success(&format!(
                "{} completed: {} file(s) processed in {:.1}s",
                step, result.processed, result.duration_secs
            ));
        }

        Ok(result)
    }
}

fn failed_result(ctx: &Context, step: WorkflowStep, error: &StepError) -> StepResult {
    let message = error.to_string();
    ctx.logger
        .error(&format!("Step '{}' failed: {}", step, message));
    StepResult::failed(step, ctx.layout.step_path(step), message)
}

fn log_final_statistics(logger: &WorkflowLogger, report: &WorkflowReport) {
    let stats = &report.statistics;
    let names = |steps: &[WorkflowStep]| {
        if steps.is_empty() {
            "none".to_string()
        } else {
            steps.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        }
    };

    logger.info(&"=".repeat(60));
    logger.info("FINAL WORKFLOW STATISTICS");
    logger.info(&"=".repeat(60));
    logger.info(&format!("Start time: {}", report.start_time));
    logger.info(&format!("End time: {}", report.end_time));
    logger.info(&format!("Total execution time: {:.2} seconds", report.elapsed_secs));
    logger.info(&format!("Total files processed: {}", stats.total_files_processed));
    logger.info(&format!("Videos processed: {}", stats.total_videos_processed));
    logger.info(&format!("Images processed: {}", stats.total_images_processed));
    logger.info(&format!("HEIC conversions: {}", stats.total_conversions));
    logger.info(&format!("Descriptions generated: {}", stats.total_descriptions));
    logger.info(&format!("Steps completed: {}", names(&stats.steps_completed)));
    logger.info(&format!("Steps failed: {}", names(&stats.steps_failed)));
    logger.info(&format!("Errors encountered: {}", stats.errors_encountered));
    if let Some(rate) = report.files_per_second {
        logger.info(&format!("Average processing rate: {:.2} files/second", rate));
    }
    logger.info(&"=".repeat(60));

    if report.success {
        logger.success("Workflow completed successfully");
    } else {
        logger.warn("Workflow completed with errors");
    }
}

fn write_summary(logger: &WorkflowLogger, path: &Path, report: &WorkflowReport) {
    let written = serde_json::to_vec_pretty(report)
        .map_err(std::io::Error::other)
        .and_then(|json| atomic_write(path, &json));
    match written {
        Ok(()) => logger.info(&format!("Workflow summary saved to {}", path.display())),
        Err(e) => logger.warn(&format!(
            "Could not write workflow summary {}: {}",
            path.display(),
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::{fail, ok, touch, ScriptedTool};
    use std::fs;
    use tempfile::tempdir;

    fn orchestrator(settings: WorkflowSettings, tool: Arc<ScriptedTool>) -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(Arc::new(settings), tool).with_log_config(LogConfig::quiet())
    }

    /// Step runner that always fails with a plain error.
    struct BrokenStep(WorkflowStep);

    impl StepRunner for BrokenStep {
        fn step(&self) -> WorkflowStep {
            self.0
        }

        fn run(&self, _ctx: &Context, _input: &StepInput, _state: &RunState) -> Result<StepResult, StepError> {
            Err(StepError::other("unexpected failure"))
        }
    }

    #[test]
    fn standard_steps_cover_pipeline() {
        let steps = standard_steps();
        assert_eq!(steps.keys().copied().collect::<Vec<_>>(), WorkflowStep::ALL.to_vec());
    }

    #[test]
    fn empty_input_succeeds_with_nothing_processed() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let tool = ScriptedTool::succeeding();
        let orch = orchestrator(WorkflowSettings::default(), tool.clone());

        let report = orch
            .run_workflow(input.path(), Some(out.path()), &WorkflowStep::ALL)
            .unwrap();

        assert!(report.success);
        assert_eq!(report.steps_completed(), WorkflowStep::ALL);
        assert!(report.step_results.iter().all(|r| r.processed == 0));
        assert!(tool.calls().is_empty());
        assert!(out.path().join(SUMMARY_FILE_NAME).is_file());
        assert!(report.log_file.as_ref().unwrap().is_file());
        assert!(report.files_per_second.is_none());
    }

    #[test]
    fn missing_input_is_rejected() {
        let out = tempdir().unwrap();
        let orch = orchestrator(WorkflowSettings::default(), ScriptedTool::succeeding());

        let err = orch
            .run_workflow(&out.path().join("missing"), Some(out.path()), &[WorkflowStep::Describe])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingInput(_)));
    }

    #[test]
    fn step_error_is_recorded_and_run_continues() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let orch = orchestrator(WorkflowSettings::default(), ScriptedTool::succeeding())
            .with_step(BrokenStep(WorkflowStep::Convert));

        let report = orch
            .run_workflow(
                input.path(),
                Some(out.path()),
                &[WorkflowStep::Convert, WorkflowStep::Html],
            )
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.steps_failed(), [WorkflowStep::Convert]);
        assert_eq!(report.steps_completed(), [WorkflowStep::Html]);
        assert_eq!(report.statistics.errors_encountered, 1);
        let convert = report.result_for(WorkflowStep::Convert).unwrap();
        assert_eq!(convert.error_message.as_deref(), Some("unexpected failure"));
    }

    #[test]
    fn disabled_step_counts_as_success() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        touch(&input.path().join("a.heic"));
        let tool = ScriptedTool::new(|_| fail(1, "should not run"));

        let mut settings = WorkflowSettings::default();
        settings.workflow.steps.image_conversion.enabled = false;
        let orch = orchestrator(settings, tool.clone());

        let report = orch
            .run_workflow(input.path(), Some(out.path()), &[WorkflowStep::Convert])
            .unwrap();

        assert!(report.success);
        assert_eq!(report.result_for(WorkflowStep::Convert).unwrap().processed, 0);
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn converted_dir_feeds_describe() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        touch(&input.path().join("a.heic"));

        let converted = out.path().join("converted_images");
        let descriptions = out.path().join("descriptions");
        let tool = ScriptedTool::new(move |inv| {
            match inv.args[0].as_str() {
                "ConvertImage.py" => touch(&converted.join("a.jpg")),
                "image_describer.py" => touch(&descriptions.join("image_descriptions.txt")),
                _ => {}
            }
            ok()
        });
        let orch = orchestrator(WorkflowSettings::default(), tool.clone());

        let report = orch
            .run_workflow(
                input.path(),
                Some(out.path()),
                &[WorkflowStep::Convert, WorkflowStep::Describe],
            )
            .unwrap();

        assert!(report.success);
        let describe_calls: Vec<_> = tool
            .calls()
            .into_iter()
            .filter(|c| c.args[0] == "image_describer.py")
            .collect();
        assert_eq!(describe_calls.len(), 1);
        assert_eq!(
            describe_calls[0].args[1],
            out.path().join("converted_images").display().to_string()
        );
        assert_eq!(report.statistics.total_conversions, 1);
        assert_eq!(report.statistics.total_descriptions, 1);
    }

    #[test]
    fn cancelled_run_writes_no_summary() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let orch = orchestrator(WorkflowSettings::default(), ScriptedTool::succeeding());
        orch.cancel_handle().cancel();

        let err = orch
            .run_workflow(input.path(), Some(out.path()), &[WorkflowStep::Describe])
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled { .. }));
        assert!(!out.path().join(SUMMARY_FILE_NAME).exists());
    }

    #[test]
    fn summary_round_trips() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let orch = orchestrator(WorkflowSettings::default(), ScriptedTool::succeeding());

        let report = orch
            .run_workflow(input.path(), Some(out.path()), &[WorkflowStep::Html])
            .unwrap();

        let saved: WorkflowReport =
            serde_json::from_str(&fs::read_to_string(out.path().join(SUMMARY_FILE_NAME)).unwrap())
                .unwrap();
        assert_eq!(saved.requested_steps, vec![WorkflowStep::Html]);
        assert_eq!(saved.success, report.success);
    }

    #[test]
    fn base_output_dir_is_fixed_per_orchestrator() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let orch = orchestrator(WorkflowSettings::default(), ScriptedTool::succeeding());

        orch.run_workflow(input.path(), Some(out.path()), &[WorkflowStep::Html])
            .unwrap();
        let err = orch
            .run_workflow(input.path(), Some(&out.path().join("other")), &[WorkflowStep::Html])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Layout(_)));
    }
}
