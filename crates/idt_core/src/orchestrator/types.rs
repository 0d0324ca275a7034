//! Core types for the workflow orchestrator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::errors::StepError;
use crate::config::WorkflowSettings;
use crate::discovery::FileDiscovery;
use crate::layout::{StepOutputLayout, LOGS_SUBDIR};
use crate::logging::WorkflowLogger;
use crate::models::{StepResult, WorkflowStep};
use crate::runner::{CancelHandle, ExternalTool, Invocation, ToolError, ToolOutput};

/// Read-only context passed to step runners.
///
/// Contains configuration and shared resources for one run. Mutable
/// state goes in `RunState`.
pub struct Context {
    /// Workflow settings, frozen for the run.
    pub settings: Arc<WorkflowSettings>,
    /// Step output directories.
    pub layout: Arc<StepOutputLayout>,
    /// File discovery over the configured patterns.
    pub discovery: FileDiscovery,
    /// Per-run logger.
    pub logger: Arc<WorkflowLogger>,
    /// Runs the external collaborators.
    tool: Arc<dyn ExternalTool>,
    /// Cancellation flag shared with the caller.
    cancel: CancelHandle,
}

impl Context {
    /// Create a new context for a run.
    pub fn new(
        settings: Arc<WorkflowSettings>,
        layout: Arc<StepOutputLayout>,
        logger: Arc<WorkflowLogger>,
        tool: Arc<dyn ExternalTool>,
        cancel: CancelHandle,
    ) -> Self {
        let discovery = FileDiscovery::new(settings.file_patterns.clone());
        Self {
            settings,
            layout,
            discovery,
            logger,
            tool,
            cancel,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Logs directory passed to the tools as `--log-dir`.
    pub fn logs_dir(&self) -> PathBuf {
        self.layout.base_output_dir().join(LOGS_SUBDIR)
    }

    /// Resolve a configured file path for a tool argument.
    pub fn resolve_tool_path(&self, configured: &str) -> PathBuf {
        self.settings.tools.resolve_path(configured)
    }

    /// Build the invocation of a step's collaborator with extra arguments.
    pub fn invocation(&self, step: WorkflowStep, args: Vec<String>) -> Invocation {
        let tools = &self.settings.tools;
        let command = tools.command_for(step);

        let mut invocation = Invocation::new(command.program.as_str())
            .args(command.args.iter().cloned())
            .args(args)
            .label(command.display_name())
            .timeout(Duration::from_secs(self.settings.workflow.step_timeout_secs));
        if let Some(ref dir) = tools.working_dir {
            invocation = invocation.cwd(dir);
        }
        for (key, value) in &tools.env {
            invocation = invocation.env(key.as_str(), value.as_str());
        }
        invocation
    }

    /// Run a step's collaborator and log everything it printed.
    ///
    /// A non-zero exit becomes `StepError::CommandFailed` and a timeout
    /// `StepError::TimedOut`, both with the captured stderr as message (or
    /// a generic one if stderr was empty). Output of a killed tool is
    /// logged like that of a finished one.
    pub fn run_tool(&self, step: WorkflowStep, args: Vec<String>) -> Result<ToolOutput, StepError> {
        let invocation = self.invocation(step, args);

        self.logger.command(&invocation.command_line());
        self.logger.clear_tail();

        let output = match self.tool.run(&invocation, &self.cancel) {
            Ok(output) => output,
            Err(err) => {
                if let Some(partial) = err.partial_output() {
                    self.logger
                        .tool_output(&invocation.label, &partial.stdout, &partial.stderr);
                }
                return Err(match err {
                    ToolError::TimedOut {
                        timeout, output, ..
                    } => {
                        self.logger.show_tail(&invocation.label);
                        StepError::timed_out(invocation.label, timeout, diagnostic(&output.stderr))
                    }
                    other => other.into(),
                });
            }
        };
        self.logger
            .tool_output(&invocation.label, &output.stdout, &output.stderr);

        if !output.success() {
            self.logger.show_tail(&invocation.label);
            return Err(StepError::command_failed(
                invocation.label,
                output.exit_code,
                diagnostic(&output.stderr),
            ));
        }

        Ok(output)
    }
}

/// Failure message from a tool's stderr.
fn diagnostic(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        "no error output captured".to_string()
    } else {
        stderr.to_string()
    }
}

/// Input directories for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInput {
    /// The directory the user passed on the command line.
    pub original_input_dir: PathBuf,
    /// The directory produced by the latest file-producing step, or the
    /// original input if none has produced anything yet.
    pub current_input_dir: PathBuf,
}

impl StepInput {
    /// Start of a run: both directories are the user's input.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        let dir = input_dir.into();
        Self {
            original_input_dir: dir.clone(),
            current_input_dir: dir,
        }
    }

    /// Whether an earlier step replaced the input directory.
    pub fn is_threaded(&self) -> bool {
        self.original_input_dir != self.current_input_dir
    }
}

/// Results recorded by the steps that already ran in this run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    results: BTreeMap<WorkflowStep, StepResult>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step result, replacing an earlier one for the same step.
    pub fn record(&mut self, result: StepResult) {
        self.results.insert(result.step, result);
    }

    /// Result of a step, if it ran.
    pub fn result(&self, step: WorkflowStep) -> Option<&StepResult> {
        self.results.get(&step)
    }

    /// Description file written by a successful describe step.
    pub fn description_file(&self) -> Option<&Path> {
        self.result(WorkflowStep::Describe)
            .filter(|r| r.success)
            .and_then(|r| r.description_file.as_deref())
    }
}

/// Append `dir` to the recursive search list `dirs` unless it is
/// already covered: listed itself or nested inside a listed directory.
///
/// Output directories under the input directory are reached by the
/// recursive search of the input and must not be processed twice.
pub(crate) fn push_search_dir(dirs: &mut Vec<PathBuf>, dir: PathBuf) {
    if !dirs.iter().any(|listed| dir.starts_with(listed)) {
        dirs.push(dir);
    }
}
