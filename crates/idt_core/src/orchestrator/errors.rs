//! Error types for the workflow orchestrator.
//!
//! Errors carry context that chains through layers:
//! Workflow → Step → Tool → Detail

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::layout::LayoutError;
use crate::models::WorkflowStep;
use crate::runner::ToolError;

/// Top-level workflow error.
///
/// Step failures are not workflow errors; they are recorded in the report
/// and the run continues. These variants abort the run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The input directory does not exist.
    #[error("Input directory does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    /// Failed to set up the run (output layout, log file, ...).
    #[error("Workflow setup failed: {message}")]
    SetupFailed { message: String },

    /// The output layout rejected the requested base directory.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The run was cancelled, before or during `step`.
    #[error("Workflow was cancelled")]
    Cancelled { step: Option<WorkflowStep> },
}

impl WorkflowError {
    /// Create a setup failed error.
    pub fn setup_failed(message: impl Into<String>) -> Self {
        Self::SetupFailed {
            message: message.into(),
        }
    }
}

/// Error from one step runner.
#[derive(Error, Debug)]
pub enum StepError {
    /// An external tool exited non-zero.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// An external tool ran past its timeout and was killed.
    #[error("{tool} timed out after {timeout:?}: {message}")]
    TimedOut {
        tool: String,
        timeout: Duration,
        message: String,
    },

    /// An external tool could not be run to completion.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A step output directory could not be created.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The tool reported success but its expected output is missing.
    #[error("{0}")]
    MissingOutput(String),

    /// Generic step error with message.
    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// Create a command failed error. Signal kills are reported as -1.
    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code: exit_code.unwrap_or(-1),
            message: message.into(),
        }
    }

    /// Create a timed out error.
    pub fn timed_out(tool: impl Into<String>, timeout: Duration, message: impl Into<String>) -> Self {
        Self::TimedOut {
            tool: tool.into(),
            timeout,
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a missing output error.
    pub fn missing_output(message: impl Into<String>) -> Self {
        Self::MissingOutput(message.into())
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether this error stems from cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Tool(ToolError::Cancelled { .. }))
    }
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::command_failed("ConvertImage.py", Some(2), "cannot open file");
        let msg = err.to_string();
        assert!(msg.contains("ConvertImage.py"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("cannot open file"));
    }

    #[test]
    fn killed_tool_reports_minus_one() {
        let err = StepError::command_failed("image_describer.py", None, "killed");
        assert!(err.to_string().contains("exit code -1"));
    }

    #[test]
    fn timeout_shows_duration_and_stderr() {
        let err = StepError::timed_out(
            "image_describer.py",
            Duration::from_millis(300),
            "model load stalled",
        );
        assert_eq!(
            err.to_string(),
            "image_describer.py timed out after 300ms: model load stalled"
        );
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancellation_is_detected() {
        let err = StepError::from(ToolError::Cancelled {
            label: "image_describer.py".to_string(),
            output: Default::default(),
        });
        assert!(err.is_cancelled());
        assert!(!StepError::other("boom").is_cancelled());
    }

    #[test]
    fn workflow_error_messages() {
        let err = WorkflowError::Cancelled {
            step: Some(WorkflowStep::Describe),
        };
        assert_eq!(err.to_string(), "Workflow was cancelled");

        let err = WorkflowError::MissingInput(PathBuf::from("/no/such/dir"));
        assert!(err.to_string().contains("/no/such/dir"));
    }
}
