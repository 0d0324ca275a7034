//! External tool invocation.
//!
//! Every pipeline step delegates its real work to an external program.
//! Steps describe what to run as an [`Invocation`] and hand it to an
//! [`ExternalTool`]; the production implementation is [`ProcessTool`],
//! tests substitute scripted fakes.

mod process;

pub use process::ProcessTool;

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors from launching or supervising an external tool.
///
/// A tool that runs and exits non-zero is not an error here; that is
/// reported through [`ToolOutput::exit_code`].
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program could not be started.
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program ran longer than its timeout and was killed.
    ///
    /// `output` holds what it printed before the kill.
    #[error("{label} timed out after {timeout:?}")]
    TimedOut {
        label: String,
        timeout: Duration,
        output: ToolOutput,
    },

    /// The run was cancelled and the program was killed.
    #[error("{label} was cancelled")]
    Cancelled { label: String, output: ToolOutput },

    /// Waiting on the program failed.
    #[error("I/O error while running {label}: {source}")]
    Io {
        label: String,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    /// Output captured from a program that was killed.
    pub fn partial_output(&self) -> Option<&ToolOutput> {
        match self {
            ToolError::TimedOut { output, .. } | ToolError::Cancelled { output, .. } => Some(output),
            ToolError::SpawnFailed { .. } | ToolError::Io { .. } => None,
        }
    }
}

/// One external program run.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Program to execute (looked up on PATH).
    pub program: String,
    /// Arguments, passed as-is (no shell).
    pub args: Vec<String>,
    /// Working directory, inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
    /// Kill the program after this long.
    pub timeout: Option<Duration>,
    /// Short name for messages.
    pub label: String,
}

impl Invocation {
    /// Create an invocation with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            label: program.clone(),
            program,
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Command line for log output. Arguments with spaces are quoted.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("\"{}\"", part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the program exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Something that can run an [`Invocation`] to completion.
pub trait ExternalTool: Send + Sync {
    /// Run the program, blocking until it exits, times out or is cancelled.
    fn run(&self, invocation: &Invocation, cancel: &CancelHandle) -> Result<ToolOutput, ToolError>;
}

/// Shared cancellation flag for a workflow run.
///
/// The orchestrator checks it between steps; [`ProcessTool`] polls it while
/// a program is running and kills the program once it is set.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a handle that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_arguments() {
        let inv = Invocation::new("python3")
            .arg("ConvertImage.py")
            .args(["photos", "--recursive"])
            .env("PYTHONUNBUFFERED", "1")
            .timeout(Duration::from_secs(5))
            .label("ConvertImage.py");

        assert_eq!(inv.args, vec!["ConvertImage.py", "photos", "--recursive"]);
        assert_eq!(inv.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(inv.label, "ConvertImage.py");
    }

    #[test]
    fn command_line_quotes_spaces() {
        let inv = Invocation::new("python3")
            .arg("descriptions_to_html.py")
            .arg("--title")
            .arg("Image Analysis Report");
        assert_eq!(
            inv.command_line(),
            "python3 descriptions_to_html.py --title \"Image Analysis Report\""
        );
    }

    #[test]
    fn cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn success_requires_zero_exit() {
        let ok = ToolOutput {
            exit_code: Some(0),
            ..ToolOutput::default()
        };
        let killed = ToolOutput::default();
        assert!(ok.success());
        assert!(!killed.success());
    }
}
