//! Scripted collaborators for unit tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::types::Context;
use crate::config::WorkflowSettings;
use crate::layout::StepOutputLayout;
use crate::logging::{LogConfig, WorkflowLogger};
use crate::runner::{CancelHandle, ExternalTool, Invocation, ToolError, ToolOutput};

type Handler = Box<dyn Fn(&Invocation) -> ToolOutput + Send + Sync>;

/// Tool that records every invocation and answers from a closure.
pub struct ScriptedTool {
    handler: Handler,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedTool {
    pub fn new(handler: impl Fn(&Invocation) -> ToolOutput + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(|_| ok())
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

impl ExternalTool for ScriptedTool {
    fn run(&self, invocation: &Invocation, cancel: &CancelHandle) -> Result<ToolOutput, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                label: invocation.label.clone(),
                output: ToolOutput::default(),
            });
        }
        self.calls.lock().push(invocation.clone());
        Ok((self.handler)(invocation))
    }
}

pub fn ok() -> ToolOutput {
    ToolOutput {
        exit_code: Some(0),
        ..ToolOutput::default()
    }
}

pub fn fail(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Value following `flag` in the invocation's arguments.
pub fn flag_value<'a>(invocation: &'a Invocation, flag: &str) -> Option<&'a str> {
    invocation
        .args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| invocation.args.get(i + 1))
        .map(String::as_str)
}

pub fn context_with(settings: WorkflowSettings, base: &Path, tool: Arc<dyn ExternalTool>) -> Context {
    let settings = Arc::new(settings);
    let layout = Arc::new(StepOutputLayout::with_base(&settings, base));
    let logger = Arc::new(WorkflowLogger::console("test", LogConfig::quiet()));
    Context::new(settings, layout, logger, tool, CancelHandle::new())
}

pub fn context(base: &Path, tool: Arc<dyn ExternalTool>) -> Context {
    context_with(WorkflowSettings::default(), base, tool)
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}
