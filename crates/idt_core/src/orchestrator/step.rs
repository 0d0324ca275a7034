//! Step runner trait definition.
//!
//! Each pipeline step implements this trait. The orchestrator looks the
//! runner up by step, calls `run` and records whatever comes back.

use super::errors::StepError;
use super::types::{Context, RunState, StepInput};
use crate::models::{StepResult, WorkflowStep};

/// Trait for pipeline steps.
///
/// `run` returns `Ok` for both real work and "nothing to do" (a result
/// with `processed == 0`). An `Err` is recorded as a failure of this step
/// only; the orchestrator moves on to the next requested step.
///
/// # Example
///
/// ```ignore
/// struct ThumbnailStep;
///
/// impl StepRunner for ThumbnailStep {
///     fn step(&self) -> WorkflowStep { WorkflowStep::Html }
///
///     fn run(&self, ctx: &Context, input: &StepInput, _state: &RunState) -> Result<StepResult, StepError> {
///         let out = ctx.layout.step_dir(self.step(), true)?;
///         ctx.run_tool(self.step(), vec![input.current_input_dir.display().to_string()])?;
///         Ok(StepResult::completed(self.step(), 1, out))
///     }
/// }
/// ```
pub trait StepRunner: Send + Sync {
    /// Which pipeline step this runner implements.
    fn step(&self) -> WorkflowStep;

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.step().as_str()
    }

    /// Run the step.
    fn run(&self, ctx: &Context, input: &StepInput, state: &RunState) -> Result<StepResult, StepError>;
}
