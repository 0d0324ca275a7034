//! Data models for the workflow.
//!
//! - Enums for pipeline steps and file categories
//! - Step results, running statistics and the final run report

mod enums;
mod results;

pub use enums::{parse_step_list, FileCategory, WorkflowStep};
pub use results::{artifact, StepResult, WorkflowReport, WorkflowStatistics};
