//! Workflow orchestrator for coordinating step execution.
//!
//! This module runs the requested pipeline steps in order, hands the
//! output of file-producing steps to the steps after them and aggregates
//! the results into a `WorkflowReport`.
//!
//! # Architecture
//!
//! ```text
//! WorkflowOrchestrator
//!     ├── Step: video     (frame extractor)
//!     ├── Step: convert   (HEIC converter)
//!     ├── Step: describe  (image describer)
//!     └── Step: html      (HTML renderer)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use idt_core::config::WorkflowSettings;
//! use idt_core::models::WorkflowStep;
//! use idt_core::orchestrator::WorkflowOrchestrator;
//! use idt_core::runner::ProcessTool;
//!
//! let orchestrator = WorkflowOrchestrator::new(
//!     Arc::new(WorkflowSettings::default()),
//!     Arc::new(ProcessTool::new()),
//! );
//! let report = orchestrator
//!     .run_workflow(Path::new("photos"), Some(Path::new("out")), &WorkflowStep::ALL)
//!     .unwrap();
//! println!("Completed: {:?}", report.steps_completed());
//! ```

mod errors;
mod step;
pub mod steps;
#[cfg(test)]
mod testing;
mod types;
mod workflow;

pub use errors::{StepError, WorkflowError, WorkflowResult};
pub use step::StepRunner;
pub use steps::{ConvertStep, DescribeStep, HtmlStep, VideoStep};
pub use types::{Context, RunState, StepInput};
pub use workflow::{standard_steps, WorkflowOrchestrator, SUMMARY_FILE_NAME};
