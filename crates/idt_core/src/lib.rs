//! IDT Core - Workflow orchestration for the image description toolkit
//!
//! This crate contains the pipeline logic that drives the external
//! collaborators (frame extractor, HEIC converter, image describer and
//! HTML renderer) with zero CLI dependencies. It can be used by the
//! `workflow` binary or embedded in another front end.

pub mod config;
pub mod discovery;
pub mod layout;
pub mod logging;
pub mod models;
pub mod naming;
pub mod orchestrator;
pub mod runner;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
