//! Output layout for step results.
//!
//! Maps logical step keys to subdirectories of one base output directory:
//!
//! ```text
//! <base_output_dir>/
//!     ├── extracted_frames/   (video_extraction)
//!     ├── converted_images/   (image_conversion)
//!     ├── descriptions/       (image_description)
//!     ├── html_reports/       (html_generation)
//!     └── logs/
//! ```
//!
//! Directories are created lazily and never deleted, so the existence of a
//! step directory means the step has run at least once for this base.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

use crate::config::{StepsSettings, WorkflowSettings};
use crate::models::WorkflowStep;

/// Subdirectory holding the per-run log files.
pub const LOGS_SUBDIR: &str = "logs";

/// Errors from output layout operations.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The base directory was already fixed to a different path.
    #[error("Base output directory is already {current}, cannot change it to {requested}")]
    BaseAlreadySet { current: PathBuf, requested: PathBuf },

    /// Creating a step directory failed.
    #[error("Failed to create {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves step output directories under one base directory.
#[derive(Debug)]
pub struct StepOutputLayout {
    /// Base directory from configuration (used if never overridden).
    configured_base: String,
    /// Per-step subdirectory names.
    steps: StepsSettings,
    /// Base directory, fixed on first use or explicit override.
    base: OnceLock<PathBuf>,
}

impl StepOutputLayout {
    /// Create a layout from settings. Nothing is resolved or created yet.
    pub fn new(settings: &WorkflowSettings) -> Self {
        Self {
            configured_base: settings.workflow.base_output_dir.clone(),
            steps: settings.workflow.steps.clone(),
            base: OnceLock::new(),
        }
    }

    /// Create a layout whose base is fixed to `base` immediately.
    pub fn with_base(settings: &WorkflowSettings, base: impl AsRef<Path>) -> Self {
        let layout = Self::new(settings);
        let _ = layout.base.set(absolutize(base.as_ref()));
        layout
    }

    /// Base output directory (absolute).
    ///
    /// Resolved from configuration on first call unless overridden before.
    pub fn base_output_dir(&self) -> &Path {
        self.base
            .get_or_init(|| absolutize(Path::new(&self.configured_base)))
    }

    /// Fix the base output directory.
    ///
    /// Succeeds if the base is still unresolved or already equals `path`.
    /// Once resolved, the base is immutable for the rest of the run.
    pub fn set_base_output_dir(&self, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        let requested = absolutize(path.as_ref());
        match self.base.set(requested.clone()) {
            Ok(()) => Ok(()),
            Err(_) => {
                let current = self.base_output_dir().to_path_buf();
                if current == requested {
                    Ok(())
                } else {
                    Err(LayoutError::BaseAlreadySet { current, requested })
                }
            }
        }
    }

    /// Subdirectory name for a step key; unknown keys map to themselves.
    pub fn subdir_for<'a>(&'a self, step_key: &'a str) -> &'a str {
        self.steps.output_subdir(step_key).unwrap_or(step_key)
    }

    /// Output directory for a step key, created (with parents) when `create` is set.
    pub fn get_step_output_dir(&self, step_key: &str, create: bool) -> Result<PathBuf, LayoutError> {
        let dir = self.base_output_dir().join(self.subdir_for(step_key));
        if create {
            ensure_dir(&dir)?;
        }
        Ok(dir)
    }

    /// Output directory for a pipeline step.
    pub fn step_dir(&self, step: WorkflowStep, create: bool) -> Result<PathBuf, LayoutError> {
        self.get_step_output_dir(step.output_key(), create)
    }

    /// Path of a step's output directory without touching the filesystem.
    pub fn step_path(&self, step: WorkflowStep) -> PathBuf {
        self.base_output_dir().join(self.subdir_for(step.output_key()))
    }

    /// Logs directory, sibling of the step directories.
    pub fn logs_dir(&self, create: bool) -> Result<PathBuf, LayoutError> {
        let dir = self.base_output_dir().join(LOGS_SUBDIR);
        if create {
            ensure_dir(&dir)?;
        }
        Ok(dir)
    }

    /// Whether the step has run at least once for this base directory.
    pub fn has_run(&self, step: WorkflowStep) -> bool {
        self.step_path(step).is_dir()
    }
}

fn ensure_dir(dir: &Path) -> Result<(), LayoutError> {
    fs::create_dir_all(dir).map_err(|source| LayoutError::CreateFailed {
        path: dir.to_path_buf(),
        source,
    })
}

/// Make `path` absolute against the current directory (lexically).
pub fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
