//! Core enums used throughout the workflow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A pipeline step the user can request on the command line.
///
/// The declaration order is the canonical pipeline order
/// (`video → convert → describe → html`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStep {
    /// Extract frames from video files.
    Video,
    /// Convert HEIC images to JPG.
    Convert,
    /// Generate AI descriptions for images.
    Describe,
    /// Create an HTML report from descriptions.
    Html,
}

impl WorkflowStep {
    /// All valid steps in canonical order.
    pub const ALL: [WorkflowStep; 4] = [
        WorkflowStep::Video,
        WorkflowStep::Convert,
        WorkflowStep::Describe,
        WorkflowStep::Html,
    ];

    /// Short name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Video => "video",
            WorkflowStep::Convert => "convert",
            WorkflowStep::Describe => "describe",
            WorkflowStep::Html => "html",
        }
    }

    /// Logical output key used by the output layout and configuration.
    pub fn output_key(&self) -> &'static str {
        match self {
            WorkflowStep::Video => "video_extraction",
            WorkflowStep::Convert => "image_conversion",
            WorkflowStep::Describe => "image_description",
            WorkflowStep::Html => "html_generation",
        }
    }

    /// Whether the step produces files a later step can consume as input.
    pub fn produces_inputs(&self) -> bool {
        matches!(self, WorkflowStep::Video | WorkflowStep::Convert)
    }

    /// Comma-separated list of the valid step names.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "video" => Ok(WorkflowStep::Video),
            "convert" => Ok(WorkflowStep::Convert),
            "describe" => Ok(WorkflowStep::Describe),
            "html" => Ok(WorkflowStep::Html),
            other => Err(format!(
                "invalid workflow step '{}' (valid steps: {})",
                other,
                WorkflowStep::valid_names()
            )),
        }
    }
}

/// Parse a comma-separated step list, rejecting unknown names.
///
/// Empty tokens (e.g. a trailing comma) are ignored. All invalid tokens
/// are reported together.
pub fn parse_step_list(list: &str) -> Result<Vec<WorkflowStep>, String> {
    let mut steps = Vec::new();
    let mut invalid = Vec::new();

    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<WorkflowStep>() {
            Ok(step) => steps.push(step),
            Err(_) => invalid.push(token.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(format!(
            "Invalid workflow steps: {} (valid steps: {})",
            invalid.join(", "),
            WorkflowStep::valid_names()
        ));
    }
    if steps.is_empty() {
        return Err(format!(
            "No workflow steps given (valid steps: {})",
            WorkflowStep::valid_names()
        ));
    }

    Ok(steps)
}

/// Category of files known to the pattern registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Videos,
    Images,
    Heic,
    Descriptions,
}

impl FileCategory {
    /// All built-in categories.
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Videos,
        FileCategory::Images,
        FileCategory::Heic,
        FileCategory::Descriptions,
    ];

    /// Registry key for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Videos => "videos",
            FileCategory::Images => "images",
            FileCategory::Heic => "heic",
            FileCategory::Descriptions => "descriptions",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
