//! Step and workflow result structures.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::WorkflowStep;

/// Artifact count keys recorded by the step runners.
pub mod artifact {
    pub const EXTRACTED_FRAMES: &str = "extracted_frames";
    pub const CONVERTED_IMAGES: &str = "converted_images";
    pub const DESCRIPTION_FILE_SIZE: &str = "description_file_size";
    pub const DIRECTORIES_PROCESSED: &str = "directories_processed";
    pub const HTML_FILE_COUNT: &str = "html_file_count";
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Which step produced this result.
    pub step: WorkflowStep,
    /// Whether the step succeeded.
    pub success: bool,
    /// Number of input files the step handled.
    pub processed: usize,
    /// Output directory of the step.
    pub output_dir: PathBuf,
    /// Diagnostic text when the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Artifacts found on disk after the step ran.
    #[serde(default)]
    pub artifact_counts: BTreeMap<String, u64>,
    /// Cumulative description file (describe step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_file: Option<PathBuf>,
    /// Generated report (html step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_file: Option<PathBuf>,
    /// Wall-clock duration in seconds.
    #[serde(default)]
    pub duration_secs: f64,
}

impl StepResult {
    /// A successful result that handled `processed` files.
    pub fn completed(step: WorkflowStep, processed: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            step,
            success: true,
            processed,
            output_dir: output_dir.into(),
            error_message: None,
            artifact_counts: BTreeMap::new(),
            description_file: None,
            html_file: None,
            duration_secs: 0.0,
        }
    }

    /// Nothing matched the step's inputs. Not an error.
    pub fn nothing_to_do(step: WorkflowStep, output_dir: impl Into<PathBuf>) -> Self {
        Self::completed(step, 0, output_dir)
    }

    /// A failed result with diagnostic text.
    pub fn failed(
        step: WorkflowStep,
        output_dir: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::completed(step, 0, output_dir)
        }
    }

    /// Record an artifact count (builder pattern).
    pub fn with_artifact(mut self, key: &str, count: u64) -> Self {
        self.artifact_counts.insert(key.to_string(), count);
        self
    }

    /// Look up an artifact count.
    pub fn artifact(&self, key: &str) -> Option<u64> {
        self.artifact_counts.get(key).copied()
    }
}

/// Running aggregate over the steps of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatistics {
    pub total_files_processed: usize,
    pub total_videos_processed: usize,
    pub total_images_processed: usize,
    pub total_conversions: usize,
    pub total_descriptions: usize,
    pub errors_encountered: usize,
    pub steps_completed: Vec<WorkflowStep>,
    pub steps_failed: Vec<WorkflowStep>,
}

impl WorkflowStatistics {
    /// Fold one completed step into the aggregate.
    pub fn record(&mut self, result: &StepResult) {
        if !result.success {
            self.errors_encountered += 1;
            self.steps_failed.push(result.step);
            return;
        }

        let processed = result.processed;
        match result.step {
            WorkflowStep::Video => self.total_videos_processed += processed,
            WorkflowStep::Convert => {
                self.total_conversions += processed;
                self.total_images_processed += processed;
            }
            WorkflowStep::Describe => {
                self.total_descriptions += processed;
                self.total_images_processed += processed;
            }
            WorkflowStep::Html => {}
        }
        self.total_files_processed += processed;
        self.steps_completed.push(result.step);
    }

    /// Files per second, when both elapsed time and file count are positive.
    pub fn throughput(&self, elapsed_secs: f64) -> Option<f64> {
        if elapsed_secs > 0.0 && self.total_files_processed > 0 {
            Some(self.total_files_processed as f64 / elapsed_secs)
        } else {
            None
        }
    }
}

/// Final report of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// True iff every requested step succeeded.
    pub success: bool,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub requested_steps: Vec<WorkflowStep>,
    pub step_results: Vec<StepResult>,
    pub statistics: WorkflowStatistics,
    pub start_time: String,
    pub end_time: String,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl WorkflowReport {
    /// Steps that completed successfully, in run order.
    pub fn steps_completed(&self) -> &[WorkflowStep] {
        &self.statistics.steps_completed
    }

    /// Steps that failed, in run order.
    pub fn steps_failed(&self) -> &[WorkflowStep] {
        &self.statistics.steps_failed
    }

    /// Result for a specific step, if it ran.
    pub fn result_for(&self, step: WorkflowStep) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_count_by_step_kind() {
        let mut stats = WorkflowStatistics::default();
        stats.record(&StepResult::completed(WorkflowStep::Video, 2, "/out/frames"));
        stats.record(&StepResult::completed(WorkflowStep::Convert, 3, "/out/conv"));
        stats.record(&StepResult::completed(WorkflowStep::Describe, 10, "/out/desc"));
        stats.record(&StepResult::completed(WorkflowStep::Html, 1, "/out/html"));

        assert_eq!(stats.total_videos_processed, 2);
        assert_eq!(stats.total_conversions, 3);
        assert_eq!(stats.total_descriptions, 10);
        assert_eq!(stats.total_images_processed, 13);
        assert_eq!(stats.total_files_processed, 16);
        assert_eq!(stats.steps_completed.len(), 4);
        assert!(stats.steps_failed.is_empty());
    }

    #[test]
    fn failed_steps_do_not_count_files() {
        let mut stats = WorkflowStatistics::default();
        stats.record(&StepResult::failed(WorkflowStep::Convert, "/out/conv", "boom"));

        assert_eq!(stats.total_files_processed, 0);
        assert_eq!(stats.steps_failed, vec![WorkflowStep::Convert]);
        assert_eq!(stats.errors_encountered, 1);
    }

    #[test]
    fn throughput_needs_time_and_files() {
        let mut stats = WorkflowStatistics::default();
        assert_eq!(stats.throughput(10.0), None);

        stats.record(&StepResult::completed(WorkflowStep::Describe, 20, "/out"));
        assert_eq!(stats.throughput(0.0), None);
        assert_eq!(stats.throughput(10.0), Some(2.0));
    }

    #[test]
    fn step_result_serializes_artifacts() {
        let result = StepResult::completed(WorkflowStep::Convert, 3, "/out/conv")
            .with_artifact(artifact::CONVERTED_IMAGES, 3);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"step\":\"convert\""));
        assert!(json.contains("\"converted_images\":3"));
        assert!(!json.contains("error_message"));
    }
}
