//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field has a default so a partial file (or no file at all) yields
//! a complete configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::absolutize;
use crate::models::{FileCategory, WorkflowStep};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Output layout, timeouts and per-step options.
    #[serde(default)]
    pub workflow: WorkflowSection,

    /// Extension patterns per file category.
    #[serde(default)]
    pub file_patterns: FilePatternRegistry,

    /// How the external collaborators are launched.
    #[serde(default)]
    pub tools: ToolSettings,
}

impl WorkflowSettings {
    /// Check value ranges, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.workflow.base_output_dir.trim().is_empty() {
            problems.push("workflow.base_output_dir must not be empty".to_string());
        }
        if self.workflow.step_timeout_secs == 0 {
            problems.push("workflow.step_timeout_secs must be greater than zero".to_string());
        }

        let quality = self.workflow.steps.image_conversion.quality;
        if !(1..=100).contains(&quality) {
            problems.push(format!(
                "workflow.steps.image_conversion.quality must be 1-100, got {}",
                quality
            ));
        }

        for step in WorkflowStep::ALL {
            let key = step.output_key();
            let subdir = self.workflow.steps.output_subdir(key).unwrap_or(key);
            if subdir.trim().is_empty() {
                problems.push(format!("workflow.steps.{}.output_subdir must not be empty", key));
            } else if Path::new(subdir).is_absolute() {
                problems.push(format!(
                    "workflow.steps.{}.output_subdir must be relative, got {}",
                    key, subdir
                ));
            }

            if self.tools.command_for(step).program.trim().is_empty() {
                problems.push(format!("tools.{}.program must not be empty", key));
            }
        }

        for (category, patterns) in self.file_patterns.iter() {
            if patterns.iter().any(|p| p.is_empty()) {
                problems.push(format!("file_patterns.{} contains an empty pattern", category));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// `[workflow]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSection {
    /// Base directory for step outputs when no output dir is given.
    #[serde(default = "default_base_output_dir")]
    pub base_output_dir: String,

    /// Keep the input directory hierarchy in step outputs.
    #[serde(default = "default_true")]
    pub preserve_structure: bool,

    /// Remove intermediate outputs after the run (never done by the orchestrator itself).
    #[serde(default)]
    pub cleanup_intermediate: bool,

    /// Timeout for one external tool invocation.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Per-step options.
    #[serde(default)]
    pub steps: StepsSettings,
}

fn default_base_output_dir() -> String {
    "workflow_output".to_string()
}

fn default_true() -> bool {
    true
}

fn default_step_timeout() -> u64 {
    1800
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            base_output_dir: default_base_output_dir(),
            preserve_structure: true,
            cleanup_intermediate: false,
            step_timeout_secs: default_step_timeout(),
            steps: StepsSettings::default(),
        }
    }
}

/// `[workflow.steps]` tables, one per step key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepsSettings {
    #[serde(default)]
    pub video_extraction: VideoExtractionSettings,
    #[serde(default)]
    pub image_conversion: ImageConversionSettings,
    #[serde(default)]
    pub image_description: ImageDescriptionSettings,
    #[serde(default)]
    pub html_generation: HtmlGenerationSettings,
}

impl StepsSettings {
    /// Configured output subdirectory for a step key, if the key is known.
    pub fn output_subdir(&self, key: &str) -> Option<&str> {
        match key {
            "video_extraction" => Some(&self.video_extraction.output_subdir),
            "image_conversion" => Some(&self.image_conversion.output_subdir),
            "image_description" => Some(&self.image_description.output_subdir),
            "html_generation" => Some(&self.html_generation.output_subdir),
            _ => None,
        }
    }

    /// Whether a step key is enabled. Unknown keys are enabled.
    pub fn is_enabled(&self, key: &str) -> bool {
        match key {
            "video_extraction" => self.video_extraction.enabled,
            "image_conversion" => self.image_conversion.enabled,
            "image_description" => self.image_description.enabled,
            "html_generation" => self.html_generation.enabled,
            _ => true,
        }
    }
}

/// `[workflow.steps.video_extraction]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoExtractionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_frames_subdir")]
    pub output_subdir: String,
    /// Frame extractor configuration file.
    #[serde(default = "default_extractor_config")]
    pub config_file: String,
}

fn default_frames_subdir() -> String {
    "extracted_frames".to_string()
}

fn default_extractor_config() -> String {
    "video_frame_extractor_config.json".to_string()
}

impl Default for VideoExtractionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_subdir: default_frames_subdir(),
            config_file: default_extractor_config(),
        }
    }
}

/// `[workflow.steps.image_conversion]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConversionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_converted_subdir")]
    pub output_subdir: String,
    /// JPG quality passed to the converter.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Keep EXIF metadata in converted images.
    #[serde(default = "default_true")]
    pub keep_metadata: bool,
}

fn default_converted_subdir() -> String {
    "converted_images".to_string()
}

fn default_quality() -> u8 {
    95
}

impl Default for ImageConversionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_subdir: default_converted_subdir(),
            quality: default_quality(),
            keep_metadata: true,
        }
    }
}

/// `[workflow.steps.image_description]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_descriptions_subdir")]
    pub output_subdir: String,
    /// Vision model name passed to the describer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Prompt style passed to the describer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_style: Option<String>,
    /// Describer configuration file.
    #[serde(default = "default_describer_config")]
    pub config_file: String,
}

fn default_descriptions_subdir() -> String {
    "descriptions".to_string()
}

fn default_describer_config() -> String {
    "image_describer_config.json".to_string()
}

impl Default for ImageDescriptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_subdir: default_descriptions_subdir(),
            model: None,
            prompt_style: None,
            config_file: default_describer_config(),
        }
    }
}

/// `[workflow.steps.html_generation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlGenerationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_html_subdir")]
    pub output_subdir: String,
    /// Report title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Render full description details.
    #[serde(default)]
    pub include_details: bool,
}

fn default_html_subdir() -> String {
    "html_reports".to_string()
}

fn default_title() -> String {
    "Image Analysis Report".to_string()
}

impl Default for HtmlGenerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_subdir: default_html_subdir(),
            title: default_title(),
            include_details: false,
        }
    }
}

/// `[file_patterns]` - extension (or file name suffix) sets per category.
///
/// The four built-in categories always exist; extra categories may be
/// added by the user and are looked up by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePatternRegistry {
    #[serde(default = "default_video_patterns")]
    pub videos: Vec<String>,
    #[serde(default = "default_image_patterns")]
    pub images: Vec<String>,
    #[serde(default = "default_heic_patterns")]
    pub heic: Vec<String>,
    #[serde(default = "default_description_patterns")]
    pub descriptions: Vec<String>,
    /// User-defined categories.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Vec<String>>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_video_patterns() -> Vec<String> {
    to_strings(&[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v"])
}

fn default_image_patterns() -> Vec<String> {
    to_strings(&[".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".webp"])
}

fn default_heic_patterns() -> Vec<String> {
    to_strings(&[".heic", ".HEIC", ".heif", ".HEIF"])
}

fn default_description_patterns() -> Vec<String> {
    to_strings(&["image_descriptions.txt"])
}

impl Default for FilePatternRegistry {
    fn default() -> Self {
        Self {
            videos: default_video_patterns(),
            images: default_image_patterns(),
            heic: default_heic_patterns(),
            descriptions: default_description_patterns(),
            extra: BTreeMap::new(),
        }
    }
}

impl FilePatternRegistry {
    /// Patterns for a built-in category.
    pub fn for_category(&self, category: FileCategory) -> &[String] {
        match category {
            FileCategory::Videos => &self.videos,
            FileCategory::Images => &self.images,
            FileCategory::Heic => &self.heic,
            FileCategory::Descriptions => &self.descriptions,
        }
    }

    /// Patterns by category name. Unknown names yield an empty slice.
    pub fn get(&self, name: &str) -> &[String] {
        match name {
            "videos" => &self.videos,
            "images" => &self.images,
            "heic" => &self.heic,
            "descriptions" => &self.descriptions,
            other => self.extra.get(other).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    /// Iterate over every category (built-in first, then extras).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        FileCategory::ALL
            .into_iter()
            .map(move |c| (c.as_str(), self.for_category(c)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_slice())))
    }
}

/// `[tools]` - launch settings for the external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Working directory for every tool invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Extra environment variables for every tool invocation.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_extractor_command")]
    pub video_extraction: ToolCommand,
    #[serde(default = "default_converter_command")]
    pub image_conversion: ToolCommand,
    #[serde(default = "default_describer_command")]
    pub image_description: ToolCommand,
    #[serde(default = "default_renderer_command")]
    pub html_generation: ToolCommand,
}

fn default_extractor_command() -> ToolCommand {
    ToolCommand::python_script("video_frame_extractor.py")
}

fn default_converter_command() -> ToolCommand {
    ToolCommand::python_script("ConvertImage.py")
}

fn default_describer_command() -> ToolCommand {
    ToolCommand::python_script("image_describer.py")
}

fn default_renderer_command() -> ToolCommand {
    ToolCommand::python_script("descriptions_to_html.py")
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            working_dir: None,
            env: BTreeMap::new(),
            video_extraction: default_extractor_command(),
            image_conversion: default_converter_command(),
            image_description: default_describer_command(),
            html_generation: default_renderer_command(),
        }
    }
}

impl ToolSettings {
    /// Launch command for a step.
    pub fn command_for(&self, step: WorkflowStep) -> &ToolCommand {
        match step {
            WorkflowStep::Video => &self.video_extraction,
            WorkflowStep::Convert => &self.image_conversion,
            WorkflowStep::Describe => &self.image_description,
            WorkflowStep::Html => &self.html_generation,
        }
    }

    /// Absolute path of a file named in the configuration.
    ///
    /// Relative paths are taken against `working_dir` when set, else
    /// against the current directory, so tools get the same file
    /// wherever they run.
    pub fn resolve_path(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.working_dir {
            Some(ref dir) => absolutize(&Path::new(dir).join(path)),
            None => absolutize(path),
        }
    }
}

/// Program plus leading arguments for one collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    /// `python3 <script>`
    pub fn python_script(script: &str) -> Self {
        Self {
            program: "python3".to_string(),
            args: vec![script.to_string()],
        }
    }

    /// Short name for log messages (the script if present, else the program).
    pub fn display_name(&self) -> &str {
        self.args
            .first()
            .map(String::as_str)
            .unwrap_or(self.program.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = WorkflowSettings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[workflow]"));
        assert!(toml.contains("[file_patterns]"));
        assert!(toml.contains("base_output_dir"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = WorkflowSettings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: WorkflowSettings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[workflow.steps.image_conversion]\nquality = 80\n";
        let parsed: WorkflowSettings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.workflow.steps.image_conversion.quality, 80);
        assert_eq!(parsed.workflow.steps.image_conversion.output_subdir, "converted_images");
        assert_eq!(parsed.workflow.step_timeout_secs, 1800);
        assert_eq!(parsed.file_patterns.heic.len(), 4);
    }

    #[test]
    fn extra_pattern_categories_are_kept() {
        let content = "[file_patterns]\nraw = [\".cr2\", \".nef\"]\n";
        let parsed: WorkflowSettings = toml::from_str(content).unwrap();
        assert_eq!(parsed.file_patterns.get("raw"), [".cr2", ".nef"]);
        assert_eq!(parsed.file_patterns.get("images").len(), 6);
        assert!(parsed.file_patterns.get("missing").is_empty());
    }

    #[test]
    fn unknown_step_keys_have_no_subdir() {
        let steps = StepsSettings::default();
        assert_eq!(steps.output_subdir("image_description"), Some("descriptions"));
        assert_eq!(steps.output_subdir("thumbnails"), None);
        assert!(steps.is_enabled("thumbnails"));
    }

    #[test]
    fn validate_reports_bad_values() {
        let mut settings = WorkflowSettings::default();
        settings.workflow.steps.image_conversion.quality = 0;
        settings.workflow.step_timeout_secs = 0;
        settings.workflow.steps.html_generation.output_subdir = String::new();

        let problems = settings.validate().unwrap_err();
        assert_eq!(problems.len(), 3);
        assert!(WorkflowSettings::default().validate().is_ok());
    }

    #[test]
    fn resolve_path_uses_working_dir() {
        let mut tools = ToolSettings::default();
        assert_eq!(tools.resolve_path("/etc/cfg.json"), PathBuf::from("/etc/cfg.json"));
        assert!(tools.resolve_path("cfg.json").is_absolute());

        tools.working_dir = Some("/opt/idt/scripts".to_string());
        assert_eq!(
            tools.resolve_path("cfg.json"),
            PathBuf::from("/opt/idt/scripts/cfg.json")
        );
    }

    #[test]
    fn tool_display_name_prefers_script() {
        assert_eq!(
            ToolSettings::default().command_for(WorkflowStep::Convert).display_name(),
            "ConvertImage.py"
        );
        let bare = ToolCommand {
            program: "heif-convert".to_string(),
            args: Vec::new(),
        };
        assert_eq!(bare.display_name(), "heif-convert");
    }
}
