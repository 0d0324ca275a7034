//! Filesystem-safe naming for run directories.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Timestamp format used in run directory and log file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Convert a model or prompt-style name into a filesystem-safe tag.
///
/// Mapping:
/// - ASCII alphanumerics, `_`, `-` and `.` are kept; every other char becomes `_`
/// - runs of `_` collapse into one
/// - leading and trailing `_` are trimmed
/// - the result is lowercased
/// - an empty result becomes `unknown`
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for c in name.chars() {
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a timestamp for directory and file names.
pub fn timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Name of an unlabeled run directory: `workflow_<model>_<prompt>_<timestamp>`.
pub fn run_dir_name(model: &str, prompt_style: &str, at: DateTime<Local>) -> String {
    format!(
        "workflow_{}_{}_{}",
        sanitize(model),
        sanitize(prompt_style),
        timestamp(at)
    )
}

/// First path `parent/name`, `parent/name_2`, `parent/name_3`, ... that does not exist.
///
/// Only checks existence; nothing is created.
pub fn unique_dir(parent: &Path, name: &str) -> PathBuf {
    let candidate = parent.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let mut n = 2u32;
    loop {
        let candidate = parent.join(format!("{}_{}", name, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn sanitize_keeps_safe_chars() {
        assert_eq!(sanitize("llava-7b.v2"), "llava-7b.v2");
        assert_eq!(sanitize("Detailed"), "detailed");
    }

    #[test]
    fn sanitize_replaces_and_collapses() {
        assert_eq!(sanitize("llava:7b"), "llava_7b");
        assert_eq!(sanitize("qwen2.5vl / 32b"), "qwen2.5vl_32b");
        assert_eq!(sanitize("a::__::b"), "a_b");
    }

    #[test]
    fn sanitize_trims_underscores() {
        assert_eq!(sanitize("__art__"), "art");
        assert_eq!(sanitize(":colon:"), "colon");
    }

    #[test]
    fn sanitize_empty_is_unknown() {
        assert_eq!(sanitize(""), "unknown");
        assert_eq!(sanitize("///"), "unknown");
        assert_eq!(sanitize("日本"), "unknown");
    }

    #[test]
    fn run_dir_name_contains_tags() {
        let at = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            run_dir_name("llava:7b", "Narrative", at),
            "workflow_llava_7b_narrative_20250314_092653"
        );
    }

    #[test]
    fn unique_dir_skips_existing() {
        let dir = tempdir().unwrap();
        assert_eq!(unique_dir(dir.path(), "run"), dir.path().join("run"));

        std::fs::create_dir(dir.path().join("run")).unwrap();
        std::fs::create_dir(dir.path().join("run_2")).unwrap();
        assert_eq!(unique_dir(dir.path(), "run"), dir.path().join("run_3"));
    }
}
