//! File discovery by category.
//!
//! Scans a directory for files whose names end with one of a category's
//! registered patterns. Results are deduplicated and sorted so that
//! downstream numbering ("image 3/50") is stable between runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::FilePatternRegistry;
use crate::models::FileCategory;

/// Finds and categorizes files using the configured pattern registry.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    patterns: FilePatternRegistry,
}

impl FileDiscovery {
    /// Create a discovery helper over the given registry.
    pub fn new(patterns: FilePatternRegistry) -> Self {
        Self { patterns }
    }

    /// Find files of a built-in category.
    pub fn find_files(&self, directory: &Path, category: FileCategory, recursive: bool) -> Vec<PathBuf> {
        find_files_with_suffixes(directory, self.patterns.for_category(category), recursive)
    }

    /// Find files of a category by name.
    ///
    /// Unknown categories and nonexistent directories yield an empty list.
    pub fn find_files_by_type(&self, directory: &Path, category: &str, recursive: bool) -> Vec<PathBuf> {
        let patterns = self.patterns.get(category);
        if patterns.is_empty() {
            tracing::debug!("No patterns registered for category '{}'", category);
            return Vec::new();
        }
        find_files_with_suffixes(directory, patterns, recursive)
    }

    /// Run discovery for every registered category.
    pub fn categorize_files(&self, directory: &Path, recursive: bool) -> BTreeMap<String, Vec<PathBuf>> {
        self.patterns
            .iter()
            .map(|(name, patterns)| {
                (
                    name.to_string(),
                    find_files_with_suffixes(directory, patterns, recursive),
                )
            })
            .collect()
    }
}

/// Find regular files whose name ends with any of `suffixes`, ignoring case.
///
/// Returns a sorted list without duplicates. A missing directory yields
/// an empty list; unreadable entries are skipped.
pub fn find_files_with_suffixes<S: AsRef<str>>(
    directory: &Path,
    suffixes: &[S],
    recursive: bool,
) -> Vec<PathBuf> {
    if suffixes.is_empty() || !directory.is_dir() {
        return Vec::new();
    }

    let suffixes: Vec<String> = suffixes
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = BTreeSet::new();

    for entry in WalkDir::new(directory).min_depth(1).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", directory.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            found.insert(path.to_path_buf());
        }
    }

    found.into_iter().collect()
}

/// Path of `file` relative to `base`, or just its file name if not under `base`.
pub fn relative_path_structure(file: &Path, base: &Path) -> PathBuf {
    match file.strip_prefix(base) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| file.to_path_buf()),
    }
}

/// Whether `dir` exists and contains at least one entry.
pub fn dir_has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
