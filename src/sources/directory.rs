//! Directory-based configuration source.

use crate::error::{ConfigError, Result};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Selects configuration files by extension.
///
/// Suffixes are stored without the leading dot and compared case-sensitively.
///
/// # Examples
///
/// ```rust
/// use confwatch::sources::FileFilter;
///
/// let filter = FileFilter::new([".json", "yaml"]);
/// assert!(filter.matches_name("app.json"));
/// assert!(filter.matches_name("app.yaml"));
/// assert!(!filter.matches_name("app.JSON"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    suffixes: Vec<String>,
}

impl FileFilter {
    /// Create a filter accepting any of the given suffixes.
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self {
            suffixes: Vec::new(),
        };
        for suffix in suffixes {
            filter.add(suffix.as_ref());
        }
        filter
    }

    /// Add a suffix. A leading dot is ignored.
    pub fn add(&mut self, suffix: &str) {
        let suffix = suffix.trim_start_matches('.');
        if !suffix.is_empty() && !self.suffixes.iter().any(|s| s == suffix) {
            self.suffixes.push(suffix.to_string());
        }
    }

    /// The accepted suffixes, without leading dots.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Check whether a file name or path has an accepted extension.
    ///
    /// Does not touch the file system.
    pub fn matches_name(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.suffixes.iter().any(|s| s == ext))
    }

    /// Check whether `path` is an existing regular file with an accepted extension.
    pub fn matches(&self, path: &Path) -> bool {
        self.matches_name(path) && path.is_file()
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(["json"])
    }
}

/// A flat directory of configuration files.
///
/// Subdirectories are never recursed into.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: PathBuf,
    filter: FileFilter,
}

impl DirectorySource {
    /// Open a configuration directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DirectoryNotFound`] if `path` does not exist or
    /// is not a directory.
    pub fn open(path: impl Into<PathBuf>, filter: FileFilter) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(ConfigError::DirectoryNotFound(path));
        }
        Ok(Self { path, filter })
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file filter.
    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    /// List the matching files currently in the directory, in enumeration order.
    ///
    /// Entries that cannot be read are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory itself cannot be read.
    pub fn matching_files(&self) -> Result<Vec<PathBuf>> {
        Ok(collect_matching(fs::read_dir(&self.path)?, &self.filter))
    }
}

fn collect_matching<I>(entries: I, filter: &FileFilter) -> Vec<PathBuf>
where
    I: IntoIterator<Item = io::Result<DirEntry>>,
{
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|path| filter.matches(path))
        .collect()
}

/// Name under which a file is stored, its final path component.
pub fn file_key(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
