//! Builder for constructing ConfigManager instances.

use crate::core::ConfigManager;
use crate::core::manager::Coordinator;
use crate::error::{ConfigError, Result};
use crate::notify::{DirectoryWatcher, NotifyDirectoryWatcher, WatchBackend};
use crate::sources::{DirectorySource, FileFilter};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Name of the default configuration directory, next to the executable.
pub const DEFAULT_DIRECTORY_NAME: &str = "conf";

/// Builder for constructing a [`ConfigManager`].
///
/// # Examples
///
/// ```rust,no_run
/// use confwatch::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let manager = ConfigManager::builder()
///     .directory("/etc/myapp/conf.d")
///     .with_suffix("json")
///     .with_polling(Duration::from_secs(2))
///     .with_removal_tracking(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigManagerBuilder {
    directory: Option<PathBuf>,
    suffixes: Vec<String>,
    backend: WatchBackend,
    watcher: Option<Box<dyn DirectoryWatcher>>,
    track_removals: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl ConfigManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            directory: None,
            suffixes: Vec::new(),
            backend: WatchBackend::Native,
            watcher: None,
            track_removals: false,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// The directory used when none is set: `conf` next to the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined.
    pub fn default_directory() -> Result<PathBuf> {
        let exe = std::env::current_exe()?;
        let parent = exe.parent().ok_or_else(|| {
            ConfigError::DirectoryNotFound(exe.join(DEFAULT_DIRECTORY_NAME))
        })?;
        Ok(parent.join(DEFAULT_DIRECTORY_NAME))
    }

    /// Set the directory to watch.
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directory = Some(path.into());
        self
    }

    /// Accept files with this suffix (`"json"` or `".json"`).
    ///
    /// The first call replaces the default `json` suffix; later calls add to it.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    /// Accept files with any of these suffixes.
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes.extend(suffixes.into_iter().map(Into::into));
        self
    }

    /// Poll the directory every `interval` instead of using native events.
    pub fn with_polling(mut self, interval: Duration) -> Self {
        self.backend = WatchBackend::Poll(interval);
        self
    }

    /// Use a custom directory watcher.
    ///
    /// Overrides [`with_polling`](Self::with_polling).
    pub fn with_watcher<W: DirectoryWatcher + 'static>(mut self, watcher: W) -> Self {
        self.watcher = Some(Box::new(watcher));
        self
    }

    /// Drop a file's document when the file is removed from the directory.
    ///
    /// Off by default: removals are ignored and the last loaded value stays.
    pub fn with_removal_tracking(mut self, enabled: bool) -> Self {
        self.track_removals = enabled;
        self
    }

    /// Record reload metrics with the given OpenTelemetry meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(ConfigMetrics::new(meter));
        self
    }

    /// Build the manager.
    ///
    /// Every matching file already in the directory is loaded. Files that
    /// fail to parse are logged and skipped. No watch is started.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DirectoryNotFound`] if the directory does not
    /// exist, or an IO error if it cannot be listed.
    pub fn build(self) -> Result<ConfigManager> {
        let directory = match self.directory {
            Some(directory) => directory,
            None => Self::default_directory()?,
        };

        let filter = if self.suffixes.is_empty() {
            FileFilter::default()
        } else {
            FileFilter::new(&self.suffixes)
        };

        let source = DirectorySource::open(directory, filter.clone())?;

        let canonical = source.path().canonicalize()?;
        let coordinator = Coordinator::new(canonical, filter, self.track_removals);
        #[cfg(feature = "metrics")]
        let coordinator = coordinator.with_metrics(self.metrics);
        coordinator.load_initial(&source)?;

        let watcher: Box<dyn DirectoryWatcher> = match self.watcher {
            Some(watcher) => watcher,
            None => Box::new(NotifyDirectoryWatcher::new(self.backend)),
        };

        Ok(ConfigManager::from_parts(
            coordinator,
            source.path().to_path_buf(),
            watcher,
        ))
    }
}

impl Default for ConfigManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builder_accumulates_suffixes() {
        let builder = ConfigManagerBuilder::new()
            .with_suffix("json")
            .with_suffixes([".yaml", "yml"]);

        assert_eq!(builder.suffixes, vec!["json", ".yaml", "yml"]);
    }

    #[test]
    fn test_builder_polling() {
        let builder = ConfigManagerBuilder::new().with_polling(Duration::from_millis(250));
        assert_eq!(builder.backend, WatchBackend::Poll(Duration::from_millis(250)));
    }

    #[test]
    fn test_default_directory_is_next_to_executable() {
        let dir = ConfigManagerBuilder::default_directory().unwrap();
        assert!(dir.ends_with(DEFAULT_DIRECTORY_NAME));
    }

    #[test]
    fn test_custom_suffix_replaces_json() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("b.conf"), r#"{"b": true}"#).unwrap();

        let manager = ConfigManagerBuilder::new()
            .directory(temp_dir.path())
            .with_suffix(".conf")
            .build()
            .unwrap();

        assert_eq!(manager.snapshot().names(), vec!["b.conf"]);
    }

    #[test]
    fn test_build_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManagerBuilder::new()
            .directory(temp_dir.path())
            .build()
            .unwrap();
        assert!(manager.snapshot().is_empty());
    }
}
