//! The configuration manager: reloads files on change and notifies observers.

use crate::core::{ConfigManagerBuilder, ConfigSnapshot, ConfigStore};
use crate::error::{ConfigError, Result};
use crate::notify::{DirectoryWatcher, FileEvent, FileEventKind, Observer, ObserverRegistry};
use crate::sources::{DirectorySource, FileFilter, file_key};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Lifecycle of the directory watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Constructed, no watch established yet
    Created,
    /// The watch worker is running
    Running,
    /// Stop was requested; terminal for this manager
    Stopped,
}

/// What [`ConfigManager::on_file_event`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event did not concern a matching configuration file
    Ignored,
    /// The file was reloaded and observers were notified
    Reloaded,
    /// The file could not be read or parsed; the previous value was kept
    Rejected,
    /// The file was removed from the store and observers were notified
    Removed,
}

/// Result of [`ConfigManager::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum Configuration {
    /// Every loaded document
    All(ConfigSnapshot),
    /// A single document
    Document(Arc<Value>),
}

/// State shared between the manager and its watch worker.
pub(crate) struct Coordinator {
    /// Canonical path of the watched directory.
    directory: PathBuf,
    store: ConfigStore,
    observers: ObserverRegistry,
    filter: FileFilter,
    track_removals: bool,
    /// Serializes reload + notify so notifications never interleave.
    reload_lock: Mutex<()>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl Coordinator {
    pub(crate) fn new(directory: PathBuf, filter: FileFilter, track_removals: bool) -> Self {
        Self {
            directory,
            store: ConfigStore::new(),
            observers: ObserverRegistry::new(),
            filter,
            track_removals,
            reload_lock: Mutex::new(()),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: Option<ConfigMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Load every matching file in `source`. Failures are logged and skipped.
    pub(crate) fn load_initial(&self, source: &DirectorySource) -> Result<()> {
        for path in source.matching_files()? {
            let Some(name) = file_key(&path) else {
                continue;
            };
            match read_and_load(&self.store, &name, &path) {
                Ok(()) => debug!(file = %name, "Loaded configuration file"),
                Err(e) => warn!(file = %name, error = %e, "Skipping configuration file"),
            }
        }

        info!(
            directory = %source.path().display(),
            documents = self.store.len(),
            "Loaded configuration directory"
        );
        Ok(())
    }

    fn handle_event(&self, event: &FileEvent) -> EventOutcome {
        let name = match file_key(&event.path) {
            Some(name) if self.filter.matches_name(&event.path) && self.contains(&event.path) => {
                name
            }
            _ => {
                debug!(path = %event.path.display(), "Ignoring event for non-configuration path");
                return EventOutcome::Ignored;
            }
        };

        let _guard = self.reload_lock.lock();

        match event.kind {
            FileEventKind::Created | FileEventKind::Modified => {
                if !event.path.is_file() {
                    return EventOutcome::Ignored;
                }
                self.reload(&name, &event.path)
            }
            FileEventKind::Removed => {
                if !self.track_removals || event.path.is_file() || !self.store.remove(&name) {
                    return EventOutcome::Ignored;
                }
                info!(file = %name, "Configuration file removed");
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_change(self.store.len());
                }
                self.notify(&self.store.snapshot());
                EventOutcome::Removed
            }
        }
    }

    /// Whether `path` names an entry directly inside the watched directory.
    fn contains(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if parent == self.directory => true,
            Some(parent) => parent
                .canonicalize()
                .is_ok_and(|parent| parent == self.directory),
            None => false,
        }
    }

    fn notify_serialized(&self, snapshot: &ConfigSnapshot) -> Vec<ConfigError> {
        let _guard = self.reload_lock.lock();
        self.notify(snapshot)
    }

    fn reload(&self, name: &str, path: &Path) -> EventOutcome {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(ConfigMetrics::start_reload);

        match read_and_load(&self.store, name, path) {
            Ok(()) => {
                info!(file = %name, "Configuration file reloaded");
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_reload_success(name, timer, self.store.len());
                }
                self.notify(&self.store.snapshot());
                EventOutcome::Reloaded
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Rejected configuration file, keeping previous value");
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_reload_failure(name, timer);
                }
                EventOutcome::Rejected
            }
        }
    }

    fn notify(&self, snapshot: &ConfigSnapshot) -> Vec<ConfigError> {
        let failures = self.observers.notify_all(snapshot);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_observer_failures(failures.len());
        }
        failures
    }
}

fn read_and_load(store: &ConfigStore, name: &str, path: &Path) -> Result<()> {
    let raw = fs::read(path)?;
    store.load(name, &raw)
}

/// Watches a directory of configuration files and keeps them loaded.
///
/// On construction every matching file in the directory is parsed into the
/// store. After [`start`](Self::start), each create or modify event for a
/// matching file reloads that file and, if it parsed, passes a snapshot of
/// the whole configuration to every registered observer.
///
/// # Examples
///
/// ```rust,no_run
/// use confwatch::prelude::*;
///
/// # fn example() -> Result<()> {
/// let mut manager = ConfigManager::new("conf")?;
///
/// manager.register_observer(|snapshot: &ConfigSnapshot| {
///     println!("configuration changed: {:?}", snapshot.names());
/// });
///
/// let server = manager.document("server.json")?;
/// println!("port: {}", server["port"]);
///
/// manager.start()?;
/// // ... run until shutdown
/// manager.stop();
/// manager.join()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigManager {
    coordinator: Arc<Coordinator>,
    directory: PathBuf,
    state: WatchState,
    watcher: Box<dyn DirectoryWatcher>,
}

impl ConfigManager {
    /// Load a configuration directory with default settings.
    ///
    /// Watches `.json` files using native file system events.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DirectoryNotFound`] if `directory` does not exist.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        Self::builder().directory(directory).build()
    }

    /// Create a builder for constructing a configuration manager.
    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        coordinator: Coordinator,
        directory: PathBuf,
        watcher: Box<dyn DirectoryWatcher>,
    ) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            directory,
            state: WatchState::Created,
            watcher,
        }
    }

    /// Register an observer called with the full snapshot after every change.
    ///
    /// Observers run on the watch worker, in registration order. Returns the
    /// stored callback.
    ///
    /// An observer must not call [`on_file_event`](Self::on_file_event) itself;
    /// reading the configuration from an observer is fine.
    pub fn register_observer<F>(&self, callback: F) -> Observer
    where
        F: Fn(&ConfigSnapshot) + Send + Sync + 'static,
    {
        self.coordinator.observers.register(callback)
    }

    /// Handle one file system event.
    ///
    /// Events for paths that are not regular files with a configured suffix,
    /// or that lie outside the watched directory, are ignored. A file that fails to read or parse is logged and left at
    /// its previous value, and no observer is notified. This is what the
    /// watch worker calls for every event.
    pub fn on_file_event(&self, event: &FileEvent) -> EventOutcome {
        self.coordinator.handle_event(event)
    }

    /// Notify every observer with `snapshot`.
    ///
    /// A panicking observer is logged and does not prevent the remaining
    /// observers from running. Returns one error per failed observer.
    ///
    /// Waits for any reload in progress, so this never overlaps another
    /// notification. Must not be called from an observer.
    pub fn notify(&self, snapshot: &ConfigSnapshot) -> Vec<ConfigError> {
        self.coordinator.notify_serialized(snapshot)
    }

    /// Get every loaded document, or a single one by file name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `name` was never successfully loaded.
    pub fn get(&self, name: Option<&str>) -> Result<Configuration> {
        match name {
            None => Ok(Configuration::All(self.snapshot())),
            Some(name) => self.document(name).map(Configuration::Document),
        }
    }

    /// Get a read-only snapshot of every loaded document.
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.coordinator.store.snapshot()
    }

    /// Get a single document by file name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `name` was never successfully loaded.
    pub fn document(&self, name: &str) -> Result<Arc<Value>> {
        self.coordinator.store.get(name)
    }

    /// Start watching the directory on a background worker.
    ///
    /// Returns as soon as the watch is established. Starting a running
    /// manager does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidState`] after [`stop`](Self::stop), or
    /// the watcher's error if the watch could not be established.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            WatchState::Running => {
                warn!(directory = %self.directory.display(), "Already watching");
                return Ok(());
            }
            WatchState::Stopped => {
                return Err(ConfigError::InvalidState(
                    "cannot restart a stopped watch".to_string(),
                ));
            }
            WatchState::Created => {}
        }

        info!(directory = %self.directory.display(), "Start watching");
        let coordinator = Arc::clone(&self.coordinator);
        self.watcher.start(
            &self.directory,
            Box::new(move |event| {
                coordinator.handle_event(&event);
            }),
        )?;
        self.state = WatchState::Running;
        Ok(())
    }

    /// Ask the watch worker to stop.
    ///
    /// The event being handled, if any, completes first. Use
    /// [`join`](Self::join) to wait for the worker to exit.
    pub fn stop(&mut self) {
        if self.state == WatchState::Running {
            info!(directory = %self.directory.display(), "Stop watching");
            self.watcher.stop();
        }
        self.state = WatchState::Stopped;
    }

    /// Block until the watch worker has exited.
    ///
    /// Call [`stop`](Self::stop) first: a running worker never exits on its
    /// own, so joining it without stopping blocks forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker panicked.
    pub fn join(&mut self) -> Result<()> {
        if self.state == WatchState::Created {
            return Ok(());
        }
        debug!(directory = %self.directory.display(), "Waiting for watch worker");
        self.watcher.join()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// The watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.coordinator.observers.len()
    }
}

impl Drop for ConfigManager {
    fn drop(&mut self) {
        if self.state != WatchState::Created {
            self.watcher.stop();
            let _ = self.watcher.join();
        }
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("directory", &self.directory)
            .field("state", &self.state)
            .field("documents", &self.coordinator.store.len())
            .field("observers", &self.coordinator.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn manager_with(files: &[(&str, &str)]) -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).unwrap();
        }
        let manager = ConfigManager::new(temp_dir.path()).unwrap();
        (temp_dir, manager)
    }

    fn modified(dir: &TempDir, name: &str) -> FileEvent {
        FileEvent::new(dir.path().join(name), FileEventKind::Modified)
    }

    #[test]
    fn test_construct_loads_matching_files() {
        let (_dir, manager) =
            manager_with(&[("a.json", r#"{"x": 1}"#), ("bad.json", "{x:}"), ("c.txt", "x")]);

        assert_eq!(manager.snapshot().names(), vec!["a.json"]);
        assert_eq!(manager.state(), WatchState::Created);
    }

    #[test]
    fn test_construct_missing_directory() {
        let result = ConfigManager::new("/nonexistent/conf");
        assert!(matches!(result, Err(ConfigError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_get_all_and_one() {
        let (_dir, manager) = manager_with(&[("a.json", r#"{"x": 1}"#)]);

        match manager.get(None).unwrap() {
            Configuration::All(snapshot) => assert_eq!(snapshot.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            manager.get(Some("a.json")).unwrap(),
            Configuration::Document(Arc::new(json!({"x": 1})))
        );
        assert!(matches!(
            manager.get(Some("nonexistent.json")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_modify_event_reloads_and_notifies() {
        let (dir, manager) = manager_with(&[("a.json", r#"{"x": 1}"#)]);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        manager.register_observer(move |snapshot| {
            assert_eq!(snapshot.document("a.json"), Some(&json!({"x": 2})));
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        fs::write(dir.path().join("a.json"), r#"{"x": 2}"#).unwrap();
        assert_eq!(manager.on_file_event(&modified(&dir, "a.json")), EventOutcome::Reloaded);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*manager.document("a.json").unwrap(), json!({"x": 2}));
    }

    #[test]
    fn test_invalid_modify_keeps_value_and_does_not_notify() {
        let (dir, manager) = manager_with(&[("a.json", r#"{"x": 1}"#)]);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        manager.register_observer(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        fs::write(dir.path().join("a.json"), "{x:}").unwrap();
        assert_eq!(manager.on_file_event(&modified(&dir, "a.json")), EventOutcome::Rejected);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*manager.document("a.json").unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_filtered_events_are_ignored() {
        let (dir, manager) = manager_with(&[]);
        fs::write(dir.path().join("notes.txt"), "{}").unwrap();
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        assert_eq!(manager.on_file_event(&modified(&dir, "notes.txt")), EventOutcome::Ignored);
        assert_eq!(manager.on_file_event(&modified(&dir, "sub.json")), EventOutcome::Ignored);
        assert_eq!(manager.on_file_event(&modified(&dir, "gone.json")), EventOutcome::Ignored);
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn test_events_outside_directory_are_ignored() {
        let (dir, manager) = manager_with(&[("a.json", r#"{"x": 1}"#)]);
        let other = TempDir::new().unwrap();
        fs::write(other.path().join("a.json"), r#"{"x": 99}"#).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("a.json"), r#"{"x": 42}"#).unwrap();

        for path in [other.path().join("a.json"), dir.path().join("sub").join("a.json")] {
            let event = FileEvent::new(path, FileEventKind::Modified);
            assert_eq!(manager.on_file_event(&event), EventOutcome::Ignored);
        }
        let relative = FileEvent::new("a.json", FileEventKind::Modified);
        assert_eq!(manager.on_file_event(&relative), EventOutcome::Ignored);

        assert_eq!(*manager.document("a.json").unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_remove_ignored_by_default() {
        let (dir, manager) = manager_with(&[("a.json", "{}")]);
        fs::remove_file(dir.path().join("a.json")).unwrap();

        let event = FileEvent::new(dir.path().join("a.json"), FileEventKind::Removed);
        assert_eq!(manager.on_file_event(&event), EventOutcome::Ignored);
        assert!(manager.document("a.json").is_ok());
    }

    #[test]
    fn test_lifecycle_without_start() {
        let (_dir, mut manager) = manager_with(&[]);
        manager.stop();
        assert_eq!(manager.state(), WatchState::Stopped);
        assert!(manager.join().is_ok());
        assert!(matches!(manager.start(), Err(ConfigError::InvalidState(_))));
    }

    #[test]
    fn test_start_stop_join() {
        let (_dir, mut manager) = manager_with(&[]);
        manager.start().unwrap();
        assert_eq!(manager.state(), WatchState::Running);

        // second start is a no-op
        manager.start().unwrap();

        manager.stop();
        manager.join().unwrap();
        assert_eq!(manager.state(), WatchState::Stopped);
    }
}
