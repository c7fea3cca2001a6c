//! Directory watching for automatic configuration reloads.

use crate::error::{ConfigError, Result};
use crossbeam_channel::{Receiver, Sender, select};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A file system event for a path inside the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The path of the file that changed
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created or moved into the directory
    Created,
    /// File contents or metadata changed
    Modified,
    /// File was removed or moved out of the directory
    Removed,
}

impl FileEvent {
    /// Create an event.
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Convert a raw `notify` event into one event per affected path.
    ///
    /// Access and other non-changing events produce nothing.
    pub fn from_notify(event: Event) -> Vec<FileEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => FileEventKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FileEventKind::Removed,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FileEventKind::Created,
            // Both halves of the rename were already delivered as From and To
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => return Vec::new(),
            EventKind::Modify(_) => FileEventKind::Modified,
            EventKind::Remove(_) => FileEventKind::Removed,
            _ => return Vec::new(),
        };

        event
            .paths
            .into_iter()
            .map(|path| FileEvent::new(path, kind))
            .collect()
    }
}

/// Callback receiving every event from a running watch.
pub type EventHandler = Box<dyn FnMut(FileEvent) + Send + 'static>;

/// A blocking source of file system events for one directory.
///
/// `start` must not block the caller: the watch runs on its own worker and
/// invokes the handler there, one event at a time, in emission order.
/// `stop` asks the worker to finish and `join` waits for it to exit. A worker
/// never exits on its own, so `join` without `stop` blocks forever. Joining a
/// watcher that was never started, or already joined, returns immediately.
pub trait DirectoryWatcher: Send + Sync {
    /// Start watching `directory` (non-recursively) on a background worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch could not be established or the watcher
    /// was already started.
    fn start(&mut self, directory: &Path, handler: EventHandler) -> Result<()>;

    /// Ask the worker to stop after the event it is currently handling.
    fn stop(&mut self);

    /// Block until the worker has exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker panicked.
    fn join(&mut self) -> Result<()>;
}

/// Which `notify` backend drives the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchBackend {
    /// The platform's native file event API (inotify, FSEvents, kqueue, ...)
    #[default]
    Native,
    /// Periodic polling, for file systems without native events
    Poll(Duration),
}

/// [`DirectoryWatcher`] backed by the `notify` crate.
///
/// The `notify` watcher is created on the worker thread and lives there until
/// the worker stops, so the watch is torn down by the time `join` returns.
///
/// # Examples
///
/// ```rust,no_run
/// use confwatch::notify::{DirectoryWatcher, NotifyDirectoryWatcher};
/// use std::path::Path;
///
/// # fn example() -> confwatch::error::Result<()> {
/// let mut watcher = NotifyDirectoryWatcher::native();
/// watcher.start(Path::new("conf"), Box::new(|event| println!("{:?}", event)))?;
///
/// // ... later
/// watcher.stop();
/// watcher.join()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct NotifyDirectoryWatcher {
    backend: WatchBackend,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl NotifyDirectoryWatcher {
    /// Create a watcher with the given backend.
    pub fn new(backend: WatchBackend) -> Self {
        Self {
            backend,
            stop_tx: None,
            worker: None,
        }
    }

    /// Create a watcher using native file system events.
    pub fn native() -> Self {
        Self::new(WatchBackend::Native)
    }

    /// Create a watcher polling every `interval`.
    pub fn polling(interval: Duration) -> Self {
        Self::new(WatchBackend::Poll(interval))
    }

    /// The backend this watcher uses.
    pub fn backend(&self) -> WatchBackend {
        self.backend
    }
}

fn create_watcher(
    backend: WatchBackend,
    directory: &Path,
    event_tx: Sender<FileEvent>,
) -> Result<Box<dyn NotifyWatcher>> {
    let handler = move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for file_event in FileEvent::from_notify(event) {
                // Receiver only goes away once the worker has stopped
                let _ = event_tx.send(file_event);
            }
        }
        Err(e) => warn!("File watch error: {}", e),
    };

    let mut watcher: Box<dyn NotifyWatcher> = match backend {
        WatchBackend::Native => Box::new(notify::recommended_watcher(handler)?),
        WatchBackend::Poll(interval) => Box::new(PollWatcher::new(
            handler,
            notify::Config::default().with_poll_interval(interval),
        )?),
    };

    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn run_worker(
    watcher: Box<dyn NotifyWatcher>,
    events: Receiver<FileEvent>,
    stop: Receiver<()>,
    mut handler: EventHandler,
) {
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => handler(event),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
    drop(watcher);
    debug!("Watch worker exited");
}

impl DirectoryWatcher for NotifyDirectoryWatcher {
    fn start(&mut self, directory: &Path, handler: EventHandler) -> Result<()> {
        if self.worker.is_some() {
            return Err(ConfigError::InvalidState(
                "watcher already started".to_string(),
            ));
        }

        let directory = directory
            .canonicalize()
            .map_err(|_| ConfigError::DirectoryNotFound(directory.to_path_buf()))?;
        let backend = self.backend;
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let worker = thread::Builder::new()
            .name("confwatch-watcher".to_string())
            .spawn(move || {
                let (event_tx, event_rx) = crossbeam_channel::unbounded();
                match create_watcher(backend, &directory, event_tx) {
                    Ok(watcher) => {
                        let _ = ready_tx.send(Ok(()));
                        run_worker(watcher, event_rx, stop_rx, handler);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(ConfigError::WatchError(
                    "watch worker exited during startup".to_string(),
                ));
            }
        }

        info!(backend = ?backend, "Watch worker started");
        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| ConfigError::WatchError("watch worker panicked".to_string())),
            None => Ok(()),
        }
    }
}
