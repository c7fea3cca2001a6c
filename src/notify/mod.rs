//! Configuration change notification system.
//!
//! Provides directory watching and observer-based notifications when a
//! configuration file is reloaded.

pub mod observer;
pub mod watcher;

pub use observer::{Observer, ObserverRegistry};
pub use watcher::{
    DirectoryWatcher, EventHandler, FileEvent, FileEventKind, NotifyDirectoryWatcher, WatchBackend,
};
