//! Core configuration management types.

mod builder;
mod format;
mod manager;
mod store;

pub use builder::{ConfigManagerBuilder, DEFAULT_DIRECTORY_NAME};
pub use format::DocumentFormat;
pub use manager::{ConfigManager, Configuration, EventOutcome, WatchState};
pub use store::{ConfigSnapshot, ConfigStore, DocumentMap};
