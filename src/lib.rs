//! # confwatch
//!
//! Watch a directory of configuration files, reload them when they change and
//! notify observers with the complete, updated configuration.
//!
//! ## Overview
//!
//! `confwatch` keeps every matching file of one flat directory parsed in
//! memory:
//! - Lock-free reads of the current configuration using `arc-swap`
//! - Reload of a single file on every create/modify event
//! - Files that fail to parse are rejected, the last good value stays
//! - Observers receive a snapshot of every file after each successful reload
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confwatch::prelude::*;
//!
//! # fn example() -> Result<()> {
//! let mut manager = ConfigManager::new("conf")?;
//!
//! manager.register_observer(|snapshot: &ConfigSnapshot| {
//!     println!("reloaded, {} files loaded", snapshot.len());
//! });
//!
//! let app = manager.document("app.json")?;
//! println!("app: {}", app);
//!
//! manager.start()?;
//! // ... until shutdown
//! manager.stop();
//! manager.join()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml`: parse `.yaml`/`.yml` files
//! - `toml`: parse `.toml` files
//! - `metrics`: OpenTelemetry reload metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        ConfigManager, ConfigManagerBuilder, ConfigSnapshot, Configuration, EventOutcome,
        WatchState,
    };
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{FileEvent, FileEventKind};
}
