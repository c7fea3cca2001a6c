//! Built-in metrics for configuration reloads.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Reload attempts/success/failures per file
//! - Reload duration
//! - Loaded document count and configuration age
//! - Observer failures
//!
//! # Examples
//!
//! ```rust,no_run
//! use confwatch::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let manager = ConfigManager::builder()
//!     .directory("conf")
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod config_metrics;

pub use config_metrics::ConfigMetrics;
