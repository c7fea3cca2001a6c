//! Error types for confwatch.

use std::path::PathBuf;

/// Result type alias for confwatch operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or watching a configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration directory does not exist or is not a directory.
    #[error("Configuration directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A configuration file could not be parsed.
    #[error("Failed to parse configuration file '{file}': {message}")]
    ParseError {
        /// Name of the file that failed to parse
        file: String,
        /// Parser error message
        message: String,
    },

    /// No document with this name has been loaded.
    #[error("'{0}' is not a loaded configuration file")]
    NotFound(String),

    /// An observer panicked while being notified.
    #[error("Observer failed: {0}")]
    ObserverError(String),

    /// The file watching backend failed.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// A lifecycle operation was called in the wrong state.
    #[error("Invalid watch state: {0}")]
    InvalidState(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Create a parse error for the given file.
    pub fn parse(file: impl Into<String>, message: impl ToString) -> Self {
        Self::ParseError {
            file: file.into(),
            message: message.to_string(),
        }
    }
}

impl From<notify::Error> for ConfigError {
    fn from(err: notify::Error) -> Self {
        ConfigError::WatchError(err.to_string())
    }
}
