//! Document formats and parsing of raw file contents.

use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::path::Path;

/// Structured format of a configuration file.
///
/// JSON is always available. YAML and TOML are parsed into the same
/// [`serde_json::Value`] document type when the `yaml` or `toml` features are
/// enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON (`.json`)
    Json,
    /// YAML (`.yaml`, `.yml`)
    #[cfg(feature = "yaml")]
    Yaml,
    /// TOML (`.toml`)
    #[cfg(feature = "toml")]
    Toml,
}

impl DocumentFormat {
    /// Detect the format from a file extension, without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "json" => Some(Self::Json),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(Self::Yaml),
            #[cfg(feature = "toml")]
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Detect the format from a file name or path.
    ///
    /// Falls back to JSON when the extension is missing or unknown.
    pub fn for_name(name: impl AsRef<Path>) -> Self {
        name.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Json)
    }

    /// Parse raw bytes into a document.
    ///
    /// `file` is only used to label the error.
    pub fn parse(self, file: &str, raw: &[u8]) -> Result<Value> {
        match self {
            Self::Json => serde_json::from_slice(raw).map_err(|e| ConfigError::parse(file, e)),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::from_slice(raw).map_err(|e| ConfigError::parse(file, e)),
            #[cfg(feature = "toml")]
            Self::Toml => {
                let text = std::str::from_utf8(raw).map_err(|e| ConfigError::parse(file, e))?;
                toml::from_str(text).map_err(|e| ConfigError::parse(file, e))
            }
        }
    }
}
