//! Where configuration files come from.

mod directory;

pub use directory::{DirectorySource, FileFilter, file_key};
