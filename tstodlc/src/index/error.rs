//! Error types for index documents.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while reading, reconciling or writing indices.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Failed to read a file.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(String),

    /// The compressed container could not be read or written.
    #[error("archive error for {}: {message}", .path.display())]
    Archive { path: PathBuf, message: String },

    /// A package file name does not follow `<directory>:<file>`.
    #[error("invalid package file name '{0}'")]
    InvalidFileName(String),
}
