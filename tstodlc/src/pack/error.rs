//! Error types for packaging runs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::index::IndexError;

/// Result type for packaging operations.
pub type PackResult<T> = Result<T, PackError>;

/// Errors that abort a packaging run.
#[derive(Debug, Error)]
pub enum PackError {
    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a superseded file.
    #[error("failed to remove {}: {source}", .path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// A zip container could not be built.
    #[error("archive error for {}: {message}", .path.display())]
    Archive { path: PathBuf, message: String },

    /// A directory name cannot be used in package names.
    #[error("unusable directory name: {}", .0.display())]
    InvalidName(PathBuf),

    /// The catalog blob could not be encoded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An index could not be updated.
    #[error(transparent)]
    Index(#[from] IndexError),
}
