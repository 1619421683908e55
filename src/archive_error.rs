//! Error types for module archive assembly.
//!
//! Any failure while listing, reading, or writing aborts the whole build;
//! a partially written archive is never handed to the host.

use std::path::PathBuf;
use thiserror::Error;

/// Errors arising while assembling a module archive from a directory.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Listing a directory, reading a file, or writing output failed.
    #[error("I/O error while building archive: {0}")]
    Io(#[from] std::io::Error),

    /// The zip writer rejected an entry or failed to finish the archive.
    #[error("zip error while building archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A file or directory name cannot be represented as an entry path.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}
