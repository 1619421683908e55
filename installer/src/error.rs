//! Error types for the hotdeploy CLI.
//!
//! Each variant says what the operator can do about it where that is not
//! obvious from the message alone.

use crate::store_index::StoreError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while running a CLI command.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// No store directory was given and none could be derived.
    #[error("could not determine module store directory; pass --store or set HOTDEPLOY_STORE")]
    StoreDirUnavailable,

    /// Opening or reading the module store failed.
    #[error("module store error: {0}")]
    Store(#[from] StoreError),

    /// The archive passed with `--archive` could not be opened.
    #[error("failed to open archive {path}: {source}")]
    OpenArchive {
        /// Path given on the command line.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The deployment was rejected; the message comes from the outcome.
    #[error("deployment failed: {message}")]
    DeployFailed {
        /// Failure message reported for the request.
        message: String,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
