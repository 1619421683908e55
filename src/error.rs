//! Error types for module deployment.
//!
//! Every failure surfaces to the caller as a single failed outcome with a
//! human-readable message. Nothing is retried: an install is an
//! operator-triggered, at-most-once action per request.

use crate::archive_error::ArchiveError;
use crate::host::HostError;
use crate::manifest::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while installing or updating a module.
#[derive(Debug, Error)]
pub enum DeployError {
    /// No manifest was found in the upload or under the directory.
    #[error("{origin} does not contain a manifest")]
    MissingManifest {
        /// Description of where the manifest was expected.
        origin: String,
    },

    /// The manifest parsed but carries no symbolic name.
    #[error("manifest in {origin} does not have a Bundle-SymbolicName")]
    MissingIdentity {
        /// Description of where the manifest was read from.
        origin: String,
    },

    /// The manifest text is malformed.
    #[error("invalid manifest in {origin}: {source}")]
    InvalidManifest {
        /// Description of where the manifest was read from.
        origin: String,
        /// The parse failure.
        #[source]
        source: ManifestError,
    },

    /// The source directory does not exist.
    #[error("directory {} does not exist", .path.display())]
    SourceNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// Assembling an archive from the directory failed.
    #[error("failed to build module archive: {0}")]
    ArchiveBuild(#[from] ArchiveError),

    /// The host rejected the install, update, start, or refresh.
    #[error("unable to install/update module {symbolic_name}: {source}")]
    InstallationFailed {
        /// Symbolic name of the module being deployed.
        symbolic_name: String,
        /// The host's reason.
        #[source]
        source: HostError,
    },

    /// A filesystem or stream operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request carried neither a directory nor uploaded content.
    #[error("no dir parameter specified and no multipart content found")]
    NoSource,

    /// The upload did not contain exactly one part.
    #[error("found {count} items to process, but only updating 1 module is supported")]
    InvalidPartCount {
        /// Number of parts received.
        count: usize,
    },
}

/// Result type alias using [`DeployError`].
pub type Result<T> = std::result::Result<T, DeployError>;
