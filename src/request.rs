//! The request boundary: turning raw install parameters into an outcome.
//!
//! A request carries either multipart upload content or a `dir` parameter,
//! plus a refresh flag. Multipart content takes precedence. Invalid
//! requests are answered without touching the host.

use crate::coordinator::InstallCoordinator;
use crate::error::DeployError;
use crate::host::ModuleHandle;
use crate::source::{DirectoryTree, ModuleSource, UploadStream};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};

/// HTTP-style status for a successful request.
pub const STATUS_OK: u16 = 200;
/// HTTP-style status for any failed request.
pub const STATUS_FAILED: u16 = 500;

/// One file of a multipart upload.
pub struct UploadPart<'a> {
    file_name: Option<String>,
    content: Box<dyn Read + 'a>,
}

impl<'a> UploadPart<'a> {
    /// Wraps an anonymous upload.
    pub fn new(content: impl Read + 'a) -> Self {
        Self {
            file_name: None,
            content: Box::new(content),
        }
    }

    /// Wraps an upload that carried a client-side file name.
    pub fn named(file_name: impl Into<String>, content: impl Read + 'a) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content: Box::new(content),
        }
    }

    /// Returns the client-side file name, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

impl fmt::Debug for UploadPart<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPart")
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Raw parameters of one install request.
#[derive(Debug, Default)]
pub struct InstallRequest<'a> {
    /// The `dir` parameter, naming an exploded module on the host's disk.
    pub dir: Option<String>,
    /// The `refreshPackages` parameter.
    pub refresh_packages: bool,
    /// Upload parts; `Some` only for multipart requests.
    pub parts: Option<Vec<UploadPart<'a>>>,
}

/// The serialised body of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    /// Whether the module was installed or updated.
    pub success: bool,
    /// Failure explanation; absent on success.
    pub message: Option<String>,
}

impl InstallationResult {
    /// Renders the result as JSON.
    ///
    /// # Errors
    ///
    /// Propagates serialisation or write failures.
    pub fn render<W: io::Write>(&self, out: W) -> serde_json::Result<()> {
        serde_json::to_writer(out, self)
    }

    /// Returns the result as a JSON string.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// What became of one request.
#[derive(Debug)]
pub struct InstallOutcome {
    /// Whether the module was installed or updated.
    pub success: bool,
    /// Failure explanation; absent on success.
    pub message: Option<String>,
    /// The installed or updated module on success.
    pub handle: Option<ModuleHandle>,
}

impl InstallOutcome {
    fn succeeded(handle: ModuleHandle) -> Self {
        Self {
            success: true,
            message: None,
            handle: Some(handle),
        }
    }

    fn failed(err: &DeployError) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
            handle: None,
        }
    }

    /// Returns 200 on success and 500 on any failure.
    #[must_use]
    pub fn status(&self) -> u16 {
        if self.success {
            STATUS_OK
        } else {
            STATUS_FAILED
        }
    }

    /// Returns the response body.
    #[must_use]
    pub fn result(&self) -> InstallationResult {
        InstallationResult {
            success: self.success,
            message: self.message.clone(),
        }
    }
}

/// Handles one install request end to end.
///
/// Never panics on bad input: every failure becomes an unsuccessful
/// outcome carrying the error message.
pub fn handle_request(
    coordinator: &InstallCoordinator,
    request: InstallRequest<'_>,
) -> InstallOutcome {
    let InstallRequest {
        dir,
        refresh_packages,
        parts,
    } = request;
    let deployed = select_source(parts, dir, coordinator.config().peek_limit)
        .and_then(|source| coordinator.deploy(source, refresh_packages));
    match deployed {
        Ok(handle) => InstallOutcome::succeeded(handle),
        Err(err) => {
            if matches!(err, DeployError::NoSource) {
                error!("{err}");
            } else {
                info!("{err}");
            }
            InstallOutcome::failed(&err)
        }
    }
}

/// Picks the module source for a request.
///
/// # Errors
///
/// Returns [`DeployError::InvalidPartCount`] for a multipart request
/// without exactly one part, and [`DeployError::NoSource`] when neither
/// parts nor a non-blank `dir` are present.
pub fn select_source<'a>(
    parts: Option<Vec<UploadPart<'a>>>,
    dir: Option<String>,
    peek_limit: usize,
) -> Result<ModuleSource<'a>, DeployError> {
    if let Some(parts) = parts {
        let count = parts.len();
        let mut parts = parts.into_iter();
        return match (parts.next(), parts.next()) {
            (Some(part), None) => {
                debug!(
                    "deploying upload {}",
                    part.file_name().unwrap_or("without a file name")
                );
                Ok(ModuleSource::Upload(UploadStream::with_limit(
                    part.content,
                    peek_limit,
                )))
            }
            _ => Err(DeployError::InvalidPartCount { count }),
        };
    }
    match dir.filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => Ok(ModuleSource::Directory(DirectoryTree::new(dir))),
        None => Err(DeployError::NoSource),
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
