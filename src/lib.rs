//! Hot install and update of modules into a live module host.
//!
//! A module arrives either as an uploaded archive or as an exploded
//! directory. Its manifest is validated, an existing module with the same
//! symbolic name is looked up, directories are assembled into a temporary
//! archive with the manifest first, and the bytes are streamed into the
//! host's install or update primitive. A transitive refresh can follow.
//!
//! # Modules
//!
//! - [`archive`] - Directory-to-archive assembly with the manifest first
//! - [`config`] - Deployment tuning
//! - [`coordinator`] - Install-or-update orchestration
//! - [`error`] - Deployment error taxonomy
//! - [`host`] - The module host contract
//! - [`local_header`] - Forward-only zip entry reading
//! - [`locks`] - Per-symbolic-name serialisation
//! - [`manifest`] - Manifest parsing, identity, and serialisation
//! - [`peek`] - Bounded, rewindable stream prefix
//! - [`refresh`] - Transitive refresh trigger
//! - [`registry`] - Lookup of an existing module by identity
//! - [`request`] - Request parameters to outcome
//! - [`source`] - Upload and directory sources
//! - [`validator`] - Manifest extraction and identity checks

pub mod archive;
pub mod archive_error;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod local_header;
pub mod locks;
pub mod manifest;
pub mod peek;
pub mod refresh;
pub mod registry;
pub mod request;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validator;

pub use config::DeployConfig;
pub use coordinator::InstallCoordinator;
pub use error::{DeployError, Result};
pub use host::{HostError, ModuleHandle, ModuleHost, ModuleId};
pub use manifest::{ModuleIdentity, ModuleManifest};
pub use request::{InstallOutcome, InstallRequest, InstallationResult, UploadPart, handle_request};
pub use source::{DirectoryTree, ModuleSource, UploadStream};
