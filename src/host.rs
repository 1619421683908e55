//! The narrow contract through which the running module host is reached.
//!
//! The host owns every loaded module and its linkage. This crate only
//! enumerates modules, pushes archive bytes into install or update, starts
//! fresh installs, and asks for a transitive refresh; it never keeps a
//! [`ModuleHandle`] beyond one request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// Host-assigned numeric module identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to a module known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    id: ModuleId,
    symbolic_name: Option<String>,
    location: String,
}

impl ModuleHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new(id: ModuleId, symbolic_name: Option<String>, location: impl Into<String>) -> Self {
        Self {
            id,
            symbolic_name,
            location: location.into(),
        }
    }

    /// Returns the host identifier.
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Returns the symbolic name, if the host knows one.
    #[must_use]
    pub fn symbolic_name(&self) -> Option<&str> {
        self.symbolic_name.as_deref()
    }

    /// Returns the location string the module was installed from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// A rejection reported by a host primitive.
///
/// The coordinator does not interpret these; it wraps them uniformly.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host refused the package or the operation.
    #[error("{reason}")]
    Rejected {
        /// Host-provided explanation.
        reason: String,
    },

    /// The handle no longer refers to a module the host knows.
    #[error("module {id} is not installed")]
    UnknownModule {
        /// The stale identifier.
        id: ModuleId,
    },

    /// Reading the package stream or host storage failed.
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Convenience constructor for [`HostError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Install, update, start, and refresh primitives of a live module host.
///
/// Implementations provide whatever internal serialisation they need to
/// keep their registry consistent.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleHost: Send + Sync {
    /// Lists every module currently known to the host.
    fn modules(&self) -> Vec<ModuleHandle>;

    /// Installs a new module from `content`, recorded under `location`.
    ///
    /// # Errors
    ///
    /// Fails if `content` is not a well-formed module package.
    fn install(&self, location: &str, content: &mut dyn Read) -> Result<ModuleHandle, HostError>;

    /// Replaces the content of an existing module. Its location is kept.
    ///
    /// # Errors
    ///
    /// Fails if the module is gone or the package is rejected.
    fn update(&self, module: &ModuleHandle, content: &mut dyn Read) -> Result<(), HostError>;

    /// Starts a module.
    ///
    /// # Errors
    ///
    /// Fails if the module cannot be resolved or activated.
    fn start(&self, module: &ModuleHandle) -> Result<(), HostError>;

    /// Recomputes linkage for `modules` and everything that depends on them.
    ///
    /// # Errors
    ///
    /// Fails if the host cannot perform the refresh.
    fn refresh_transitive(&self, modules: &[ModuleHandle]) -> Result<(), HostError>;
}
