//! Install-or-update orchestration.
//!
//! A deployment validates the source, resolves any existing module with the
//! same symbolic name, streams the archive into the host's install or
//! update primitive, starts fresh installs, and optionally triggers a
//! transitive refresh. Lookup through refresh runs under a per-name lock.

use crate::archive::ArchiveBuilder;
use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::host::{HostError, ModuleHandle, ModuleHost};
use crate::locks::NameLocks;
use crate::manifest::ModuleIdentity;
use crate::refresh::refresh_module;
use crate::registry::find_by_identity;
use crate::source::{DirectoryTree, ModuleSource, UploadStream};
use crate::validator::{validate_directory, validate_upload};
use log::{debug, info};
use std::io::Read;
use std::path;
use std::sync::Arc;

/// What one install-or-update call acts on.
#[derive(Debug, Clone)]
pub struct InstallTarget<'a> {
    /// Identity of the module being deployed.
    pub identity: &'a ModuleIdentity,
    /// The module to update, or `None` for a fresh install.
    pub existing: Option<ModuleHandle>,
    /// Location recorded by the host for a fresh install.
    pub location: String,
    /// Whether to refresh dependants afterwards.
    pub refresh: bool,
}

/// Drives deployments against a single host.
pub struct InstallCoordinator {
    host: Arc<dyn ModuleHost>,
    config: DeployConfig,
    locks: NameLocks,
}

impl InstallCoordinator {
    /// Creates a coordinator with default tuning.
    #[must_use]
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self::with_config(host, DeployConfig::default())
    }

    /// Creates a coordinator with explicit tuning.
    #[must_use]
    pub fn with_config(host: Arc<dyn ModuleHost>, config: DeployConfig) -> Self {
        Self {
            host,
            config,
            locks: NameLocks::new(),
        }
    }

    /// Returns the host this coordinator deploys into.
    #[must_use]
    pub fn host(&self) -> &dyn ModuleHost {
        self.host.as_ref()
    }

    /// Returns the active tuning.
    #[must_use]
    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Deploys either kind of source.
    ///
    /// # Errors
    ///
    /// See [`Self::deploy_upload`] and [`Self::deploy_directory`].
    pub fn deploy(&self, source: ModuleSource<'_>, refresh: bool) -> Result<ModuleHandle> {
        match source {
            ModuleSource::Upload(upload) => self.deploy_upload(upload, refresh),
            ModuleSource::Directory(tree) => self.deploy_directory(&tree, refresh),
        }
    }

    /// Deploys an uploaded archive, streaming the original bytes to the
    /// host after validation.
    ///
    /// # Errors
    ///
    /// Returns the validation error for a bad upload, or
    /// [`DeployError::InstallationFailed`] if the host rejects it.
    pub fn deploy_upload(
        &self,
        mut upload: UploadStream<'_>,
        refresh: bool,
    ) -> Result<ModuleHandle> {
        let validated = validate_upload(&mut upload)?;
        let identity = &validated.identity;
        let _guard = self.locks.lock(identity.symbolic_name());
        let target = InstallTarget {
            identity,
            existing: find_by_identity(self.host(), identity),
            location: upload_location(identity),
            refresh,
        };
        self.install_or_update(target, &mut upload)
    }

    /// Deploys an exploded module by assembling it into a temporary archive.
    ///
    /// The temporary archive is deleted before this returns, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns the validation error for a bad directory,
    /// [`DeployError::ArchiveBuild`] if assembly fails, or
    /// [`DeployError::InstallationFailed`] if the host rejects the module.
    pub fn deploy_directory(&self, tree: &DirectoryTree, refresh: bool) -> Result<ModuleHandle> {
        let validated = validate_directory(tree)?;
        let identity = &validated.identity;
        let _guard = self.locks.lock(identity.symbolic_name());
        let existing = find_by_identity(self.host(), identity);
        let mut archive = ArchiveBuilder::new(self.config.compression)
            .build_temp(tree.root(), &validated.manifest)?;
        debug!("streaming {} to the host", archive.path().display());
        let location = path::absolute(tree.root())?.display().to_string();
        let target = InstallTarget {
            identity,
            existing,
            location,
            refresh,
        };
        self.install_or_update(target, &mut archive)
    }

    /// Updates `target.existing` when present, otherwise installs and
    /// starts a new module; then refreshes it if requested.
    ///
    /// # Errors
    ///
    /// Any host rejection is returned as [`DeployError::InstallationFailed`].
    pub fn install_or_update(
        &self,
        target: InstallTarget<'_>,
        content: &mut dyn Read,
    ) -> Result<ModuleHandle> {
        let name = target.identity.symbolic_name();
        let module = match target.existing {
            Some(existing) => {
                info!("updating module {} ({})", target.identity, existing.id());
                self.host
                    .update(&existing, content)
                    .map_err(installation_failed(name))?;
                existing
            }
            None => {
                info!(
                    "installing module {} from {}",
                    target.identity, target.location
                );
                let module = self
                    .host
                    .install(&target.location, content)
                    .map_err(installation_failed(name))?;
                self.host
                    .start(&module)
                    .map_err(installation_failed(name))?;
                module
            }
        };
        if target.refresh {
            debug!("refreshing dependants of {}", module.id());
            refresh_module(self.host(), &module).map_err(installation_failed(name))?;
        }
        Ok(module)
    }
}

impl std::fmt::Debug for InstallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallCoordinator")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

/// Returns the location string the host records for an uploaded module.
#[must_use]
pub fn upload_location(identity: &ModuleIdentity) -> String {
    match identity.version() {
        Some(version) => format!("inputstream:{}-{version}.jar", identity.symbolic_name()),
        None => format!("inputstream:{}.jar", identity.symbolic_name()),
    }
}

fn installation_failed(name: &str) -> impl Fn(HostError) -> DeployError + '_ {
    move |source| DeployError::InstallationFailed {
        symbolic_name: name.to_owned(),
        source,
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
