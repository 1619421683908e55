//! A filesystem-backed module host.
//!
//! Layout under the store root:
//!
//! - `registry.json` - the [`StoreIndex`]
//! - `modules/<id>.jar` - the current archive of each module
//! - `.lock` - advisory lock file guarding the index
//!
//! Nothing is cached between calls. Every primitive takes an exclusive
//! lock on `.lock`, reloads the index, and saves it before unlocking, so
//! several processes (or handles) sharing one root never lose each
//! other's writes or hand out the same identifier twice.

use crate::store_index::{ModuleRecord, ModuleState, StoreError, StoreIndex};
use camino::{Utf8Path, Utf8PathBuf};
use hotdeploy::manifest::{MANIFEST_PATH, ModuleIdentity, ModuleManifest};
use hotdeploy::{HostError, ModuleHandle, ModuleHost, ModuleId};
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use tempfile::NamedTempFile;
use zip::ZipArchive;

/// File name of the store index.
pub const INDEX_FILE: &str = "registry.json";
/// Directory holding module archives.
pub const MODULES_DIR: &str = "modules";
/// File name of the advisory lock guarding the index.
pub const LOCK_FILE: &str = ".lock";
/// Manifest header naming required modules.
pub const REQUIRE_BUNDLE_HEADER: &str = "Require-Bundle";

/// A [`ModuleHost`] that keeps modules as archives in a directory.
#[derive(Debug)]
pub struct FsModuleStore {
    root: Utf8PathBuf,
}

/// Holds a lock on the store lock file until dropped.
#[derive(Debug)]
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("failed to unlock module store: {err}");
        }
    }
}

/// A received archive, checked and waiting to be moved into place.
struct StagedModule {
    file: NamedTempFile,
    identity: ModuleIdentity,
    requires: Vec<String>,
}

impl FsModuleStore {
    /// Opens the store at `root`, creating its directories if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directories cannot be created or the
    /// index cannot be read.
    pub fn open(root: &Utf8Path) -> Result<Self, StoreError> {
        let modules_dir = root.join(MODULES_DIR);
        fs::create_dir_all(&modules_dir).map_err(|source| StoreError::CreateDirectory {
            path: modules_dir.into_std_path_buf(),
            source,
        })?;
        let store = Self {
            root: root.to_path_buf(),
        };
        debug!(
            "opened module store at {root} with {} modules",
            store.records()?.len()
        );
        Ok(store)
    }

    /// Returns a snapshot of every record, read under a shared lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be locked or its index
    /// cannot be read.
    pub fn records(&self) -> Result<Vec<ModuleRecord>, StoreError> {
        let _lock = self.lock(Access::Shared)?;
        Ok(self.load()?.records().to_vec())
    }

    /// Returns where the archive of `id` is kept.
    #[must_use]
    pub fn archive_path(&self, id: ModuleId) -> Utf8PathBuf {
        self.root
            .join(MODULES_DIR)
            .join(format!("{}.jar", id.get()))
    }

    fn index_path(&self) -> Utf8PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn load(&self) -> Result<StoreIndex, StoreError> {
        StoreIndex::load(self.index_path().as_std_path())
    }

    fn lock(&self, access: Access) -> Result<StoreLock, StoreError> {
        let path = self.root.join(LOCK_FILE);
        let lock_error = |source| StoreError::Lock {
            path: path.clone().into_std_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;
        let locked = match access {
            Access::Shared => FileExt::lock_shared(&file),
            Access::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(lock_error)?;
        Ok(StoreLock { file })
    }

    /// Runs `change` against the freshly loaded index under the exclusive
    /// lock, saving the index only if `change` succeeds.
    fn modify<T>(
        &self,
        change: impl FnOnce(&mut StoreIndex) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let _lock = self.lock(Access::Exclusive).map_err(store_failure)?;
        let mut index = self.load().map_err(store_failure)?;
        let value = change(&mut index)?;
        self.save(&index)?;
        Ok(value)
    }

    fn save(&self, index: &StoreIndex) -> Result<(), HostError> {
        index.save(self.index_path().as_std_path()).map_err(store_failure)
    }

    /// Copies `content` into the store and checks it is a module package.
    fn stage(&self, content: &mut dyn Read) -> Result<StagedModule, HostError> {
        let mut file = NamedTempFile::new_in(self.root.join(MODULES_DIR))?;
        io::copy(content, &mut file)?;
        let manifest = read_manifest(&file)?;
        let identity = manifest
            .identity()
            .ok_or_else(|| HostError::rejected("module manifest has no Bundle-SymbolicName"))?;
        let requires = manifest
            .main_attributes()
            .get(REQUIRE_BUNDLE_HEADER)
            .map(parse_require_bundle)
            .unwrap_or_default();
        Ok(StagedModule {
            file,
            identity,
            requires,
        })
    }

    fn place(&self, staged: NamedTempFile, id: ModuleId) -> Result<(), HostError> {
        staged
            .persist(self.archive_path(id))
            .map_err(|err| HostError::Io(err.error))?;
        Ok(())
    }
}

impl ModuleHost for FsModuleStore {
    fn modules(&self) -> Vec<ModuleHandle> {
        let records = match self.records() {
            Ok(records) => records,
            Err(err) => {
                warn!("cannot list stored modules: {err}");
                return Vec::new();
            }
        };
        records
            .into_iter()
            .map(|record| ModuleHandle::new(record.id, Some(record.symbolic_name), record.location))
            .collect()
    }

    fn install(&self, location: &str, content: &mut dyn Read) -> Result<ModuleHandle, HostError> {
        let staged = self.stage(content)?;
        let identity = staged.identity;
        let name = identity.symbolic_name().to_owned();
        let id = self.modify(|index| {
            let id = index.allocate_id();
            self.place(staged.file, id)?;
            index.push(ModuleRecord {
                id,
                symbolic_name: name.clone(),
                version: identity.version().map(str::to_owned),
                location: location.to_owned(),
                state: ModuleState::Installed,
                requires: staged.requires,
                refresh_count: 0,
            });
            Ok(id)
        })?;
        info!("stored module {identity} as {id}");
        Ok(ModuleHandle::new(id, Some(name), location))
    }

    fn update(&self, module: &ModuleHandle, content: &mut dyn Read) -> Result<(), HostError> {
        let staged = self.stage(content)?;
        let identity = staged.identity;
        self.modify(|index| {
            let record = index
                .get_mut(module.id())
                .ok_or(HostError::UnknownModule { id: module.id() })?;
            self.place(staged.file, module.id())?;
            record.symbolic_name = identity.symbolic_name().to_owned();
            record.version = identity.version().map(str::to_owned);
            record.requires = staged.requires;
            Ok(())
        })?;
        info!("replaced archive of {} with {identity}", module.id());
        Ok(())
    }

    fn start(&self, module: &ModuleHandle) -> Result<(), HostError> {
        self.modify(|index| {
            let record = index
                .get_mut(module.id())
                .ok_or(HostError::UnknownModule { id: module.id() })?;
            record.state = ModuleState::Active;
            Ok(())
        })
    }

    fn refresh_transitive(&self, modules: &[ModuleHandle]) -> Result<(), HostError> {
        let roots: Vec<ModuleId> = modules.iter().map(ModuleHandle::id).collect();
        self.modify(|index| {
            let closure = index.dependency_closure(&roots);
            for id in &closure {
                if let Some(record) = index.get_mut(*id) {
                    record.refresh_count = record.refresh_count.saturating_add(1);
                }
            }
            debug!("refreshed {} modules", closure.len());
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Shared,
    Exclusive,
}

/// Splits a `Require-Bundle` value into symbolic names.
///
/// Clauses are separated by commas outside quotes; attributes and
/// directives after `;` are dropped.
#[must_use]
pub fn parse_require_bundle(value: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in value.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ',' if !quoted => clauses.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    clauses.push(current);
    clauses
        .iter()
        .filter_map(|clause| clause.split(';').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_manifest(file: &NamedTempFile) -> Result<ModuleManifest, HostError> {
    let mut archive = ZipArchive::new(file.reopen()?)
        .map_err(|err| HostError::rejected(format!("not a well-formed module package: {err}")))?;
    let mut entry = archive
        .by_name(MANIFEST_PATH)
        .map_err(|_| HostError::rejected(format!("module package has no {MANIFEST_PATH}")))?;
    let mut raw = Vec::new();
    entry.read_to_end(&mut raw)?;
    ModuleManifest::parse(&raw)
        .map_err(|err| HostError::rejected(format!("invalid module manifest: {err}")))
}

fn store_failure(err: StoreError) -> HostError {
    HostError::Io(io::Error::other(err))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
