//! The persisted index of a module store.
//!
//! Stored as pretty-printed JSON at `<store>/registry.json`. A missing file
//! is an empty store; a malformed one is an error, since silently resetting
//! it would orphan every stored archive.

use hotdeploy::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Creating a store directory failed.
    #[error("failed to create store directory {}: {source}", .path.display())]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the index failed.
    #[error("failed to read store index {}: {source}", .path.display())]
    ReadIndex {
        /// Index file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The index is not valid JSON for this schema.
    #[error("store index {} is malformed: {source}", .path.display())]
    ParseIndex {
        /// Index file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialising the index failed.
    #[error("failed to serialise store index: {source}")]
    SerializeIndex {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },

    /// Opening or locking the store lock file failed.
    #[error("failed to lock store {}: {source}", .path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the index or an archive failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle state of a stored module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Installed but not started.
    Installed,
    /// Started.
    Active,
}

/// One module in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Store-assigned identifier.
    pub id: ModuleId,
    /// Symbolic name from the module's manifest.
    pub symbolic_name: String,
    /// Version from the module's manifest.
    pub version: Option<String>,
    /// Location string given at install time.
    pub location: String,
    /// Lifecycle state.
    pub state: ModuleState,
    /// Symbolic names listed in `Require-Bundle`.
    #[serde(default)]
    pub requires: Vec<String>,
    /// How many times a refresh has relinked this module.
    #[serde(default)]
    pub refresh_count: u64,
}

/// All records plus the next identifier to hand out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreIndex {
    next_id: u64,
    modules: Vec<ModuleRecord>,
}

impl StoreIndex {
    /// Loads the index at `path`, or an empty one if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadIndex`] or [`StoreError::ParseIndex`].
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| StoreError::ReadIndex {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::ParseIndex {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the index to `path`, replacing any previous file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialisation or any write fails.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| StoreError::SerializeIndex { source })?;
        let write_error = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut staged = NamedTempFile::new_in(parent).map_err(write_error)?;
        staged.write_all(json.as_bytes()).map_err(write_error)?;
        staged
            .persist(path)
            .map_err(|err| write_error(err.error))?;
        Ok(())
    }

    /// Reserves the next identifier. Identifiers start at 1.
    pub fn allocate_id(&mut self) -> ModuleId {
        let id = ModuleId::new(self.next_id.max(1));
        self.next_id = id.get() + 1;
        id
    }

    /// Returns every record in install order.
    #[must_use]
    pub fn records(&self) -> &[ModuleRecord] {
        &self.modules
    }

    /// Returns the record for `id`.
    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.modules.iter().find(|record| record.id == id)
    }

    /// Returns the record for `id` mutably.
    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut ModuleRecord> {
        self.modules.iter_mut().find(|record| record.id == id)
    }

    /// Appends a record.
    pub fn push(&mut self, record: ModuleRecord) {
        self.modules.push(record);
    }

    /// Returns `roots` plus every module that transitively requires one of
    /// them, in ascending id order.
    #[must_use]
    pub fn dependency_closure(&self, roots: &[ModuleId]) -> Vec<ModuleId> {
        let mut closure: BTreeSet<ModuleId> = roots
            .iter()
            .copied()
            .filter(|id| self.get(*id).is_some())
            .collect();
        let mut pending: VecDeque<ModuleId> = closure.iter().copied().collect();
        while let Some(id) = pending.pop_front() {
            let Some(name) = self.get(id).map(|record| record.symbolic_name.as_str()) else {
                continue;
            };
            for dependant in &self.modules {
                let requires_name = dependant.requires.iter().any(|r| r == name);
                if requires_name && closure.insert(dependant.id) {
                    pending.push_back(dependant.id);
                }
            }
        }
        closure.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn record(id: u64, name: &str, requires: &[&str]) -> ModuleRecord {
        ModuleRecord {
            id: ModuleId::new(id),
            symbolic_name: name.to_owned(),
            version: None,
            location: format!("loc-{id}"),
            state: ModuleState::Installed,
            requires: requires.iter().map(|r| (*r).to_owned()).collect(),
            refresh_count: 0,
        }
    }

    fn index(records: Vec<ModuleRecord>) -> StoreIndex {
        let mut index = StoreIndex::default();
        for record in records {
            index.allocate_id();
            index.push(record);
        }
        index
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().expect("temp dir");
        let loaded = StoreIndex::load(&dir.path().join("registry.json")).expect("load");
        assert_eq!(loaded, StoreIndex::default());
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("registry.json");
        let saved = index(vec![record(1, "a", &[]), record(2, "b", &["a"])]);
        saved.save(&path).expect("save");
        assert_eq!(StoreIndex::load(&path).expect("load"), saved);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("registry.json");
        fs::write(&path, "{not json").expect("write");
        let err = StoreIndex::load(&path).expect_err("malformed");
        assert!(matches!(err, StoreError::ParseIndex { .. }));
    }

    #[test]
    fn identifiers_start_at_one_and_increase() {
        let mut index = StoreIndex::default();
        assert_eq!(index.allocate_id(), ModuleId::new(1));
        assert_eq!(index.allocate_id(), ModuleId::new(2));
    }

    #[rstest]
    #[case::leaf(4, vec![4])]
    #[case::one_dependant(3, vec![3, 4])]
    #[case::chain(2, vec![2, 3, 4])]
    #[case::root(1, vec![1, 2, 3, 4])]
    #[case::unknown(99, vec![])]
    fn closure_follows_require_bundle(#[case] root: u64, #[case] expected: Vec<u64>) {
        let index = index(vec![
            record(1, "core", &[]),
            record(2, "api", &["core"]),
            record(3, "impl", &["api"]),
            record(4, "extra", &["core", "impl"]),
            record(5, "unrelated", &[]),
        ]);
        let closure: Vec<u64> = index
            .dependency_closure(&[ModuleId::new(root)])
            .into_iter()
            .map(ModuleId::get)
            .collect();
        assert_eq!(closure, expected);
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let index = index(vec![record(1, "a", &["b"]), record(2, "b", &["a"])]);
        assert_eq!(
            index.dependency_closure(&[ModuleId::new(1)]),
            vec![ModuleId::new(1), ModuleId::new(2)]
        );
    }
}
