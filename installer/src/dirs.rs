//! Directory resolution abstraction for platform-specific paths.
//!
//! The CLI never asks the platform directly; it goes through [`BaseDirs`]
//! so tests can substitute fixed locations.

use camino::Utf8PathBuf;
use directories_next::ProjectDirs;
use std::path::PathBuf;

const STORE_DIRNAME: &str = "store";

/// Base directories consulted by the CLI.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Returns the per-user data directory for hotdeploy, if one exists.
    fn hotdeploy_data_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the platform conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn hotdeploy_data_dir(&self) -> Option<PathBuf> {
        ProjectDirs::from("", "", "hotdeploy").map(|dirs| dirs.data_dir().to_path_buf())
    }
}

/// Returns the default module store location, `<data_dir>/store`.
///
/// `None` when no data directory is available or its path is not UTF-8.
#[must_use]
pub fn default_store_dir(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    let data_dir = dirs.hotdeploy_data_dir()?;
    Utf8PathBuf::from_path_buf(data_dir.join(STORE_DIRNAME)).ok()
}
