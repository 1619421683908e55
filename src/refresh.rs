//! Triggering the host's transitive dependency refresh.

use crate::host::{HostError, ModuleHandle, ModuleHost};
use log::debug;

/// Asks the host to relink `module` and whatever depends on it.
///
/// Only the one changed module is named; the host decides which other
/// modules need relinking (added or removed exports, newly satisfiable
/// optional dependencies). Refreshing an already consistent graph is a
/// no-op from this side.
///
/// # Errors
///
/// Returns the host's [`HostError`] unchanged.
pub fn refresh_module(host: &dyn ModuleHost, module: &ModuleHandle) -> Result<(), HostError> {
    debug!("refreshing module {} and its dependants", module.id());
    host.refresh_transitive(std::slice::from_ref(module))
}
