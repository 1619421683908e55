//! Per-symbolic-name mutual exclusion.
//!
//! Lookup and the following install or update must not interleave with
//! another request for the same module, otherwise both could observe "not
//! installed" and install twice. Requests for different names proceed in
//! parallel.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// A table of symbolic names currently being deployed.
#[derive(Debug, Default)]
pub struct NameLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl NameLocks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `name` is free, then holds it until the guard drops.
    pub fn lock(&self, name: &str) -> NameGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(name) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(name.to_owned());
        NameGuard {
            locks: self,
            name: name.to_owned(),
        }
    }
}

/// Releases its name when dropped.
#[derive(Debug)]
pub struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
        self.locks.released.notify_all();
    }
}
