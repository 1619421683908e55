//! Operator CLI library for hotdeploy.
//!
//! Wires the `hotdeploy` deployment pipeline to a filesystem-backed module
//! store so modules can be installed, updated and listed from a shell.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Error types with recovery hints
//! - [`output`] - Human-readable and JSON output formatting
//! - [`run`] - Command execution
//! - [`store`] - Filesystem module store implementing `ModuleHost`
//! - [`store_index`] - Persistent JSON index of stored modules

pub mod cli;
pub mod dirs;
pub mod error;
pub mod output;
pub mod run;
pub mod store;
pub mod store_index;
