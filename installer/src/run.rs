//! Command execution for the hotdeploy CLI.
//!
//! [`run`] takes every side-effecting dependency as a parameter so the
//! commands can be driven from tests against a temporary store.

use crate::cli::{Cli, Command, InstallArgs, ListArgs};
use crate::dirs::{BaseDirs, default_store_dir};
use crate::error::{InstallerError, Result};
use crate::output::{format_human, format_json, success_message, write_stderr_line};
use crate::store::FsModuleStore;
use camino::{Utf8Path, Utf8PathBuf};
use hotdeploy::archive::Compression;
use hotdeploy::peek::DEFAULT_PEEK_LIMIT;
use hotdeploy::{DeployConfig, InstallCoordinator, InstallRequest, UploadPart, handle_request};
use log::debug;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;

/// Runs the parsed command.
///
/// # Errors
///
/// Returns [`InstallerError`] when the store cannot be opened, the
/// deployment fails, or output cannot be written.
pub fn run(
    cli: &Cli,
    dirs: &dyn BaseDirs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    match &cli.command {
        Command::Install(args) => run_install(args, dirs, stderr),
        Command::List(args) => run_list(args, dirs, stdout),
    }
}

/// Picks the explicit store directory or falls back to the platform one.
///
/// # Errors
///
/// Returns [`InstallerError::StoreDirUnavailable`] when neither is known.
pub fn resolve_store_dir(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    explicit
        .map(Utf8Path::to_path_buf)
        .or_else(|| default_store_dir(dirs))
        .ok_or(InstallerError::StoreDirUnavailable)
}

fn run_install(args: &InstallArgs, dirs: &dyn BaseDirs, stderr: &mut dyn Write) -> Result<()> {
    let root = resolve_store_dir(args.store.as_deref(), dirs)?;
    let store = FsModuleStore::open(&root)?;
    let coordinator = InstallCoordinator::with_config(Arc::new(store), deploy_config(args));

    let request = install_request(args)?;
    let outcome = handle_request(&coordinator, request);
    match outcome.handle {
        Some(handle) if outcome.success => {
            if !args.quiet {
                write_stderr_line(stderr, success_message(&handle, args.refresh));
            }
            Ok(())
        }
        _ => Err(InstallerError::DeployFailed {
            message: outcome
                .message
                .unwrap_or_else(|| "unknown failure".to_owned()),
        }),
    }
}

fn deploy_config(args: &InstallArgs) -> DeployConfig {
    DeployConfig {
        peek_limit: args.peek_limit.unwrap_or(DEFAULT_PEEK_LIMIT),
        compression: if args.deflate {
            Compression::Deflated
        } else {
            Compression::Stored
        },
    }
}

fn install_request(args: &InstallArgs) -> Result<InstallRequest<'static>> {
    let parts = match &args.archive {
        Some(path) => {
            let file = File::open(path).map_err(|source| InstallerError::OpenArchive {
                path: path.clone(),
                source,
            })?;
            let part = match path.file_name() {
                Some(name) => UploadPart::named(name, file),
                None => UploadPart::new(file),
            };
            Some(vec![part])
        }
        None => None,
    };
    debug!("deploying {:?}", args.archive.as_ref().or(args.dir.as_ref()));
    Ok(InstallRequest {
        dir: args.dir.as_ref().map(ToString::to_string),
        refresh_packages: args.refresh,
        parts,
    })
}

fn run_list(args: &ListArgs, dirs: &dyn BaseDirs, stdout: &mut dyn Write) -> Result<()> {
    let root = resolve_store_dir(args.store.as_deref(), dirs)?;
    let store = FsModuleStore::open(&root)?;
    let records = store.records()?;
    let rendered = if args.json {
        format_json(&records)
    } else {
        format_human(&records)
    };
    writeln!(stdout, "{rendered}").map_err(|source| InstallerError::WriteFailed { source })
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
