//! Output formatting for the hotdeploy CLI.
//!
//! Progress goes to stderr through [`write_stderr_line`]; listings go to
//! stdout in human-readable or JSON form.

use crate::store_index::{ModuleRecord, ModuleState};
use hotdeploy::ModuleHandle;
use serde::Serialize;
use std::io::Write;

/// Writes one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output.
    }
}

/// Describes a successful deployment.
#[must_use]
pub fn success_message(handle: &ModuleHandle, refreshed: bool) -> String {
    let name = handle.symbolic_name().unwrap_or("module");
    let refresh_note = if refreshed {
        " and refreshed its dependants"
    } else {
        ""
    };
    format!(
        "Deployed {name} as {} from {}{refresh_note}.",
        handle.id(),
        handle.location()
    )
}

/// Formats stored modules for human-readable output.
///
/// # Examples
///
/// ```
/// use hotdeploy_installer::output::format_human;
///
/// let output = format_human(&[]);
/// assert!(output.contains("No modules installed"));
/// ```
#[must_use]
pub fn format_human(records: &[ModuleRecord]) -> String {
    if records.is_empty() {
        return String::from(
            "No modules installed.\n\nRun `hotdeploy install --dir <DIR>` to deploy one.",
        );
    }

    let mut output = String::from("Installed modules:\n");
    for record in records {
        let version = record.version.as_deref().unwrap_or("-");
        let state = match record.state {
            ModuleState::Installed => "installed",
            ModuleState::Active => "active",
        };
        output.push_str(&format!(
            "  {:>4}  {} {version} [{state}]\n",
            record.id.to_string(),
            record.symbolic_name
        ));
        if !record.requires.is_empty() {
            output.push_str(&format!(
                "        requires: {}\n",
                record.requires.join(", ")
            ));
        }
    }
    output
}

/// Formats stored modules as JSON.
///
/// # Examples
///
/// ```
/// use hotdeploy_installer::output::format_json;
///
/// let json = format_json(&[]);
/// assert!(json.contains("\"modules\""));
/// ```
#[must_use]
pub fn format_json(records: &[ModuleRecord]) -> String {
    let listing = ModuleListing { modules: records };
    serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "{}".to_owned())
}

/// JSON-serialisable listing of stored modules.
#[derive(Debug, Serialize)]
pub struct ModuleListing<'a> {
    /// Every stored module.
    pub modules: &'a [ModuleRecord],
}
