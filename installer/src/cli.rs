//! CLI argument definitions for the hotdeploy command.
//!
//! Kept apart from the entrypoint so parsing can be tested without running
//! any command.

use camino::Utf8PathBuf;
use clap::{ArgGroup, Args, Parser, Subcommand};

/// Environment variable consulted when `--store` is not given.
pub const STORE_ENV: &str = "HOTDEPLOY_STORE";

/// Install or update modules in a module store without restarting it.
#[derive(Parser, Debug)]
#[command(name = "hotdeploy")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install or update modules in a module store without restarting it.\n\n",
    "A module is either a pre-built archive or an exploded directory whose ",
    "META-INF/MANIFEST.MF carries a Bundle-SymbolicName. A module whose ",
    "symbolic name is already installed is updated in place; otherwise it is ",
    "installed and started.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Deploy an exploded module and refresh its dependants:\n",
    "    $ hotdeploy install --dir target/classes --refresh\n\n",
    "  Deploy a pre-built archive into a specific store:\n",
    "    $ hotdeploy install --archive foo-1.0.0.jar --store /srv/modules\n\n",
    "  List stored modules as JSON:\n",
    "    $ hotdeploy list --json",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install a new module or update the existing one with the same name.
    Install(InstallArgs),

    /// List the modules in the store.
    List(ListArgs),
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone, Default)]
#[command(group(ArgGroup::new("source").required(true).args(["dir", "archive"])))]
pub struct InstallArgs {
    /// Exploded module directory containing META-INF/MANIFEST.MF.
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<Utf8PathBuf>,

    /// Pre-built module archive.
    #[arg(short, long, value_name = "FILE")]
    pub archive: Option<Utf8PathBuf>,

    /// Refresh modules that depend on the deployed one.
    #[arg(short, long)]
    pub refresh: bool,

    /// Deflate entries of archives assembled from directories.
    #[arg(long)]
    pub deflate: bool,

    /// Bytes of an archive inspected to find its manifest.
    #[arg(long, value_name = "BYTES")]
    pub peek_limit: Option<usize>,

    /// Module store directory [default: platform-specific].
    #[arg(short, long, value_name = "DIR", env = STORE_ENV)]
    pub store: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,

    /// Module store directory [default: platform-specific].
    #[arg(short, long, value_name = "DIR", env = STORE_ENV)]
    pub store: Option<Utf8PathBuf>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
