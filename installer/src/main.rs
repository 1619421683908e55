//! hotdeploy CLI entrypoint.
//!
//! Installs or updates modules in a filesystem module store and lists what
//! the store holds.

use clap::Parser;
use hotdeploy_installer::cli::Cli;
use hotdeploy_installer::dirs::SystemBaseDirs;
use hotdeploy_installer::error::Result;
use hotdeploy_installer::output::write_stderr_line;
use hotdeploy_installer::run::run;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemBaseDirs, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn std::io::Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
