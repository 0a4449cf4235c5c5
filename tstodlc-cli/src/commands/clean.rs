//! The `clean` command: drop server records whose package file is gone.

use std::path::PathBuf;

use clap::Args;
use tstodlc::index::{remove_dead_packages, Branch};

use crate::error::CliError;
use crate::output::{ConsoleOutput, Output};

/// Arguments of `tstodlc clean`.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// DLC directory holding dlc/DLCIndex.zip
    #[arg(value_name = "DLC_DIR")]
    pub dlc_dir: PathBuf,
}

/// Run `tstodlc clean`.
pub fn run(args: CleanArgs) -> Result<(), CliError> {
    let out = ConsoleOutput::new();

    match remove_dead_packages(&args.dlc_dir, &Branch::ALL)? {
        None => out.warning(&format!(
            "No server index found below {}",
            args.dlc_dir.display()
        )),
        Some(report) if !report.removed() => out.success("No dead packages"),
        Some(report) => {
            out.header("Removed packages");
            for (branch, file_name) in &report.removed {
                out.indented(&format!("{} ({})", file_name, branch));
            }
            out.newline();
            out.success(&format!("{} records removed", report.removed.len()));
        }
    }
    Ok(())
}
