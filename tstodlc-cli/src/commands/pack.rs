//! The `pack` command.

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use tstodlc::config::{validate_min_version, ConfigFile};
use tstodlc::index::AttributeOverrides;
use tstodlc::pack::{PackOptions, PackReport, Packager, DEFAULT_PRIORITY};

use crate::error::CliError;
use crate::output::{ConsoleOutput, Output, ProgressOutput};

/// Arguments of `tstodlc pack`.
#[derive(Debug, Args)]
pub struct PackArgs {
    /// Content directories followed by the DLC directory
    #[arg(value_name = "DIR", required = true, num_args = 2..)]
    pub dirs: Vec<PathBuf>,

    /// Platform written into every package record (all, ios, android)
    #[arg(long)]
    pub platform: Option<String>,

    /// Mark packages to be installed unpacked
    #[arg(long)]
    pub unzip: bool,

    /// Minimum game version, e.g. 4.69.0
    #[arg(long, value_name = "VERSION")]
    pub min_version: Option<String>,

    /// Device tier written into every package record
    #[arg(long)]
    pub tier: Option<String>,

    /// Language written into every package record
    #[arg(long)]
    pub language: Option<String>,

    /// Also list packages under InitialPackages
    #[arg(long)]
    pub initial: bool,

    /// Also list packages under TutorialPackages
    #[arg(long)]
    pub tutorial: bool,

    /// Catalog priority; rebuilds every package
    #[arg(short, long)]
    pub priority: Option<u16>,

    /// Name packages without the -r<epoch> revision suffix
    #[arg(long)]
    pub norevision: bool,

    /// Only refresh the local index
    #[arg(short, long)]
    pub index_only: bool,

    /// Write the catalog and content archive as plain files
    #[arg(short, long)]
    pub nozip: bool,
}

impl PackArgs {
    /// Merge the arguments with configured defaults.
    pub fn options(&self, config: &ConfigFile) -> Result<PackOptions, CliError> {
        let defaults = &config.package;
        let min_version = self
            .min_version
            .clone()
            .or_else(|| defaults.min_version.clone());
        if let Some(version) = &min_version {
            validate_min_version(version).map_err(|e| {
                CliError::Usage(format!("Invalid --min-version '{}': {}", version, e))
            })?;
        }

        Ok(PackOptions {
            overrides: AttributeOverrides {
                platform: self.platform.clone().or_else(|| defaults.platform.clone()),
                unzip: self.unzip.then_some(true),
                min_version,
                tier: self.tier.clone().or_else(|| defaults.tier.clone()),
                language: self.language.clone().or_else(|| defaults.language.clone()),
            },
            initial: self.initial,
            tutorial: self.tutorial,
            priority: self.priority,
            default_priority: defaults.priority.unwrap_or(DEFAULT_PRIORITY),
            revision: !self.norevision,
            index_only: self.index_only,
            nozip: self.nozip,
            ..PackOptions::default()
        })
    }

    /// Input directories and the DLC directory.
    fn split_dirs(&self) -> Result<(&[PathBuf], &PathBuf), CliError> {
        match self.dirs.split_last() {
            Some((dlc_dir, inputs)) if !inputs.is_empty() => Ok((inputs, dlc_dir)),
            _ => Err(CliError::Usage(
                "Expected at least one input directory and a DLC directory".to_string(),
            )),
        }
    }
}

/// Run `tstodlc pack`.
pub fn run(args: PackArgs, config: &ConfigFile) -> Result<(), CliError> {
    let options = args.options(config)?;
    let (inputs, dlc_dir) = args.split_dirs()?;
    info!(
        inputs = inputs.len(),
        dlc_dir = %dlc_dir.display(),
        epoch = options.epoch,
        "Starting packaging run"
    );

    let mut progress = ProgressOutput::new();
    let result = Packager::new(options).run(inputs, dlc_dir, &mut progress);
    progress.finish();

    print_summary(&ConsoleOutput::new(), &result?);
    Ok(())
}

fn print_summary(out: &dyn Output, report: &PackReport) {
    out.newline();
    out.success(&format!(
        "{} packed, {} unchanged, {} empty",
        report.packed(),
        report.unchanged(),
        report.empty()
    ));
    for skipped in &report.skipped {
        out.warning(&format!("{} skipped: not a directory", skipped.display()));
    }
}
