//! The `inspect` command: decode and print a catalog blob.

use std::path::PathBuf;

use clap::Args;
use tstodlc::catalog::{Catalog, CatalogReader};
use tstodlc::pack::read_catalog_blob;

use crate::error::CliError;
use crate::output::{ConsoleOutput, Output};

/// Arguments of `tstodlc inspect`.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Catalog file `0` or a distribution zip
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Run `tstodlc inspect`.
pub fn run(args: InspectArgs) -> Result<(), CliError> {
    let blob = read_catalog_blob(&args.file)?;
    let catalog = CatalogReader::parse(&blob)?;
    print_catalog(&ConsoleOutput::new(), &catalog);
    Ok(())
}

fn print_catalog(out: &dyn Output, catalog: &Catalog) {
    out.header("Catalog");
    out.println(&format!("Archive:      {}", catalog.archive_path));
    out.println(&format!("Content CRC:  {:08x}", catalog.content_crc));
    out.println(&format!("Blob size:    {} bytes", catalog.total_size));
    out.println(&format!("Checksum:     {:08x}", catalog.checksum));
    out.newline();

    out.subheader(&format!(
        "Files ({}, {} bytes)",
        catalog.entries.len(),
        catalog.content_size()
    ));
    let width = catalog
        .entries
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(0);
    for entry in &catalog.entries {
        out.indented(&format!(
            "{:<width$}  {:>10}  priority {}",
            entry.name,
            entry.size,
            entry.priority,
            width = width
        ));
    }
}
