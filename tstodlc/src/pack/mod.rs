//! Packaging of content directories into distribution units.
//!
//! # Example
//!
//! ```ignore
//! use tstodlc::pack::{NoProgress, PackOptions, Packager};
//!
//! let packager = Packager::new(PackOptions::default());
//! let report = packager.run(&["mods/Props".into()], "dist".as_ref(), &mut NoProgress)?;
//! println!("{} units packed", report.packed());
//! ```

mod archive;
mod error;
mod packager;

pub use archive::{
    build_content_archive, collect_content_files, find_existing_archive, read_catalog_blob,
    write_distribution_unit, write_unpacked, ContentFile,
};
pub use error::{PackError, PackResult};
pub use packager::{
    current_epoch, InputReport, NoProgress, PackEvent, PackOptions, PackProgress, PackReport,
    Packager, UnitOutcome, UnitReport, DEFAULT_PRIORITY,
};
