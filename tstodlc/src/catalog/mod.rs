//! Catalog blobs for content archives.
//!
//! Every distributable unit pairs a content archive (`1`) with a catalog
//! blob (`0`) that lists the archive's files, their sizes and priorities,
//! and protects itself with a CRC-32. The game's loader reads the catalog to
//! decide which files to take from the archive.
//!
//! - [`CatalogEncoder`] writes blobs.
//! - [`CatalogReader`] decodes and verifies them.

mod encoder;
mod error;
mod reader;

pub use encoder::{
    extension_of, CatalogEncoder, FileDescriptor, ARCHIVE_FLAG, ARCHIVE_HEADER, CATALOG_FILE_NAME,
    CONTENT_ARCHIVE_NAME, MAX_STRING_LEN, SIGNATURE,
};
pub use error::{CatalogError, CatalogResult};
pub use reader::{Catalog, CatalogEntry, CatalogReader};
