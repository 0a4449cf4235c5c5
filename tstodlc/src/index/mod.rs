//! Package index documents and their maintenance.
//!
//! An index is an XML document listing distributable packages. Two of them
//! matter during a packaging run:
//!
//! - the **local index** `DLCIndex-<name>.xml` kept beside the content
//!   directories, updated by every run ([`update_entry`],
//!   [`remove_stale_entries`]);
//! - the **server index**, a compressed index located through the master
//!   pointer of the distribution ([`locate_server_index`]) and kept in sync
//!   with the local one ([`update_server_index`], [`remove_dead_packages`]).
//!
//! Records are matched by [`PackageIdentity`], the revision-insensitive form
//! of their `FileName`. Attribute values missing from a record are filled in
//! by the [`resolve`] table.

mod document;
mod error;
mod identity;
mod local;
mod master;
mod prune;
mod reconcile;
mod record;
mod resolve;
mod store;

pub use document::{Branch, Element, IndexDocument, INDEX_ROOT_TAG, PACKAGE_TAG, PRIORITY_ATTR, REVISION_ATTR};
pub use error::{IndexError, IndexResult};
pub use identity::{split_revision, FileName, PackageIdentity, ARCHIVE_EXTENSION, SEPARATOR_MARKER};
pub use local::{remove_stale_entries, update_entry, PackageUpdate};
pub(crate) use local::first_match;
pub use master::{locate_server_index, DLC_SUBDIR, MASTER_INDEX_FILE, MASTER_ROOT_TAG};
pub use prune::{prune, remove_dead_packages, PruneReport};
pub use reconcile::{reconcile, update_server_index, ReconcileReport, ReconciledPackage, ServerUpdate};
pub use record::{
    ContentStats, PackageRecord, ALL, DEFAULT_INDEX_FILE_SIG, DEFAULT_LOCAL_DIR, DEFAULT_MIN_VERSION,
    DEFAULT_VERSION,
};
pub use resolve::{resolve, AttributeOverrides};
pub use store::{IndexSource, IndexStore, LoadedIndex};
