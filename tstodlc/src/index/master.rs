//! Resolution of the server index through the master pointer.
//!
//! The distribution's `dlc` directory holds an externally managed
//! `DLCIndex.zip` whose `IndexFile` element names the real server index as
//! `<ignored>:<relative path>`. This module only reads the pointer.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::identity::SEPARATOR_MARKER;
use super::store::IndexStore;

/// File name of the master pointer container.
pub const MASTER_INDEX_FILE: &str = "DLCIndex.zip";

/// Root tag of the master pointer document.
pub const MASTER_ROOT_TAG: &str = "MasterDLCIndex";

const INDEX_FILE_TAG: &str = "IndexFile";
const INDEX_ATTR: &str = "index";

/// Directory under the distribution root holding the master pointer.
pub const DLC_SUBDIR: &str = "dlc";

/// Locate the server index named by the master pointer in `dlc_root`.
///
/// Returns `None` when the pointer is missing, is not a master document, or
/// does not carry an `IndexFile@index` value. The returned path is not
/// checked for existence.
pub fn locate_server_index(dlc_root: &Path) -> Option<PathBuf> {
    let pointer = dlc_root.join(MASTER_INDEX_FILE);
    let loaded = IndexStore::load(&pointer, MASTER_ROOT_TAG);
    if !loaded.is_parsed() {
        debug!(path = %pointer.display(), "No usable master pointer");
        return None;
    }

    let value = loaded
        .document
        .root()
        .child_attr(INDEX_FILE_TAG, INDEX_ATTR)?;
    let relative = value
        .rsplit(SEPARATOR_MARKER)
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let path = dlc_root.join(relative);
    debug!(index = %path.display(), "Resolved server index");
    Some(path)
}
