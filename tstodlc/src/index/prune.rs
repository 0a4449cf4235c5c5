//! Removal of server records whose distribution unit is gone.

use std::path::Path;

use tracing::{info, warn};

use super::document::{Branch, IndexDocument, INDEX_ROOT_TAG, PACKAGE_TAG};
use super::error::IndexResult;
use super::identity::FileName;
use super::master::{locate_server_index, DLC_SUBDIR};
use super::record::PackageRecord;
use super::store::IndexStore;

/// Records removed by [`prune`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<(Branch, FileName)>,
}

impl PruneReport {
    /// Whether at least one record was removed.
    pub fn removed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Drop every record whose file does not exist under `distribution_root`.
///
/// The literal file name is checked, revision suffix included. Records
/// without a usable file name are kept.
pub fn prune(server: &mut IndexDocument, distribution_root: &Path, branches: &[Branch]) -> PruneReport {
    let mut report = PruneReport::default();

    for &branch in branches {
        let Some(element) = server.branch_mut(branch) else {
            continue;
        };

        element.retain_children(|child| {
            if child.name() != PACKAGE_TAG {
                return true;
            }
            let Some(name) = PackageRecord::file_name_of(child) else {
                return true;
            };
            if distribution_root.join(name.relative_path()).exists() {
                return true;
            }
            info!(package = %name, %branch, "Package file not found, removing record");
            report.removed.push((branch, name));
            false
        });
    }

    report
}

/// Prune the server index of a distribution and write it back.
///
/// The index is rewritten even when nothing was removed. Returns `None`
/// without writing when no usable server index is found.
pub fn remove_dead_packages(distribution_root: &Path, branches: &[Branch]) -> IndexResult<Option<PruneReport>> {
    let Some(path) = locate_server_index(&distribution_root.join(DLC_SUBDIR)) else {
        return Ok(None);
    };

    let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
    if !loaded.is_parsed() {
        warn!(path = %path.display(), source = ?loaded.source, "Server index not usable, leaving it untouched");
        return Ok(None);
    }

    let mut server = loaded.document;
    let report = prune(&mut server, distribution_root, branches);
    IndexStore::save(&path, &server)?;

    info!(path = %path.display(), removed = report.removed.len(), "Cleaned server index");
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn server() -> IndexDocument {
        IndexDocument::parse(
            r#"<DlcIndex>
                 <Package><FileName val="Props:here-r1.zip"/></Package>
                 <Package><FileName val="Props:gone-r1.zip"/></Package>
                 <Package><Version val="1"/></Package>
                 <TutorialPackages>
                   <Package><FileName val="Props:gone-r1.zip"/></Package>
                 </TutorialPackages>
               </DlcIndex>"#,
        )
        .unwrap()
    }

    fn distribution() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("Props")).unwrap();
        fs::write(temp.path().join("Props").join("here-r1.zip"), b"zip").unwrap();
        temp
    }

    #[test]
    fn test_removes_exactly_the_missing_records() {
        let temp = distribution();
        let mut doc = server();

        let report = prune(&mut doc, temp.path(), &Branch::ALL);

        assert!(report.removed());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.removed[0].0, Branch::Root);
        assert_eq!(report.removed[1].0, Branch::Tutorial);
        let remaining: Vec<_> = doc
            .root()
            .children_named("Package")
            .map(PackageRecord::read)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(doc.has_branch(Branch::Tutorial));
    }

    #[test]
    fn test_revision_is_part_of_the_checked_path() {
        let temp = distribution();
        let mut doc = IndexDocument::parse(
            r#"<DlcIndex><Package><FileName val="Props:here-r2.zip"/></Package></DlcIndex>"#,
        )
        .unwrap();
        assert!(prune(&mut doc, temp.path(), &[Branch::Root]).removed());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let temp = distribution();
        let mut doc = server();
        assert!(prune(&mut doc, temp.path(), &Branch::ALL).removed());
        assert!(!prune(&mut doc, temp.path(), &Branch::ALL).removed());
    }

    #[test]
    fn test_remove_dead_packages_without_pointer() {
        let temp = distribution();
        assert_eq!(remove_dead_packages(temp.path(), &Branch::ALL).unwrap(), None);
    }
}
