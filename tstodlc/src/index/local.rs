//! Maintenance of the local index kept beside the content directories.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::document::{Branch, Element, IndexDocument};
use super::identity::{FileName, PackageIdentity};
use super::record::{ContentStats, PackageRecord};
use super::resolve::{resolve, AttributeOverrides};

/// What one packaging run knows about a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpdate {
    /// File name of the current distribution unit, revision included.
    pub file_name: FileName,
    /// Caller-supplied attribute values.
    pub overrides: AttributeOverrides,
    /// Fresh content stats, when the unit was rebuilt.
    pub stats: Option<ContentStats>,
}

impl PackageUpdate {
    /// Revision-insensitive identity of the updated package.
    pub fn identity(&self) -> PackageIdentity {
        self.file_name.identity()
    }
}

/// Positions of `Package` children of `branch` with the given identity.
pub(crate) fn matching_positions(branch: &Element, identity: &PackageIdentity) -> Vec<usize> {
    branch
        .children()
        .iter()
        .enumerate()
        .filter(|(_, child)| PackageRecord::identity_of(child).as_ref() == Some(identity))
        .map(|(pos, _)| pos)
        .collect()
}

/// First record in `branch` with the given identity.
pub(crate) fn first_match(branch: &Element, identity: &PackageIdentity) -> Option<PackageRecord> {
    matching_positions(branch, identity)
        .first()
        .map(|&pos| PackageRecord::read(&branch.children()[pos]))
}

/// Add or refresh the record for `update` in one branch of `doc`.
///
/// The branch is created if missing. With no existing record a new
/// `Package` element is inserted first; otherwise the first match is
/// updated in place and any further matches are dropped.
pub fn update_entry(doc: &mut IndexDocument, branch: Branch, update: &PackageUpdate) {
    let identity = update.identity();

    let root = first_match(doc.root(), &identity);
    doc.ensure_branch(branch);
    let Some(element) = doc.branch_mut(branch) else {
        return;
    };

    let positions = matching_positions(element, &identity);
    let own = positions
        .first()
        .map(|&pos| PackageRecord::read(&element.children()[pos]));

    let resolved = resolve(
        &update.overrides,
        update.stats,
        update.file_name.clone(),
        own.as_ref(),
        root.as_ref(),
    );

    match positions.split_first() {
        None => {
            debug!(package = %identity, %branch, "Adding package entry");
            element.insert_child(0, resolved.to_element());
        }
        Some((&first, rest)) => {
            debug!(package = %identity, %branch, "Updating package entry");
            resolved.write_into(&mut element.children_mut()[first]);
            // Remove from the back so earlier positions stay valid.
            for &pos in rest.iter().rev() {
                element.remove_child(pos);
            }
        }
    }
}

/// Drop records whose content subdirectory is gone or empty.
///
/// A record named `Props:buildings-r12.zip` stays only while
/// `content_dir/buildings` is a non-empty directory. Records without a
/// usable file name are left alone. Returns the number removed.
pub fn remove_stale_entries(doc: &mut IndexDocument, content_dir: &Path, branches: &[Branch]) -> usize {
    let mut removed = 0;

    for &branch in branches {
        let Some(element) = doc.branch_mut(branch) else {
            continue;
        };

        let before = element.children().len();
        element.retain_children(|child| match PackageRecord::identity_of(child) {
            Some(identity) => {
                let keep = has_content(&content_dir.join(identity.stem()));
                if !keep {
                    info!(package = %identity, %branch, "Removing stale package entry");
                }
                keep
            }
            None => true,
        });
        removed += before - element.children().len();
    }

    removed
}

/// Whether `dir` is a directory with at least one entry.
fn has_content(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::INDEX_ROOT_TAG;
    use tempfile::TempDir;

    fn update(name: &str, stats: Option<ContentStats>) -> PackageUpdate {
        PackageUpdate {
            file_name: FileName::parse(name).unwrap(),
            overrides: AttributeOverrides::default(),
            stats,
        }
    }

    fn packages(doc: &IndexDocument, branch: Branch) -> Vec<PackageRecord> {
        doc.branch(branch)
            .unwrap()
            .children_named("Package")
            .map(PackageRecord::read)
            .collect()
    }

    #[test]
    fn test_new_entry_is_inserted_first() {
        let mut doc = IndexDocument::empty(INDEX_ROOT_TAG);
        doc.root_mut().push_child(
            Element::new("Package").with_child(Element::new("FileName").with_attr("val", "P:old.zip")),
        );

        update_entry(&mut doc, Branch::Root, &update("P:new-r1.zip", None));

        let records = packages(&doc, Branch::Root);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name.as_ref().unwrap().to_string(), "P:new-r1.zip");
        assert_eq!(records[0].platform.as_deref(), Some("all"));
    }

    #[test]
    fn test_existing_entry_updated_in_place_and_deduplicated() {
        let mut doc = IndexDocument::parse(
            r#"<DlcIndex>
                 <Package platform="ios" custom="x"><FileName val="P:a-r1.zip"/></Package>
                 <Package><FileName val="P:b.zip"/></Package>
                 <Package><FileName val="P:a-r0.zip"/></Package>
               </DlcIndex>"#,
        )
        .unwrap();
        let stats = ContentStats::from_bytes(5000, 7000, 42);

        update_entry(&mut doc, Branch::Root, &update("P:a-r2.zip", Some(stats)));

        let children = doc.root().children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].attr("custom"), Some("x"));
        let record = PackageRecord::read(&children[0]);
        assert_eq!(record.file_name.unwrap().to_string(), "P:a-r2.zip");
        assert_eq!(record.platform.as_deref(), Some("ios"));
        assert_eq!(record.stats, Some(stats));
    }

    #[test]
    fn test_update_twice_yields_one_record() {
        let mut doc = IndexDocument::empty(INDEX_ROOT_TAG);
        let u = update("P:a-r2.zip", Some(ContentStats::from_bytes(1000, 2000, 3)));
        update_entry(&mut doc, Branch::Root, &u);
        let once = doc.clone();
        update_entry(&mut doc, Branch::Root, &u);
        assert_eq!(doc, once);
        assert_eq!(packages(&doc, Branch::Root).len(), 1);
    }

    #[test]
    fn test_unchanged_update_keeps_previous_stats() {
        let mut doc = IndexDocument::empty(INDEX_ROOT_TAG);
        let stats = ContentStats::from_bytes(9000, 9000, 9);
        update_entry(&mut doc, Branch::Root, &update("P:a-r1.zip", Some(stats)));
        update_entry(&mut doc, Branch::Root, &update("P:a-r1.zip", None));

        assert_eq!(packages(&doc, Branch::Root)[0].stats, Some(stats));
    }

    #[test]
    fn test_branch_entry_inherits_from_root() {
        let mut doc = IndexDocument::parse(
            r#"<DlcIndex>
                 <Package xml="root.xml" platform="android"><FileName val="P:a-r1.zip"/><Version val="4"/></Package>
               </DlcIndex>"#,
        )
        .unwrap();

        update_entry(&mut doc, Branch::Initial, &update("P:a-r1.zip", None));

        assert!(doc.has_branch(Branch::Initial));
        let record = &packages(&doc, Branch::Initial)[0];
        assert_eq!(record.xml.as_deref(), Some("root.xml"));
        assert_eq!(record.version.as_deref(), Some("4"));
        assert_eq!(record.platform.as_deref(), Some("android"));
        // The branch element itself is not a package of the root branch.
        assert_eq!(packages(&doc, Branch::Root).len(), 1);
    }

    #[test]
    fn test_remove_stale_entries() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("full")).unwrap();
        fs::write(temp.path().join("full").join("a.png"), b"x").unwrap();
        fs::create_dir(temp.path().join("empty")).unwrap();

        let mut doc = IndexDocument::parse(
            r#"<DlcIndex>
                 <Package><FileName val="P:full-r1.zip"/></Package>
                 <Package><FileName val="P:empty-r1.zip"/></Package>
                 <Package><FileName val="P:gone.zip"/></Package>
                 <Package><Version val="1"/></Package>
                 <InitialPackages>
                   <Package><FileName val="P:gone-r3.zip"/></Package>
                 </InitialPackages>
               </DlcIndex>"#,
        )
        .unwrap();

        let removed = remove_stale_entries(&mut doc, temp.path(), &Branch::ALL);
        assert_eq!(removed, 3);

        let root = packages(&doc, Branch::Root);
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].file_name.as_ref().unwrap().to_string(), "P:full-r1.zip");
        assert!(root[1].file_name.is_none());
        assert!(packages(&doc, Branch::Initial).is_empty());
        assert!(doc.has_branch(Branch::Initial));
    }
}
