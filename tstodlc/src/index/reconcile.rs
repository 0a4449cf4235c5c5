//! Propagation of freshly packaged records into the server index.
//!
//! The local index already reflects the current run. For every package the
//! run touched, the server branch loses all of its records with the same
//! identity and gains one copy of the local record at the front.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::document::{Branch, Element, IndexDocument, INDEX_ROOT_TAG};
use super::error::IndexResult;
use super::identity::PackageIdentity;
use super::local::matching_positions;
use super::master::{locate_server_index, DLC_SUBDIR};
use super::record::PackageRecord;
use super::resolve::{resolve, AttributeOverrides};
use super::store::IndexStore;

/// One record written into a server branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledPackage {
    pub branch: Branch,
    pub identity: PackageIdentity,
    /// Number of server records with the same identity that were dropped.
    pub replaced: usize,
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Written records, in processing order.
    pub packages: Vec<ReconciledPackage>,
    /// Requested branches missing from either document.
    pub skipped_branches: Vec<Branch>,
}

impl ReconcileReport {
    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Outcome of [`update_server_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUpdate {
    /// No usable server index; no file was touched.
    NotFound,
    /// The server index at `path` was reconciled and rewritten.
    Updated { path: PathBuf, report: ReconcileReport },
}

/// Merge the touched records of `local` into `server`.
///
/// Branches are processed in the given order and skipped unless present in
/// both documents. Selected local records are visited last to first, so the
/// repeated prepends leave them in local order at the front of the server
/// branch, and the first local record of a duplicated identity wins.
pub fn reconcile(
    local: &IndexDocument,
    server: &mut IndexDocument,
    touched: &HashSet<PackageIdentity>,
    branches: &[Branch],
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for &branch in branches {
        let (Some(local_branch), Some(server_branch)) = (local.branch(branch), server.branch_mut(branch))
        else {
            debug!(%branch, "Branch not present in both indices, skipping");
            report.skipped_branches.push(branch);
            continue;
        };

        let selected: Vec<(PackageIdentity, &Element)> = local_branch
            .children()
            .iter()
            .filter_map(|child| {
                PackageRecord::identity_of(child)
                    .filter(|identity| touched.contains(identity))
                    .map(|identity| (identity, child))
            })
            .collect();

        for (identity, local_element) in selected.into_iter().rev() {
            let positions = matching_positions(server_branch, &identity);
            let own = positions
                .first()
                .map(|&pos| PackageRecord::read(&server_branch.children()[pos]));
            for &pos in positions.iter().rev() {
                server_branch.remove_child(pos);
            }

            let local_record = PackageRecord::read(local_element);
            let Some(file_name) = local_record.file_name.clone() else {
                continue;
            };
            let mut resolved = resolve(
                &AttributeOverrides::from_record(&local_record),
                local_record.stats,
                file_name,
                own.as_ref(),
                Some(&local_record),
            );
            // A local ignore flag always replaces the server's.
            resolved.ignore = local_record.ignore.or(resolved.ignore);

            let mut element = local_element.clone();
            resolved.write_into(&mut element);
            server_branch.insert_child(0, element);

            debug!(package = %identity, %branch, replaced = positions.len(), "Reconciled package");
            report.packages.push(ReconciledPackage {
                branch,
                identity,
                replaced: positions.len(),
            });
        }
    }

    report
}

/// Reconcile the server index of a distribution with `local`.
///
/// The server index is found through the master pointer in
/// `<distribution_root>/dlc`. When the pointer or the index cannot be used,
/// nothing is written and [`ServerUpdate::NotFound`] is returned; the
/// server index is never replaced by an empty document.
pub fn update_server_index(
    distribution_root: &Path,
    local: &IndexDocument,
    touched: &HashSet<PackageIdentity>,
    branches: &[Branch],
) -> IndexResult<ServerUpdate> {
    let Some(path) = locate_server_index(&distribution_root.join(DLC_SUBDIR)) else {
        return Ok(ServerUpdate::NotFound);
    };

    let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
    if !loaded.is_parsed() {
        warn!(path = %path.display(), source = ?loaded.source, "Server index not usable, leaving it untouched");
        return Ok(ServerUpdate::NotFound);
    }

    let mut server = loaded.document;
    let report = reconcile(local, &mut server, touched, branches);
    IndexStore::save(&path, &server)?;

    info!(path = %path.display(), packages = report.packages.len(), "Updated server index");
    Ok(ServerUpdate::Updated { path, report })
}
