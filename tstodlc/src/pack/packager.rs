//! The packaging driver.
//!
//! For each input directory `D` the packager turns every subdirectory `S`
//! into a distribution unit under `<dlc_dir>/<D name>/`, keeps the local
//! index `D/DLCIndex-<D name>.xml` in step, and finally pushes the touched
//! records into the distribution's server index.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::archive::{
    build_content_archive, collect_content_files, find_existing_archive, write_distribution_unit,
    write_unpacked,
};
use super::error::{PackError, PackResult};
use crate::catalog::{CatalogEncoder, FileDescriptor};
use crate::index::{
    first_match, remove_stale_entries, update_entry, update_server_index, AttributeOverrides, Branch,
    ContentStats, FileName, IndexDocument, IndexStore, PackageIdentity, PackageUpdate,
    ServerUpdate, INDEX_ROOT_TAG,
};

/// Default for [`PackOptions::default_priority`].
pub const DEFAULT_PRIORITY: u16 = 1;

/// Options of one packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    /// Attribute values written into every touched record.
    pub overrides: AttributeOverrides,
    /// Create the `InitialPackages` branch if missing.
    pub initial: bool,
    /// Create the `TutorialPackages` branch if missing.
    pub tutorial: bool,
    /// Catalog priority; also forces a rebuild of every unit.
    pub priority: Option<u16>,
    /// Catalog priority when neither `priority` nor the index sets one.
    pub default_priority: u16,
    /// Name units `<S>-r<epoch>.zip` instead of `<S>.zip`.
    pub revision: bool,
    /// Only refresh the local index, build nothing.
    pub index_only: bool,
    /// Write `0` and `1` as plain files into `<dlc_dir>/<S>/`.
    pub nozip: bool,
    /// Revision number of units built by this run.
    pub epoch: u64,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            overrides: AttributeOverrides::default(),
            initial: false,
            tutorial: false,
            priority: None,
            default_priority: DEFAULT_PRIORITY,
            revision: true,
            index_only: false,
            nozip: false,
            epoch: current_epoch(),
        }
    }
}

/// Seconds since the Unix epoch.
pub fn current_epoch() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackEvent {
    /// An input directory is about to be processed.
    InputStarted { input: PathBuf, target: PathBuf },
    /// An input is not a directory and was skipped.
    NotADirectory(PathBuf),
    /// Records of vanished subdirectories were dropped from the local index.
    StaleEntriesRemoved { count: usize },
    /// A unit is up to date.
    Unchanged { name: String },
    /// A subdirectory holds no files.
    Empty { name: String },
    /// A unit was (re)built.
    Packed { name: String, path: PathBuf },
    /// The local index was written.
    LocalIndexWritten(PathBuf),
    /// Outcome of the server index update.
    ServerIndex(ServerUpdate),
}

impl PackEvent {
    /// Whether the event finishes one subdirectory.
    pub fn is_unit(&self) -> bool {
        matches!(
            self,
            PackEvent::Unchanged { .. } | PackEvent::Empty { .. } | PackEvent::Packed { .. }
        )
    }
}

/// Receiver of progress notifications.
pub trait PackProgress {
    /// Called once with the number of subdirectories to process.
    fn begin(&mut self, total: usize);

    /// Called for every event.
    fn event(&mut self, event: &PackEvent);
}

/// Progress receiver that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl PackProgress for NoProgress {
    fn begin(&mut self, _total: usize) {}

    fn event(&mut self, _event: &PackEvent) {}
}

/// What happened to one subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Built into `path`. Stats are absent for unpacked output.
    Packed {
        path: PathBuf,
        stats: Option<ContentStats>,
    },
    /// Existing unit kept.
    Unchanged { path: PathBuf },
    /// No files; nothing written.
    Empty,
}

/// Report for one subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub name: String,
    pub outcome: UnitOutcome,
}

/// Report for one input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport {
    pub input: PathBuf,
    pub target: PathBuf,
    pub units: Vec<UnitReport>,
    pub stale_removed: usize,
    pub local_index: Option<PathBuf>,
    pub server: Option<ServerUpdate>,
}

/// Report for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    pub inputs: Vec<InputReport>,
    /// Inputs that were not directories.
    pub skipped: Vec<PathBuf>,
}

impl PackReport {
    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.inputs
            .iter()
            .flat_map(|i| &i.units)
            .filter(|u| pred(&u.outcome))
            .count()
    }

    /// Number of units built.
    pub fn packed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Packed { .. }))
    }

    /// Number of units left as they were.
    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Unchanged { .. }))
    }

    /// Number of empty subdirectories.
    pub fn empty(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Empty))
    }
}

/// Per-input state shared by the unit steps.
struct InputState {
    doc: IndexDocument,
    branches: Vec<Branch>,
    target: PathBuf,
    target_name: String,
    force: bool,
    revision_matches: bool,
}

/// Runs packaging over a list of input directories.
pub struct Packager {
    options: PackOptions,
}

impl Packager {
    /// Create a packager.
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    /// Options of this packager.
    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Package every input into `dlc_dir`.
    pub fn run(
        &self,
        inputs: &[PathBuf],
        dlc_dir: &Path,
        progress: &mut dyn PackProgress,
    ) -> PackResult<PackReport> {
        let mut report = PackReport::default();

        let total = if self.options.index_only {
            0
        } else {
            inputs
                .iter()
                .filter(|i| i.is_dir())
                .map(|i| subdirectories(i).map(|s| s.len()).unwrap_or(0))
                .sum()
        };
        progress.begin(total);

        for input in inputs {
            if !input.is_dir() {
                warn!(input = %input.display(), "Input is not a directory, skipping");
                progress.event(&PackEvent::NotADirectory(input.clone()));
                report.skipped.push(input.clone());
                continue;
            }
            report.inputs.push(self.pack_input(input, dlc_dir, progress)?);
        }

        info!(
            packed = report.packed(),
            unchanged = report.unchanged(),
            empty = report.empty(),
            "Packaging finished"
        );
        Ok(report)
    }

    fn pack_input(
        &self,
        input: &Path,
        dlc_dir: &Path,
        progress: &mut dyn PackProgress,
    ) -> PackResult<InputReport> {
        let opts = &self.options;
        let input_name = dir_name(input)?;

        let target = if opts.nozip {
            dlc_dir.to_path_buf()
        } else {
            dlc_dir.join(&input_name)
        };
        fs::create_dir_all(&target).map_err(|e| PackError::CreateDirectoryFailed {
            path: target.clone(),
            source: e,
        })?;
        let target_name = dir_name(&target)?;
        progress.event(&PackEvent::InputStarted {
            input: input.to_path_buf(),
            target: target.clone(),
        });

        let index_path = input.join(format!("DLCIndex-{}.xml", target_name));
        let mut force = !index_path.is_file();
        let mut doc = IndexStore::load(&index_path, INDEX_ROOT_TAG).document;

        let revision_matches = doc.revision().unwrap_or(opts.revision) == opts.revision;
        doc.set_revision(opts.revision);

        let mut branches = vec![Branch::Root];
        for (branch, requested) in [(Branch::Initial, opts.initial), (Branch::Tutorial, opts.tutorial)] {
            if doc.has_branch(branch) {
                branches.push(branch);
            } else if requested {
                doc.ensure_branch(branch);
                branches.push(branch);
                force = true;
            }
        }

        let stale_removed = remove_stale_entries(&mut doc, input, &branches);
        if stale_removed > 0 {
            progress.event(&PackEvent::StaleEntriesRemoved {
                count: stale_removed,
            });
        }

        let subdirs = subdirectories(input)?;
        let mut state = InputState {
            doc,
            branches,
            target: target.clone(),
            target_name,
            force,
            revision_matches,
        };

        let mut units = Vec::new();
        if !opts.index_only {
            for (name, path) in &subdirs {
                let outcome = self.pack_unit(&mut state, name, path)?;
                let event = match &outcome {
                    UnitOutcome::Packed { path, .. } => PackEvent::Packed {
                        name: name.clone(),
                        path: path.clone(),
                    },
                    UnitOutcome::Unchanged { .. } => PackEvent::Unchanged { name: name.clone() },
                    UnitOutcome::Empty => PackEvent::Empty { name: name.clone() },
                };
                progress.event(&event);
                units.push(UnitReport {
                    name: name.clone(),
                    outcome,
                });
            }
        }

        let mut report = InputReport {
            input: input.to_path_buf(),
            target,
            units,
            stale_removed,
            local_index: None,
            server: None,
        };

        if opts.nozip {
            return Ok(report);
        }

        IndexStore::save_plain(&index_path, &state.doc)?;
        info!(path = %index_path.display(), "Wrote local index");
        progress.event(&PackEvent::LocalIndexWritten(index_path.clone()));
        report.local_index = Some(index_path);

        let touched: HashSet<PackageIdentity> = subdirs
            .iter()
            .map(|(name, _)| PackageIdentity::archive(input_name.clone(), name.clone()))
            .collect();
        let server = update_server_index(dlc_dir, &state.doc, &touched, &state.branches)?;
        if server == ServerUpdate::NotFound {
            info!("Server index not found, skipping reconciliation");
        }
        progress.event(&PackEvent::ServerIndex(server.clone()));
        report.server = Some(server);

        Ok(report)
    }

    fn pack_unit(&self, state: &mut InputState, name: &str, dir: &Path) -> PackResult<UnitOutcome> {
        let opts = &self.options;
        let existing = if opts.nozip {
            None
        } else {
            find_existing_archive(&state.target, name)
        };

        if let Some(existing) = existing.as_ref().filter(|path| self.is_up_to_date(state, name, dir, path)) {
            debug!(unit = name, archive = %existing.display(), "Unit has not changed");
            let file_name = self.file_name_of(state, existing)?;
            self.record(state, file_name, None);
            return Ok(UnitOutcome::Unchanged {
                path: existing.clone(),
            });
        }

        let files = collect_content_files(dir)?;
        if files.is_empty() {
            warn!(dir = %dir.display(), "No files found, skipping");
            return Ok(UnitOutcome::Empty);
        }

        let content = build_content_archive(dir, &files)?;
        let priority = opts
            .priority
            .or_else(|| state.doc.priority())
            .unwrap_or(opts.default_priority);
        state.doc.set_priority(priority);

        let descriptors: Vec<FileDescriptor> = files.iter().map(|f| f.descriptor()).collect();
        let catalog =
            CatalogEncoder::new(name, priority).encode(&descriptors, crc32fast::hash(&content))?;

        if opts.nozip {
            let out = state.target.join(name);
            write_unpacked(&out, &catalog, &content)?;
            info!(unit = name, path = %out.display(), "Wrote unpacked unit");
            return Ok(UnitOutcome::Packed {
                path: out,
                stats: None,
            });
        }

        let file_name = FileName::archive(
            &state.target_name,
            name,
            opts.revision.then_some(opts.epoch),
        )?;
        let path = state.target.join(file_name.file());
        let size = write_distribution_unit(&path, &catalog, &content)?;
        if let Some(old) = existing.filter(|old| *old != path) {
            fs::remove_file(&old).map_err(|e| PackError::RemoveFailed { path: old, source: e })?;
        }
        info!(unit = name, path = %path.display(), size, "Wrote distribution unit");

        let stats = ContentStats::from_bytes(size, content.len() as u64, crc32fast::hash(&catalog));
        self.record(state, file_name, Some(stats));

        Ok(UnitOutcome::Packed {
            path,
            stats: Some(stats),
        })
    }

    /// Whether the unit at `archive` can be kept as it is.
    ///
    /// Only the subdirectory's own modification time is compared. A unit
    /// whose root record lacks its stats is always rebuilt.
    fn is_up_to_date(&self, state: &InputState, name: &str, dir: &Path, archive: &Path) -> bool {
        if state.force || !state.revision_matches || self.options.priority.is_some() {
            return false;
        }
        let identity = PackageIdentity::archive(state.target_name.clone(), name);
        if first_match(state.doc.root(), &identity).and_then(|r| r.stats).is_none() {
            debug!(unit = name, "No recorded stats, rebuilding");
            return false;
        }
        match (modified(dir), modified(archive)) {
            (Some(dir_time), Some(archive_time)) => dir_time < archive_time,
            _ => false,
        }
    }

    fn file_name_of(&self, state: &InputState, archive: &Path) -> PackResult<FileName> {
        let file = archive
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| PackError::InvalidName(archive.to_path_buf()))?;
        Ok(FileName::from_parts(&state.target_name, file)?)
    }

    /// Update the unit's record in every active branch.
    fn record(&self, state: &mut InputState, file_name: FileName, stats: Option<ContentStats>) {
        let update = PackageUpdate {
            file_name,
            overrides: self.options.overrides.clone(),
            stats,
        };
        for &branch in &state.branches {
            update_entry(&mut state.doc, branch, &update);
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn dir_name(path: &Path) -> PackResult<String> {
    let resolved = if path.file_name().is_some() {
        path.to_path_buf()
    } else {
        path.canonicalize().map_err(|e| PackError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?
    };
    resolved
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PackError::InvalidName(path.to_path_buf()))
}

/// Subdirectories of `dir` with their names, sorted by name.
fn subdirectories(dir: &Path) -> PackResult<Vec<(String, PathBuf)>> {
    let read_err = |e| PackError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_dir() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => subdirs.push((name.to_string(), path.clone())),
            None => warn!(path = %path.display(), "Skipping directory with a non UTF-8 name"),
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{PackageRecord, PACKAGE_TAG};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        total: Option<usize>,
        events: Vec<PackEvent>,
    }

    impl PackProgress for Recorder {
        fn begin(&mut self, total: usize) {
            self.total = Some(total);
        }

        fn event(&mut self, event: &PackEvent) {
            self.events.push(event.clone());
        }
    }

    fn options() -> PackOptions {
        PackOptions {
            epoch: 1_700_000_000,
            ..PackOptions::default()
        }
    }

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("Props");
        fs::create_dir_all(input.join("buildings")).unwrap();
        fs::write(input.join("buildings").join("house.rgb"), vec![7u8; 3000]).unwrap();
        fs::create_dir_all(input.join("empty")).unwrap();
        let dlc = temp.path().join("dist");
        (temp, input, dlc)
    }

    fn local_records(input: &Path) -> Vec<PackageRecord> {
        let loaded = IndexStore::load(&input.join("DLCIndex-Props.xml"), INDEX_ROOT_TAG);
        loaded
            .document
            .root()
            .children_named(PACKAGE_TAG)
            .map(PackageRecord::read)
            .collect()
    }

    #[test]
    fn test_run_packs_and_indexes() {
        let (_temp, input, dlc) = fixture();
        let mut recorder = Recorder::default();

        let report = Packager::new(options())
            .run(&[input.clone()], &dlc, &mut recorder)
            .unwrap();

        assert_eq!(recorder.total, Some(2));
        assert_eq!(report.packed(), 1);
        assert_eq!(report.empty(), 1);
        assert!(dlc.join("Props").join("buildings-r1700000000.zip").is_file());
        assert_eq!(report.inputs[0].server, Some(ServerUpdate::NotFound));

        let records = local_records(&input);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].file_name.as_ref().unwrap().to_string(),
            "Props:buildings-r1700000000.zip"
        );
        assert_eq!(records[0].stats.unwrap().uncompressed_size_kb, 0);
        assert_eq!(records[0].platform.as_deref(), Some("all"));
    }

    #[test]
    fn test_norevision_names_and_priority() {
        let (_temp, input, dlc) = fixture();
        let opts = PackOptions {
            revision: false,
            priority: Some(9),
            ..options()
        };

        Packager::new(opts).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        assert!(dlc.join("Props").join("buildings.zip").is_file());
        let loaded = IndexStore::load(&input.join("DLCIndex-Props.xml"), INDEX_ROOT_TAG);
        assert_eq!(loaded.document.priority(), Some(9));
        assert_eq!(loaded.document.revision(), Some(false));
    }

    #[test]
    fn test_default_priority_used_without_index_priority() {
        let (_temp, input, dlc) = fixture();
        let opts = PackOptions {
            default_priority: 4,
            ..options()
        };

        Packager::new(opts).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        let loaded = IndexStore::load(&input.join("DLCIndex-Props.xml"), INDEX_ROOT_TAG);
        assert_eq!(loaded.document.priority(), Some(4));
    }

    #[test]
    fn test_rebuild_replaces_previous_revision() {
        let (_temp, input, dlc) = fixture();
        Packager::new(options()).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        let second = PackOptions {
            epoch: 1_800_000_000,
            priority: Some(1),
            ..options()
        };
        Packager::new(second).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        assert!(!dlc.join("Props").join("buildings-r1700000000.zip").exists());
        assert!(dlc.join("Props").join("buildings-r1800000000.zip").is_file());
        assert_eq!(local_records(&input).len(), 1);
    }

    #[test]
    fn test_unit_without_recorded_stats_is_rebuilt() {
        let (_temp, input, dlc) = fixture();
        Packager::new(options()).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        let index_path = input.join("DLCIndex-Props.xml");
        let mut loaded = IndexStore::load(&index_path, INDEX_ROOT_TAG);
        loaded
            .document
            .root_mut()
            .retain_children(|child| child.name() != PACKAGE_TAG);
        IndexStore::save_plain(&index_path, &loaded.document).unwrap();

        let archive = dlc.join("Props").join("buildings-r1700000000.zip");
        let later = SystemTime::now() + std::time::Duration::from_secs(3600);
        filetime::set_file_mtime(&archive, filetime::FileTime::from_system_time(later)).unwrap();

        let report = Packager::new(options()).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        assert_eq!(report.packed(), 1);
        let records = local_records(&input);
        assert_eq!(records.len(), 1);
        assert!(records[0].stats.is_some());
    }

    #[test]
    fn test_nozip_writes_plain_files_without_index() {
        let (_temp, input, dlc) = fixture();
        let opts = PackOptions {
            nozip: true,
            ..options()
        };

        let report = Packager::new(opts).run(&[input.clone()], &dlc, &mut NoProgress).unwrap();

        assert!(dlc.join("buildings").join("0").is_file());
        assert!(dlc.join("buildings").join("1").is_file());
        assert!(!input.join("DLCIndex-dist.xml").exists());
        assert_eq!(report.inputs[0].local_index, None);
    }

    #[test]
    fn test_index_only_builds_nothing() {
        let (_temp, input, dlc) = fixture();
        let opts = PackOptions {
            index_only: true,
            initial: true,
            ..options()
        };
        let mut recorder = Recorder::default();

        Packager::new(opts).run(&[input.clone()], &dlc, &mut recorder).unwrap();

        assert_eq!(recorder.total, Some(0));
        assert!(!recorder.events.iter().any(PackEvent::is_unit));
        let loaded = IndexStore::load(&input.join("DLCIndex-Props.xml"), INDEX_ROOT_TAG);
        assert!(loaded.document.has_branch(Branch::Initial));
    }

    #[test]
    fn test_non_directory_input_is_skipped() {
        let (temp, _input, dlc) = fixture();
        let file = temp.path().join("not-a-dir.txt");
        fs::write(&file, b"x").unwrap();
        let mut recorder = Recorder::default();

        let report = Packager::new(options()).run(&[file.clone()], &dlc, &mut recorder).unwrap();

        assert_eq!(report.skipped, vec![file.clone()]);
        assert_eq!(recorder.events, vec![PackEvent::NotADirectory(file)]);
    }
}
