//! Attribute inheritance for package records.
//!
//! When a record is written, each field is taken from the first source that
//! has it. The sources are the caller's explicit value, the record's own
//! previous value in the branch being written (`own`), the matching record of
//! the root branch (`root`), and a hardcoded default. Fields differ in which
//! of `own` and `root` wins and in whether the caller may supply them at all:
//!
//! | Field | explicit | then | default |
//! |---|---|---|---|
//! | platform, unzip, minVersion, tier, language | yes | own, root | `all`/`false`/`4.69.0` |
//! | content stats | yes | own, root | none |
//! | ignore | no | own, root | `false` |
//! | xml, type, indexFileSig, version, localDir | no | root, own | see [`record`](super::record) |
//!
//! The file name is always explicit.

use super::identity::FileName;
use super::record::{
    ContentStats, PackageRecord, ALL, DEFAULT_INDEX_FILE_SIG, DEFAULT_LOCAL_DIR,
    DEFAULT_MIN_VERSION, DEFAULT_VERSION,
};

/// Values supplied by the caller for one packaging run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeOverrides {
    pub platform: Option<String>,
    pub unzip: Option<bool>,
    pub min_version: Option<String>,
    pub tier: Option<String>,
    pub language: Option<String>,
}

impl AttributeOverrides {
    /// Overrides equal to every explicit field of `record`.
    pub fn from_record(record: &PackageRecord) -> Self {
        Self {
            platform: record.platform.clone(),
            unzip: record.unzip,
            min_version: record.min_version.clone(),
            tier: record.tier.clone(),
            language: record.language.clone(),
        }
    }
}

/// Which previous record is consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precedence {
    OwnFirst,
    RootFirst,
}

/// Inputs shared by every field lookup.
struct Sources<'a> {
    own: Option<&'a PackageRecord>,
    root: Option<&'a PackageRecord>,
}

impl<'a> Sources<'a> {
    fn pick<T: Clone + 'a>(
        &self,
        precedence: Precedence,
        explicit: Option<&T>,
        field: impl Fn(&'a PackageRecord) -> Option<&'a T>,
    ) -> Option<T> {
        let own = self.own.and_then(&field);
        let root = self.root.and_then(&field);
        let (first, second) = match precedence {
            Precedence::OwnFirst => (own, root),
            Precedence::RootFirst => (root, own),
        };
        explicit.or(first).or(second).cloned()
    }
}

/// Resolve every field of a record about to be written.
///
/// `stats` are the freshly computed content stats, if this run produced the
/// archive. `own` is the record's previous state in the branch being
/// written; `root` is the matching record in the root branch.
pub fn resolve(
    explicit: &AttributeOverrides,
    stats: Option<ContentStats>,
    file_name: FileName,
    own: Option<&PackageRecord>,
    root: Option<&PackageRecord>,
) -> PackageRecord {
    use Precedence::{OwnFirst, RootFirst};

    let src = Sources { own, root };
    let text = |value: Option<String>, default: &str| value.unwrap_or_else(|| default.to_string());

    PackageRecord {
        platform: Some(text(
            src.pick(OwnFirst, explicit.platform.as_ref(), |r| r.platform.as_ref()),
            ALL,
        )),
        unzip: Some(
            src.pick(OwnFirst, explicit.unzip.as_ref(), |r| r.unzip.as_ref())
                .unwrap_or(false),
        ),
        min_version: Some(text(
            src.pick(OwnFirst, explicit.min_version.as_ref(), |r| {
                r.min_version.as_ref()
            }),
            DEFAULT_MIN_VERSION,
        )),
        tier: Some(text(
            src.pick(OwnFirst, explicit.tier.as_ref(), |r| r.tier.as_ref()),
            ALL,
        )),
        xml: Some(text(src.pick(RootFirst, None, |r| r.xml.as_ref()), "")),
        kind: Some(text(src.pick(RootFirst, None, |r| r.kind.as_ref()), "")),
        ignore: Some(
            src.pick(OwnFirst, None, |r| r.ignore.as_ref())
                .unwrap_or(false),
        ),
        local_dir: Some(text(
            src.pick(RootFirst, None, |r| r.local_dir.as_ref()),
            DEFAULT_LOCAL_DIR,
        )),
        stats: src.pick(OwnFirst, stats.as_ref(), |r| r.stats.as_ref()),
        index_file_sig: Some(text(
            src.pick(RootFirst, None, |r| r.index_file_sig.as_ref()),
            DEFAULT_INDEX_FILE_SIG,
        )),
        version: Some(text(
            src.pick(RootFirst, None, |r| r.version.as_ref()),
            DEFAULT_VERSION,
        )),
        file_name: Some(file_name),
        language: Some(text(
            src.pick(OwnFirst, explicit.language.as_ref(), |r| r.language.as_ref()),
            ALL,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> FileName {
        FileName::parse("Props:buildings-r2.zip").unwrap()
    }

    fn record(tag: &str) -> PackageRecord {
        PackageRecord {
            platform: Some(format!("{tag}-platform")),
            unzip: Some(true),
            min_version: Some(format!("{tag}-min")),
            tier: Some(format!("{tag}-tier")),
            xml: Some(format!("{tag}-xml")),
            kind: Some(format!("{tag}-type")),
            ignore: Some(true),
            local_dir: Some(format!("{tag}-dir")),
            stats: Some(ContentStats {
                file_size_kb: tag.len() as u64,
                uncompressed_size_kb: 1,
                index_crc: 1,
            }),
            index_file_sig: Some(format!("{tag}-sig")),
            version: Some(format!("{tag}-version")),
            file_name: Some(FileName::parse("Props:buildings-r1.zip").unwrap()),
            language: Some(format!("{tag}-lang")),
        }
    }

    #[test]
    fn test_defaults_when_nothing_known() {
        let resolved = resolve(&AttributeOverrides::default(), None, name(), None, None);
        assert_eq!(resolved.platform.as_deref(), Some("all"));
        assert_eq!(resolved.unzip, Some(false));
        assert_eq!(resolved.min_version.as_deref(), Some("4.69.0"));
        assert_eq!(resolved.tier.as_deref(), Some("all"));
        assert_eq!(resolved.xml.as_deref(), Some(""));
        assert_eq!(resolved.kind.as_deref(), Some(""));
        assert_eq!(resolved.ignore, Some(false));
        assert_eq!(resolved.local_dir.as_deref(), Some("dlc"));
        assert_eq!(resolved.stats, None);
        assert_eq!(
            resolved.index_file_sig.as_deref(),
            Some("You should patch the APK/IPA to bypass this!")
        );
        assert_eq!(resolved.version.as_deref(), Some("1"));
        assert_eq!(resolved.language.as_deref(), Some("all"));
        assert_eq!(resolved.file_name, Some(name()));
    }

    #[test]
    fn test_explicit_values_win() {
        let explicit = AttributeOverrides {
            platform: Some("ios".to_string()),
            unzip: Some(false),
            min_version: Some("5.0.0".to_string()),
            tier: Some("7".to_string()),
            language: Some("pt".to_string()),
        };
        let fresh = ContentStats::from_bytes(9000, 9000, 9);
        let own = record("own");
        let root = record("root");
        let resolved = resolve(&explicit, Some(fresh), name(), Some(&own), Some(&root));

        assert_eq!(resolved.platform.as_deref(), Some("ios"));
        assert_eq!(resolved.unzip, Some(false));
        assert_eq!(resolved.min_version.as_deref(), Some("5.0.0"));
        assert_eq!(resolved.tier.as_deref(), Some("7"));
        assert_eq!(resolved.language.as_deref(), Some("pt"));
        assert_eq!(resolved.stats, Some(fresh));
    }

    #[test]
    fn test_own_first_fields_prefer_own() {
        let own = record("own");
        let root = record("root");
        let resolved = resolve(
            &AttributeOverrides::default(),
            None,
            name(),
            Some(&own),
            Some(&root),
        );
        assert_eq!(resolved.platform.as_deref(), Some("own-platform"));
        assert_eq!(resolved.min_version.as_deref(), Some("own-min"));
        assert_eq!(resolved.tier.as_deref(), Some("own-tier"));
        assert_eq!(resolved.language.as_deref(), Some("own-lang"));
        assert_eq!(resolved.stats, own.stats);
        assert_eq!(resolved.ignore, Some(true));
    }

    #[test]
    fn test_root_first_fields_prefer_root() {
        let own = record("own");
        let root = record("root");
        let resolved = resolve(
            &AttributeOverrides::default(),
            None,
            name(),
            Some(&own),
            Some(&root),
        );
        assert_eq!(resolved.xml.as_deref(), Some("root-xml"));
        assert_eq!(resolved.kind.as_deref(), Some("root-type"));
        assert_eq!(resolved.index_file_sig.as_deref(), Some("root-sig"));
        assert_eq!(resolved.version.as_deref(), Some("root-version"));
        assert_eq!(resolved.local_dir.as_deref(), Some("root-dir"));
    }

    #[test]
    fn test_falls_back_to_other_source() {
        let own = record("own");
        let root = PackageRecord::default();
        let resolved = resolve(
            &AttributeOverrides::default(),
            None,
            name(),
            Some(&own),
            Some(&root),
        );
        // Root has nothing, so root-first fields fall back to own.
        assert_eq!(resolved.xml.as_deref(), Some("own-xml"));
        assert_eq!(resolved.version.as_deref(), Some("own-version"));

        let root = record("root");
        let resolved = resolve(&AttributeOverrides::default(), None, name(), None, Some(&root));
        assert_eq!(resolved.platform.as_deref(), Some("root-platform"));
        assert_eq!(resolved.stats, root.stats);
    }

    #[test]
    fn test_file_name_always_explicit() {
        let own = record("own");
        let resolved = resolve(&AttributeOverrides::default(), None, name(), Some(&own), None);
        assert_eq!(resolved.file_name.unwrap().to_string(), "Props:buildings-r2.zip");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let own = record("own");
        let once = resolve(&AttributeOverrides::default(), None, name(), Some(&own), None);
        let twice = resolve(
            &AttributeOverrides::from_record(&once),
            once.stats,
            name(),
            Some(&once),
            Some(&once),
        );
        assert_eq!(once, twice);
    }
}
