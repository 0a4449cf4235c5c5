//! Typed view of `Package` elements.
//!
//! A [`PackageRecord`] is read from an element, resolved, and written back
//! into the same element. Writing only touches the attributes and
//! sub-elements listed here; anything else on the element survives.

use tracing::warn;

use super::document::{Element, PACKAGE_TAG};
use super::identity::{FileName, PackageIdentity};

/// Default `minVersion`.
pub const DEFAULT_MIN_VERSION: &str = "4.69.0";

/// Default `platform`, `tier` and `language`.
pub const ALL: &str = "all";

/// Default `indexFileSig`.
pub const DEFAULT_INDEX_FILE_SIG: &str = "You should patch the APK/IPA to bypass this!";

/// Default `version`.
pub const DEFAULT_VERSION: &str = "1";

/// Default `localDir` name.
pub const DEFAULT_LOCAL_DIR: &str = "dlc";

const ATTR_PLATFORM: &str = "platform";
const ATTR_UNZIP: &str = "unzip";
const ATTR_MIN_VERSION: &str = "minVersion";
const ATTR_TIER: &str = "tier";
const ATTR_XML: &str = "xml";
const ATTR_TYPE: &str = "type";
const ATTR_IGNORE: &str = "ignore";

const EL_LOCAL_DIR: &str = "LocalDir";
const EL_FILE_SIZE: &str = "FileSize";
const EL_UNCOMPRESSED_FILE_SIZE: &str = "UncompressedFileSize";
const EL_INDEX_FILE_CRC: &str = "IndexFileCRC";
const EL_INDEX_FILE_SIG: &str = "IndexFileSig";
const EL_VERSION: &str = "Version";
const EL_FILE_NAME: &str = "FileName";
const EL_LANGUAGE: &str = "Language";

const VAL: &str = "val";
const NAME: &str = "name";

/// Content-dependent fields, always computed and stored together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    /// Distribution archive size in KB (bytes / 1000).
    pub file_size_kb: u64,

    /// Content archive size in KB (bytes / 1000).
    pub uncompressed_size_kb: u64,

    /// CRC-32 of the catalog blob.
    pub index_crc: u32,
}

impl ContentStats {
    /// Build stats from byte sizes.
    pub fn from_bytes(file_size: u64, uncompressed_size: u64, index_crc: u32) -> Self {
        Self {
            file_size_kb: file_size / 1000,
            uncompressed_size_kb: uncompressed_size / 1000,
            index_crc,
        }
    }

    fn read(element: &Element) -> Option<Self> {
        let file_size = element.child_attr(EL_FILE_SIZE, VAL)?.trim().parse().ok()?;
        let uncompressed = element
            .child_attr(EL_UNCOMPRESSED_FILE_SIZE, VAL)?
            .trim()
            .parse()
            .ok()?;
        let crc = element.child_attr(EL_INDEX_FILE_CRC, VAL)?.trim().parse().ok()?;
        Some(Self {
            file_size_kb: file_size,
            uncompressed_size_kb: uncompressed,
            index_crc: crc,
        })
    }
}

/// Semantic record of one distributable package.
///
/// Every field is optional: a freshly read element may omit any of them.
/// The resolver fills them in before a record is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRecord {
    pub platform: Option<String>,
    pub unzip: Option<bool>,
    pub min_version: Option<String>,
    pub tier: Option<String>,
    pub xml: Option<String>,
    pub kind: Option<String>,
    pub ignore: Option<bool>,
    pub local_dir: Option<String>,
    pub stats: Option<ContentStats>,
    pub index_file_sig: Option<String>,
    pub version: Option<String>,
    pub file_name: Option<FileName>,
    pub language: Option<String>,
}

impl PackageRecord {
    /// Read the known fields of a `Package` element.
    pub fn read(element: &Element) -> Self {
        let file_name = element
            .child_attr(EL_FILE_NAME, VAL)
            .and_then(|raw| match FileName::parse(raw) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(error = %e, "Ignoring package with unusable file name");
                    None
                }
            });

        Self {
            platform: element.attr(ATTR_PLATFORM).map(str::to_string),
            unzip: element.attr(ATTR_UNZIP).map(parse_bool),
            min_version: element.attr(ATTR_MIN_VERSION).map(str::to_string),
            tier: element.attr(ATTR_TIER).map(str::to_string),
            xml: element.attr(ATTR_XML).map(str::to_string),
            kind: element.attr(ATTR_TYPE).map(str::to_string),
            ignore: element.attr(ATTR_IGNORE).map(parse_bool),
            local_dir: element.child_attr(EL_LOCAL_DIR, NAME).map(str::to_string),
            stats: ContentStats::read(element),
            index_file_sig: element.child_attr(EL_INDEX_FILE_SIG, VAL).map(str::to_string),
            version: element.child_attr(EL_VERSION, VAL).map(str::to_string),
            file_name,
            language: element.child_attr(EL_LANGUAGE, VAL).map(str::to_string),
        }
    }

    /// Identity of the record, if its file name is usable.
    pub fn identity(&self) -> Option<PackageIdentity> {
        self.file_name.as_ref().map(FileName::identity)
    }

    /// Identity of a `Package` element without reading the other fields.
    ///
    /// Unusable file names yield `None` silently; [`read`](Self::read)
    /// is the place that reports them.
    pub fn identity_of(element: &Element) -> Option<PackageIdentity> {
        if element.name() != PACKAGE_TAG {
            return None;
        }
        element
            .child_attr(EL_FILE_NAME, VAL)
            .and_then(|raw| FileName::parse(raw).ok())
            .map(|name| name.identity())
    }

    /// Literal file name of a `Package` element, if usable.
    pub fn file_name_of(element: &Element) -> Option<FileName> {
        element
            .child_attr(EL_FILE_NAME, VAL)
            .and_then(|raw| FileName::parse(raw).ok())
    }

    /// Write the present fields into `element`.
    ///
    /// Existing attributes and sub-elements are updated in place; missing
    /// ones are appended in canonical order.
    pub fn write_into(&self, element: &mut Element) {
        let attrs: [(&str, Option<String>); 7] = [
            (ATTR_PLATFORM, self.platform.clone()),
            (ATTR_UNZIP, self.unzip.map(format_bool)),
            (ATTR_MIN_VERSION, self.min_version.clone()),
            (ATTR_TIER, self.tier.clone()),
            (ATTR_XML, self.xml.clone()),
            (ATTR_TYPE, self.kind.clone()),
            (ATTR_IGNORE, self.ignore.map(format_bool)),
        ];
        for (key, value) in attrs {
            if let Some(value) = value {
                element.set_attr(key, value);
            }
        }

        let stats = self.stats.map(|s| {
            (
                s.file_size_kb.to_string(),
                s.uncompressed_size_kb.to_string(),
                s.index_crc.to_string(),
            )
        });
        let (file_size, uncompressed, crc) = match stats {
            Some((a, b, c)) => (Some(a), Some(b), Some(c)),
            None => (None, None, None),
        };

        let children: [(&str, &str, Option<String>); 8] = [
            (EL_LOCAL_DIR, NAME, self.local_dir.clone()),
            (EL_FILE_SIZE, VAL, file_size),
            (EL_UNCOMPRESSED_FILE_SIZE, VAL, uncompressed),
            (EL_INDEX_FILE_CRC, VAL, crc),
            (EL_INDEX_FILE_SIG, VAL, self.index_file_sig.clone()),
            (EL_VERSION, VAL, self.version.clone()),
            (EL_FILE_NAME, VAL, self.file_name.as_ref().map(FileName::to_string)),
            (EL_LANGUAGE, VAL, self.language.clone()),
        ];
        for (tag, key, value) in children {
            let Some(value) = value else { continue };
            match element.child_mut(tag) {
                Some(child) => child.set_attr(key, value),
                None => element.push_child(Element::new(tag).with_attr(key, value)),
            }
        }
    }

    /// Create a new `Package` element holding this record.
    pub fn to_element(&self) -> Element {
        let mut element = Element::new(PACKAGE_TAG);
        self.write_into(&mut element);
        element
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn format_bool(value: bool) -> String {
    String::from(if value { "true" } else { "false" })
}
