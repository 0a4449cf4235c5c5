//! Package file names and their revision-insensitive identities.
//!
//! Index records name their distribution unit with an on-disk identifier of
//! the form `<directory>:<stem>[-r<revision>].<ext>`, where `:` stands in for
//! the filesystem separator. Two records describe the same package when
//! their names agree after the revision suffix is dropped; that normalized
//! form is the [`PackageIdentity`] used for lookup, replacement and
//! de-duplication.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::error::{IndexError, IndexResult};

/// Separator marker between directory and file in stored file names.
pub const SEPARATOR_MARKER: char = ':';

/// Extension of distribution archives.
pub const ARCHIVE_EXTENSION: &str = "zip";

fn revision_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)-r([0-9]+)$").expect("valid revision pattern"))
}

/// Split a trailing `-r<digits>` revision suffix from a file stem.
///
/// Returns the stem without the suffix and the revision digits. Stems
/// without a well-formed suffix are returned unchanged.
///
/// # Examples
///
/// ```
/// use tstodlc::index::split_revision;
///
/// assert_eq!(split_revision("buildings-r1700000000"), ("buildings", Some("1700000000")));
/// assert_eq!(split_revision("buildings"), ("buildings", None));
/// assert_eq!(split_revision("buildings-r"), ("buildings-r", None));
/// assert_eq!(split_revision("a-r1-r2"), ("a-r1", Some("2")));
/// ```
pub fn split_revision(stem: &str) -> (&str, Option<&str>) {
    match revision_pattern().captures(stem) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(base), Some(rev)) => (base.as_str(), Some(rev.as_str())),
            _ => (stem, None),
        },
        None => (stem, None),
    }
}

/// Split a file name into stem and extension the way paths do.
///
/// A leading dot does not start an extension.
fn split_extension(file: &str) -> (&str, Option<&str>) {
    match file.rfind('.') {
        Some(pos) if pos > 0 => (&file[..pos], Some(&file[pos + 1..])),
        _ => (file, None),
    }
}

fn is_separator(c: char) -> bool {
    c == SEPARATOR_MARKER || c == '/' || c == '\\'
}

/// Revision-insensitive identity of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageIdentity {
    directory: String,
    stem: String,
    extension: Option<String>,
}

impl PackageIdentity {
    /// Create an identity from its parts.
    pub fn new(
        directory: impl Into<String>,
        stem: impl Into<String>,
        extension: Option<&str>,
    ) -> Self {
        Self {
            directory: directory.into(),
            stem: stem.into(),
            extension: extension.map(str::to_string),
        }
    }

    /// Identity of the distribution archive built from `directory/stem`.
    pub fn archive(directory: impl Into<String>, stem: impl Into<String>) -> Self {
        Self::new(directory, stem, Some(ARCHIVE_EXTENSION))
    }

    /// Directory part.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Stem without revision suffix.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Extension, if any.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Native path of the identity, relative to the distribution root.
    pub fn to_path(&self) -> PathBuf {
        let file = match &self.extension {
            Some(ext) => format!("{}.{}", self.stem, ext),
            None => self.stem.clone(),
        };
        PathBuf::from(&self.directory).join(file)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.directory, SEPARATOR_MARKER, self.stem)?;
        if let Some(ext) = &self.extension {
            write!(f, ".{}", ext)?;
        }
        Ok(())
    }
}

/// A stored package file name, e.g. `Props:buildings-r1700000000.zip`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName {
    directory: String,
    file: String,
}

impl FileName {
    /// Parse a stored file name.
    ///
    /// `:` is the canonical separator; `/` and `\` written by older tools
    /// are accepted too. The result is always rendered with `:`.
    pub fn parse(value: &str) -> IndexResult<Self> {
        let invalid = || IndexError::InvalidFileName(value.to_string());

        let split = value
            .find(SEPARATOR_MARKER)
            .or_else(|| value.rfind(['/', '\\']))
            .ok_or_else(invalid)?;
        let directory = &value[..split];
        let file = &value[split + 1..];

        Self::from_parts(directory, file).map_err(|_| invalid())
    }

    /// Build a file name from a directory and a file.
    pub fn from_parts(directory: &str, file: &str) -> IndexResult<Self> {
        if directory.is_empty()
            || file.is_empty()
            || directory.contains(SEPARATOR_MARKER)
            || file.contains(is_separator)
        {
            return Err(IndexError::InvalidFileName(format!(
                "{}{}{}",
                directory, SEPARATOR_MARKER, file
            )));
        }
        Ok(Self {
            directory: directory.to_string(),
            file: file.to_string(),
        })
    }

    /// Name of the distribution archive for `directory/stem`.
    ///
    /// With a revision the name becomes `<stem>-r<revision>.zip`.
    pub fn archive(directory: &str, stem: &str, revision: Option<u64>) -> IndexResult<Self> {
        let file = match revision {
            Some(rev) => format!("{}-r{}.{}", stem, rev, ARCHIVE_EXTENSION),
            None => format!("{}.{}", stem, ARCHIVE_EXTENSION),
        };
        Self::from_parts(directory, &file)
    }

    /// Directory part.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// File part, revision and extension included.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Revision digits, if the name carries a revision suffix.
    pub fn revision(&self) -> Option<&str> {
        let (stem, _) = split_extension(&self.file);
        split_revision(stem).1
    }

    /// Revision-insensitive identity.
    pub fn identity(&self) -> PackageIdentity {
        let (stem, extension) = split_extension(&self.file);
        let (base, _) = split_revision(stem);
        PackageIdentity::new(self.directory.clone(), base, extension)
    }

    /// Literal native path, relative to the distribution root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join(&self.file)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.directory, SEPARATOR_MARKER, self.file)
    }
}

impl FromStr for FileName {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
