//! Loading and saving index documents.
//!
//! Index files are stored either as plain `.xml` or as a `.zip` container
//! whose single member is `<stem>.xml`. Loading is tolerant: a missing,
//! unreadable or foreign document yields an empty document of the expected
//! shape instead of an error, and the caller is told which case occurred.
//! Saving always goes through a temporary file in the target directory
//! followed by a rename, so a failed write never leaves a half-written
//! index in place.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::document::IndexDocument;
use super::error::{IndexError, IndexResult};
use crate::fsutil;

/// How a loaded document came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    /// Parsed from the file with the expected root tag.
    Parsed,
    /// The file (or container member) does not exist, or the path has an
    /// unsupported extension.
    Missing,
    /// The file exists but could not be used; the reason is attached.
    Replaced(String),
}

/// A document together with its provenance.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub document: IndexDocument,
    pub source: IndexSource,
}

impl LoadedIndex {
    /// Whether the document was read from disk as-is.
    pub fn is_parsed(&self) -> bool {
        self.source == IndexSource::Parsed
    }
}

/// Reads and writes index documents.
pub struct IndexStore;

impl IndexStore {
    /// Load a document, falling back to an empty one with `root_tag`.
    ///
    /// A wrong root tag or a malformed document is replaced by an empty
    /// document without raising an error, logged at `warn`.
    pub fn load(path: &Path, root_tag: &str) -> LoadedIndex {
        let empty = |source| LoadedIndex {
            document: IndexDocument::empty(root_tag),
            source,
        };

        let text = match read_document_text(path) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(path = %path.display(), "Index not found, starting empty");
                return empty(IndexSource::Missing);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable index replaced by an empty one");
                return empty(IndexSource::Replaced(e.to_string()));
            }
        };

        match IndexDocument::parse(&text) {
            Ok(doc) if doc.root_tag() == root_tag => LoadedIndex {
                document: doc,
                source: IndexSource::Parsed,
            },
            Ok(doc) => {
                let reason = format!("expected root <{}>, found <{}>", root_tag, doc.root_tag());
                warn!(path = %path.display(), %reason, "Foreign index replaced by an empty one");
                empty(IndexSource::Replaced(reason))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed index replaced by an empty one");
                empty(IndexSource::Replaced(e.to_string()))
            }
        }
    }

    /// Write a document in the format implied by the path's extension.
    ///
    /// `.zip` paths get a compressed container, anything else plain XML.
    pub fn save(path: &Path, document: &IndexDocument) -> IndexResult<()> {
        let compressed = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if compressed {
            Self::save_compressed(path, document)
        } else {
            Self::save_plain(path, document)
        }
    }

    /// Write a document as plain XML.
    pub fn save_plain(path: &Path, document: &IndexDocument) -> IndexResult<()> {
        let xml = document.to_xml()?;
        write_index(path, xml.as_bytes())?;
        debug!(path = %path.display(), "Wrote index");
        Ok(())
    }

    /// Write a document into a single-member zip container.
    ///
    /// The member is named after the container's stem with an `.xml`
    /// extension.
    pub fn save_compressed(path: &Path, document: &IndexDocument) -> IndexResult<()> {
        let xml = document.to_xml()?;
        let member = member_name(path)?;

        let archive_err = |e: zip::result::ZipError| IndexError::Archive {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(member, options).map_err(archive_err)?;
        zip.write_all(xml.as_bytes())
            .map_err(|e| IndexError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let bytes = zip.finish().map_err(archive_err)?.into_inner();

        write_index(path, &bytes)?;
        debug!(path = %path.display(), "Wrote compressed index");
        Ok(())
    }
}

/// Member name used inside a compressed index container.
fn member_name(path: &Path) -> IndexResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| format!("{}.xml", stem))
        .ok_or_else(|| IndexError::Archive {
            path: path.to_path_buf(),
            message: "container path has no usable file name".to_string(),
        })
}

/// Read the XML text of an index file.
///
/// Returns `Ok(None)` when there is nothing to read.
fn read_document_text(path: &Path) -> IndexResult<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("xml") => fs::read_to_string(path)
            .map(Some)
            .map_err(|e| IndexError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        Some("zip") => read_zip_member(path),
        _ => Ok(None),
    }
}

fn read_zip_member(path: &Path) -> IndexResult<Option<String>> {
    let archive_err = |e: zip::result::ZipError| IndexError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let file = File::open(path).map_err(|e| IndexError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut archive = ZipArchive::new(file).map_err(archive_err)?;
    let member = member_name(path)?;

    let mut entry = match archive.by_name(&member) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(archive_err(e)),
    };

    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| IndexError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(Some(text))
}

fn write_index(path: &Path, bytes: &[u8]) -> IndexResult<()> {
    fsutil::write_atomic(path, bytes).map_err(|e| IndexError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Branch, Element, INDEX_ROOT_TAG};
    use tempfile::TempDir;

    fn sample_doc() -> IndexDocument {
        let mut doc = IndexDocument::empty(INDEX_ROOT_TAG);
        doc.set_revision(true);
        doc.root_mut().push_child(
            Element::new("Package").with_child(Element::new("FileName").with_attr("val", "a:b.zip")),
        );
        doc.ensure_branch(Branch::Initial);
        doc
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let loaded = IndexStore::load(&temp.path().join("none.xml"), INDEX_ROOT_TAG);
        assert_eq!(loaded.source, IndexSource::Missing);
        assert_eq!(loaded.document, IndexDocument::empty(INDEX_ROOT_TAG));
    }

    #[test]
    fn test_unsupported_extension_is_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.txt");
        fs::write(&path, "<DlcIndex/>").unwrap();
        assert_eq!(IndexStore::load(&path, INDEX_ROOT_TAG).source, IndexSource::Missing);
    }

    #[test]
    fn test_plain_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("DLCIndex-Props.xml");
        let doc = sample_doc();

        IndexStore::save_plain(&path, &doc).unwrap();
        let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
        assert!(loaded.is_parsed());
        assert_eq!(loaded.document, doc);
    }

    #[test]
    fn test_compressed_round_trip_uses_stem_member() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("DLCIndex-2024.zip");
        let doc = sample_doc();

        IndexStore::save_compressed(&path, &doc).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        assert!(archive.by_name("DLCIndex-2024.xml").is_ok());

        let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
        assert!(loaded.is_parsed());
        assert_eq!(loaded.document, doc);
    }

    // Documents with a foreign root are silently replaced by an empty one.
    // This is intentional and kept for compatibility.
    #[test]
    fn test_wrong_root_tag_replaced_with_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.xml");
        fs::write(&path, "<Other><Package/></Other>").unwrap();

        let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
        assert!(matches!(loaded.source, IndexSource::Replaced(_)));
        assert_eq!(loaded.document, IndexDocument::empty(INDEX_ROOT_TAG));
    }

    #[test]
    fn test_malformed_replaced_with_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.xml");
        fs::write(&path, "<DlcIndex><Package></DlcIndex>").unwrap();

        let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
        assert!(matches!(loaded.source, IndexSource::Replaced(_)));
        assert!(loaded.document.root().children().is_empty());
    }

    #[test]
    fn test_corrupt_zip_replaced_with_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.zip");
        fs::write(&path, b"definitely not a zip").unwrap();

        let loaded = IndexStore::load(&path, INDEX_ROOT_TAG);
        assert!(matches!(loaded.source, IndexSource::Replaced(_)));
    }

    #[test]
    fn test_zip_without_member_is_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.zip");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("other.xml", FileOptions::default()).unwrap();
        zip.write_all(b"<DlcIndex/>").unwrap();
        zip.finish().unwrap();

        assert_eq!(IndexStore::load(&path, INDEX_ROOT_TAG).source, IndexSource::Missing);
    }

    #[test]
    fn test_save_replaces_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.xml");
        fs::write(&path, "old").unwrap();

        IndexStore::save_plain(&path, &sample_doc()).unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(fs::read_to_string(&path).unwrap().contains("<DlcIndex"));
    }
}
