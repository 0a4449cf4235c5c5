//! Catalog blob encoder.
//!
//! Serializes the list of files placed into a content archive into the
//! binary descriptor the game's loader reads before touching the archive.
//!
//! # Layout
//!
//! All integers are big-endian. Strings are written as a one-byte length
//! (`byte_length + 1`), the UTF-8 bytes and a terminating NUL.
//!
//! ```text
//! signature        6   42 47 72 6D 03 02
//! total size       4   patched once the entries are written
//! largest hint     2   2 * len(longest name) + len(its extension) + 14
//! reserved         1   00
//! archive path     s   "<directory>/1"
//! archive header   4   00 01 00 08
//! archive name     s   "1"
//! flag             1   01
//! archive crc      4   CRC-32 of the content archive
//! entry count      2
//! entries          *   hint(2) name(s) ext(s) name(s) size(4) priority(2) 00 00
//! blob crc         4   CRC-32 of everything above
//! ```

use std::path::Path;

use super::error::{CatalogError, CatalogResult};

/// Signature every catalog blob starts with.
pub const SIGNATURE: [u8; 6] = [0x42, 0x47, 0x72, 0x6D, 0x03, 0x02];

/// Archive entry count and field widths that follow the archive path.
pub const ARCHIVE_HEADER: [u8; 4] = [0x00, 0x01, 0x00, 0x08];

/// Flag byte written after the archive name.
pub const ARCHIVE_FLAG: u8 = 0x01;

/// Name of the content archive inside a distribution unit.
pub const CONTENT_ARCHIVE_NAME: &str = "1";

/// Name of the catalog blob inside a distribution unit.
pub const CATALOG_FILE_NAME: &str = "0";

/// Longest string the one-byte length prefix can describe.
pub const MAX_STRING_LEN: usize = u8::MAX as usize - 1;

/// Constant part of the per-record size hint.
const RECORD_HINT_BASE: usize = 14;

/// Offset of the total size field.
pub(crate) const SIZE_FIELD_OFFSET: usize = SIGNATURE.len();

/// Description of one file placed into the content archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// File name as the game refers to it (no directories).
    pub name: String,

    /// Extension without the leading dot, empty when the name has none.
    pub extension: String,

    /// File size in bytes.
    pub size: u64,
}

impl FileDescriptor {
    /// Create a descriptor, deriving the extension from the name.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let extension = extension_of(&name).to_string();
        Self {
            name,
            extension,
            size,
        }
    }

    /// Create a descriptor with an explicit extension.
    pub fn with_extension(name: impl Into<String>, extension: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            size,
        }
    }

    /// Size hint written in front of this file's record.
    ///
    /// `2 * len(name) + len(extension) + 14`, lengths in bytes.
    pub fn record_hint(&self) -> CatalogResult<u16> {
        let hint = 2 * self.name.len() + self.extension.len() + RECORD_HINT_BASE;
        u16::try_from(hint).map_err(|_| CatalogError::FieldOverflow {
            field: "record hint",
            value: hint as u64,
            bits: 16,
        })
    }
}

/// Extension of a file name without the leading dot.
///
/// Returns an empty string for names without an extension and for dot files
/// such as `.hidden`.
pub fn extension_of(name: &str) -> &str {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
}

/// Encoder for catalog blobs.
///
/// One encoder describes one content archive: the logical directory it is
/// installed under, the archive's member name and the priority baked into
/// every entry.
///
/// # Example
///
/// ```
/// use tstodlc::catalog::{CatalogEncoder, FileDescriptor};
///
/// let encoder = CatalogEncoder::new("Props", 1);
/// let files = vec![
///     FileDescriptor::new("sprite.png", 100),
///     FileDescriptor::new("data.bin", 50),
/// ];
/// let blob = encoder.encode(&files, 0xDEADBEEF).unwrap();
///
/// assert_eq!(&blob[..6], &[0x42, 0x47, 0x72, 0x6D, 0x03, 0x02]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEncoder {
    directory: String,
    archive_name: String,
    priority: u16,
}

impl CatalogEncoder {
    /// Create an encoder for archives installed under `directory`.
    pub fn new(directory: impl Into<String>, priority: u16) -> Self {
        Self {
            directory: directory.into(),
            archive_name: CONTENT_ARCHIVE_NAME.to_string(),
            priority,
        }
    }

    /// Override the content archive's member name.
    pub fn with_archive_name(mut self, archive_name: impl Into<String>) -> Self {
        self.archive_name = archive_name.into();
        self
    }

    /// Logical directory the archive is installed under.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Priority written into every entry.
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Path of the content archive as recorded in the blob.
    pub fn archive_path(&self) -> String {
        format!("{}/{}", self.directory, self.archive_name)
    }

    /// Encode the catalog for `files`, in order.
    ///
    /// `content_crc` is the CRC-32 of the fully built content archive.
    ///
    /// # Errors
    ///
    /// Fails when `files` is empty or when any name, size or count does not
    /// fit its field.
    pub fn encode(&self, files: &[FileDescriptor], content_crc: u32) -> CatalogResult<Vec<u8>> {
        let longest = longest_name(files).ok_or(CatalogError::EmptyFileList)?;
        let entry_count = u16::try_from(files.len()).map_err(|_| CatalogError::FieldOverflow {
            field: "entry count",
            value: files.len() as u64,
            bits: 16,
        })?;

        let mut buf = Vec::with_capacity(64 + files.len() * 64);
        buf.extend_from_slice(&SIGNATURE);
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&longest.record_hint()?.to_be_bytes());
        buf.push(0);

        write_string(&mut buf, &self.archive_path())?;
        buf.extend_from_slice(&ARCHIVE_HEADER);
        write_string(&mut buf, &self.archive_name)?;
        buf.push(ARCHIVE_FLAG);
        buf.extend_from_slice(&content_crc.to_be_bytes());
        buf.extend_from_slice(&entry_count.to_be_bytes());

        for file in files {
            buf.extend_from_slice(&file.record_hint()?.to_be_bytes());
            write_string(&mut buf, &file.name)?;
            write_string(&mut buf, &file.extension)?;
            write_string(&mut buf, &file.name)?;

            let size = u32::try_from(file.size).map_err(|_| CatalogError::FieldOverflow {
                field: "file size",
                value: file.size,
                bits: 32,
            })?;
            buf.extend_from_slice(&size.to_be_bytes());
            buf.extend_from_slice(&self.priority.to_be_bytes());
            buf.extend_from_slice(&[0u8; 2]);
        }

        // The recorded size includes the trailing checksum.
        let total = buf.len() + 4;
        let total = u32::try_from(total).map_err(|_| CatalogError::FieldOverflow {
            field: "total size",
            value: total as u64,
            bits: 32,
        })?;
        buf[SIZE_FIELD_OFFSET..SIZE_FIELD_OFFSET + 4].copy_from_slice(&total.to_be_bytes());

        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_be_bytes());

        Ok(buf)
    }
}

/// First file whose name has the maximum byte length.
fn longest_name(files: &[FileDescriptor]) -> Option<&FileDescriptor> {
    files.iter().fold(None, |best, file| match best {
        Some(current) if current.name.len() >= file.name.len() => Some(current),
        _ => Some(file),
    })
}

/// Write a length-prefixed, NUL-terminated string.
fn write_string(buf: &mut Vec<u8>, value: &str) -> CatalogResult<()> {
    let bytes = value.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(CatalogError::StringTooLong {
            value: value.to_string(),
            len: bytes.len(),
            max: MAX_STRING_LEN,
        });
    }
    buf.push((bytes.len() + 1) as u8);
    buf.extend_from_slice(bytes);
    buf.push(0);
    Ok(())
}
