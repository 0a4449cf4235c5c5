//! Catalog blob decoder.
//!
//! Reads back every field written by [`CatalogEncoder`](super::CatalogEncoder)
//! and verifies the blob's size field and trailing checksum.

use super::encoder::{ARCHIVE_HEADER, SIGNATURE};
use super::error::{CatalogError, CatalogResult};

/// One decoded file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Size hint stored in front of the record.
    pub record_hint: u16,

    /// Display name.
    pub name: String,

    /// Extension without the leading dot.
    pub extension: String,

    /// Internal name (identical to the display name in blobs we produce).
    pub internal_name: String,

    /// File size in bytes.
    pub size: u32,

    /// Priority value.
    pub priority: u16,
}

/// A decoded catalog blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Total size recorded in the header.
    pub total_size: u32,

    /// Largest-capacity hint from the header.
    pub largest_entry_hint: u16,

    /// Path of the content archive (e.g. `Props/1`).
    pub archive_path: String,

    /// Member name of the content archive (e.g. `1`).
    pub archive_name: String,

    /// CRC-32 of the content archive.
    pub content_crc: u32,

    /// File entries in stored order.
    pub entries: Vec<CatalogEntry>,

    /// Trailing checksum over the rest of the blob.
    pub checksum: u32,
}

impl Catalog {
    /// Logical directory the archive is installed under.
    pub fn directory(&self) -> &str {
        self.archive_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or(&self.archive_path)
    }

    /// Sum of all entry sizes in bytes.
    pub fn content_size(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.size)).sum()
    }
}

/// Sequential reader over a catalog blob.
pub struct CatalogReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> CatalogReader<'a> {
    /// Decode and verify a complete catalog blob.
    pub fn parse(bytes: &'a [u8]) -> CatalogResult<Catalog> {
        if bytes.len() < SIGNATURE.len() + 4 {
            return Err(CatalogError::Truncated {
                offset: bytes.len(),
                field: "header",
            });
        }
        if bytes[..SIGNATURE.len()] != SIGNATURE {
            return Err(CatalogError::BadSignature);
        }

        let body_len = bytes.len() - 4;
        let stored = u32::from_be_bytes([
            bytes[body_len],
            bytes[body_len + 1],
            bytes[body_len + 2],
            bytes[body_len + 3],
        ]);
        let computed = crc32fast::hash(&bytes[..body_len]);
        if stored != computed {
            return Err(CatalogError::ChecksumMismatch { stored, computed });
        }

        let mut reader = CatalogReader {
            bytes: &bytes[..body_len],
            offset: SIGNATURE.len(),
        };

        let total_size = reader.read_u32("total size")?;
        if total_size as usize != bytes.len() {
            return Err(CatalogError::SizeMismatch {
                recorded: total_size,
                actual: bytes.len(),
            });
        }

        let largest_entry_hint = reader.read_u16("largest hint")?;
        reader.skip(1, "reserved")?;
        let archive_path = reader.read_string()?;
        let header = reader.take(ARCHIVE_HEADER.len(), "archive header")?;
        if header != ARCHIVE_HEADER {
            tracing::debug!(?header, "unexpected archive header bytes");
        }
        let archive_name = reader.read_string()?;
        reader.skip(1, "archive flag")?;
        let content_crc = reader.read_u32("archive crc")?;
        let count = reader.read_u16("entry count")?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let record_hint = reader.read_u16("record hint")?;
            let name = reader.read_string()?;
            let extension = reader.read_string()?;
            let internal_name = reader.read_string()?;
            let size = reader.read_u32("file size")?;
            let priority = reader.read_u16("priority")?;
            reader.skip(2, "entry reserved")?;
            entries.push(CatalogEntry {
                record_hint,
                name,
                extension,
                internal_name,
                size,
                priority,
            });
        }

        let remaining = reader.bytes.len() - reader.offset;
        if remaining != 0 {
            return Err(CatalogError::TrailingBytes { count: remaining });
        }

        Ok(Catalog {
            total_size,
            largest_entry_hint,
            archive_path,
            archive_name,
            content_crc,
            entries,
            checksum: stored,
        })
    }

    fn take(&mut self, len: usize, field: &'static str) -> CatalogResult<&'a [u8]> {
        let end = self.offset + len;
        if end > self.bytes.len() {
            return Err(CatalogError::Truncated {
                offset: self.offset,
                field,
            });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize, field: &'static str) -> CatalogResult<()> {
        self.take(len, field).map(|_| ())
    }

    fn read_u16(&mut self, field: &'static str) -> CatalogResult<u16> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self, field: &'static str) -> CatalogResult<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_string(&mut self) -> CatalogResult<String> {
        let start = self.offset;
        let len = self.take(1, "string length")?[0] as usize;
        if len == 0 {
            return Err(CatalogError::MalformedString { offset: start });
        }
        let raw = self.take(len, "string")?;
        let (text, nul) = raw.split_at(len - 1);
        if nul != [0] {
            return Err(CatalogError::MalformedString { offset: start });
        }
        String::from_utf8(text.to_vec()).map_err(|_| CatalogError::MalformedString { offset: start })
    }
}
