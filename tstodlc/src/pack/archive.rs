//! Content discovery and zip containers for distribution units.
//!
//! A distribution unit `<S>[-r<epoch>].zip` holds two members: the catalog
//! blob `0` and the content archive `1`, itself a zip of every regular file
//! below the content subdirectory `S`.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::{PackError, PackResult};
use crate::catalog::{FileDescriptor, CATALOG_FILE_NAME, CONTENT_ARCHIVE_NAME};
use crate::fsutil;
use crate::index::{split_revision, ARCHIVE_EXTENSION};

/// A regular file found below a content subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    /// Absolute or caller-relative path on disk.
    pub path: PathBuf,

    /// Path relative to the content subdirectory, `/`-separated.
    pub relative: String,

    /// Base name of the file.
    pub name: String,

    /// Size in bytes.
    pub size: u64,
}

impl ContentFile {
    /// Catalog descriptor of the file.
    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor::new(self.name.clone(), self.size)
    }
}

/// Collect every regular file below `dir`, sorted by relative path.
pub fn collect_content_files(dir: &Path) -> PackResult<Vec<ContentFile>> {
    let mut files = Vec::new();
    walk(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    debug!(dir = %dir.display(), count = files.len(), "Collected content files");
    Ok(files)
}

fn walk(base: &Path, dir: &Path, files: &mut Vec<ContentFile>) -> PackResult<()> {
    let read_err = |e: io::Error| PackError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| PackError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        if file_type.is_symlink() {
            warn!(path = %path.display(), "Skipping symbolic link");
            continue;
        }
        let metadata = entry.metadata().map_err(|e| PackError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;

        if metadata.is_dir() {
            walk(base, &path, files)?;
            continue;
        }
        if !metadata.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            warn!(path = %path.display(), "Skipping file with a non UTF-8 name");
            continue;
        };
        let relative = path
            .strip_prefix(base)
            .map_err(|_| PackError::InvalidName(path.clone()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(ContentFile {
            path,
            relative,
            name,
            size: metadata.len(),
        });
    }
    Ok(())
}

/// Zip `files` into an in-memory content archive.
pub fn build_content_archive(dir: &Path, files: &[ContentFile]) -> PackResult<Vec<u8>> {
    let archive_err = |e: zip::result::ZipError| PackError::Archive {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for file in files {
        zip.start_file(file.relative.as_str(), options)
            .map_err(archive_err)?;
        let mut source = File::open(&file.path).map_err(|e| PackError::ReadFailed {
            path: file.path.clone(),
            source: e,
        })?;
        io::copy(&mut source, &mut zip).map_err(|e| PackError::ReadFailed {
            path: file.path.clone(),
            source: e,
        })?;
    }
    Ok(zip.finish().map_err(archive_err)?.into_inner())
}

/// Write the distribution unit `path` holding `catalog` and `content`.
///
/// Returns the size of the written file in bytes.
pub fn write_distribution_unit(path: &Path, catalog: &[u8], content: &[u8]) -> PackResult<u64> {
    let archive_err = |e: zip::result::ZipError| PackError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let write_err = |e: io::Error| PackError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in [(CATALOG_FILE_NAME, catalog), (CONTENT_ARCHIVE_NAME, content)] {
        zip.start_file(name, options).map_err(archive_err)?;
        zip.write_all(bytes).map_err(write_err)?;
    }
    let bytes = zip.finish().map_err(archive_err)?.into_inner();

    fsutil::write_atomic(path, &bytes).map_err(write_err)?;

    Ok(bytes.len() as u64)
}

/// Copy `catalog` and `content` as plain files into `dir`.
pub fn write_unpacked(dir: &Path, catalog: &[u8], content: &[u8]) -> PackResult<()> {
    fs::create_dir_all(dir).map_err(|e| PackError::CreateDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for (name, bytes) in [(CATALOG_FILE_NAME, catalog), (CONTENT_ARCHIVE_NAME, content)] {
        let path = dir.join(name);
        fs::write(&path, bytes).map_err(|e| PackError::WriteFailed { path, source: e })?;
    }
    Ok(())
}

/// Read the catalog blob of `path`.
///
/// `path` is either a distribution unit, whose member `0` is returned, or
/// an unpacked catalog file.
pub fn read_catalog_blob(path: &Path) -> PackResult<Vec<u8>> {
    let read_err = |e: io::Error| PackError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let bytes = fs::read(path).map_err(read_err)?;
    if !bytes.starts_with(b"PK\x03\x04") {
        return Ok(bytes);
    }

    let archive_err = |e: zip::result::ZipError| PackError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;
    let mut member = archive.by_name(CATALOG_FILE_NAME).map_err(archive_err)?;
    let mut catalog = Vec::new();
    member.read_to_end(&mut catalog).map_err(read_err)?;
    Ok(catalog)
}

/// Find the current distribution unit of `stem` in `target_dir`.
///
/// `<stem>.zip` wins over revisioned names; among those the highest
/// revision is taken.
pub fn find_existing_archive(target_dir: &Path, stem: &str) -> Option<PathBuf> {
    let plain = target_dir.join(format!("{}.{}", stem, ARCHIVE_EXTENSION));
    if plain.is_file() {
        return Some(plain);
    }

    let pattern = format!(
        "{}/{}-r*.{}",
        Pattern::escape(&target_dir.to_string_lossy()),
        Pattern::escape(stem),
        ARCHIVE_EXTENSION
    );
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid archive pattern");
            return None;
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let file_stem = path.file_stem()?.to_str()?;
            let revision: u64 = match split_revision(file_stem) {
                (base, Some(rev)) if base == stem => rev.parse().ok()?,
                _ => return None,
            };
            Some((revision, path))
        })
        .max_by_key(|(rev, _)| *rev)
        .map(|(_, path)| path)
}
