//! Tar packing and unpacking for artifact payloads
//!
//! Artifacts travel as tar archives. Headers are written in deterministic
//! mode so identical content always packs to identical bytes, which keeps
//! content-addressed keys stable across uploads.

use crate::{Error, Result};
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder, EntryType, HeaderMode};

/// zstd frame magic (little-endian 0xFD2FB528)
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// A regular file extracted from an artifact archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Path inside the archive
    pub path: String,
    /// File contents
    pub data: Vec<u8>,
}

/// Pack a local file or directory into a tar archive.
///
/// Directories are packed recursively with paths relative to the
/// directory; a single file is packed under its file name.
///
/// # Errors
///
/// Returns `Error::NotFound` if `path` does not exist or cannot be read.
pub fn pack_path(path: &Path) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| Error::NotFound(format!("local artifact {}: {e}", path.display())))?;

    let mut builder = Builder::new(Vec::new());
    builder.mode(HeaderMode::Deterministic);

    let appended = if metadata.is_dir() {
        builder.append_dir_all(".", path)
    } else {
        let name = path
            .file_name()
            .map_or_else(|| "artifact".into(), |n| n.to_string_lossy().into_owned());
        builder.append_path_with_name(path, name)
    };
    appended.map_err(|e| Error::NotFound(format!("local artifact {}: {e}", path.display())))?;

    Ok(builder.into_inner()?)
}

/// Build a tar archive from in-memory files, in the given order.
///
/// # Errors
///
/// Returns `Error::Io` if a header cannot be written.
pub fn pack_members<'a, I>(members: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut builder = Builder::new(Vec::new());
    for (path, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, path, data)?;
    }
    Ok(builder.into_inner()?)
}

/// Unpack the regular files of an archive, in archive order.
///
/// A zstd-framed archive is decompressed first when the `compression`
/// feature is enabled.
///
/// # Errors
///
/// Returns `Error::CorruptRecord` if the bytes are not a readable archive.
pub fn unpack_members(bytes: &[u8]) -> Result<Vec<ArchiveMember>> {
    if bytes.starts_with(&ZSTD_MAGIC) {
        return unpack_zstd(bytes);
    }
    read_entries(bytes)
}

#[cfg(feature = "compression")]
fn unpack_zstd(bytes: &[u8]) -> Result<Vec<ArchiveMember>> {
    let decoded = zstd::decode_all(bytes)
        .map_err(|e| Error::corrupt("archive", format!("zstd decode: {e}")))?;
    read_entries(&decoded)
}

#[cfg(not(feature = "compression"))]
fn unpack_zstd(_bytes: &[u8]) -> Result<Vec<ArchiveMember>> {
    Err(Error::corrupt(
        "archive",
        "zstd archive requires the `compression` feature",
    ))
}

fn read_entries(bytes: &[u8]) -> Result<Vec<ArchiveMember>> {
    let archive_err = |e: std::io::Error| Error::corrupt("archive", e);

    let mut archive = Archive::new(bytes);
    let mut members = Vec::new();
    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let path = entry
            .path()
            .map_err(archive_err)?
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(archive_err)?;
        members.push(ArchiveMember { path, data });
    }
    Ok(members)
}
