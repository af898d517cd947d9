//! Archive packaging — assembles artifacts into self-contained zip parts.
//!
//! A split archive is not a byte-range split of one big zip: every part is
//! an independently valid archive holding whole files, so a user can open
//! any part on its own. Files keep resolution order across parts. Audio
//! streams are already compressed, so entries are stored, which also makes
//! part sizes predictable up front.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{DeliveryError, Error, Result};
use crate::types::{Artifact, ZipPart};

/// Hard ceiling for any single delivered file or archive part: 50 MiB.
pub const SIZE_CEILING: u64 = 50 * 1024 * 1024;

/// Conservative zip bookkeeping cost per archive (end-of-central-directory
/// record plus slack).
const PART_BASE_OVERHEAD: u64 = 1024;

/// Conservative zip bookkeeping cost per entry (local header plus central
/// directory entry, including the file name twice). Generated names are
/// capped well below this.
const ENTRY_OVERHEAD: u64 = 512;

/// One file headed into an archive
struct ArchiveEntry {
    name: String,
    size: u64,
    source: EntrySource,
}

enum EntrySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Group entries into parts, preserving order, such that every part's
/// stored size (payload plus bookkeeping) stays at or below the ceiling.
///
/// Returns the entry indices of each part. Fails when a single entry
/// cannot fit an empty part — such a file can never become a valid
/// self-contained segment.
fn plan_parts(entries: &[ArchiveEntry], ceiling: u64) -> Result<Vec<Vec<usize>>> {
    let capacity = ceiling.saturating_sub(PART_BASE_OVERHEAD);
    let mut parts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_size: u64 = 0;

    for (index, entry) in entries.iter().enumerate() {
        let cost = entry.size + ENTRY_OVERHEAD;
        if cost > capacity {
            return Err(Error::Delivery(DeliveryError::PartExceedsCeiling {
                path: match &entry.source {
                    EntrySource::File(path) => path.clone(),
                    EntrySource::Bytes(_) => PathBuf::from(&entry.name),
                },
                size: entry.size,
                ceiling,
            }));
        }
        if current_size + cost > capacity && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(index);
        current_size += cost;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    Ok(parts)
}

/// Build a (possibly split) archive from artifacts, in the order given.
///
/// `cover` is included as `cover.jpg` in the first part when present.
/// Part files land in `out_dir` named after `base_name`; a single part
/// keeps the plain `.zip` name, split parts are numbered. Every returned
/// [`ZipPart`] is individually openable and at most `ceiling` bytes.
///
/// This does blocking filesystem work; callers on the async runtime wrap
/// it in `spawn_blocking`.
pub(crate) fn build_archive(
    artifacts: &[Artifact],
    cover: Option<Vec<u8>>,
    out_dir: &Path,
    base_name: &str,
    ceiling: u64,
) -> Result<Vec<ZipPart>> {
    let mut entries = Vec::with_capacity(artifacts.len() + 1);
    if let Some(bytes) = cover {
        entries.push(ArchiveEntry {
            name: "cover.jpg".to_string(),
            size: bytes.len() as u64,
            source: EntrySource::Bytes(bytes),
        });
    }
    for artifact in artifacts {
        let name = artifact
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .unwrap_or_else(|| format!("{} - {}.{}", artifact.tags.artist, artifact.tags.title,
                artifact.codec.extension()));
        entries.push(ArchiveEntry {
            name,
            size: artifact.size_bytes,
            source: EntrySource::File(artifact.path.clone()),
        });
    }

    let plan = plan_parts(&entries, ceiling)?;
    let total = plan.len();
    let mut parts = Vec::with_capacity(total);

    for (part_index, entry_indices) in plan.iter().enumerate() {
        let index = part_index + 1;
        let path = if total == 1 {
            out_dir.join(format!("{}.zip", base_name))
        } else {
            out_dir.join(format!("{}.part{:02}.zip", base_name, index))
        };
        write_part(&path, entry_indices.iter().map(|&i| &entries[i]))?;

        let size_bytes = std::fs::metadata(&path)?.len();
        if size_bytes > ceiling {
            return Err(Error::Delivery(DeliveryError::PartExceedsCeiling {
                path,
                size: size_bytes,
                ceiling,
            }));
        }

        tracing::debug!(
            part = %format!("{}/{}", index, total),
            path = %path.display(),
            size_bytes,
            "archive part sealed"
        );

        parts.push(ZipPart {
            path,
            size_bytes,
            index,
            total,
        });
    }

    Ok(parts)
}

fn write_part<'a>(
    path: &Path,
    entries: impl Iterator<Item = &'a ArchiveEntry>,
) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);

    for entry in entries {
        writer.start_file(entry.name.clone(), options)?;
        match &entry.source {
            EntrySource::File(source) => {
                let mut reader = std::fs::File::open(source)?;
                std::io::copy(&mut reader, &mut writer)?;
            }
            EntrySource::Bytes(bytes) => {
                writer.write_all(bytes)?;
            }
        }
    }

    writer.finish()?;
    Ok(())
}
