//! Archive extraction for arXiv source distributions.
//!
//! Bulk tarballs (`arXiv_src_2003_026.tar`) hold one compressed source per
//! paper, stored as `2003/2003.00001.gz`. A per-paper `.gz` is either a
//! gzipped tarball of the paper directory or, for single-file submissions, a
//! gzipped `.tex` file.
//!
//! Entries with exactly two path components lose their leading directory, so
//! `2003/2003.00001.gz` lands directly in the destination. Deeper paths are
//! kept as-is. Only regular files are written; entries that would escape the
//! destination are skipped.

use crate::error::ArchiveError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, warn};

/// Offset and value of the POSIX tar magic in a header block.
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Recognised archive layouts, by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.tar`
    Tar,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.gz`: a gzipped tarball or a single gzipped file, decided by content.
    Gz,
}

impl ArchiveKind {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".gz") {
            Some(Self::Gz)
        } else {
            None
        }
    }
}

/// File name without any archive suffix: `2003.00001.tar.gz` → `2003.00001`.
pub fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for suffix in [".tar.gz", ".tgz", ".tar", ".gz"] {
        if name.len() > suffix.len() && name.to_ascii_lowercase().ends_with(suffix) {
            return name[..name.len() - suffix.len()].to_string();
        }
    }
    name
}

/// `arXiv_src_2003_026.tar` → `2003_026`.
pub fn arxiv_year_index(file_name: &str) -> Option<String> {
    let parts: Vec<&str> = file_name.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let year = parts[parts.len() - 2];
    let index = parts[parts.len() - 1];
    let index = index.strip_suffix(".tar").unwrap_or(index);
    Some(format!("{year}_{index}"))
}

/// Unpack `archive` into `dest`, creating `dest` if needed.
///
/// Returns the paths of the files written.
pub fn unpack(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let kind = ArchiveKind::detect(archive).ok_or_else(|| ArchiveError::UnsupportedFormat {
        path: archive.to_path_buf(),
    })?;
    let io_err = |source| ArchiveError::Io {
        path: archive.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dest).map_err(io_err)?;
    let file = File::open(archive).map_err(io_err)?;

    let written = match kind {
        ArchiveKind::Tar => unpack_tar(file, dest),
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(file), dest),
        ArchiveKind::Gz => {
            let mut bytes = Vec::new();
            GzDecoder::new(file).read_to_end(&mut bytes).map_err(io_err)?;
            if is_tar(&bytes) {
                unpack_tar(bytes.as_slice(), dest)
            } else {
                let target = dest.join(format!("{}.tex", archive_stem(archive)));
                std::fs::write(&target, &bytes).map(|_| vec![target])
            }
        }
    }
    .map_err(io_err)?;

    debug!("Unpacked {} files from {}", written.len(), archive.display());
    Ok(written)
}

fn is_tar(bytes: &[u8]) -> bool {
    bytes
        .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
        .is_some_and(|magic| magic == TAR_MAGIC)
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archive = Archive::new(reader);
    let mut written = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let entry_path = entry.path()?.into_owned();
        let Some(relative) = entry_target(&entry_path) else {
            warn!("Skipping unsafe archive entry {}", entry_path.display());
            continue;
        };

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
        written.push(target);
    }

    Ok(written)
}

/// Where an entry lands relative to the destination, or `None` when the
/// path is absolute or climbs out with `..`.
fn entry_target(path: &Path) -> Option<PathBuf> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    match parts.len() {
        0 => None,
        2 => Some(PathBuf::from(parts[1])),
        _ => Some(parts.iter().collect()),
    }
}
