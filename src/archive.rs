//! Packs generated source files into a zip archive.
//!
//! Only the immediate entries of the source directory are considered, and only regular
//! files whose name ends in one of the configured suffixes are included. Entries are
//! written in file-name order with the zip epoch as timestamp, so the same inputs always
//! produce byte-identical archives.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot create archive {path}: {source}")]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot list directory {path}: {source}")]
    ListSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {path} into the archive: {source}")]
    WriteEntry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("archiving task did not complete: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

/// Result of a successful [`compress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entry names in archive order.
    pub entries: Vec<String>,
    /// Archive size on disk in bytes.
    pub size: u64,
}

fn has_source_suffix(name: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
}

/// Writes every matching file of `source_dir` into a new archive at `archive_path`.
///
/// The archive is finalized (central directory written) before returning.
pub fn compress(
    source_dir: &Path,
    archive_path: &Path,
    suffixes: &[String],
) -> Result<ArchiveSummary, ArchiveError> {
    let archive_file = File::create(archive_path).map_err(|source| ArchiveError::CreateArchive {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut zip = ZipWriter::new(archive_file);

    let listing = fs::read_dir(source_dir).map_err(|source| ArchiveError::ListSource {
        path: source_dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|source| ArchiveError::ListSource {
            path: source_dir.to_path_buf(),
            source,
        })?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!(entry = ?entry.file_name(), "Skipping non UTF-8 file name");
            continue;
        };
        if !has_source_suffix(&name, suffixes) {
            continue;
        }
        candidates.push((name, entry.path()));
    }
    candidates.sort();

    let mut entries = Vec::with_capacity(candidates.len());
    for (name, path) in candidates {
        let metadata = fs::metadata(&path).map_err(|source| ArchiveError::ReadFile {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            debug!(path = %path.display(), "Skipping non-file entry");
            continue;
        }

        let mut file = File::open(&path).map_err(|source| ArchiveError::ReadFile {
            path: path.clone(),
            source,
        })?;

        let options = entry_options(&metadata);
        zip.start_file(name.as_str(), options)
            .map_err(|source| ArchiveError::Zip {
                path: archive_path.to_path_buf(),
                source,
            })?;
        io::copy(&mut file, &mut zip).map_err(|source| ArchiveError::WriteEntry {
            path: path.clone(),
            source,
        })?;
        debug!(entry = %name, bytes = metadata.len(), "Added file to archive");
        entries.push(name);
    }

    zip.finish().map_err(|source| ArchiveError::Zip {
        path: archive_path.to_path_buf(),
        source,
    })?;

    let size = fs::metadata(archive_path)
        .map_err(|source| ArchiveError::ReadFile {
            path: archive_path.to_path_buf(),
            source,
        })?
        .len();

    info!(
        source_dir = %source_dir.display(),
        archive = %archive_path.display(),
        entries = entries.len(),
        size,
        "Archive written"
    );

    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        entries,
        size,
    })
}

/// [`compress`] on the blocking thread pool.
pub async fn spawn_compress(
    source_dir: PathBuf,
    archive_path: PathBuf,
    suffixes: Vec<String>,
) -> Result<ArchiveSummary, ArchiveError> {
    tokio::task::spawn_blocking(move || compress(&source_dir, &archive_path, &suffixes)).await?
}

#[cfg(unix)]
fn entry_options(metadata: &fs::Metadata) -> FileOptions {
    use std::os::unix::fs::PermissionsExt;

    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn entry_options(_metadata: &fs::Metadata) -> FileOptions {
    FileOptions::default().compression_method(CompressionMethod::Deflated)
}
