//! Last-modified detection for issue folders.
//!
//! Directory timestamps are unreliable once files have been copied around,
//! so each folder gets a `.manifest` listing its files with sizes and
//! checksums. The manifest's creation time is the folder's last change.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use nca_logging::nca_debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::persist::{AtomicFileWriter, PersistError};

pub const MANIFEST_NAME: &str = ".manifest";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to write manifest: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub path: String,
    pub created: DateTime<Utc>,
    pub files: Vec<FileInfo>,
}

impl Manifest {
    /// Same files with the same contents, whenever each was recorded.
    pub fn same_contents(&self, other: &Manifest) -> bool {
        self.files == other.files
    }
}

fn page_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[0-9]{4}\.pdf$").expect("renamed page pattern"))
}

fn read_error(path: &Path) -> impl FnOnce(io::Error) -> ManifestError + '_ {
    move |source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Lists the folder's visible files, sorted by name, with SHA-256 sums.
pub fn build_manifest(dir: &Path, now: DateTime<Utc>) -> Result<Manifest, ManifestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| ManifestError::Read {
            path: err.path().unwrap_or(dir).to_path_buf(),
            source: err.into(),
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.file_type().is_file() {
            continue;
        }
        let bytes = fs::read(entry.path()).map_err(read_error(entry.path()))?;
        files.push(FileInfo {
            path: name,
            size: bytes.len() as u64,
            checksum: format!("{:x}", Sha256::digest(&bytes)),
        });
    }

    Ok(Manifest {
        path: dir.to_string_lossy().into_owned(),
        created: now,
        files,
    })
}

/// The stored manifest, if the folder has one.
pub fn read_manifest(dir: &Path) -> Result<Option<Manifest>, ManifestError> {
    let path = dir.join(MANIFEST_NAME);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ManifestError::Read { path, source }),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| ManifestError::Json { path, source })
}

/// When the folder's contents last changed. A changed or missing manifest
/// is rewritten and `now` returned; a folder that no longer exists also
/// counts as changed just now.
pub fn last_modified(dir: &Path, now: DateTime<Utc>) -> Result<DateTime<Utc>, ManifestError> {
    if !dir.is_dir() {
        return Ok(now);
    }

    let fresh = build_manifest(dir, now)?;
    // An unreadable manifest is replaced like a stale one.
    let stored = read_manifest(dir).unwrap_or(None);
    if let Some(stored) = stored.filter(|m| m.same_contents(&fresh)) {
        return Ok(stored.created);
    }

    let json = serde_json::to_vec_pretty(&fresh).map_err(|source| ManifestError::Json {
        path: dir.join(MANIFEST_NAME),
        source,
    })?;
    AtomicFileWriter::new(dir).write(MANIFEST_NAME, &json)?;
    nca_debug!("Wrote new manifest for {}", dir.display());
    Ok(fresh.created)
}

/// True when nothing in the folder has changed for at least `quiet`.
pub fn is_quiet(dir: &Path, quiet: Duration, now: DateTime<Utc>) -> Result<bool, ManifestError> {
    Ok(now - last_modified(dir, now)? >= quiet)
}

/// Every visible file is a renamed page (`NNNN.pdf`), and there is at
/// least one.
pub fn pages_renamed(dir: &Path) -> Result<bool, ManifestError> {
    let mut pages = 0;
    for entry in fs::read_dir(dir).map_err(read_error(dir))? {
        let entry = entry.map_err(read_error(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        if !page_pattern().is_match(&name) {
            nca_debug!("{} not ready: {name:?} is not a renamed page", dir.display());
            return Ok(false);
        }
        pages += 1;
    }
    Ok(pages > 0)
}

/// A page-review folder may move on once its pages are renamed and nobody
/// has touched it for the quiet period.
pub fn page_review_ready(dir: &Path, quiet: Duration, now: DateTime<Utc>) -> Result<bool, ManifestError> {
    if !dir.is_dir() || !pages_renamed(dir)? {
        return Ok(false);
    }
    is_quiet(dir, quiet, now)
}
