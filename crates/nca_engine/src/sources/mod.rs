//! Issue discovery. Each source adds what it finds to one shared
//! [`ScanContext`]; the scanner runs the enabled sources in order.

mod disk_batches;
mod in_process;
mod scans;
mod sftp;
mod validate;
mod web;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use nca_core::{AppError, Finder, FinderError, LookupError, Title, TitleId, WorkflowStep};
use thiserror::Error;
use walkdir::WalkDir;

use crate::httpcache::HttpError;
use crate::store::{StoreError, TitleCatalog};

pub use disk_batches::find_disk_batches;
pub use in_process::find_in_process_issues;
pub use scans::find_scanned_issues;
pub use sftp::find_sftp_issues;
pub use validate::{collect_issue_files, FileRules};
pub use web::find_web_batches;

/// A whole source could not be enumerated.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid web root {0:?}")]
    InvalidWebRoot(String),
    #[error("unable to load {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: HttpError,
    },
    #[error("invalid JSON in {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to query the workflow database: {0}")]
    Store(#[from] StoreError),
    #[error("unable to index scanned issues: {0}")]
    Lookup(#[from] LookupError),
}

/// The Finder under construction plus what the sources need to share:
/// titles already created (by location) and the database title list.
pub struct ScanContext {
    finder: Finder,
    catalog: TitleCatalog,
    titles_by_location: HashMap<String, TitleId>,
}

impl ScanContext {
    pub fn new(catalog: TitleCatalog) -> Self {
        Self {
            finder: Finder::new(),
            catalog,
            titles_by_location: HashMap::new(),
        }
    }

    pub fn finder(&self) -> &Finder {
        &self.finder
    }

    pub fn finder_mut(&mut self) -> &mut Finder {
        &mut self.finder
    }

    pub fn catalog(&self) -> &TitleCatalog {
        &self.catalog
    }

    pub fn into_finder(self) -> Finder {
        self.finder
    }

    pub fn title_at(&self, location: &str) -> Option<TitleId> {
        self.titles_by_location.get(location).copied()
    }

    pub fn add_title(&mut self, title: Title) -> TitleId {
        let location = title.location.clone();
        let id = self.finder.add_title(title);
        self.titles_by_location.insert(location, id);
        id
    }

    /// Title for an upload directory named after an SFTP alias or LCCN.
    /// Unknown names still get a title so their issues stay visible.
    pub fn filesystem_title(&mut self, path: &Path) -> TitleId {
        let location = path_string(path);
        if let Some(id) = self.title_at(&location) {
            return id;
        }

        let dir_name = file_name(path);
        if let Some(db_title) = self.catalog.find(&dir_name) {
            let title = db_title.to_title(&location);
            return self.add_title(title);
        }

        let mut title = Title::new(&dir_name, &dir_name, &location);
        title.errors.push(AppError::new(format!(
            "unable to find title {dir_name:?} in database"
        )));
        self.add_title(title)
    }

    /// Title for a database issue, located at its LCCN.
    pub fn database_title(&mut self, lccn: &str) -> Option<TitleId> {
        if let Some(id) = self.title_at(lccn) {
            return Some(id);
        }
        let title = self.catalog.find_lccn(lccn)?.to_title(lccn);
        Some(self.add_title(title))
    }

    pub fn lccn(&self, title: TitleId) -> &str {
        &self.finder.title(title).lccn
    }

    pub fn push_error(&mut self, error: FinderError) {
        self.finder.push_error(error);
    }
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Error prefix for an issue folder that may not have become an issue.
pub(crate) fn folder_ident(step: WorkflowStep, lccn: &str, folder: &str) -> String {
    format!("{step} issue {lccn}/{folder}")
}

/// Immediate, non-hidden subdirectories of `dir`, sorted by name.
pub(crate) fn find_directories(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            ScanError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.file_type().is_dir() && !entry.file_name().to_string_lossy().starts_with('.') {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}
