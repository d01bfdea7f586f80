//! Binary snapshot of a Finder so a restarted service has data before its
//! first scan pass finishes.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use nca_core::{
    AppError, Batch, BatchId, ErrorList, File, Finder, FinderError, Issue, IssueId, Title,
    TitleId, WorkflowStep,
};
use nca_logging::nca_debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump whenever a cached struct changes shape.
pub const CACHE_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cache io error: {0}")]
    Io(#[from] io::Error),
    #[error("cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("cache version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("corrupt cache: {0}")]
    Corrupt(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedFinder {
    version: u32,
    titles: Vec<CachedTitle>,
    batches: Vec<CachedBatch>,
    issues: Vec<CachedIssue>,
    errors: Vec<CachedError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedTitle {
    lccn: String,
    name: String,
    place_of_publication: String,
    location: String,
    errors: ErrorList,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedBatch {
    marc_org_code: String,
    keyword: String,
    version: u32,
    location: String,
    errors: ErrorList,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedFile {
    location: String,
    errors: ErrorList,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedIssue {
    title: Option<u32>,
    batch: Option<u32>,
    date: NaiveDate,
    edition: u32,
    marc_org_code: String,
    location: String,
    workflow_step: WorkflowStep,
    files: Vec<CachedFile>,
    errors: ErrorList,
    database_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedError {
    location: String,
    error: AppError,
    batch: Option<u32>,
    title: Option<u32>,
    issue: Option<u32>,
}

impl CachedFinder {
    fn from_finder(finder: &Finder) -> Self {
        Self {
            version: CACHE_VERSION,
            titles: finder
                .titles
                .iter()
                .map(|t| CachedTitle {
                    lccn: t.lccn.clone(),
                    name: t.name.clone(),
                    place_of_publication: t.place_of_publication.clone(),
                    location: t.location.clone(),
                    errors: t.errors.clone(),
                })
                .collect(),
            batches: finder
                .batches
                .iter()
                .map(|b| CachedBatch {
                    marc_org_code: b.marc_org_code.clone(),
                    keyword: b.keyword.clone(),
                    version: b.version,
                    location: b.location.clone(),
                    errors: b.errors.clone(),
                })
                .collect(),
            issues: finder
                .issues
                .iter()
                .map(|i| CachedIssue {
                    title: i.title.map(|t| t.0),
                    batch: i.batch.map(|b| b.0),
                    date: i.date,
                    edition: i.edition,
                    marc_org_code: i.marc_org_code.clone(),
                    location: i.location.clone(),
                    workflow_step: i.workflow_step,
                    files: i
                        .files
                        .iter()
                        .map(|f| CachedFile {
                            location: f.location.clone(),
                            errors: f.errors.clone(),
                        })
                        .collect(),
                    errors: i.errors.clone(),
                    database_id: i.database_id,
                })
                .collect(),
            errors: finder
                .errors
                .iter()
                .map(|e| CachedError {
                    location: e.location.clone(),
                    error: e.error.clone(),
                    batch: e.batch.map(|b| b.0),
                    title: e.title.map(|t| t.0),
                    issue: e.issue.map(|i| i.0),
                })
                .collect(),
        }
    }

    /// Rebuilds the arenas in id order so every stored id still points at
    /// the same entity.
    fn into_finder(self) -> Result<Finder, SnapshotError> {
        let title_count = self.titles.len() as u32;
        let batch_count = self.batches.len() as u32;
        let issue_count = self.issues.len() as u32;
        let check = |kind: &str, id: Option<u32>, count: u32| match id {
            Some(id) if id >= count => Err(SnapshotError::Corrupt(format!(
                "{kind} id {id} out of range ({count} stored)"
            ))),
            _ => Ok(()),
        };

        let mut finder = Finder::new();
        for t in self.titles {
            let mut title = Title::new(t.lccn, t.name, t.location);
            title.place_of_publication = t.place_of_publication;
            title.errors = t.errors;
            finder.add_title(title);
        }
        for b in self.batches {
            finder.add_batch(Batch {
                marc_org_code: b.marc_org_code,
                keyword: b.keyword,
                version: b.version,
                location: b.location,
                errors: b.errors,
                ..Batch::default()
            });
        }
        for i in self.issues {
            check("title", i.title, title_count)?;
            check("batch", i.batch, batch_count)?;
            let mut issue = Issue::new(i.date, i.edition, i.location, i.workflow_step);
            issue.title = i.title.map(TitleId);
            issue.batch = i.batch.map(BatchId);
            issue.marc_org_code = i.marc_org_code;
            issue.files = i
                .files
                .into_iter()
                .map(|f| {
                    let mut file = File::new(f.location);
                    file.errors = f.errors;
                    file
                })
                .collect();
            issue.errors = i.errors;
            issue.database_id = i.database_id;
            finder.add_issue(issue);
        }
        for e in self.errors {
            check("title", e.title, title_count)?;
            check("batch", e.batch, batch_count)?;
            check("issue", e.issue, issue_count)?;
            finder.push_error(FinderError {
                location: e.location,
                error: e.error,
                batch: e.batch.map(BatchId),
                title: e.title.map(TitleId),
                issue: e.issue.map(IssueId),
            });
        }
        finder.aggregate();
        Ok(finder)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `<path>.tmp`, keeps a `<path>.bak` of the previous file while
/// the new one is renamed into place, then drops the backup.
pub fn serialize(finder: &Finder, path: &Path) -> Result<(), SnapshotError> {
    let encoded = bincode::serialize(&CachedFinder::from_finder(finder))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = with_suffix(path, ".tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(&encoded)?;
    file.sync_all()?;
    drop(file);

    let bak = with_suffix(path, ".bak");
    if path.exists() {
        fs::copy(path, &bak)?;
    }
    fs::rename(&tmp, path)?;
    match fs::remove_file(&bak) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    nca_debug!(
        "Wrote finder cache {} ({} issues, {} bytes)",
        path.display(),
        finder.issues.len(),
        encoded.len()
    );
    Ok(())
}

/// A missing file is an empty Finder, not an error.
pub fn deserialize(path: &Path) -> Result<Finder, SnapshotError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Finder::new()),
        Err(err) => return Err(err.into()),
    };

    // The version is the first field, so it decodes on its own even when
    // the rest of the layout has changed.
    let found: u32 = bincode::deserialize(&bytes)?;
    if found != CACHE_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: CACHE_VERSION,
            found,
        });
    }

    let cached: CachedFinder = bincode::deserialize(&bytes)?;
    cached.into_finder()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_issue(title: Option<u32>) -> CachedIssue {
        CachedIssue {
            title,
            batch: None,
            date: NaiveDate::from_ymd_opt(2001, 2, 3).unwrap(),
            edition: 1,
            marc_org_code: "oru".into(),
            location: "/sftp/daily/2001-02-03".into(),
            workflow_step: WorkflowStep::SftpUpload,
            files: Vec::new(),
            errors: ErrorList::new(),
            database_id: 0,
        }
    }

    fn cached(issues: Vec<CachedIssue>, errors: Vec<CachedError>) -> CachedFinder {
        CachedFinder {
            version: CACHE_VERSION,
            titles: vec![CachedTitle {
                lccn: "sn12345678".into(),
                name: "Daily Blah".into(),
                place_of_publication: String::new(),
                location: "/sftp/daily".into(),
                errors: ErrorList::new(),
            }],
            batches: Vec::new(),
            issues,
            errors,
        }
    }

    #[test]
    fn issue_pointing_past_the_titles_is_corrupt() {
        let err = cached(vec![sample_issue(Some(4))], Vec::new())
            .into_finder()
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt(msg) if msg.contains("title id 4")));
    }

    #[test]
    fn error_pointing_past_the_issues_is_corrupt() {
        let error = CachedError {
            location: "/sftp/daily/2001-02-03".into(),
            error: AppError::new("bad"),
            batch: None,
            title: Some(0),
            issue: Some(1),
        };
        let err = cached(vec![sample_issue(Some(0))], vec![error])
            .into_finder()
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt(msg) if msg.contains("issue id 1")));
    }

    #[test]
    fn rebuilt_issues_are_linked_back_into_titles() {
        let finder = cached(vec![sample_issue(Some(0)), sample_issue(None)], Vec::new())
            .into_finder()
            .unwrap();
        assert_eq!(finder.titles[0].issues, vec![IssueId(0)]);
        assert_eq!(finder.issues[1].title, None);
    }
}
