//! In-process stand-in for the external move job: relocates queued uploads
//! into the workflow tree and marks them processed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use nca_core::schema::{date_edition, parse_raw_date};
use nca_core::workflow::IssueRecord;
use nca_logging::{nca_error, nca_info};
use thiserror::Error;
use walkdir::WalkDir;

use crate::service::{MemoryJobQueue, WorkflowService};

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("destination {0} already exists")]
    Exists(PathBuf),
    #[error("issue {0} has an invalid date")]
    InvalidDate(i64),
    #[error("unable to move {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> MoveError + '_ {
    move |source| MoveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `<moc>-<lccn>-<YYYYMMDDEE>-<id>`. Rows sharing an issue key still get
/// their own folders.
pub fn workflow_subdir(issue: &IssueRecord) -> Result<String, MoveError> {
    let date = parse_raw_date(&issue.date).ok_or(MoveError::InvalidDate(issue.id))?;
    Ok(format!(
        "{}-{}-{}-{}",
        issue.marc_org_code,
        issue.lccn,
        date_edition(date, issue.edition),
        issue.id
    ))
}

/// Copies the issue folder to a hidden work-in-progress folder, removes the
/// original and renames the copy into place. Returns the new location.
pub fn move_issue(workflow_path: &Path, issue: &IssueRecord) -> Result<PathBuf, MoveError> {
    let subdir = workflow_subdir(issue)?;
    let target = workflow_path.join(&subdir);
    if target.exists() {
        return Err(MoveError::Exists(target));
    }
    let wip = workflow_path.join(format!(".wip-{subdir}"));
    let source = Path::new(&issue.location);

    copy_dir(source, &wip)?;
    fs::remove_dir_all(source).map_err(io_error(source))?;
    fs::rename(&wip, &target).map_err(io_error(&wip))?;
    Ok(target)
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), MoveError> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|err| MoveError::Io {
            path: err.path().unwrap_or(from).to_path_buf(),
            source: err.into(),
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(io_error(&dest))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(io_error(entry.path()))?;
        }
    }
    Ok(())
}

pub struct IssueMover {
    workflow_path: PathBuf,
}

impl IssueMover {
    pub fn new(workflow_path: impl Into<PathBuf>) -> Self {
        Self {
            workflow_path: workflow_path.into(),
        }
    }

    /// Moves every pending issue. A failed move is logged and dropped; the
    /// issue stays in `AwaitingProcessing` for an operator to look at.
    pub fn run(&self, service: &WorkflowService, jobs: &MemoryJobQueue, now: DateTime<Utc>) -> usize {
        let mut moved = 0;
        for id in jobs.take_pending() {
            let issue = match service.issue(id) {
                Ok(issue) => issue,
                Err(denial) => {
                    nca_error!("Move job for issue {id} failed: {denial}");
                    continue;
                }
            };
            let location = match move_issue(&self.workflow_path, &issue) {
                Ok(location) => location,
                Err(err) => {
                    nca_error!("Move job for issue {id} failed: {err}");
                    continue;
                }
            };
            match service.complete_move(id, &location, now) {
                Ok(_) => {
                    nca_info!("Moved issue {id} to {}", location.display());
                    moved += 1;
                }
                Err(denial) => nca_error!("Issue {id} moved but not updated: {denial}"),
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queued(id: i64, location: &Path) -> IssueRecord {
        IssueRecord {
            id,
            marc_org_code: "oru".into(),
            lccn: "sn12345678".into(),
            date: "2020-01-02".into(),
            edition: 1,
            location: location.to_string_lossy().into_owned(),
            ..IssueRecord::default()
        }
    }

    #[test]
    fn folder_names_carry_org_code_key_and_id() {
        let issue = queued(17, Path::new("/uploads/x"));
        assert_eq!(workflow_subdir(&issue).unwrap(), "oru-sn12345678-2020010201-17");

        let mut undated = issue;
        undated.date = "2020-13-01".into();
        assert!(matches!(workflow_subdir(&undated), Err(MoveError::InvalidDate(17))));
    }

    #[test]
    fn rows_with_the_same_key_move_side_by_side() {
        let temp = TempDir::new().unwrap();
        let workflow = temp.path().join("workflow");
        fs::create_dir_all(&workflow).unwrap();
        let first_dir = temp.path().join("upload-a");
        let second_dir = temp.path().join("upload-b");
        for dir in [&first_dir, &second_dir] {
            fs::create_dir_all(dir).unwrap();
            fs::write(dir.join("0001.pdf"), b"page").unwrap();
        }

        let first = move_issue(&workflow, &queued(1, &first_dir)).unwrap();
        let second = move_issue(&workflow, &queued(2, &second_dir)).unwrap();

        assert_eq!(first, workflow.join("oru-sn12345678-2020010201-1"));
        assert_eq!(second, workflow.join("oru-sn12345678-2020010201-2"));
        assert!(second.join("0001.pdf").is_file());
        assert!(!first_dir.exists());

        let again = move_issue(&workflow, &queued(2, &second_dir));
        assert!(again.is_err());
    }
}
