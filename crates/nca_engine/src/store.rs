//! The workflow database as seen by the engine.
//!
//! The application's relational database is an external collaborator; the
//! engine talks to it through [`WorkflowStore`]. [`MemoryStore`] keeps
//! everything in process and backs the binary and the tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use nca_core::workflow::IssueRecord;
use nca_core::{Title, WorkflowStep};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// A title row. `sftp_dir` is the alias its uploads arrive under.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DbTitle {
    pub lccn: String,
    pub name: String,
    #[serde(default)]
    pub place_of_publication: String,
    #[serde(default)]
    pub sftp_dir: String,
    #[serde(default)]
    pub embargoed: bool,
}

impl DbTitle {
    pub fn to_title(&self, location: impl Into<String>) -> Title {
        let mut title = Title::new(&self.lccn, &self.name, location);
        title.place_of_publication = self.place_of_publication.clone();
        title
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbBatch {
    pub id: i64,
    pub marc_org_code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub issue_ids: Vec<i64>,
}

/// Database titles, resolvable by SFTP alias or LCCN.
#[derive(Debug, Clone, Default)]
pub struct TitleCatalog {
    titles: Vec<DbTitle>,
}

impl TitleCatalog {
    pub fn new(titles: Vec<DbTitle>) -> Self {
        Self { titles }
    }

    /// Directory alias wins over LCCN.
    pub fn find(&self, name: &str) -> Option<&DbTitle> {
        self.titles
            .iter()
            .find(|t| !t.sftp_dir.is_empty() && t.sftp_dir == name)
            .or_else(|| self.find_lccn(name))
    }

    pub fn find_lccn(&self, lccn: &str) -> Option<&DbTitle> {
        self.titles.iter().find(|t| t.lccn == lccn)
    }

    /// `None` for an LCCN the database doesn't know.
    pub fn embargoed(&self, lccn: &str) -> Option<bool> {
        self.find_lccn(lccn).map(|t| t.embargoed)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

pub trait WorkflowStore: Send + Sync {
    fn titles(&self) -> Result<Vec<DbTitle>, StoreError>;

    fn marc_org_codes(&self) -> Result<Vec<String>, StoreError>;

    fn issue(&self, id: i64) -> Result<Option<IssueRecord>, StoreError>;

    /// Every issue row, ignored ones included.
    fn issues(&self) -> Result<Vec<IssueRecord>, StoreError>;

    fn issues_in_step(&self, step: WorkflowStep) -> Result<Vec<IssueRecord>, StoreError>;

    /// Inserts a new row and returns its id. A nonzero `id` is ignored.
    fn create_issue(&self, issue: IssueRecord) -> Result<i64, StoreError>;

    fn save_issue(&self, issue: &IssueRecord) -> Result<(), StoreError>;

    /// Removes a row created moments ago whose follow-up work failed.
    fn delete_issue(&self, id: i64) -> Result<(), StoreError>;

    /// Id the next created batch will get.
    fn reserve_batch_id(&self) -> Result<i64, StoreError>;

    fn batch_count(&self) -> Result<u32, StoreError>;

    /// Stores the batch and every member issue in one step: either all rows
    /// are written or none are.
    fn create_batch(&self, batch: DbBatch, issues: &[IssueRecord]) -> Result<(), StoreError>;

    fn batch(&self, id: i64) -> Result<Option<DbBatch>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    titles: Vec<DbTitle>,
    mocs: Vec<String>,
    issues: BTreeMap<i64, IssueRecord>,
    batches: BTreeMap<i64, DbBatch>,
    next_issue_id: i64,
    next_batch_id: i64,
}

/// In-process store guarded by one mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(titles: Vec<DbTitle>, mocs: Vec<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                titles,
                mocs,
                next_issue_id: 1,
                next_batch_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WorkflowStore for MemoryStore {
    fn titles(&self) -> Result<Vec<DbTitle>, StoreError> {
        Ok(self.lock().titles.clone())
    }

    fn marc_org_codes(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().mocs.clone())
    }

    fn issue(&self, id: i64) -> Result<Option<IssueRecord>, StoreError> {
        Ok(self.lock().issues.get(&id).cloned())
    }

    fn issues(&self) -> Result<Vec<IssueRecord>, StoreError> {
        Ok(self.lock().issues.values().cloned().collect())
    }

    fn issues_in_step(&self, step: WorkflowStep) -> Result<Vec<IssueRecord>, StoreError> {
        Ok(self
            .lock()
            .issues
            .values()
            .filter(|i| i.workflow_step == step)
            .cloned()
            .collect())
    }

    fn create_issue(&self, mut issue: IssueRecord) -> Result<i64, StoreError> {
        let mut state = self.lock();
        let id = state.next_issue_id.max(1);
        state.next_issue_id = id + 1;
        issue.id = id;
        state.issues.insert(id, issue);
        Ok(id)
    }

    fn save_issue(&self, issue: &IssueRecord) -> Result<(), StoreError> {
        let mut state = self.lock();
        match state.issues.get_mut(&issue.id) {
            Some(row) => {
                *row = issue.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "issue",
                id: issue.id,
            }),
        }
    }

    fn delete_issue(&self, id: i64) -> Result<(), StoreError> {
        match self.lock().issues.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { kind: "issue", id }),
        }
    }

    fn reserve_batch_id(&self) -> Result<i64, StoreError> {
        let mut state = self.lock();
        let id = state.next_batch_id.max(1);
        state.next_batch_id = id + 1;
        Ok(id)
    }

    fn batch_count(&self) -> Result<u32, StoreError> {
        Ok(self.lock().batches.len() as u32)
    }

    fn create_batch(&self, batch: DbBatch, issues: &[IssueRecord]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.batches.contains_key(&batch.id) {
            return Err(StoreError::Conflict(format!("batch {} already exists", batch.id)));
        }

        let members: HashSet<i64> = batch.issue_ids.iter().copied().collect();
        for issue in issues {
            let Some(row) = state.issues.get(&issue.id) else {
                return Err(StoreError::NotFound {
                    kind: "issue",
                    id: issue.id,
                });
            };
            if !members.contains(&issue.id) || issue.batch_id != batch.id {
                return Err(StoreError::Conflict(format!(
                    "issue {} is not assigned to batch {}",
                    issue.id, batch.id
                )));
            }
            if row.batch_id != 0 {
                return Err(StoreError::Conflict(format!(
                    "issue {} already belongs to batch {}",
                    issue.id, row.batch_id
                )));
            }
        }

        for issue in issues {
            state.issues.insert(issue.id, issue.clone());
        }
        state.batches.insert(batch.id, batch);
        Ok(())
    }

    fn batch(&self, id: i64) -> Result<Option<DbBatch>, StoreError> {
        Ok(self.lock().batches.get(&id).cloned())
    }
}
