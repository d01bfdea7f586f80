#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use nca_core::workflow::{IssueRecord, Role, User};
use nca_core::WorkflowStep;
use nca_engine::{DbBatch, DbTitle, MemoryStore, StoreError, WorkflowStore};

pub const LCCN: &str = "sn12345678";

pub fn daily_blah() -> DbTitle {
    DbTitle {
        lccn: LCCN.into(),
        name: "Daily Blah".into(),
        place_of_publication: "Eugene, Or.".into(),
        sftp_dir: "daily".into(),
        embargoed: false,
    }
}

pub fn user(id: i64, role: Role) -> User {
    User::new(id, format!("user{id}"), vec![role])
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
}

pub fn record(lccn: &str, date: &str, step: WorkflowStep) -> IssueRecord {
    IssueRecord {
        marc_org_code: "oru".into(),
        lccn: lccn.into(),
        date: date.into(),
        edition: 1,
        workflow_step: step,
        ..IssueRecord::default()
    }
}

/// A memory store whose reads or writes can be switched to failing.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    refused_id: AtomicI64,
}

impl FlakyStore {
    pub fn new(titles: Vec<DbTitle>, mocs: Vec<String>) -> Self {
        Self {
            inner: MemoryStore::new(titles, mocs),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            refused_id: AtomicI64::new(0),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Saves of this one issue fail; everything else goes through.
    pub fn fail_saves_for(&self, id: i64) {
        self.refused_id.store(id, Ordering::SeqCst);
    }

    fn read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

impl WorkflowStore for FlakyStore {
    fn titles(&self) -> Result<Vec<DbTitle>, StoreError> {
        self.read()?;
        self.inner.titles()
    }

    fn marc_org_codes(&self) -> Result<Vec<String>, StoreError> {
        self.read()?;
        self.inner.marc_org_codes()
    }

    fn issue(&self, id: i64) -> Result<Option<IssueRecord>, StoreError> {
        self.read()?;
        self.inner.issue(id)
    }

    fn issues(&self) -> Result<Vec<IssueRecord>, StoreError> {
        self.read()?;
        self.inner.issues()
    }

    fn issues_in_step(&self, step: WorkflowStep) -> Result<Vec<IssueRecord>, StoreError> {
        self.read()?;
        self.inner.issues_in_step(step)
    }

    fn create_issue(&self, issue: IssueRecord) -> Result<i64, StoreError> {
        self.write()?;
        self.inner.create_issue(issue)
    }

    fn save_issue(&self, issue: &IssueRecord) -> Result<(), StoreError> {
        self.write()?;
        if issue.id != 0 && issue.id == self.refused_id.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("issue {} is locked", issue.id)));
        }
        self.inner.save_issue(issue)
    }

    fn delete_issue(&self, id: i64) -> Result<(), StoreError> {
        self.write()?;
        self.inner.delete_issue(id)
    }

    fn reserve_batch_id(&self) -> Result<i64, StoreError> {
        self.write()?;
        self.inner.reserve_batch_id()
    }

    fn batch_count(&self) -> Result<u32, StoreError> {
        self.read()?;
        self.inner.batch_count()
    }

    fn create_batch(&self, batch: DbBatch, issues: &[IssueRecord]) -> Result<(), StoreError> {
        self.write()?;
        self.inner.create_batch(batch, issues)
    }

    fn batch(&self, id: i64) -> Result<Option<DbBatch>, StoreError> {
        self.read()?;
        self.inner.batch(id)
    }
}
