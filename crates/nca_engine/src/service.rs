//! Workflow actions against the database.
//!
//! Each action loads the stored record, applies a [`Workflow`] transition to
//! a copy and saves the copy. A refused action or a failed save leaves the
//! stored record untouched.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use nca_core::schema::parse_raw_date;
use nca_core::workflow::{validate_metadata, Denial, IssueRecord, MetadataContext, User, Workflow};
use nca_core::{ErrorList, IssueId, WorkflowStep};
use nca_logging::{nca_debug, nca_error, nca_info, nca_warn};

use crate::lastmod;
use crate::scanner::Scanner;
use crate::store::{StoreError, WorkflowStore};
use crate::uploads::UploadedIssues;

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub claim_duration: Duration,
    /// How long a page-review folder must sit untouched before it moves on.
    pub page_review_quiet: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            claim_duration: Duration::days(7),
            page_review_quiet: Duration::hours(1),
        }
    }
}

/// Receives move jobs for newly queued uploads.
pub trait JobQueue: Send + Sync {
    fn queue_move(&self, issue: &IssueRecord) -> Result<(), StoreError>;
}

/// Keeps queued moves in memory until a job runner takes them.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    pending: Mutex<VecDeque<i64>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue ids waiting for a move, oldest first.
    pub fn take_pending(&self) -> Vec<i64> {
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.drain(..).collect()
    }
}

impl JobQueue for MemoryJobQueue {
    fn queue_move(&self, issue: &IssueRecord) -> Result<(), StoreError> {
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.push_back(issue.id);
        Ok(())
    }
}

/// Curator-editable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub date: String,
    pub date_as_labeled: String,
    pub volume: String,
    pub issue_number: String,
    pub edition: u32,
    pub edition_label: String,
    pub page_labels: Vec<String>,
    pub draft_comment: String,
}

impl MetadataUpdate {
    fn apply(self, issue: &mut IssueRecord) {
        issue.date = self.date;
        issue.date_as_labeled = self.date_as_labeled;
        issue.volume = self.volume;
        issue.issue_number = self.issue_number;
        issue.edition = self.edition;
        issue.edition_label = self.edition_label;
        issue.page_labels = self.page_labels;
        issue.draft_comment = self.draft_comment;
    }
}

fn store_failure(action: &str, id: i64, err: &StoreError) -> Denial {
    nca_error!("Database failure during {action} on issue {id}: {err}");
    Denial::internal("unable to save changes; try again or contact the system administrator")
}

pub struct WorkflowService {
    store: Arc<dyn WorkflowStore>,
    jobs: Arc<dyn JobQueue>,
    uploads: Arc<UploadedIssues>,
    scanner: Arc<Scanner>,
    workflow: Workflow,
    settings: WorkflowSettings,
    transitions: Mutex<()>,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        jobs: Arc<dyn JobQueue>,
        uploads: Arc<UploadedIssues>,
        scanner: Arc<Scanner>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            jobs,
            uploads,
            scanner,
            workflow: Workflow::new(settings.claim_duration),
            settings,
            transitions: Mutex::new(()),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.transitions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, action: &str, id: i64) -> Result<IssueRecord, Denial> {
        match self.store.issue(id) {
            Ok(Some(issue)) => Ok(issue),
            Ok(None) => Err(Denial::not_found(format!("issue {id} not found"))),
            Err(err) => Err(store_failure(action, id, &err)),
        }
    }

    /// Load, transition a copy, save. Transitions are serialized so two
    /// users racing on one issue see each other's writes.
    fn transition<F>(&self, action: &str, id: i64, apply: F) -> Result<IssueRecord, Denial>
    where
        F: FnOnce(&mut IssueRecord) -> Result<(), Denial>,
    {
        let _guard = self.lock();
        let stored = self.load(action, id)?;
        let mut issue = stored.clone();
        if let Err(denial) = apply(&mut issue) {
            nca_debug!("Refused {action} on issue {id}: {}", denial.message);
            return Err(denial);
        }
        if let Err(err) = self.store.save_issue(&issue) {
            return Err(store_failure(action, id, &err));
        }
        nca_info!(
            "{action} on issue {id} ({}): {} -> {}",
            issue.key(),
            stored.workflow_step,
            issue.workflow_step
        );
        Ok(issue)
    }

    pub fn issue(&self, id: i64) -> Result<IssueRecord, Denial> {
        self.load("lookup", id)
    }

    pub fn claim(&self, user: &User, id: i64, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("claim", id, |issue| self.workflow.claim(user, issue, now))
    }

    pub fn unclaim(&self, user: &User, id: i64, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("unclaim", id, |issue| self.workflow.unclaim(user, issue, now))
    }

    pub fn save_metadata(
        &self,
        user: &User,
        id: i64,
        update: MetadataUpdate,
        now: DateTime<Utc>,
    ) -> Result<IssueRecord, Denial> {
        self.transition("save metadata", id, |issue| {
            self.workflow.save_draft(user, issue, now)?;
            update.apply(issue);
            Ok(())
        })
    }

    pub fn queue_for_review(&self, user: &User, id: i64, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("queue for review", id, |issue| {
            let errors = self.validate(issue)?;
            self.workflow.queue_for_review(user, issue, &errors, now)
        })
    }

    pub fn report_error(
        &self,
        user: &User,
        id: i64,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<IssueRecord, Denial> {
        self.transition("report error", id, |issue| {
            self.workflow.report_error(user, issue, message, now)
        })
    }

    pub fn approve(&self, user: &User, id: i64, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("approve", id, |issue| {
            let errors = self.validate(issue)?;
            self.workflow.approve(user, issue, &errors, now)
        })
    }

    pub fn reject(&self, user: &User, id: i64, notes: &str, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("reject", id, |issue| self.workflow.reject(user, issue, notes, now))
    }

    pub fn return_for_curation(
        &self,
        user: &User,
        id: i64,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<IssueRecord, Denial> {
        self.transition("return for curation", id, |issue| {
            self.workflow.return_for_curation(user, issue, comment, now)
        })
    }

    pub fn return_for_review(
        &self,
        user: &User,
        id: i64,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<IssueRecord, Denial> {
        self.transition("return for review", id, |issue| {
            self.workflow.return_for_review(user, issue, comment, now)
        })
    }

    pub fn remove_from_batch(&self, user: &User, id: i64, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("remove from batch", id, |issue| {
            self.workflow.remove_from_batch(user, issue, now)
        })
    }

    pub fn flag_for_removal(
        &self,
        user: &User,
        id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<IssueRecord, Denial> {
        self.transition("flag for removal", id, |issue| {
            self.workflow.flag_for_removal(user, issue, reason, now)
        })
    }

    /// The move job for an issue finished.
    pub fn finish_processing(&self, id: i64, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("finish processing", id, |issue| {
            self.workflow.finish_processing(issue, now)
        })
    }

    /// The issue's folder now lives at `location`; the move job is done.
    pub fn complete_move(&self, id: i64, location: &Path, now: DateTime<Utc>) -> Result<IssueRecord, Denial> {
        self.transition("finish move", id, |issue| {
            self.workflow.finish_processing(issue, now)?;
            issue.location = location.to_string_lossy().into_owned();
            Ok(())
        })
    }

    /// Moves every page-review issue whose pages are renamed and whose folder
    /// has been left alone on to metadata entry. Returns how many moved.
    pub fn advance_page_reviews(&self, now: DateTime<Utc>) -> Result<usize, Denial> {
        let waiting = self
            .store
            .issues_in_step(WorkflowStep::AwaitingPageReview)
            .map_err(|err| store_failure("page review scan", 0, &err))?;

        let mut moved = 0;
        for issue in waiting {
            let dir = Path::new(&issue.location);
            match lastmod::page_review_ready(dir, self.settings.page_review_quiet, now) {
                Ok(true) => {
                    let finished = self.transition("finish page review", issue.id, |issue| {
                        self.workflow.finish_page_review(issue, now)
                    });
                    match finished {
                        Ok(_) => moved += 1,
                        Err(denial) => nca_error!("Issue {} stays in page review: {denial}", issue.id),
                    }
                }
                Ok(false) => nca_debug!("Issue {} is not ready to leave page review", issue.id),
                Err(err) => nca_warn!("Unable to check page review folder {}: {err}", dir.display()),
            }
        }
        Ok(moved)
    }

    /// Creates the workflow row for an uploaded issue and hands it to the
    /// move job. Returns the new database id.
    pub fn queue_upload(&self, user: &User, id: IssueId, now: DateTime<Utc>) -> Result<i64, Denial> {
        let _queue = self.uploads.queue_lock();
        let snapshot = self.scanner.snapshot();
        let finder = snapshot.finder();
        if id.index() >= finder.issues.len() {
            return Err(Denial::not_found(format!("uploaded issue {} not found", id.0)));
        }
        let issue = finder.issue(id);
        if !issue.workflow_step.is_upload() {
            return Err(Denial::bad_request(format!(
                "issue is not an upload (workflow step: {})",
                issue.workflow_step
            )));
        }

        let errors = self.uploads.queue_errors(&snapshot, id, now);
        if !errors.is_empty() {
            let reasons: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            nca_info!("Issue {} can't be queued: {}", finder.issue_ident(id), reasons.join("; "));
            return Err(Denial::bad_request(format!(
                "issue is not valid for queueing: {}",
                reasons.join("; ")
            )));
        }

        let mut record = IssueRecord {
            marc_org_code: issue.marc_org_code.clone(),
            lccn: finder.issue_lccn(id).to_string(),
            date: issue.raw_date(),
            edition: issue.edition,
            page_count: pdf_pages(&issue.file_names()),
            location: issue.location.clone(),
            workflow_step: issue.workflow_step,
            ..IssueRecord::default()
        };
        self.workflow.queue_upload(user, &mut record, now)?;

        let _guard = self.lock();
        record.id = self
            .store
            .create_issue(record.clone())
            .map_err(|err| store_failure("queue upload", 0, &err))?;
        if let Err(err) = self.jobs.queue_move(&record) {
            let denial = store_failure("queue move job", record.id, &err);
            if let Err(err) = self.store.delete_issue(record.id) {
                nca_error!("Unable to remove unqueued issue {}: {err}", record.id);
            }
            return Err(denial);
        }
        self.uploads.remove_issue(&record.key());
        nca_info!("Queued {} as issue {}", record.key(), record.id);
        Ok(record.id)
    }

    /// Metadata problems for an issue as it stands.
    pub fn validate(&self, issue: &IssueRecord) -> Result<ErrorList, Denial> {
        let ctx = self.metadata_context(issue)?;
        Ok(validate_metadata(issue, &ctx))
    }

    fn metadata_context(&self, issue: &IssueRecord) -> Result<MetadataContext, Denial> {
        let key = issue.key();
        let same_key = self
            .store
            .issues()
            .map_err(|err| store_failure("duplicate check", issue.id, &err))?
            .into_iter()
            .filter(|other| other.id != issue.id && !other.ignored && other.key() == key)
            .map(|other| (other.id, other.workflow_step))
            .collect();

        let snapshot = self.scanner.snapshot();
        let live_duplicate = parse_raw_date(&issue.date)
            .and_then(|date| snapshot.live_issue(&issue.lccn, date, issue.edition))
            .map(|live| snapshot.finder().workflow_identification(live));

        Ok(MetadataContext {
            jp2_count: count_jp2s(Path::new(&issue.location)),
            same_key,
            live_duplicate,
        })
    }
}

/// Scans carry a TIFF master beside each PDF page; only the PDFs count.
fn pdf_pages(names: &[&str]) -> u32 {
    names
        .iter()
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .count() as u32
}

fn count_jp2s(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| {
            Path::new(&entry.file_name())
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jp2"))
        })
        .count()
}
