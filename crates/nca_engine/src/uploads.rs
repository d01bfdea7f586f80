//! Uploaded issues as curators see them: the scanner's upload-tree issues
//! minus anything the workflow database already has in process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use nca_core::{AppError, ErrorList, IssueId};
use nca_logging::{nca_debug, nca_warn};

use crate::lastmod;
use crate::scanner::Snapshot;
use crate::store::{StoreError, WorkflowStore};

#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Minimum time between database reloads.
    pub refresh_interval: Duration,
    /// Consecutive failed reloads before the searcher reports unhealthy.
    pub max_failures: u32,
    /// How long an upload must sit untouched before it may be queued.
    pub quiet_period: chrono::Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            max_failures: 5,
            quiet_period: chrono::Duration::hours(48),
        }
    }
}

#[derive(Debug, Default)]
struct SearchState {
    in_process: HashMap<String, bool>,
    loaded_at: Option<Instant>,
    failures: u32,
}

pub struct UploadedIssues {
    store: Arc<dyn WorkflowStore>,
    settings: UploadSettings,
    state: RwLock<SearchState>,
    queue: Mutex<()>,
}

impl UploadedIssues {
    pub fn new(store: Arc<dyn WorkflowStore>, settings: UploadSettings) -> Self {
        Self {
            store,
            settings,
            state: RwLock::new(SearchState::default()),
            queue: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Reloads the in-process keys unless the last load is recent. Returns
    /// whether a load happened.
    pub fn refresh(&self) -> Result<bool, StoreError> {
        {
            let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if state
                .loaded_at
                .is_some_and(|at| at.elapsed() < self.settings.refresh_interval)
            {
                return Ok(false);
            }
        }
        self.reload().map(|()| true)
    }

    /// Reloads regardless of the interval.
    pub fn reload(&self) -> Result<(), StoreError> {
        let loaded = self.store.issues();
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        match loaded {
            Ok(records) => {
                state.in_process = records
                    .iter()
                    .map(|r| (r.key(), !r.ignored && r.workflow_step.is_in_process()))
                    .collect();
                state.loaded_at = Some(Instant::now());
                state.failures = 0;
                nca_debug!("Loaded {} workflow issue keys", state.in_process.len());
                Ok(())
            }
            Err(err) => {
                state.failures += 1;
                nca_warn!(
                    "Unable to load workflow issues ({} consecutive failures): {err}",
                    state.failures
                );
                Err(err)
            }
        }
    }

    pub fn healthy(&self) -> bool {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.failures < self.settings.max_failures
    }

    pub fn is_in_process(&self, key: &str) -> bool {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.in_process.get(key).copied().unwrap_or(false)
    }

    /// Hides an issue right after it was queued, before the next reload
    /// would notice.
    pub fn remove_issue(&self, key: &str) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.in_process.insert(key.to_string(), true);
    }

    /// Held for the whole of a queue operation.
    pub fn queue_lock(&self) -> MutexGuard<'_, ()> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Upload-tree issues not yet taken into the workflow.
    pub fn visible(&self, snapshot: &Snapshot) -> Vec<IssueId> {
        let finder = snapshot.finder();
        finder
            .issue_ids()
            .filter(|&id| finder.issue(id).workflow_step.is_upload())
            .filter(|&id| {
                finder
                    .issue_key(id)
                    .map_or(true, |key| !self.is_in_process(key.as_str()))
            })
            .collect()
    }

    /// Every reason the issue may not be queued right now.
    pub fn queue_errors(&self, snapshot: &Snapshot, id: IssueId, now: DateTime<Utc>) -> ErrorList {
        let finder = snapshot.finder();
        let issue = finder.issue(id);
        let ident = finder.issue_ident(id);
        let mut errors = issue.errors.clone();
        for file in &issue.files {
            for err in file.errors.iter() {
                errors.push(err.clone());
            }
        }

        match finder.issue_title(id) {
            Some(title) if title.errors.major().is_empty() => {}
            Some(_) => errors.push(AppError::new(format!("{ident}: title has errors"))),
            None => errors.push(AppError::new(format!("{ident}: no title"))),
        }

        if let Some(key) = finder.issue_key(id) {
            if self.is_in_process(key.as_str()) {
                errors.push(AppError::new(format!("{ident}: already queued")));
            }
        }

        let hours = self.settings.quiet_period.num_hours().max(0) as u32;
        match lastmod::is_quiet(Path::new(&issue.location), self.settings.quiet_period, now) {
            Ok(true) => {}
            Ok(false) => errors.push(AppError::too_new(&ident, hours)),
            Err(err) => errors.push(AppError::read_failure(&ident, &err.to_string())),
        }
        errors
    }
}
