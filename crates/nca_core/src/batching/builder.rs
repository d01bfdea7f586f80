use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nca_logging::{nca_debug, nca_info, nca_warn};

use super::queue::{IssueQueue, QueuedIssue};
use crate::schema::{parse_raw_date, WorkflowStep};
use crate::workflow::IssueRecord;

/// Size and age rules for batch assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingLimits {
    pub min_pages: u32,
    pub max_pages: u32,
    /// Days past publication after which a small queue is batched anyway.
    pub long_wait_days: i64,
    /// Extra days an embargoed title must wait before going live.
    pub embargo_days: i64,
}

impl Default for PackingLimits {
    fn default() -> Self {
        PackingLimits {
            min_pages: 10_000,
            max_pages: 20_000,
            long_wait_days: 30,
            embargo_days: 0,
        }
    }
}

/// A workflow issue that passed the readiness filter, with its MARC org code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyIssue {
    pub marc_org_code: String,
    pub issue: QueuedIssue,
}

/// Issues picked for one new batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBatch {
    pub marc_org_code: String,
    pub issues: Vec<QueuedIssue>,
    pub pages: u32,
}

/// Filters workflow rows down to what may be batched right now.
///
/// Only rows in `step` with no batch and a valid date qualify. `embargoed`
/// answers whether a title (by LCCN) is embargoed, or `None` for a title the
/// database does not know.
pub fn find_ready_issues<F>(
    records: &[IssueRecord],
    step: WorkflowStep,
    embargoed: F,
    limits: &PackingLimits,
    now: DateTime<Utc>,
) -> Vec<ReadyIssue>
where
    F: Fn(&str) -> Option<bool>,
{
    let mut ready = Vec::new();
    for record in records {
        if record.workflow_step != step || record.batch_id != 0 || record.ignored {
            continue;
        }
        let key = record.key();
        let Some(date) = parse_raw_date(&record.date) else {
            nca_warn!("Issue {} ({key}) has an invalid date {:?}", record.id, record.date);
            continue;
        };
        let Some(is_embargoed) = embargoed(&record.lccn) else {
            nca_warn!("Issue {} ({key}) has an LCCN with no database title", record.id);
            continue;
        };

        let published = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()).unwrap_or(now);
        let mut days_stale = (now - published).num_hours() / 24;
        if is_embargoed {
            days_stale -= limits.embargo_days;
            if days_stale < 0 {
                nca_info!("Skipping {key} (embargoed)");
                continue;
            }
        }

        nca_debug!("Adding {key} to batch queue");
        ready.push(ReadyIssue {
            marc_org_code: record.marc_org_code.clone(),
            issue: QueuedIssue {
                id: record.id,
                key,
                pages: record.pages(),
                days_stale,
                approved_at: record.metadata_approved_at,
            },
        });
    }
    ready
}

/// Round-robin batch assembly over per-MOC queues.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    limits: PackingLimits,
    moc_list: Vec<String>,
    queues: HashMap<String, IssueQueue>,
    cursor: usize,
}

impl BatchBuilder {
    pub fn new(limits: PackingLimits) -> Self {
        BatchBuilder {
            limits,
            moc_list: Vec::new(),
            queues: HashMap::new(),
            cursor: 0,
        }
    }

    pub fn push(&mut self, ready: ReadyIssue) {
        let ReadyIssue { marc_org_code, issue } = ready;
        if issue.pages > self.limits.max_pages {
            nca_warn!(
                "Issue {} has {} pages, more than a whole batch ({}); it cannot be batched",
                issue.key,
                issue.pages,
                self.limits.max_pages
            );
        }
        let long_wait_days = self.limits.long_wait_days;
        let queue = self.queues.entry(marc_org_code.clone()).or_insert_with(|| {
            self.moc_list.push(marc_org_code);
            IssueQueue::new(long_wait_days)
        });
        queue.append(issue);
    }

    pub fn extend(&mut self, ready: impl IntoIterator<Item = ReadyIssue>) {
        for issue in ready {
            self.push(issue);
        }
    }

    pub fn queued_pages(&self, moc: &str) -> u32 {
        self.queues.get(moc).map_or(0, IssueQueue::pages)
    }

    /// Picks the next batch, visiting MOCs in turn starting after the one that
    /// produced the previous batch. A MOC whose next split is too small (and
    /// not long-waiting) keeps its issues and is skipped. `None` once no MOC
    /// can produce a batch.
    pub fn next_batch(&mut self) -> Option<PackedBatch> {
        let count = self.moc_list.len();
        for offset in 0..count {
            let idx = (self.cursor + offset) % count;
            let moc = &self.moc_list[idx];
            let Some(queue) = self.queues.get_mut(moc) else {
                continue;
            };
            if queue.is_empty() {
                continue;
            }

            let long_wait = queue.long_wait();
            let popped = queue.split_queue(self.limits.max_pages);
            let big_enough = popped.pages() >= self.limits.min_pages;
            if popped.is_empty() || !(big_enough || long_wait) {
                nca_debug!(
                    "Queue {moc:?}: {} pages is too small for a batch; deferring",
                    popped.pages()
                );
                queue.restore(popped);
                continue;
            }

            if !big_enough {
                nca_info!(
                    "Queue {moc:?}: pushing {} pages due to age",
                    popped.pages()
                );
            }

            let batch = PackedBatch {
                marc_org_code: moc.clone(),
                pages: popped.pages(),
                issues: popped.into_issues(),
            };
            self.cursor = (idx + 1) % count;
            return Some(batch);
        }
        None
    }
}
