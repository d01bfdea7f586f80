//! Turns approved issues into batch rows.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nca_core::batching::find_ready_issues;
use nca_core::workflow::{Denial, IssueRecord, Privilege, User, Workflow};
use nca_core::{random_batch_name, BatchBuilder, BatchName, PackingLimits, WorkflowStep};
use nca_logging::{nca_debug, nca_info};
use thiserror::Error;

use crate::store::{DbBatch, StoreError, TitleCatalog, WorkflowStore};

#[derive(Debug, Clone, Default)]
pub struct BatchSettings {
    pub limits: PackingLimits,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch maker database failure: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Forbidden(Denial),
    #[error("unable to add issue {issue} to a batch: {denial}")]
    Denied { issue: i64, denial: Denial },
}

pub struct BatchMaker {
    store: Arc<dyn WorkflowStore>,
    workflow: Workflow,
    settings: BatchSettings,
}

impl BatchMaker {
    pub fn new(store: Arc<dyn WorkflowStore>, workflow: Workflow, settings: BatchSettings) -> Self {
        Self {
            store,
            workflow,
            settings,
        }
    }

    /// Batches approved issues.
    pub fn make_batches(&self, user: &User, now: DateTime<Utc>) -> Result<Vec<DbBatch>, BatchError> {
        self.run(user, WorkflowStep::ReadyForBatching, now)
    }

    /// Batches issues pulled from production for a fix.
    pub fn make_redo_batches(&self, user: &User, now: DateTime<Utc>) -> Result<Vec<DbBatch>, BatchError> {
        self.run(user, WorkflowStep::ReadyForRebatching, now)
    }

    fn run(&self, user: &User, step: WorkflowStep, now: DateTime<Utc>) -> Result<Vec<DbBatch>, BatchError> {
        if !user.permitted_to(Privilege::GenerateBatches) {
            return Err(BatchError::Forbidden(Denial::forbidden("cannot generate batches")));
        }

        let catalog = TitleCatalog::new(self.store.titles()?);
        let records = self.store.issues_in_step(step)?;
        let limits = &self.settings.limits;
        let ready = find_ready_issues(&records, step, |lccn| catalog.embargoed(lccn), limits, now);
        nca_info!("{} of {} {step} issues can be batched", ready.len(), records.len());

        let by_id: HashMap<i64, &IssueRecord> = records.iter().map(|r| (r.id, r)).collect();
        let mut builder = BatchBuilder::new(*limits);
        builder.extend(ready);

        let mut created = Vec::new();
        while let Some(packed) = builder.next_batch() {
            let id = self.store.reserve_batch_id()?;
            let keyword = random_batch_name(id.max(0) as u32);

            let mut members = Vec::with_capacity(packed.issues.len());
            for queued in &packed.issues {
                let record = by_id.get(&queued.id).ok_or(StoreError::NotFound {
                    kind: "issue",
                    id: queued.id,
                })?;
                let mut issue = (*record).clone();
                self.workflow
                    .assign_batch(user, &mut issue, id, now)
                    .map_err(|denial| BatchError::Denied {
                        issue: queued.id,
                        denial,
                    })?;
                members.push(issue);
            }

            let batch = DbBatch {
                id,
                marc_org_code: packed.marc_org_code.clone(),
                name: keyword,
                created_at: now,
                issue_ids: members.iter().map(|issue| issue.id).collect(),
            };
            self.store.create_batch(batch.clone(), &members)?;
            nca_info!(
                "Created {} with {} issues ({} pages)",
                full_name(&batch),
                members.len(),
                packed.pages
            );
            created.push(batch);
        }

        nca_debug!("Batch maker finished: {} batches", created.len());
        Ok(created)
    }
}

/// `batch_<moc>_<keyword>_ver01` for a freshly created batch.
pub fn full_name(batch: &DbBatch) -> String {
    BatchName {
        marc_org_code: batch.marc_org_code.clone(),
        keyword: batch.name.clone(),
        version: 1,
    }
    .fullname()
}
