use chrono::{DateTime, Duration, Utc};

use super::can::{Can, Denial};
use super::privilege::User;
use super::record::{ActionKind, IssueRecord};
use crate::schema::{ErrorList, WorkflowStep};

/// Applies user actions and job completions to an issue record.
///
/// Every method checks first and mutates second: a refused action leaves the
/// record exactly as it was.
#[derive(Debug, Clone, Copy)]
pub struct Workflow {
    claim_duration: Duration,
}

impl Default for Workflow {
    fn default() -> Self {
        Workflow::new(Duration::days(7))
    }
}

fn invalid_metadata(errors: &ErrorList) -> Result<(), Denial> {
    let major = errors.major();
    if major.is_empty() {
        return Ok(());
    }
    let reasons: Vec<&str> = major.iter().map(|e| e.message.as_str()).collect();
    Err(Denial::bad_request(format!(
        "metadata is invalid: {}",
        reasons.join("; ")
    )))
}

impl Workflow {
    pub fn new(claim_duration: Duration) -> Self {
        Workflow { claim_duration }
    }

    pub fn claim_duration(&self) -> Duration {
        self.claim_duration
    }

    pub fn claim(&self, user: &User, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        Can::new(user, now).claim(issue)?;
        issue.claim(user.id, now, self.claim_duration)?;
        issue.record(ActionKind::Claim, user.id, "", now);
        Ok(())
    }

    pub fn unclaim(&self, user: &User, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        Can::new(user, now).unclaim(issue)?;
        issue.unclaim();
        issue.record(ActionKind::Unclaim, user.id, "", now);
        Ok(())
    }

    /// Uploaded issue handed to the job queue for moving into the workflow.
    pub fn queue_upload(&self, user: &User, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        Can::new(user, now).queue_upload(issue)?;
        issue.is_from_scanner = issue.workflow_step == WorkflowStep::ScanUpload;
        issue.workflow_step = WorkflowStep::AwaitingProcessing;
        issue.record(ActionKind::QueueForProcessing, user.id, "", now);
        Ok(())
    }

    /// The move job finished: scans go to page review, born-digital issues
    /// straight to metadata entry.
    pub fn finish_processing(&self, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        if issue.workflow_step != WorkflowStep::AwaitingProcessing {
            return Err(Denial::bad_request(format!(
                "issue is not awaiting processing (workflow step: {})",
                issue.workflow_step
            )));
        }
        issue.workflow_step = if issue.is_from_scanner {
            WorkflowStep::AwaitingPageReview
        } else {
            WorkflowStep::ReadyForMetadataEntry
        };
        issue.record(ActionKind::ProcessingComplete, 0, "", now);
        Ok(())
    }

    /// Pages were renamed and the folder has been left alone long enough.
    pub fn finish_page_review(&self, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        if issue.workflow_step != WorkflowStep::AwaitingPageReview {
            return Err(Denial::bad_request(format!(
                "issue is not awaiting page review (workflow step: {})",
                issue.workflow_step
            )));
        }
        issue.workflow_step = WorkflowStep::ReadyForMetadataEntry;
        issue.record(ActionKind::PageReviewComplete, 0, "", now);
        Ok(())
    }

    /// Saves a draft without leaving the step.
    pub fn save_draft(&self, user: &User, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        Can::new(user, now).enter_metadata(issue)?;
        issue.record(ActionKind::SaveMetadata, user.id, "", now);
        Ok(())
    }

    /// Curator finished entry. A previously rejected issue goes back to the
    /// reviewer who rejected it.
    pub fn queue_for_review(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        validation: &ErrorList,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).enter_metadata(issue)?;
        invalid_metadata(validation)?;

        issue.workflow_step = WorkflowStep::AwaitingMetadataReview;
        issue.metadata_entry_user_id = user.id;
        issue.metadata_entered_at = Some(now);
        issue.unclaim();
        if issue.rejected_by_user_id != 0 {
            issue.claim(issue.rejected_by_user_id, now, self.claim_duration)?;
        }
        let comment = std::mem::take(&mut issue.draft_comment);
        issue.record(ActionKind::QueueForReview, user.id, comment, now);
        Ok(())
    }

    pub fn report_error(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).enter_metadata(issue)?;
        if message.trim().is_empty() {
            return Err(Denial::bad_request("an error report must explain the problem"));
        }
        issue.workflow_step = WorkflowStep::UnfixableMetadataError;
        issue.unclaim();
        issue.record(ActionKind::ReportError, user.id, message, now);
        Ok(())
    }

    pub fn approve(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        validation: &ErrorList,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).review_metadata(issue)?;
        invalid_metadata(validation)?;

        issue.unclaim();
        issue.metadata_approved_at = Some(now);
        issue.reviewed_by_user_id = user.id;
        issue.workflow_step = WorkflowStep::ReadyForBatching;
        issue.record(ActionKind::ApproveMetadata, user.id, "", now);
        Ok(())
    }

    /// Sends the issue back to entry, claimed by whoever entered the metadata.
    pub fn reject(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).review_metadata(issue)?;

        issue.claim(issue.metadata_entry_user_id, now, self.claim_duration)?;
        issue.rejected_by_user_id = user.id;
        issue.workflow_step = WorkflowStep::ReadyForMetadataEntry;
        issue.record(ActionKind::RejectMetadata, user.id, notes, now);
        Ok(())
    }

    pub fn return_for_curation(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).review_unfixable(issue)?;
        issue.unclaim();
        issue.workflow_step = WorkflowStep::ReadyForMetadataEntry;
        issue.record(ActionKind::ReturnForCuration, user.id, comment, now);
        Ok(())
    }

    pub fn return_for_review(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).review_unfixable(issue)?;
        if issue.metadata_entry_user_id == 0 {
            return Err(Denial::bad_request("issue has never had metadata entered"));
        }
        issue.unclaim();
        issue.workflow_step = WorkflowStep::AwaitingMetadataReview;
        issue.record(ActionKind::ReturnForReview, user.id, comment, now);
        Ok(())
    }

    pub fn assign_batch(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        batch_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).generate_batches(issue)?;
        if issue.batch_id != 0 {
            return Err(Denial::bad_request(format!(
                "issue already belongs to batch {}",
                issue.batch_id
            )));
        }
        issue.batch_id = batch_id;
        issue.record(ActionKind::AssignBatch, user.id, format!("batch {batch_id}"), now);
        Ok(())
    }

    pub fn remove_from_batch(&self, user: &User, issue: &mut IssueRecord, now: DateTime<Utc>) -> Result<(), Denial> {
        Can::new(user, now).generate_batches(issue)?;
        if issue.batch_id == 0 {
            return Err(Denial::bad_request("issue is not in a batch"));
        }
        let old = std::mem::take(&mut issue.batch_id);
        issue.record(ActionKind::RemoveFromBatch, user.id, format!("batch {old}"), now);
        Ok(())
    }

    /// A live issue with a problem re-enters the pipeline to be rebatched.
    pub fn flag_for_removal(
        &self,
        user: &User,
        issue: &mut IssueRecord,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        Can::new(user, now).flag_live(issue)?;
        issue.workflow_step = WorkflowStep::ReadyForRebatching;
        issue.batch_id = 0;
        issue.record(ActionKind::FlagForRemoval, user.id, reason, now);
        Ok(())
    }
}
