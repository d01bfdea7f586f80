use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::can::Denial;
use crate::schema::{date_edition, parse_raw_date, WorkflowStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Claim,
    Unclaim,
    QueueForProcessing,
    ProcessingComplete,
    PageReviewComplete,
    SaveMetadata,
    QueueForReview,
    ReportError,
    ApproveMetadata,
    RejectMetadata,
    ReturnForCuration,
    ReturnForReview,
    AssignBatch,
    RemoveFromBatch,
    FlagForRemoval,
}

/// One entry of an issue's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub user_id: i64,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// The persisted workflow row for one issue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: i64,
    pub marc_org_code: String,
    pub lccn: String,
    /// `YYYY-MM-DD` as entered by the curator; may be invalid until reviewed.
    pub date: String,
    pub date_as_labeled: String,
    pub volume: String,
    pub issue_number: String,
    pub edition: u32,
    pub edition_label: String,
    pub page_labels: Vec<String>,
    pub page_count: u32,
    pub batch_id: i64,
    pub location: String,
    pub is_from_scanner: bool,
    pub workflow_step: WorkflowStep,
    pub workflow_owner_id: i64,
    pub workflow_owner_expires_at: Option<DateTime<Utc>>,
    pub metadata_entry_user_id: i64,
    pub metadata_entered_at: Option<DateTime<Utc>>,
    pub reviewed_by_user_id: i64,
    pub metadata_approved_at: Option<DateTime<Utc>>,
    pub rejected_by_user_id: i64,
    pub draft_comment: String,
    pub ignored: bool,
    pub actions: Vec<Action>,
}

impl IssueRecord {
    /// `<lccn>/<YYYYMMDDEE>`, or `<lccn>/<raw date><EE>` if the date is invalid.
    pub fn key(&self) -> String {
        match parse_raw_date(&self.date) {
            Some(date) => format!("{}/{}", self.lccn, date_edition(date, self.edition)),
            None => format!("{}/{}{:02}", self.lccn, self.date.replace('-', ""), self.edition),
        }
    }

    /// Claims are soft: an expired claim is treated as no claim at all.
    pub fn is_owned(&self, now: DateTime<Utc>) -> bool {
        self.workflow_owner_id != 0
            && self
                .workflow_owner_expires_at
                .is_some_and(|expires| expires > now)
    }

    pub fn is_owned_by(&self, user_id: i64, now: DateTime<Utc>) -> bool {
        self.is_owned(now) && self.workflow_owner_id == user_id
    }

    /// Ids of zero or below can't own an issue.
    pub fn claim(&mut self, user_id: i64, now: DateTime<Utc>, duration: Duration) -> Result<(), Denial> {
        if user_id <= 0 {
            return Err(Denial::bad_request(format!("user {user_id} cannot claim an issue")));
        }
        self.workflow_owner_id = user_id;
        self.workflow_owner_expires_at = Some(now + duration);
        Ok(())
    }

    pub fn unclaim(&mut self) {
        self.workflow_owner_id = 0;
        self.workflow_owner_expires_at = None;
    }

    pub fn record(
        &mut self,
        kind: ActionKind,
        user_id: i64,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.actions.push(Action {
            kind,
            user_id,
            message: message.into(),
            at,
        });
    }

    /// Page count used for batch sizing: one page per label once metadata is
    /// entered, the count taken at queue time before that.
    pub fn pages(&self) -> u32 {
        if self.page_labels.is_empty() {
            self.page_count
        } else {
            self.page_labels.len() as u32
        }
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }
}
