use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::privilege::{Privilege, User};
use super::record::IssueRecord;
use crate::schema::WorkflowStep;

/// HTTP-equivalent outcome of a workflow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::Internal => 500,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Why a workflow request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({status})")]
pub struct Denial {
    pub status: Status,
    pub message: String,
}

impl Denial {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Denial {
            status: Status::BadRequest,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Denial {
            status: Status::Forbidden,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Denial {
            status: Status::NotFound,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Denial {
            status: Status::Internal,
            message: message.into(),
        }
    }
}

/// Permission and state checks for one user at one moment.
pub struct Can<'a> {
    user: &'a User,
    now: DateTime<Utc>,
}

impl<'a> Can<'a> {
    pub fn new(user: &'a User, now: DateTime<Utc>) -> Self {
        Can { user, now }
    }

    fn privileged(&self, privilege: Privilege, what: &str) -> Result<(), Denial> {
        if self.user.permitted_to(privilege) {
            Ok(())
        } else {
            Err(Denial::forbidden(format!("insufficient privileges ({what})")))
        }
    }

    fn step(&self, issue: &IssueRecord, expected: WorkflowStep, what: &str) -> Result<(), Denial> {
        if issue.workflow_step == expected {
            Ok(())
        } else {
            Err(Denial::bad_request(format!(
                "issue not {what} (workflow step: {})",
                issue.workflow_step
            )))
        }
    }

    pub fn owns(&self, issue: &IssueRecord) -> Result<(), Denial> {
        if !issue.is_owned(self.now) {
            return Err(Denial::bad_request("issue must be claimed first"));
        }
        if issue.workflow_owner_id != self.user.id {
            return Err(Denial::bad_request("somebody else owns this issue"));
        }
        Ok(())
    }

    pub fn claim(&self, issue: &IssueRecord) -> Result<(), Denial> {
        if issue.is_owned(self.now) {
            return Err(Denial::bad_request("already owned by somebody"));
        }
        match issue.workflow_step {
            WorkflowStep::ReadyForMetadataEntry => {
                self.privileged(Privilege::EnterIssueMetadata, "cannot enter issue metadata")
            }
            WorkflowStep::AwaitingMetadataReview => {
                self.privileged(Privilege::ReviewIssueMetadata, "cannot review issue metadata")
            }
            WorkflowStep::UnfixableMetadataError => self.privileged(
                Privilege::ReviewUnfixableIssues,
                "cannot process unfixable issues",
            ),
            step => Err(Denial::bad_request(format!("invalid workflow step: {step:?}"))),
        }
    }

    pub fn unclaim(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.owns(issue)
    }

    pub fn enter_metadata(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.privileged(Privilege::EnterIssueMetadata, "cannot enter issue metadata")?;
        self.owns(issue)?;
        self.step(issue, WorkflowStep::ReadyForMetadataEntry, "awaiting metadata entry")
    }

    pub fn review_metadata(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.privileged(Privilege::ReviewIssueMetadata, "cannot review issue metadata")?;
        self.owns(issue)?;
        self.step(issue, WorkflowStep::AwaitingMetadataReview, "awaiting metadata review")?;
        if issue.metadata_entry_user_id == self.user.id
            && !self.user.permitted_to(Privilege::ReviewOwnMetadata)
        {
            return Err(Denial::bad_request("author cannot also be reviewer"));
        }
        Ok(())
    }

    pub fn review_unfixable(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.privileged(Privilege::ReviewUnfixableIssues, "cannot process unfixable issues")?;
        self.owns(issue)?;
        self.step(issue, WorkflowStep::UnfixableMetadataError, "in the unfixable error state")
    }

    pub fn queue_upload(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.privileged(Privilege::ModifyUploadedIssues, "cannot queue uploaded issues")?;
        if issue.workflow_step.is_upload() {
            Ok(())
        } else {
            Err(Denial::bad_request(format!(
                "issue is not an uploaded issue (workflow step: {})",
                issue.workflow_step
            )))
        }
    }

    pub fn generate_batches(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.privileged(Privilege::GenerateBatches, "cannot generate batches")?;
        match issue.workflow_step {
            WorkflowStep::ReadyForBatching | WorkflowStep::ReadyForRebatching => Ok(()),
            step => Err(Denial::bad_request(format!(
                "issue not ready for batching (workflow step: {step})"
            ))),
        }
    }

    pub fn flag_live(&self, issue: &IssueRecord) -> Result<(), Denial> {
        self.privileged(Privilege::FlagLiveIssues, "cannot flag live issues")?;
        self.step(issue, WorkflowStep::InProduction, "in production")
    }
}
