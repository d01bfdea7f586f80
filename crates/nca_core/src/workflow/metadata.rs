use super::record::IssueRecord;
use crate::schema::{is_valid_edition, parse_raw_date, AppError, ErrorList, WorkflowStep};

/// Facts about an issue that live outside its own record.
#[derive(Debug, Clone, Default)]
pub struct MetadataContext {
    /// JP2 derivatives present in the issue's folder.
    pub jp2_count: usize,
    /// Other workflow rows sharing this issue's key: (database id, step).
    pub same_key: Vec<(i64, WorkflowStep)>,
    /// Description of a live issue with the same key, if any.
    pub live_duplicate: Option<String>,
}

/// Checks entered metadata. An empty list means the issue may move on.
pub fn validate_metadata(issue: &IssueRecord, ctx: &MetadataContext) -> ErrorList {
    let mut errors = ErrorList::new();

    for (value, field) in [(&issue.date, "Issue Date"), (&issue.date_as_labeled, "Date As Labeled")] {
        if parse_raw_date(value).is_none() {
            errors.push(AppError::new(format!("{field:?} is not a valid date")));
        }
    }

    for (value, field) in [(&issue.volume, "Volume Number"), (&issue.issue_number, "Issue Number")] {
        if value.trim().is_empty() {
            errors.push(AppError::new(format!("{field:?} cannot be blank")));
        }
    }

    if !is_valid_edition(issue.edition) {
        errors.push(AppError::new(format!(
            "\"Edition Number\" must be between 1 and 3 (got {})",
            issue.edition
        )));
    }

    let labels = issue.page_labels.len();
    if labels < ctx.jp2_count {
        errors.push(AppError::new("Page labeling isn't completed"));
    } else if labels > ctx.jp2_count {
        errors.push(AppError::new(format!(
            "There are {labels} page labels, but only {} pages",
            ctx.jp2_count
        )));
    }

    let rank = issue.workflow_step.rank();
    for &(id, step) in &ctx.same_key {
        if id != issue.id && step.rank() > rank {
            errors.push(AppError::new(format!(
                "duplicates issue {id}, which is further along ({step})"
            )));
        }
    }

    if let Some(live) = &ctx.live_duplicate {
        errors.push(AppError::new(format!("duplicates a live issue: {live}")));
    }

    errors
}
