use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::batch_name::BatchName;
use super::error::ErrorList;
use super::key::{date_edition, escape_tsv};
use super::step::WorkflowStep;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(TitleId);
arena_id!(IssueId);
arena_id!(BatchId);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Title {
    pub lccn: String,
    pub name: String,
    pub place_of_publication: String,
    /// Directory, URL, or (for database titles) the LCCN itself.
    pub location: String,
    pub issues: Vec<IssueId>,
    pub errors: ErrorList,
    pub has_child_errors: bool,
}

impl Title {
    pub fn new(lccn: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Title {
            lccn: lccn.into(),
            name: name.into(),
            location: location.into(),
            ..Title::default()
        }
    }

    pub fn tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{:06}",
            self.location,
            self.lccn,
            self.name,
            self.place_of_publication,
            self.issues.len()
        )
    }
}

/// One page-level file of an issue; owned by the issue's `files` list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct File {
    pub location: String,
    pub errors: ErrorList,
}

impl File {
    pub fn new(location: impl Into<String>) -> Self {
        File {
            location: location.into(),
            errors: ErrorList::new(),
        }
    }

    pub fn name(&self) -> &str {
        Path::new(&self.location)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.location)
    }

    /// Lowercased extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(&self.location)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub title: Option<TitleId>,
    pub date: NaiveDate,
    /// 1 for the default edition, 2-3 for later same-day editions.
    pub edition: u32,
    pub marc_org_code: String,
    /// Absolute path, or absolute URL for live issues.
    pub location: String,
    pub workflow_step: WorkflowStep,
    pub batch: Option<BatchId>,
    pub files: Vec<File>,
    pub errors: ErrorList,
    /// Zero unless the issue has a workflow database row.
    pub database_id: i64,
}

impl Issue {
    pub fn new(date: NaiveDate, edition: u32, location: impl Into<String>, step: WorkflowStep) -> Self {
        Issue {
            title: None,
            date,
            edition,
            marc_org_code: String::new(),
            location: location.into(),
            workflow_step: step,
            batch: None,
            files: Vec::new(),
            errors: ErrorList::new(),
            database_id: 0,
        }
    }

    /// `YYYY-MM-DD`
    pub fn raw_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `YYYYMMDDEE`
    pub fn date_edition(&self) -> String {
        date_edition(self.date, self.edition)
    }

    pub fn is_web(&self) -> bool {
        self.location.starts_with("http")
    }

    pub fn location_basename(&self) -> &str {
        self.location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.location)
    }

    /// Prefix used in issue error messages: `<step> issue <lccn>/<folder>`.
    pub fn error_ident(&self, lccn: &str) -> String {
        format!(
            "{} issue {}/{}",
            self.workflow_step,
            lccn,
            self.location_basename()
        )
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(File::name).collect()
    }

    pub fn has_file_errors(&self) -> bool {
        self.files.iter().any(|f| !f.errors.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub marc_org_code: String,
    pub keyword: String,
    pub version: u32,
    pub issues: Vec<IssueId>,
    /// URL for live batches, path for batches on disk.
    pub location: String,
    pub errors: ErrorList,
}

impl Batch {
    pub fn from_name(name: BatchName, location: impl Into<String>) -> Self {
        Batch {
            marc_org_code: name.marc_org_code,
            keyword: name.keyword,
            version: name.version,
            location: location.into(),
            ..Batch::default()
        }
    }

    pub fn fullname(&self) -> String {
        BatchName {
            marc_org_code: self.marc_org_code.clone(),
            keyword: self.keyword.clone(),
            version: self.version,
        }
        .fullname()
    }

    pub fn tsv(&self) -> String {
        format!(
            "{}\t{}\t{:06} issues",
            self.location,
            self.fullname(),
            self.issues.len()
        )
    }

    pub fn escaped_tsv(&self) -> String {
        escape_tsv(&self.tsv())
    }
}
