use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference data carried by a duplicate-issue error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateOf {
    pub database_id: i64,
    pub location: String,
    /// `"<title name>, <raw date>"`
    pub name: String,
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    General,
    NoFiles,
    InvalidFolderName,
    ReadFailure,
    FolderContents,
    TooNew { hours: u32 },
    Duplicate(DuplicateOf),
}

/// A validation problem attached to a batch, title, issue, or file.
///
/// `error` is the terse machine-ish description, `message` the long form shown
/// to curators. `propagate` flags the owning title as having child errors;
/// `warning` marks the problem as advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub error: String,
    pub message: String,
    pub propagate: bool,
    pub warning: bool,
}

impl AppError {
    pub fn new(error: impl Into<String>) -> Self {
        let error = error.into();
        AppError {
            kind: ErrorKind::General,
            message: error.clone(),
            error,
            propagate: true,
            warning: false,
        }
    }

    pub fn as_warning(mut self) -> Self {
        self.warning = true;
        self
    }

    fn issue(kind: ErrorKind, error: &str, message: String, propagate: bool) -> Self {
        AppError {
            kind,
            error: error.to_string(),
            message,
            propagate,
            warning: false,
        }
    }

    pub fn no_files(ident: &str) -> Self {
        Self::issue(ErrorKind::NoFiles, "no files", format!("{ident} has no files"), true)
    }

    pub fn invalid_folder_name(ident: &str, extra: &str) -> Self {
        Self::issue(
            ErrorKind::InvalidFolderName,
            "invalid folder name",
            format!("{ident} has an invalid folder name: {extra}"),
            true,
        )
    }

    pub fn read_failure(ident: &str, err: &str) -> Self {
        Self::issue(
            ErrorKind::ReadFailure,
            err,
            format!("{ident} wasn't able to be scanned for files: {err}"),
            true,
        )
    }

    pub fn folder_contents(ident: &str, extra: &str) -> Self {
        Self::issue(
            ErrorKind::FolderContents,
            "missing / invalid folder contents",
            format!("{ident} doesn't have valid files: {extra}"),
            true,
        )
    }

    pub fn too_new(ident: &str, hours: u32) -> Self {
        Self::issue(
            ErrorKind::TooNew { hours },
            "too new for processing",
            format!("{ident} must be left alone for a minimum of {hours} hours before processing"),
            false,
        )
    }

    /// Duplicates never block curation on their own; they are warnings that
    /// still mark the title.
    pub fn duplicate(ident: &str, canonical_ident: &str, dupe: DuplicateOf) -> Self {
        AppError {
            kind: ErrorKind::Duplicate(dupe),
            error: "duplicate of another issue".to_string(),
            message: format!("{ident} is a likely duplicate of {canonical_ident}"),
            propagate: true,
            warning: true,
        }
    }

    pub fn duplicate_of(&self) -> Option<&DuplicateOf> {
        match &self.kind {
            ErrorKind::Duplicate(dupe) => Some(dupe),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorList(Vec<AppError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: AppError) {
        self.0.push(err);
    }

    /// Blocking errors only.
    pub fn major(&self) -> ErrorList {
        ErrorList(self.0.iter().filter(|e| !e.warning).cloned().collect())
    }

    /// Warnings only.
    pub fn minor(&self) -> ErrorList {
        ErrorList(self.0.iter().filter(|e| e.warning).cloned().collect())
    }

    pub fn any_propagating(&self) -> bool {
        self.0.iter().any(|e| e.propagate)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AppError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<Vec<AppError>> for ErrorList {
    fn from(errors: Vec<AppError>) -> Self {
        ErrorList(errors)
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a AppError;
    type IntoIter = std::slice::Iter<'a, AppError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
