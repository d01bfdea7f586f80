use std::path::Path;

use nca_core::{AppError, File, Issue};
use walkdir::WalkDir;

/// What an issue folder may contain.
#[derive(Debug, Clone, Copy)]
pub struct FileRules<'a> {
    /// Lowercase, with the leading dot.
    pub extensions: &'a [&'a str],
    /// Hidden files are left out of the issue unless strict, in which case
    /// they are listed and validated like any other file.
    pub strict: bool,
}

impl<'a> FileRules<'a> {
    pub const fn new(extensions: &'a [&'a str]) -> Self {
        Self {
            extensions,
            strict: false,
        }
    }
}

/// Lists the files directly inside the issue's folder into `issue.files`
/// and validates them. Problems land on the issue or the offending file.
pub fn collect_issue_files(issue: &mut Issue, ident: &str, rules: FileRules<'_>) {
    let dir = Path::new(&issue.location).to_path_buf();
    let mut files = Vec::new();

    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                issue.errors.push(AppError::read_failure(ident, &err.to_string()));
                return;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let hidden = name.starts_with('.');
        if hidden && !rules.strict {
            continue;
        }

        let mut file = File::new(entry.path().to_string_lossy());
        let file_type = entry.file_type();
        if file_type.is_dir() {
            file.errors.push(AppError::new(format!("{name:?} is a subdirectory")));
        } else if !file_type.is_file() {
            file.errors.push(AppError::new(format!("{name:?} is not a regular file")));
        } else if !rules.extensions.contains(&file.extension().as_str()) {
            file.errors.push(AppError::new(format!("{name:?} has an invalid extension")));
        }
        files.push(file);
    }

    if files.is_empty() {
        issue.errors.push(AppError::no_files(ident));
    }
    issue.files = files;
}
