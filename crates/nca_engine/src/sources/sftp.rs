use std::path::{Path, PathBuf};

use nca_core::schema::parse_raw_date;
use nca_core::{AppError, FinderError, Issue, TitleId, WorkflowStep};
use nca_logging::nca_debug;
use walkdir::WalkDir;

use super::validate::{collect_issue_files, FileRules};
use super::{file_name, find_directories, folder_ident, path_string, ScanContext, ScanError};

const SFTP_FILES: FileRules<'static> = FileRules::new(&[".pdf"]);
const MANUAL_ERROR_SUFFIX: &str = "-error";

/// Born-digital uploads: `<root>/<title>/<YYYY-MM-DD>/*.pdf`, where an issue
/// folder may sit one level deeper inside a holding folder.
pub fn find_sftp_issues(ctx: &mut ScanContext, root: &Path, moc: &str) -> Result<(), ScanError> {
    for title_path in find_directories(root)? {
        let title = ctx.filesystem_title(&title_path);
        for issue_path in issue_folders(&title_path)? {
            add_sftp_issue(ctx, title, &issue_path, moc);
        }
    }
    Ok(())
}

/// Direct subfolders are issues unless they hold no PDFs themselves but
/// have subfolders that do; those subfolders are the issues instead.
fn issue_folders(title_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut folders = Vec::new();
    for dir in find_directories(title_path)? {
        if has_pdf(&dir) {
            folders.push(dir);
            continue;
        }
        let nested: Vec<PathBuf> = find_directories(&dir)?
            .into_iter()
            .filter(|sub| has_pdf(sub))
            .collect();
        if nested.is_empty() {
            folders.push(dir);
        } else {
            folders.extend(nested);
        }
    }
    Ok(folders)
}

fn has_pdf(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .any(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
}

fn add_sftp_issue(ctx: &mut ScanContext, title: TitleId, path: &Path, moc: &str) {
    let step = WorkflowStep::SftpUpload;
    let folder = file_name(path);
    let location = path_string(path);
    let ident = folder_ident(step, ctx.lccn(title), &folder);

    let (base, flagged) = match folder.strip_suffix(MANUAL_ERROR_SUFFIX) {
        Some(base) => (base, true),
        None => (folder.as_str(), false),
    };

    let Some(date) = parse_raw_date(base) else {
        nca_debug!("SFTP folder {location} has an invalid name");
        ctx.push_error(
            FinderError::new(
                &location,
                AppError::invalid_folder_name(&ident, "must be formatted YYYY-MM-DD"),
            )
            .with_title(title),
        );
        return;
    };

    let mut issue = Issue::new(date, 1, &location, step);
    issue.marc_org_code = moc.to_string();
    issue.title = Some(title);
    if flagged {
        issue.errors.push(AppError::new("manually flagged issue"));
    }
    collect_issue_files(&mut issue, &ident, SFTP_FILES);
    ctx.finder_mut().add_issue(issue);
}
