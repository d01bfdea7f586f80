use std::path::Path;

use nca_core::schema::parse_raw_date;
use nca_core::workflow::IssueRecord;
use nca_core::{AppError, File, FinderError, Issue};
use walkdir::WalkDir;

use super::ScanContext;

/// Indexes workflow rows that are somewhere in the curation pipeline, so an
/// upload that was already queued is recognised as such.
pub fn find_in_process_issues(ctx: &mut ScanContext, records: &[IssueRecord]) {
    for record in records {
        if record.ignored || !record.workflow_step.is_in_process() {
            continue;
        }
        add_in_process_issue(ctx, record);
    }
}

fn add_in_process_issue(ctx: &mut ScanContext, record: &IssueRecord) {
    let Some(title) = ctx.database_title(&record.lccn) else {
        ctx.push_error(FinderError::new(
            &record.location,
            AppError::new(format!("missing title for issue ID {}", record.id)),
        ));
        return;
    };
    let Some(date) = parse_raw_date(&record.date) else {
        ctx.push_error(
            FinderError::new(
                &record.location,
                AppError::new(format!(
                    "invalid time format ({}) in database issue {}",
                    record.date, record.id
                )),
            )
            .with_title(title),
        );
        return;
    };

    let mut issue = Issue::new(date, record.edition, &record.location, record.workflow_step);
    issue.title = Some(title);
    issue.marc_org_code = record.marc_org_code.clone();
    issue.database_id = record.id;
    issue.files = list_files(Path::new(&record.location));
    ctx.finder_mut().add_issue(issue);
}

/// Plain listing; workflow folders are validated by the workflow itself.
fn list_files(dir: &Path) -> Vec<File> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| File::new(entry.path().to_string_lossy()))
        .collect()
}
