use std::path::Path;

use nca_core::schema::{is_valid_edition, parse_raw_date};
use nca_core::{AppError, Batch, BatchId, BatchName, FinderError, Issue, Title, TitleId, WorkflowStep};
use nca_logging::nca_debug;

use super::{file_name, find_directories, path_string, ScanContext, ScanError};
use crate::batch_xml::{read_batch_xml, BatchXmlIssue};

/// Staged batches under the batch output folder. Issues come from each
/// batch's `data/batch.xml`; their files are not indexed.
pub fn find_disk_batches(ctx: &mut ScanContext, root: &Path) -> Result<(), ScanError> {
    for batch_dir in find_directories(root)? {
        add_disk_batch(ctx, &batch_dir);
    }
    Ok(())
}

fn add_disk_batch(ctx: &mut ScanContext, batch_dir: &Path) {
    let location = path_string(batch_dir);
    let dir_name = file_name(batch_dir);
    let name = match BatchName::parse(&dir_name) {
        Ok(name) => name,
        Err(err) => {
            ctx.push_error(FinderError::new(
                &location,
                AppError::new(format!("invalid batch directory name {dir_name:?}: {err}")),
            ));
            return;
        }
    };
    let batch = ctx.finder_mut().add_batch(Batch::from_name(name, &location));

    let entries = match read_batch_xml(batch_dir) {
        Ok(entries) => entries,
        Err(err) => {
            ctx.push_error(
                FinderError::new(
                    &location,
                    AppError::new(format!("unable to process batch XML: {err}")),
                )
                .with_batch(batch),
            );
            return;
        }
    };
    nca_debug!("Batch {dir_name}: {} issues in batch.xml", entries.len());

    for entry in &entries {
        add_batched_issue(ctx, batch_dir, batch, entry);
    }
}

fn add_batched_issue(ctx: &mut ScanContext, batch_dir: &Path, batch: BatchId, entry: &BatchXmlIssue) {
    let location = path_string(batch_dir);
    let invalid = |ctx: &mut ScanContext, what: &str| {
        ctx.push_error(
            FinderError::new(
                &location,
                AppError::new(format!(
                    "invalid issue {what} in batch XML ({} {} ed {})",
                    entry.lccn, entry.issue_date, entry.edition_order
                )),
            )
            .with_batch(batch),
        );
    };

    let Some(date) = parse_raw_date(&entry.issue_date) else {
        invalid(ctx, "date");
        return;
    };
    let edition = match entry.edition_order.parse::<u32>() {
        Ok(edition) if is_valid_edition(edition) => edition,
        _ => {
            invalid(ctx, "edition");
            return;
        }
    };

    let title = batched_title(ctx, batch_dir, &entry.lccn);
    let content = entry.content.trim_start_matches("./");
    let mut issue = Issue::new(
        date,
        edition,
        path_string(&batch_dir.join(content)),
        WorkflowStep::ReadyForBatching,
    );
    issue.marc_org_code = ctx.finder().batch(batch).marc_org_code.clone();
    issue.title = Some(title);
    issue.batch = Some(batch);
    ctx.finder_mut().add_issue(issue);
}

/// Each batch gets its own title entries at `<batch>/data/<LCCN>`.
fn batched_title(ctx: &mut ScanContext, batch_dir: &Path, lccn: &str) -> TitleId {
    let location = path_string(&batch_dir.join("data").join(lccn));
    if let Some(id) = ctx.title_at(&location) {
        return id;
    }
    let title = match ctx.catalog().find_lccn(lccn) {
        Some(db_title) => db_title.to_title(&location),
        None => Title::new(lccn, lccn, &location),
    };
    ctx.add_title(title)
}
