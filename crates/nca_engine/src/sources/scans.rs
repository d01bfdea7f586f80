use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use nca_core::schema::{is_valid_edition, parse_raw_date};
use nca_core::{AppError, FinderError, Issue, TitleId, WorkflowStep};
use nca_logging::nca_warn;
use regex::Regex;

use super::validate::{collect_issue_files, FileRules};
use super::{file_name, find_directories, folder_ident, path_string, ScanContext, ScanError};

const SCAN_FILES: FileRules<'static> = FileRules::new(&[".pdf", ".tif", ".tiff"]);

fn pdf_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[0-9]{4}\.pdf$").expect("pdf page pattern"))
}

fn tiff_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[0-9]{4}\.tiff?$").expect("tiff page pattern"))
}

/// In-house scans: `<root>/<MOC>/<title>/<YYYY-MM-DD[_EE]>/` holding
/// matching `NNNN.pdf` / `NNNN.tif` pairs. MOC folders the database doesn't
/// know are reported and skipped.
pub fn find_scanned_issues(
    ctx: &mut ScanContext,
    root: &Path,
    valid_mocs: &HashSet<String>,
) -> Result<(), ScanError> {
    for moc_path in find_directories(root)? {
        let moc = file_name(&moc_path);
        if !valid_mocs.contains(&moc) {
            nca_warn!("Scan folder {} is not a known MARC org code", moc_path.display());
            ctx.push_error(FinderError::new(
                path_string(&moc_path),
                AppError::new(format!("unable to find MARC Org Code {moc:?} in database")),
            ));
            continue;
        }

        for title_path in find_directories(&moc_path)? {
            let title = ctx.filesystem_title(&title_path);
            for issue_path in find_directories(&title_path)? {
                add_scanned_issue(ctx, title, &issue_path, &moc);
            }
        }
    }
    Ok(())
}

/// Splits `YYYY-MM-DD` or `YYYY-MM-DD_EE` into date text and edition text.
fn split_folder_name(folder: &str) -> (&str, Option<&str>) {
    if folder.len() == 13 && folder.as_bytes()[10] == b'_' {
        if let (Some(date), Some(edition)) = (folder.get(..10), folder.get(11..)) {
            return (date, Some(edition));
        }
    }
    (folder, None)
}

fn add_scanned_issue(ctx: &mut ScanContext, title: TitleId, path: &Path, moc: &str) {
    let step = WorkflowStep::ScanUpload;
    let folder = file_name(path);
    let location = path_string(path);
    let ident = folder_ident(step, ctx.lccn(title), &folder);

    let (date_text, edition_text) = split_folder_name(&folder);
    let Some(date) = parse_raw_date(date_text) else {
        ctx.push_error(
            FinderError::new(
                &location,
                AppError::invalid_folder_name(&ident, "must be formatted YYYY-MM-DD or YYYY-MM-DD_EE"),
            )
            .with_title(title),
        );
        return;
    };

    let mut issue = Issue::new(date, 1, &location, step);
    issue.marc_org_code = moc.to_string();
    issue.title = Some(title);

    if let Some(text) = edition_text {
        match text.parse::<u32>() {
            Ok(edition) if is_valid_edition(edition) && text.bytes().all(|b| b.is_ascii_digit()) => {
                issue.edition = edition;
            }
            _ => issue.errors.push(AppError::invalid_folder_name(
                &ident,
                &format!("edition {text:?} must be 01, 02, or 03"),
            )),
        }
    }

    if let Err(problem) = verify_page_pairs(path) {
        issue.errors.push(AppError::folder_contents(&ident, &problem));
    }
    collect_issue_files(&mut issue, &ident, SCAN_FILES);
    ctx.finder_mut().add_issue(issue);
}

/// Every PDF page needs a TIFF master with the same number.
fn verify_page_pairs(path: &Path) -> Result<(), String> {
    let entries = fs::read_dir(path).map_err(|err| format!("unable to list files: {err}"))?;
    let mut pdfs = Vec::new();
    let mut tiffs = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if pdf_pattern().is_match(&name) {
            pdfs.push(name);
        } else if tiff_pattern().is_match(&name) {
            tiffs.push(name);
        }
    }

    if tiffs.is_empty() {
        return Err("no TIFF files".to_string());
    }
    if tiffs.len() != pdfs.len() {
        return Err(format!(
            "PDF/TIFF files don't match ({} PDFs, {} TIFFs)",
            pdfs.len(),
            tiffs.len()
        ));
    }

    pdfs.sort();
    tiffs.sort();
    for (idx, (pdf, tiff)) in pdfs.iter().zip(&tiffs).enumerate() {
        if pdf.get(..4) != tiff.get(..4) {
            return Err(format!(
                "PDF/TIFF files don't match (index {idx} / pdf {pdf:?} / tiff {tiff:?})"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names_split_into_date_and_edition() {
        assert_eq!(split_folder_name("2001-02-03"), ("2001-02-03", None));
        assert_eq!(split_folder_name("2001-02-03_02"), ("2001-02-03", Some("02")));
        assert_eq!(split_folder_name("2001-02-03-02"), ("2001-02-03-02", None));
        assert_eq!(split_folder_name("2001-02-0é_2"), ("2001-02-0é_2", None));
    }
}
