use std::collections::HashSet;
use std::time::Duration;

use nca_core::schema::{is_valid_edition, parse_raw_date};
use nca_core::{AppError, Batch, BatchId, BatchName, FinderError, Issue, Title, TitleId, WorkflowStep};
use nca_logging::{nca_debug, nca_info, nca_warn};

use super::{ScanContext, ScanError};
use crate::chronam::{self, BatchMetadata, IssueMetadata};
use crate::httpcache::{CacheClient, Request};

/// Indexes every batch, issue and title the live site publishes.
///
/// The batch list is always re-downloaded; batch and title documents come
/// from the cache when present. Batch detail requests are paced by
/// `batch_throttle`.
pub async fn find_web_batches(
    ctx: &mut ScanContext,
    client: &CacheClient,
    webroot: &str,
    batch_throttle: Duration,
) -> Result<(), ScanError> {
    let list = find_all_live_batches(client, webroot).await?;
    nca_info!("Live site lists {} batches", list.len());

    let detail_client = client.with_throttle(batch_throttle);
    for meta in list {
        let name = match BatchName::parse(&meta.name) {
            Ok(name) => name,
            Err(err) => {
                nca_warn!("Skipping live batch {:?}: {err}", meta.name);
                ctx.push_error(FinderError::new(
                    webroot,
                    AppError::new(format!("invalid live batch name {:?}: {err}", meta.name)),
                ));
                continue;
            }
        };
        let batch = ctx.finder_mut().add_batch(Batch::from_name(name, &meta.url));

        for issue in batched_issue_metadata(&detail_client, &meta).await? {
            let title = web_title(ctx, &detail_client, &issue.title.url).await?;
            add_live_issue(ctx, batch, title, &issue);
        }
    }
    Ok(())
}

async fn find_all_live_batches(
    client: &CacheClient,
    webroot: &str,
) -> Result<Vec<BatchMetadata>, ScanError> {
    let mut api = url::Url::parse(webroot).map_err(|_| ScanError::InvalidWebRoot(webroot.to_string()))?;
    api.set_path("batches.json");

    let list_client = client.with_throttle(Duration::ZERO);
    let mut next = Some(api.to_string());
    let mut seen = HashSet::new();
    let mut batches = Vec::new();
    let mut page = 0;

    while let Some(url) = next.take() {
        if !seen.insert(url.clone()) {
            nca_warn!("Batch list page {url} links back to an earlier page; stopping");
            break;
        }
        page += 1;
        let request = Request::new(&url, "batch-list", format!("page-{page}"), "json");
        let body = list_client
            .force_get(&request)
            .await
            .map_err(|source| ScanError::Http {
                url: url.clone(),
                source,
            })?;
        let list = chronam::parse_batches_list(&body).map_err(|source| ScanError::Json {
            url: url.clone(),
            source,
        })?;
        nca_debug!("Batch list page {page}: {} batches", list.batches.len());
        next = list.next_page().map(str::to_string);
        batches.extend(list.batches);
    }
    Ok(batches)
}

async fn batched_issue_metadata(
    client: &CacheClient,
    meta: &BatchMetadata,
) -> Result<Vec<IssueMetadata>, ScanError> {
    let body = client
        .get_cached(&Request::auto(&meta.url, "batches"))
        .await
        .map_err(|source| ScanError::Http {
            url: meta.url.clone(),
            source,
        })?;
    let detail = chronam::parse_batch(&body).map_err(|source| ScanError::Json {
        url: meta.url.clone(),
        source,
    })?;
    Ok(detail.issues)
}

/// Titles are shared across batches, keyed by their URL.
async fn web_title(
    ctx: &mut ScanContext,
    client: &CacheClient,
    url: &str,
) -> Result<TitleId, ScanError> {
    if let Some(id) = ctx.title_at(url) {
        return Ok(id);
    }

    let body = client
        .get_cached(&Request::auto(url, "titles"))
        .await
        .map_err(|source| ScanError::Http {
            url: url.to_string(),
            source,
        })?;
    let detail = chronam::parse_title(&body).map_err(|source| ScanError::Json {
        url: url.to_string(),
        source,
    })?;

    let mut title = Title::new(detail.lccn, detail.name, url);
    title.place_of_publication = detail.place_of_publication;
    Ok(ctx.add_title(title))
}

fn add_live_issue(ctx: &mut ScanContext, batch: BatchId, title: TitleId, meta: &IssueMetadata) {
    let batch_location = ctx.finder().batch(batch).location.clone();

    let Some(date) = parse_raw_date(&meta.date_issued) else {
        ctx.push_error(
            FinderError::new(
                &batch_location,
                AppError::new(format!(
                    "invalid date {:?} for issue {}",
                    meta.date_issued, meta.url
                )),
            )
            .with_batch(batch),
        );
        return;
    };
    let edition = chronam::edition_from_url(&meta.url).filter(|&ed| is_valid_edition(ed));
    let Some(edition) = edition else {
        ctx.push_error(
            FinderError::new(
                &batch_location,
                AppError::new(format!("invalid edition for issue {}", meta.url)),
            )
            .with_batch(batch),
        );
        return;
    };

    let mut issue = Issue::new(date, edition, &meta.url, WorkflowStep::InProduction);
    issue.marc_org_code = ctx.finder().batch(batch).marc_org_code.clone();
    issue.title = Some(title);
    issue.batch = Some(batch);
    ctx.finder_mut().add_issue(issue);
}
