use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use nca_core::workflow::{Role, User};
use nca_engine::{
    full_name, BatchMaker, CacheClient, IssueMover, JobQueue, MemoryJobQueue, MemoryStore,
    Scanner, UploadedIssues, Watcher, WorkflowService, WorkflowStore,
};
use nca_logging::{nca_debug, nca_error, nca_info, nca_warn};

use super::config::{AppConfig, DEFAULT_CONFIG};
use super::logging;

/// Everything the maintenance loop drives.
struct Services {
    uploads: Arc<UploadedIssues>,
    jobs: Arc<MemoryJobQueue>,
    workflow: WorkflowService,
    mover: IssueMover,
    batch_maker: BatchMaker,
}

pub fn run_app() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = AppConfig::load(&config_path)?;
    logging::initialize(config.log_destination, config.log_level()?, &config.log_file);
    nca_info!("Starting with configuration from {}", config_path.display());

    let store: Arc<dyn WorkflowStore> =
        Arc::new(MemoryStore::new(config.titles.clone(), config.mocs.clone()));
    let client = CacheClient::new(config.cache_settings()).context("unable to build HTTP client")?;
    let scanner = Arc::new(Scanner::new(config.scanner_settings(), Arc::clone(&store), client));
    let uploads = Arc::new(UploadedIssues::new(Arc::clone(&store), config.upload_settings()));
    let jobs = Arc::new(MemoryJobQueue::new());
    let workflow = WorkflowService::new(
        Arc::clone(&store),
        Arc::clone(&jobs) as Arc<dyn JobQueue>,
        Arc::clone(&uploads),
        Arc::clone(&scanner),
        config.workflow_settings(),
    );
    let batch_maker = BatchMaker::new(store, *workflow.workflow(), config.batch_settings());
    let services = Services {
        uploads,
        jobs,
        workflow,
        mover: IssueMover::new(&config.workflow_path),
        batch_maker,
    };

    let watcher = Watcher::new(scanner, config.watcher_settings());
    watcher.start().context("unable to start the scanner watcher")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("unable to start the async runtime")?;
    let result = runtime.block_on(maintain(&services, &config));

    nca_info!("Stopping scanner watcher");
    watcher.stop();
    result
}

/// Periodic upkeep until interrupted.
async fn maintain(services: &Services, config: &AppConfig) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.maintenance_interval_secs.max(1)));
    let batch_interval = Duration::from_secs(config.batch_interval_secs);
    let batch_user = User::new(0, "batch-maker", vec![Role::BatchBuilder]);
    let mut last_batch_run: Option<Instant> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("unable to listen for shutdown signal")?;
                nca_info!("Interrupted; shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        upkeep(services);
        if last_batch_run.map_or(true, |at| at.elapsed() >= batch_interval) {
            make_batches(services, &batch_user);
            last_batch_run = Some(Instant::now());
        }
    }
}

fn upkeep(services: &Services) {
    let now = Utc::now();
    if let Err(err) = services.uploads.refresh() {
        nca_warn!("Unable to refresh uploaded issues: {err}");
    }
    if !services.uploads.healthy() {
        nca_error!("Uploaded-issue searcher is unhealthy; queueing will see stale data");
    }

    let moved = services.mover.run(&services.workflow, &services.jobs, now);
    if moved > 0 {
        nca_info!("Moved {moved} queued issues into the workflow");
    }

    match services.workflow.advance_page_reviews(now) {
        Ok(0) => nca_debug!("No page reviews ready"),
        Ok(count) => nca_info!("{count} issues finished page review"),
        Err(denial) => nca_error!("Page review check failed: {denial}"),
    }
}

fn make_batches(services: &Services, user: &User) {
    let now = Utc::now();
    let runs = [
        ("batch", services.batch_maker.make_batches(user, now)),
        ("redo batch", services.batch_maker.make_redo_batches(user, now)),
    ];
    for (what, result) in runs {
        match result {
            Ok(batches) => {
                for batch in &batches {
                    nca_info!("New {what} {} ({} issues)", full_name(batch), batch.issue_ids.len());
                }
            }
            Err(err) => nca_error!("Unable to generate {what}es: {err}"),
        }
    }
}
