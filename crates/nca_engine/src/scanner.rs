//! Scan orchestration and the published Finder/Lookup snapshot.
//!
//! A scan pass builds a fresh [`Snapshot`] off to the side; only a complete
//! pass replaces the published one, so readers always see a Finder together
//! with the Lookup built from it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use nca_core::schema::IssueKey;
use nca_core::{check_duplicates, Finder, Issue, IssueId, Lookup, LookupError, SearchKey, WorkflowStep};
use nca_logging::{nca_debug, nca_info};

use crate::httpcache::CacheClient;
use crate::serialize::{self, SnapshotError};
use crate::sources::{
    find_disk_batches, find_in_process_issues, find_scanned_issues, find_sftp_issues,
    find_web_batches, ScanContext, ScanError,
};
use crate::store::{TitleCatalog, WorkflowStore};

const CACHE_FILE: &str = "finder.cache";

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// Base URL of the live presentation site.
    pub webroot: Option<String>,
    pub sftp_path: PathBuf,
    pub scan_path: PathBuf,
    pub batch_output_path: PathBuf,
    /// MARC org code given to born-digital uploads.
    pub sftp_marc_org_code: String,
    pub cache_path: PathBuf,
    /// Pause between live batch detail requests.
    pub batch_throttle: Duration,
    pub scan_web: bool,
    pub scan_database: bool,
    pub scan_sftp: bool,
    pub scan_scans: bool,
    pub scan_disk_batches: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            webroot: None,
            sftp_path: PathBuf::from("sftp"),
            scan_path: PathBuf::from("scans"),
            batch_output_path: PathBuf::from("batches"),
            sftp_marc_org_code: String::new(),
            cache_path: PathBuf::from("cache"),
            batch_throttle: Duration::from_millis(50),
            scan_web: true,
            scan_database: true,
            scan_sftp: true,
            scan_scans: true,
            scan_disk_batches: true,
        }
    }
}

impl ScannerSettings {
    pub fn cache_file(&self) -> PathBuf {
        self.cache_path.join(CACHE_FILE)
    }
}

/// One immutable scan result.
#[derive(Debug, Default)]
pub struct Snapshot {
    finder: Finder,
    lookup: Lookup,
}

impl Snapshot {
    /// Aggregates a freshly scanned finder, indexes it and flags duplicates.
    pub fn build(mut finder: Finder) -> Result<Self, LookupError> {
        finder.aggregate();
        let lookup = Lookup::build(&finder)?;
        let dupes = check_duplicates(&mut finder, &lookup);
        if dupes > 0 {
            nca_info!("Flagged {dupes} duplicate issues");
        }
        Ok(Self { finder, lookup })
    }

    /// A finder read back from the cache file already carries its
    /// duplicate errors.
    pub fn from_cached(finder: Finder) -> Result<Self, LookupError> {
        let lookup = Lookup::build(&finder)?;
        Ok(Self { finder, lookup })
    }

    pub fn finder(&self) -> &Finder {
        &self.finder
    }

    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    /// Issues matching a partial key, in lookup order.
    pub fn issues(&self, key: &SearchKey) -> impl Iterator<Item = (IssueId, &Issue)> + '_ {
        self.lookup
            .issues(key)
            .iter()
            .map(|&id| (id, self.finder.issue(id)))
    }

    /// The live issue with exactly this key, if the site has one.
    pub fn live_issue(&self, lccn: &str, date: NaiveDate, edition: u32) -> Option<IssueId> {
        let key = IssueKey::new(lccn, date, edition);
        self.lookup
            .issues_for_key(&key)
            .iter()
            .copied()
            .find(|&id| self.finder.issue(id).workflow_step == WorkflowStep::InProduction)
    }
}

/// Runs the enabled sources and holds the published snapshot.
pub struct Scanner {
    settings: ScannerSettings,
    store: Arc<dyn WorkflowStore>,
    client: CacheClient,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Scanner {
    pub fn new(settings: ScannerSettings, store: Arc<dyn WorkflowStore>, client: CacheClient) -> Self {
        Self {
            settings,
            store,
            client,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Same configuration, no data.
    pub fn duplicate(&self) -> Self {
        Self::new(self.settings.clone(), Arc::clone(&self.store), self.client.clone())
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    pub fn client(&self) -> &CacheClient {
        &self.client
    }

    /// The current snapshot. The lock is held only long enough to clone
    /// the pointer.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&snapshot);
        snapshot
    }

    /// One full scan pass. Nothing is published.
    pub async fn scan(&self) -> Result<Snapshot, ScanError> {
        let settings = &self.settings;
        let started = Instant::now();
        let mut ctx = ScanContext::new(TitleCatalog::new(self.store.titles()?));

        if settings.scan_web {
            if let Some(webroot) = &settings.webroot {
                find_web_batches(&mut ctx, &self.client, webroot, settings.batch_throttle).await?;
                nca_debug!("Web scan done: {} issues so far", ctx.finder().issues.len());
            }
        }
        if settings.scan_database {
            let records = self.store.issues()?;
            find_in_process_issues(&mut ctx, &records);
        }
        if settings.scan_sftp {
            find_sftp_issues(&mut ctx, &settings.sftp_path, &settings.sftp_marc_org_code)?;
        }
        if settings.scan_scans {
            let mocs: HashSet<String> = self.store.marc_org_codes()?.into_iter().collect();
            find_scanned_issues(&mut ctx, &settings.scan_path, &mocs)?;
        }
        if settings.scan_disk_batches {
            find_disk_batches(&mut ctx, &settings.batch_output_path)?;
        }

        let snapshot = Snapshot::build(ctx.into_finder())?;
        nca_info!(
            "Found {} titles, {} issues, {} batches in {:.1?}",
            snapshot.finder.titles.len(),
            snapshot.finder.issues.len(),
            snapshot.finder.batches.len(),
            started.elapsed()
        );
        Ok(snapshot)
    }

    /// Scans and publishes. A failed pass leaves the old snapshot in place.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, ScanError> {
        let snapshot = self.scan().await?;
        Ok(self.publish(snapshot))
    }

    /// Publishes the cache file's contents. Returns false when there was
    /// nothing cached.
    pub fn load_cache(&self) -> Result<bool, SnapshotError> {
        let path = self.settings.cache_file();
        let finder = serialize::deserialize(&path)?;
        if finder.issues.is_empty() && finder.titles.is_empty() {
            return Ok(false);
        }
        let snapshot =
            Snapshot::from_cached(finder).map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
        nca_info!(
            "Loaded {} cached issues from {}",
            snapshot.finder.issues.len(),
            path.display()
        );
        self.publish(snapshot);
        Ok(true)
    }

    pub fn save_cache(&self) -> Result<(), SnapshotError> {
        serialize::serialize(self.snapshot().finder(), &self.settings.cache_file())
    }
}
