//! Service configuration, read from a RON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::LevelFilter;
use nca_core::PackingLimits;
use nca_engine::{
    BatchSettings, CacheSettings, DbTitle, ScannerSettings, UploadSettings, WatcherSettings,
    WorkflowSettings,
};
use serde::Deserialize;

use super::logging::LogDestination;

pub const DEFAULT_CONFIG: &str = "nca.ron";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Live site base URL; no web scan without it.
    pub webroot: Option<String>,
    pub cache_path: PathBuf,
    pub sftp_upload_path: PathBuf,
    pub scan_upload_path: PathBuf,
    pub batch_output_path: PathBuf,
    pub workflow_path: PathBuf,
    pub pdf_batch_marc_org_code: String,

    pub watch_interval_secs: u64,
    pub full_refresh_days: u64,
    pub http_throttle_ms: u64,
    pub http_timeout_secs: u64,
    pub maintenance_interval_secs: u64,
    pub batch_interval_secs: u64,

    pub scan_web: bool,
    pub scan_sftp: bool,
    pub scan_scans: bool,
    pub scan_database: bool,
    pub scan_disk_batches: bool,

    pub min_batch_pages: u32,
    pub max_batch_pages: u32,
    pub long_wait_days: i64,
    pub embargo_days: i64,
    pub claim_days: i64,
    pub upload_quiet_hours: i64,
    pub page_review_quiet_minutes: i64,

    pub log_level: String,
    pub log_destination: LogDestination,
    pub log_file: PathBuf,

    /// Seed rows for the in-memory workflow store.
    pub titles: Vec<DbTitle>,
    pub mocs: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webroot: None,
            cache_path: PathBuf::from("cache"),
            sftp_upload_path: PathBuf::from("sftp"),
            scan_upload_path: PathBuf::from("scans"),
            batch_output_path: PathBuf::from("batches"),
            workflow_path: PathBuf::from("workflow"),
            pdf_batch_marc_org_code: String::new(),
            watch_interval_secs: 600,
            full_refresh_days: 7,
            http_throttle_ms: 50,
            http_timeout_secs: 30,
            maintenance_interval_secs: 60,
            batch_interval_secs: 3600,
            scan_web: true,
            scan_sftp: true,
            scan_scans: true,
            scan_database: true,
            scan_disk_batches: true,
            min_batch_pages: 10_000,
            max_batch_pages: 20_000,
            long_wait_days: 30,
            embargo_days: 0,
            claim_days: 7,
            upload_quiet_hours: 48,
            page_review_quiet_minutes: 60,
            log_level: "info".into(),
            log_destination: LogDestination::Terminal,
            log_file: PathBuf::from("nca.log"),
            titles: Vec::new(),
            mocs: Vec::new(),
        }
    }
}

impl AppConfig {
    /// A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("unable to read {}", path.display()))
            }
        };
        ron::from_str(&text).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .with_context(|| format!("invalid log_level {:?}", self.log_level))
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            cache_path: self.cache_path.join("http"),
            throttle: Duration::from_millis(self.http_throttle_ms),
            request_timeout: Duration::from_secs(self.http_timeout_secs),
            ..CacheSettings::default()
        }
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            webroot: self.webroot.clone(),
            sftp_path: self.sftp_upload_path.clone(),
            scan_path: self.scan_upload_path.clone(),
            batch_output_path: self.batch_output_path.clone(),
            sftp_marc_org_code: self.pdf_batch_marc_org_code.clone(),
            cache_path: self.cache_path.clone(),
            batch_throttle: Duration::from_millis(self.http_throttle_ms),
            scan_web: self.scan_web,
            scan_database: self.scan_database,
            scan_sftp: self.scan_sftp,
            scan_scans: self.scan_scans,
            scan_disk_batches: self.scan_disk_batches,
        }
    }

    pub fn watcher_settings(&self) -> WatcherSettings {
        WatcherSettings {
            interval: Duration::from_secs(self.watch_interval_secs),
            full_refresh: Duration::from_secs(self.full_refresh_days * 24 * 60 * 60),
            ..WatcherSettings::default()
        }
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            quiet_period: chrono::Duration::hours(self.upload_quiet_hours),
            ..UploadSettings::default()
        }
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            claim_duration: chrono::Duration::days(self.claim_days),
            page_review_quiet: chrono::Duration::minutes(self.page_review_quiet_minutes),
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            limits: PackingLimits {
                min_pages: self.min_batch_pages,
                max_pages: self.max_batch_pages,
                long_wait_days: self.long_wait_days,
                embargo_days: self.embargo_days,
            },
        }
    }
}
