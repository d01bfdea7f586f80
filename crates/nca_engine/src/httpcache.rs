//! Disk-memoized HTTP GETs.
//!
//! Every response body that goes through [`CacheClient::get_cached`] or
//! [`CacheClient::force_get`] is stored under the cache root, one
//! subdirectory per kind of document, so a rescan only downloads what it has
//! never seen.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use nca_logging::{nca_debug, nca_info};
use sha3::{Digest, Sha3_512};
use thiserror::Error;

use crate::persist::{ensure_dir, AtomicFileWriter, PersistError};

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub cache_path: PathBuf,
    /// Pause after every successful network response.
    pub throttle: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("cache"),
            throttle: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 32 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url {0:?}")]
    InvalidUrl(String),
    #[error("non-2xx response for GET {url}: {status}")]
    Status { url: String, status: u16 },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("redirect limit exceeded: {0}")]
    RedirectLimitExceeded(String),
    #[error("response too large (max {max_bytes}, actual {actual:?})")]
    TooLarge { max_bytes: u64, actual: Option<u64> },
    #[error("network error: {0}")]
    Network(String),
    #[error("unable to cache response: {0}")]
    Persist(#[from] PersistError),
    #[error("cache io error: {0}")]
    Io(#[from] io::Error),
}

/// Where a response lives in the cache and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub subdirectory: String,
    pub filename: String,
    /// Without the leading dot.
    pub extension: String,
}

impl Request {
    pub fn new(
        url: impl Into<String>,
        subdirectory: impl Into<String>,
        filename: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            subdirectory: subdirectory.into(),
            filename: filename.into(),
            extension: extension.into(),
        }
    }

    /// Derives the cache filename from the URL: `<last non-empty path segment>-<hash>`
    /// with the segment's extension, where `<hash>` is 8 hex characters of the
    /// SHA3-512 of the full URL.
    pub fn auto(uri: &str, subdirectory: &str) -> Self {
        let path = url::Url::parse(uri)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| uri.to_string());
        let base = path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .last()
            .unwrap_or("index.html")
            .to_string();

        let (stem, extension) = match base.rfind('.') {
            Some(idx) if idx > 0 => (base[..idx].to_string(), base[idx + 1..].to_string()),
            _ => (base, String::new()),
        };

        let digest = Sha3_512::digest(uri.as_bytes());
        let hash: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

        Self::new(uri, subdirectory, format!("{stem}-{hash}"), extension)
    }

    /// Requests without a subdirectory are filed under their extension.
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        let dir = if self.subdirectory.is_empty() {
            root.join(&self.extension)
        } else {
            root.join(&self.subdirectory)
        };
        if self.extension.is_empty() {
            dir.join(&self.filename)
        } else {
            dir.join(format!("{}.{}", self.filename, self.extension))
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheClient {
    settings: CacheSettings,
    client: reqwest::Client,
}

impl CacheClient {
    pub fn new(settings: CacheSettings) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Same client and cache, different pause between requests.
    pub fn with_throttle(&self, throttle: Duration) -> Self {
        let mut copy = self.clone();
        copy.settings.throttle = throttle;
        copy
    }

    /// Always hits the network. Non-2xx responses are errors.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| HttpError::InvalidUrl(url.to_string()))?;
        nca_debug!("GET {url}");
        let response = self.client.get(parsed).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(HttpError::TooLarge {
                    max_bytes,
                    actual: Some(len),
                });
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(HttpError::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        if !self.settings.throttle.is_zero() {
            tokio::time::sleep(self.settings.throttle).await;
        }
        Ok(bytes)
    }

    /// Returns the cached body if there is one, otherwise downloads and
    /// stores it.
    pub async fn get_cached(&self, request: &Request) -> Result<Vec<u8>, HttpError> {
        let path = request.cache_path(&self.settings.cache_path);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.get_and_store(&request.url, &path).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Downloads and stores the body, replacing any cached copy.
    pub async fn force_get(&self, request: &Request) -> Result<Vec<u8>, HttpError> {
        let path = request.cache_path(&self.settings.cache_path);
        self.get_and_store(&request.url, &path).await
    }

    async fn get_and_store(&self, url: &str, path: &Path) -> Result<Vec<u8>, HttpError> {
        let bytes = self.get(url).await?;
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| HttpError::InvalidUrl(url.to_string()))?;
        AtomicFileWriter::for_file(path).write(filename, &bytes)?;
        Ok(bytes)
    }

    /// Drops every cached response so the next scan re-downloads everything.
    /// Plain files directly under the cache root are left alone.
    pub fn purge(&self) -> Result<usize, HttpError> {
        let root = &self.settings.cache_path;
        ensure_dir(root)?;
        let mut removed = 0;
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }
        nca_info!("Purged {removed} HTTP cache directories under {}", root.display());
        Ok(removed)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        return HttpError::Timeout(err.to_string());
    }
    if err.is_redirect() {
        return HttpError::RedirectLimitExceeded(err.to_string());
    }
    HttpError::Network(err.to_string())
}
