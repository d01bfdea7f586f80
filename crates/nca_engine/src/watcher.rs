//! Background refresh loop for a [`Scanner`].
//!
//! The watcher owns a thread with its own tokio runtime, the same shape as a
//! command-driven engine handle: callers keep a cheap handle and read the
//! scanner's snapshot whenever they like.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nca_logging::{nca_error, nca_info, nca_warn, ScanPassGuard};
use thiserror::Error;

use crate::scanner::Scanner;
use crate::sources::ScanError;

/// One watcher per process.
static WATCHER_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    /// Time between scan passes.
    pub interval: Duration,
    /// How often the HTTP cache is purged so the live site is re-read.
    pub full_refresh: Duration,
    /// How long the loop sleeps between checks.
    pub tick: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            full_refresh: Duration::from_secs(7 * 24 * 60 * 60),
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("a watcher is already running in this process")]
    AlreadyRunning,
    #[error("unable to start watcher runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("unable to spawn watcher thread: {0}")]
    Thread(#[source] io::Error),
}

#[derive(Debug, Default)]
pub struct WatcherStatus {
    running: AtomicBool,
    refreshing: AtomicBool,
    finished: AtomicBool,
}

impl WatcherStatus {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Marks a refresh as in flight until the guard drops. `None` when one
    /// is already running.
    pub fn begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        self.refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RefreshGuard { status: self })
    }
}

pub struct RefreshGuard<'a> {
    status: &'a WatcherStatus,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.status.refreshing.store(false, Ordering::SeqCst);
    }
}

struct WatchState {
    scanner: Arc<Scanner>,
    settings: WatcherSettings,
    status: WatcherStatus,
    pass: AtomicU64,
}

impl WatchState {
    async fn refresh(&self, purge: bool) -> Result<bool, ScanError> {
        let Some(_guard) = self.status.begin_refresh() else {
            nca_warn!("Scanner refresh requested while one is already running; ignoring");
            return Ok(false);
        };

        if purge {
            if let Err(err) = self.scanner.client().purge() {
                nca_warn!("Unable to purge HTTP cache before full refresh: {err}");
            }
        }

        let pass = self.pass.fetch_add(1, Ordering::SeqCst) + 1;
        let _pass = ScanPassGuard::enter(pass);
        let started = Instant::now();
        let snapshot = self.scanner.refresh().await?;
        nca_info!(
            "Published {} issues in {:.1?}",
            snapshot.finder().issues.len(),
            started.elapsed()
        );
        Ok(true)
    }

    async fn watch(&self) {
        match self.scanner.load_cache() {
            Ok(true) => {}
            Ok(false) => nca_info!("No scanner cache yet; waiting for the first scan pass"),
            Err(err) => nca_warn!("Unable to load scanner cache: {err}"),
        }

        let mut last_refresh: Option<Instant> = None;
        let mut last_purge = Instant::now();
        while self.status.is_running() {
            if last_refresh.map_or(true, |at| at.elapsed() >= self.settings.interval) {
                let purge = last_purge.elapsed() >= self.settings.full_refresh;
                match self.refresh(purge).await {
                    Ok(true) => {
                        if purge {
                            last_purge = Instant::now();
                        }
                        if let Err(err) = self.scanner.save_cache() {
                            nca_error!("Unable to write scanner cache: {err}");
                        }
                    }
                    Ok(false) => {}
                    Err(err) => nca_error!("Scan pass failed; keeping previous results: {err}"),
                }
                last_refresh = Some(Instant::now());
            }
            tokio::time::sleep(self.settings.tick).await;
        }
    }
}

/// Handle to the background refresh loop.
pub struct Watcher {
    state: Arc<WatchState>,
    done: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Watcher {
    pub fn new(scanner: Arc<Scanner>, settings: WatcherSettings) -> Self {
        Self {
            state: Arc::new(WatchState {
                scanner,
                settings,
                status: WatcherStatus::default(),
                pass: AtomicU64::new(0),
            }),
            done: Mutex::new(None),
        }
    }

    pub fn scanner(&self) -> &Arc<Scanner> {
        &self.state.scanner
    }

    pub fn status(&self) -> &WatcherStatus {
        &self.state.status
    }

    /// Starts the loop on its own thread.
    pub fn start(&self) -> Result<(), WatcherError> {
        if WATCHER_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WatcherError::AlreadyRunning);
        }

        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                WATCHER_ACTIVE.store(false, Ordering::SeqCst);
                return Err(WatcherError::Runtime(err));
            }
        };

        let (done_tx, done_rx) = mpsc::channel();
        let state = Arc::clone(&self.state);
        state.status.running.store(true, Ordering::SeqCst);
        state.status.finished.store(false, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("nca-watcher".into())
            .spawn(move || {
                runtime.block_on(state.watch());
                let _ = done_tx.send(());
            });
        if let Err(err) = spawned {
            self.state.status.running.store(false, Ordering::SeqCst);
            WATCHER_ACTIVE.store(false, Ordering::SeqCst);
            return Err(WatcherError::Thread(err));
        }

        *self.done.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(done_rx);
        nca_info!("Watcher started");
        Ok(())
    }

    /// Runs one pass now. Returns false when a pass was already running.
    pub async fn refresh(&self) -> Result<bool, ScanError> {
        self.state.refresh(false).await
    }

    /// Lets the current pass finish, then waits for the loop to exit.
    pub fn stop(&self) {
        self.state.status.running.store(false, Ordering::SeqCst);
        let done = self.done.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(done) = done {
            let _ = done.recv();
            WATCHER_ACTIVE.store(false, Ordering::SeqCst);
            nca_info!("Watcher stopped");
        }
        self.state.status.finished.store(true, Ordering::SeqCst);
    }
}

impl Drop for Watcher {
    /// Stops a loop that is still running. A handle that never started
    /// leaves the process-wide slot alone.
    fn drop(&mut self) {
        if self.state.status.is_running() {
            self.stop();
        }
    }
}
