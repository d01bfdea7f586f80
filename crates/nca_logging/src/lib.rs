#![deny(missing_docs)]
//! Logging for the curation workspace.
//!
//! The `nca_*` macros forward to the `log` facade. While a scan pass is
//! running on the current thread, every line is tagged with its number so
//! interleaved scanner and maintenance output can be told apart.

use std::cell::Cell;

thread_local! {
    static SCAN_PASS: Cell<u64> = const { Cell::new(0) };
}

/// Sets the scan pass number for the current thread. Zero clears it.
pub fn set_scan_pass(pass: u64) {
    SCAN_PASS.with(|v| v.set(pass));
}

/// The scan pass running on the current thread, or 0 outside of one.
pub fn scan_pass() -> u64 {
    SCAN_PASS.with(|v| v.get())
}

/// Tags the current thread with a scan pass until dropped, then restores
/// whatever pass was set before.
#[must_use = "the pass is cleared as soon as the guard is dropped"]
pub struct ScanPassGuard {
    previous: u64,
}

impl ScanPassGuard {
    /// Enters `pass` on the current thread.
    pub fn enter(pass: u64) -> Self {
        let previous = scan_pass();
        set_scan_pass(pass);
        Self { previous }
    }
}

impl Drop for ScanPassGuard {
    fn drop(&mut self) {
        set_scan_pass(self.previous);
    }
}

/// Shared body of the level macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __nca_log {
    ($level:ident, $($arg:tt)*) => {{
        let pass = $crate::scan_pass();
        if pass == 0 {
            log::$level!($($arg)*);
        } else {
            log::$level!("[pass {}] {}", pass, format_args!($($arg)*));
        }
    }};
}

/// Logs a trace-level message.
#[macro_export]
macro_rules! nca_trace {
    ($($arg:tt)*) => { $crate::__nca_log!(trace, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! nca_debug {
    ($($arg:tt)*) => { $crate::__nca_log!(debug, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! nca_info {
    ($($arg:tt)*) => { $crate::__nca_log!(info, $($arg)*) };
}

/// Logs a warn-level message.
#[macro_export]
macro_rules! nca_warn {
    ($($arg:tt)*) => { $crate::__nca_log!(warn, $($arg)*) };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! nca_error {
    ($($arg:tt)*) => { $crate::__nca_log!(error, $($arg)*) };
}

/// Installs a terminal logger for tests, without timestamps.
///
/// No-ops if a logger is already installed.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .set_time_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Error)
        .build();

    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_the_previous_pass() {
        set_scan_pass(3);
        {
            let _guard = ScanPassGuard::enter(4);
            assert_eq!(scan_pass(), 4);
            nca_info!("inside pass {}", 4);
        }
        assert_eq!(scan_pass(), 3);
        set_scan_pass(0);
    }

    #[test]
    fn passes_are_per_thread() {
        let _guard = ScanPassGuard::enter(9);
        let other = std::thread::spawn(scan_pass).join().unwrap();
        assert_eq!(other, 0);
    }
}
