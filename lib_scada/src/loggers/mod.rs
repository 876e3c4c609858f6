//! # Logging
//!
//! All crate code logs through the `log` facade. This module holds the
//! process-wide debug flag that `ScadaOptions::debug` turns on, and, with the
//! `loggers` feature, a `fern` backend for binaries.

use std::sync::atomic::{AtomicBool, Ordering};

/// `fern` setup for binaries: stdout plus a timestamped log file.
#[cfg(feature = "loggers")]
pub mod setup;

#[cfg(feature = "loggers")]
pub use setup::{parse_level, setup_logging};

static DEBUG: AtomicBool = AtomicBool::new(false);

/// Turns the process-wide debug flag on or off. Turning it on also raises
/// the global log level to at least `Debug`; turning it off leaves the level
/// where it is.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
    if enabled && log::max_level() < log::LevelFilter::Debug {
        log::set_max_level(log::LevelFilter::Debug);
    }
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}
