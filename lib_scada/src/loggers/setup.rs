use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use colored::Colorize;

/// Transport crates that are far too chatty at `Debug`.
const QUIET_TARGETS: [&str; 5] = ["hyper_util", "rustls", "tungstenite", "tokio_tungstenite", "rumqttc"];

/// Maps `debug|info|warn|error|trace|off` to a level filter; anything else is `Info`.
pub fn parse_level(raw: &str) -> log::LevelFilter {
    match raw.trim().to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// # Setup Logging
///
/// Sends every record to stdout and to `<log_dir>/<app_name>_<timestamp>.log`,
/// keeping only the newest older log of the same app next to the new one.
///
/// The dispatcher itself passes everything down to `Trace`; the effective
/// level is the global `log::max_level`, so [`super::set_debug`] can raise it
/// later. Returns the path of the new log file.
pub fn setup_logging(log_dir: &Path, log_level: &str, app_name: &str) -> Result<PathBuf> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    }

    cleanup_old_logs(log_dir, app_name)?;

    let log_file_name = format!("{}_{}.log", app_name, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let log_path = log_dir.join(log_file_name);

    let mut level = parse_level(log_level);
    if super::debug_enabled() && level < log::LevelFilter::Debug {
        level = log::LevelFilter::Debug;
    }

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let level = match record.level() {
                log::Level::Error => "ERROR".red().to_string(),
                log::Level::Warn => "WARN".yellow().to_string(),
                other => other.to_string(),
            };
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                level,
                message
            ))
        })
        .level(log::LevelFilter::Trace);
    for target in QUIET_TARGETS {
        dispatch = dispatch.level_for(target, log::LevelFilter::Info);
    }

    dispatch
        .chain(std::io::stdout())
        .chain(fern::log_file(&log_path).with_context(|| format!("Failed to open {}", log_path.display()))?)
        .apply()
        .context("A global logger is already installed")?;

    log::set_max_level(level);
    Ok(log_path)
}

/// Keeps the most recent `<app_name>_*.log` in `log_dir`, deletes the rest.
fn cleanup_old_logs(log_dir: &Path, app_name: &str) -> Result<()> {
    let prefix = format!("{}_", app_name);
    let mut entries: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();

    // Newest first
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in entries.iter().skip(1) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Failed to delete old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level(" warn "), log::LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), log::LevelFilter::Info);
    }

    #[test]
    fn cleanup_keeps_newest_log_of_the_app_only() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("scada_feed_1.log");
        let new = dir.path().join("scada_feed_2.log");
        let other = dir.path().join("other_app_1.log");
        let notes = dir.path().join("scada_feed_notes.txt");

        fs::write(&old, "old").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&new, "new").unwrap();
        fs::write(&other, "other").unwrap();
        fs::write(&notes, "notes").unwrap();

        cleanup_old_logs(dir.path(), "scada_feed").unwrap();

        assert!(!old.exists());
        assert!(new.exists());
        assert!(other.exists());
        assert!(notes.exists());
    }
}
