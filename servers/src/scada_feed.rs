use std::sync::Arc;

use anyhow::{Context, Result};
use lib_scada::configs::load_options;
use lib_scada::loggers::{set_debug, setup_logging};
use lib_scada::sinks::LogSink;
use lib_scada::{Anomaly, ReadyState, Scada};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;

mod feed_logic;
use feed_logic::{config, console};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    // Explicitly install the default crypto provider for rustls (wss:// sources)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = config::load_config();
    if config.debug == Some(true) {
        set_debug(true);
    }
    let log_dir = config.log_dir.clone().unwrap_or_else(|| "./logs".into());
    let log_path = setup_logging(&log_dir, config.log_level.as_deref().unwrap_or("info"), "scada_feed")?;
    log::info!("Logging to {}", log_path.display());

    let options_path = config.options_path.clone().context("No options file configured")?;
    let mut options = load_options(&options_path)?;
    if let Some(debug) = config.debug {
        options.debug = debug;
    }

    let (anomaly_tx, mut anomaly_rx) = mpsc::unbounded_channel::<Anomaly>();
    let anomaly_counter = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(anomaly) = anomaly_rx.recv().await {
            count += 1;
            log::debug!("Anomaly #{} ({:?})", count, anomaly.kind());
        }
        count
    });

    let mut scada = Scada::with_observer(options, Arc::new(LogSink), anomaly_tx);
    if scada.ready_state() == ReadyState::Init {
        scada.start();
    }
    log::info!("Instance {} running with sources {:?}", scada.id(), scada.source_ids());

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = config.stdin_feed.unwrap_or(true);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Ctrl-C received, initiating shutdown.");
                break;
            }
            _ = terminate() => {
                log::info!("SIGTERM received, initiating shutdown.");
                break;
            }
            line = stdin_lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Some((source_id, value)) = console::parse_feed_line(&line) {
                        // Refusals are already logged by the instance.
                        let _ = scada.feed(source_id, value);
                    }
                }
                Ok(None) => {
                    log::debug!("stdin closed, manual feeding disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    log::warn!("Failed to read stdin: {}. Manual feeding disabled.", e);
                    stdin_open = false;
                }
            }
        }
    }

    scada.close();
    // Dropping the instance drops the last observer sender.
    drop(scada);
    let anomalies = anomaly_counter.await.unwrap_or_default();

    log::info!("Shutdown complete ({} anomalies reported).", anomalies);
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut term_signal) => {
            term_signal.recv().await;
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    // On non-unix platforms, just wait forever.
    std::future::pending::<()>().await;
}
