//! # HTTP Polling Adaptor
//!
//! For REST endpoints without a streaming interface. A worker task issues
//! one GET per interval tick and broadcasts each successful response body as
//! one message.
//!
//! ## Key Design Principles:
//! - **Independent Ticks**: a failed or non-2xx tick is logged and skipped;
//!   the next tick tries again. The stream only ends on `disconnect`.
//! - **No Overlap**: a tick's request finishes (or is cancelled) before the
//!   next tick is awaited; late ticks are delayed, not bunched up.
//! - **Prompt Teardown**: the cancellation token interrupts both the wait
//!   and an in-flight request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::worker::Worker;
use super::AdaptorError;
use crate::core::dispatcher::Dispatcher;
use crate::core::model::Params;
use crate::retrieve::ky_http::ApiClient;

/// Poll interval when `params.interval` is absent.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// # Polling Config
///
/// Built from a source's `url` and `params`:
/// `interval` (ms), `headers` (object of strings), `token` (bearer),
/// `retries` (transient-failure retries per tick, default 0).
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub url: String,
    pub interval: Duration,
    pub headers: HeaderMap,
    pub auth_token: Option<String>,
    pub max_retries: u32,
}

impl PollingConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: DEFAULT_INTERVAL,
            headers: HeaderMap::new(),
            auth_token: None,
            max_retries: 0,
        }
    }

    pub fn from_params(url: Option<&str>, params: &Params) -> Result<Self, AdaptorError> {
        let url = url.ok_or(AdaptorError::MissingUrl { kind: "http" })?;
        let mut config = Self::new(url);

        if let Some(raw) = params.get("interval") {
            let millis = raw
                .as_u64()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| AdaptorError::InvalidParam {
                    name: "interval",
                    reason: format!("expected a positive number of milliseconds, got {}", raw),
                })?;
            config.interval = Duration::from_millis(millis);
        }

        if let Some(raw) = params.get("headers") {
            let entries = raw.as_object().ok_or_else(|| AdaptorError::InvalidParam {
                name: "headers",
                reason: "expected an object".to_string(),
            })?;
            for (name, value) in entries {
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    AdaptorError::InvalidParam {
                        name: "headers",
                        reason: format!("{}: {}", name, e),
                    }
                })?;
                let header_value = value
                    .as_str()
                    .and_then(|text| HeaderValue::from_str(text).ok())
                    .ok_or_else(|| AdaptorError::InvalidParam {
                        name: "headers",
                        reason: format!("{}: expected a header-safe string", name),
                    })?;
                config.headers.insert(header_name, header_value);
            }
        }

        if let Some(raw) = params.get("token") {
            let token = raw.as_str().ok_or_else(|| AdaptorError::InvalidParam {
                name: "token",
                reason: "expected a string".to_string(),
            })?;
            config.auth_token = Some(token.to_string());
        }

        if let Some(raw) = params.get("retries") {
            let retries = raw
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| AdaptorError::InvalidParam {
                    name: "retries",
                    reason: format!("expected a small non-negative integer, got {}", raw),
                })?;
            config.max_retries = retries;
        }

        Ok(config)
    }
}

/// # Polling Adaptor
pub struct PollingAdaptor {
    client: Arc<ApiClient>,
    interval: Duration,
    dispatcher: Arc<Dispatcher>,
    worker: Worker,
}

impl PollingAdaptor {
    /// Validates the configuration and prepares the HTTP client. Nothing is
    /// requested before `connect`.
    pub fn new(config: PollingConfig) -> Result<Self, AdaptorError> {
        let mut client = ApiClient::new(&config.url, config.headers.clone(), config.max_retries)
            .map_err(|e| AdaptorError::InvalidUrl {
                url: config.url.clone(),
                reason: format!("{:#}", e),
            })?;
        if let Some(token) = &config.auth_token {
            client = client.with_auth_token(token.clone());
        }

        Ok(Self {
            client: Arc::new(client),
            interval: config.interval,
            dispatcher: Dispatcher::new(format!("http {}", config.url)),
            worker: Worker::new("http"),
        })
    }

    pub fn connect(&self) -> Arc<Dispatcher> {
        let client = Arc::clone(&self.client);
        let dispatcher = Arc::clone(&self.dispatcher);
        let interval = self.interval;
        self.worker
            .spawn_once(move |token, _failure| run(client, interval, dispatcher, token));
        Arc::clone(&self.dispatcher)
    }

    pub fn disconnect(&self) -> Result<(), AdaptorError> {
        self.dispatcher.close();
        self.worker.stop()
    }
}

/// # Main Execution Loop
///
/// ## Workflow:
/// 1.  Wait for the next tick (the first fires immediately).
/// 2.  Issue the GET; on a 2xx broadcast the decoded body.
/// 3.  On error or non-2xx, log and go back to 1.
/// 4.  Exit as soon as the token is cancelled.
async fn run(
    client: Arc<ApiClient>,
    interval: Duration,
    dispatcher: Arc<Dispatcher>,
    token: CancellationToken,
) {
    log::info!("Polling {} every {:?}", client.base_url(), interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = client.fetch_value("") => outcome,
        };

        match outcome {
            Ok(response) if response.success => {
                if let Some(data) = response.data {
                    dispatcher.broadcast(data);
                }
            }
            Ok(response) => {
                log::warn!(
                    "Polling {} returned HTTP {}: {}",
                    client.base_url(),
                    response.status,
                    response.error_body.unwrap_or_default()
                );
            }
            Err(e) => {
                log::warn!("Polling {} failed: {:#}. Retrying next tick.", client.base_url(), e);
            }
        }
    }

    log::debug!("Polling {} stopped", client.base_url());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn config_reads_interval_headers_and_token() {
        let config = PollingConfig::from_params(
            Some("http://localhost/data"),
            &params(json!({
                "interval": 250,
                "headers": {"x-api-key": "secret"},
                "token": "abc",
                "retries": 2
            })),
        )
        .unwrap();

        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.headers["x-api-key"], "secret");
        assert_eq!(config.auth_token.as_deref(), Some("abc"));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn config_defaults_and_rejections() {
        let config = PollingConfig::from_params(Some("http://localhost/"), &Params::new()).unwrap();
        assert_eq!(config.interval, DEFAULT_INTERVAL);

        assert_eq!(
            PollingConfig::from_params(None, &Params::new()).unwrap_err(),
            AdaptorError::MissingUrl { kind: "http" }
        );
        assert!(matches!(
            PollingConfig::from_params(Some("http://x/"), &params(json!({"interval": 0}))),
            Err(AdaptorError::InvalidParam { name: "interval", .. })
        ));
        assert!(matches!(
            PollingConfig::from_params(Some("http://x/"), &params(json!({"headers": ["a"]}))),
            Err(AdaptorError::InvalidParam { name: "headers", .. })
        ));
    }

    #[test]
    fn relative_url_is_an_invalid_url() {
        let err = PollingAdaptor::new(PollingConfig::new("/relative")).err().unwrap();
        assert!(matches!(err, AdaptorError::InvalidUrl { .. }));
    }
}
