//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest` with middleware
//! support for exponential backoff retries and standardized response
//! handling. The polling adaptor issues one `fetch_value` per tick.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;

/// A standardized container for API responses.
///
/// Wraps the decoded body together with the HTTP transaction metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The decoded response body, present on success.
    pub data: Option<T>,
    /// The raw body returned by the server when the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Whether the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client.
///
/// Handles the base URL, default headers, an optional bearer token, and
/// automatic retries.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// Headers sent with every request.
    default_headers: HeaderMap,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient` with an exponential backoff retry policy.
    ///
    /// # Arguments
    /// * `base_url` - Absolute base URL (e.g., "https://api.example.com/v1/").
    /// * `default_headers` - Headers attached to every request.
    /// * `max_retries` - Retries of transient failures per request.
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute URL or the HTTP client cannot be built.
    pub fn new(base_url: &str, default_headers: HeaderMap, max_retries: u32) -> anyhow::Result<Self> {
        let url = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL (must be absolute): {}", base_url))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("rscada/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            default_headers,
            auth_token: None,
        })
    }

    /// Attaches `Authorization: Bearer <token>` to every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GETs `path` and returns the body as JSON when it parses, otherwise as
    /// a JSON string.
    pub async fn fetch_value(&self, path: &str) -> anyhow::Result<ApiResponse<Value>> {
        let response: reqwest::Response = self.prepare(Method::GET, path)?.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();
        let text = response.text().await?;

        if status.is_success() {
            let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            Ok(ApiResponse {
                data: None,
                error_body: Some(text),
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }

    fn prepare(&self, method: Method, path: &str) -> anyhow::Result<RequestBuilder> {
        let full_url = self.base_url.join(path)?;
        let mut req = self
            .inner
            .request(method, full_url)
            .headers(self.default_headers.clone());

        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        Ok(req)
    }
}
