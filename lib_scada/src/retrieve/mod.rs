//! # Data Retrieval Module
//!
//! HTTP plumbing shared by the polling adaptor: request building, default
//! headers, and retries of transient failures with exponential backoff.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`.

#![forbid(unsafe_code)]

/// Generic HTTP API client with retry middleware.
pub mod ky_http;
