//! # Adaptors Module
//!
//! One adaptor per declared source. Whatever the transport, an adaptor
//! exposes the same three things: `connect()` hands out its dispatcher (the
//! push stream), `disconnect()` releases the transport, and, for the manual
//! variant only, `feed()` injects a value.
//!
//! ## Contained Modules:
//! - **`polling`**: periodic HTTP GET through the retrying `ApiClient`.
//! - **`push_socket`**: WebSocket client; one frame is one message.
//! - **`pubsub`**: MQTT client; one publish on a subscribed topic is one message.
//! - **`manual`**: no transport at all, values arrive through `feed`.
//! - **`factory`**: maps a declared transport kind to one of the above.

#![forbid(unsafe_code)]

pub mod factory;
pub mod manual;
pub mod polling;
pub mod pubsub;
pub mod push_socket;
mod worker;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::dispatcher::Dispatcher;

pub use factory::{create_adaptor, resolve_adaptor, Fallback};
pub use manual::ManualAdaptor;
pub use polling::{PollingAdaptor, PollingConfig};
pub use pubsub::{PubSubAdaptor, PubSubConfig};
pub use push_socket::PushSocketAdaptor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdaptorError {
    #[error("{kind} adaptor requires a url")]
    MissingUrl { kind: &'static str },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no active subscribers")]
    NoSubscribers,

    #[error("adaptor is disconnected")]
    Disconnected,
}

/// # Adaptor
///
/// The closed set of transports a source can be bound to.
pub enum Adaptor {
    Polling(PollingAdaptor),
    PushSocket(PushSocketAdaptor),
    PubSub(PubSubAdaptor),
    Manual(ManualAdaptor),
}

impl Adaptor {
    pub fn kind(&self) -> &'static str {
        match self {
            Adaptor::Polling(_) => "polling",
            Adaptor::PushSocket(_) => "push-socket",
            Adaptor::PubSub(_) => "pubsub",
            Adaptor::Manual(_) => "manual",
        }
    }

    /// Starts producing (once) and returns the stream every subscriber
    /// attaches to. Further calls return the same stream.
    pub fn connect(&self) -> Arc<Dispatcher> {
        match self {
            Adaptor::Polling(adaptor) => adaptor.connect(),
            Adaptor::PushSocket(adaptor) => adaptor.connect(),
            Adaptor::PubSub(adaptor) => adaptor.connect(),
            Adaptor::Manual(adaptor) => adaptor.connect(),
        }
    }

    /// Stops producing and releases the transport. Idempotent. An `Err`
    /// reports a failure the transport hit earlier; the adaptor is
    /// released either way.
    pub fn disconnect(&self) -> Result<(), AdaptorError> {
        match self {
            Adaptor::Polling(adaptor) => adaptor.disconnect(),
            Adaptor::PushSocket(adaptor) => adaptor.disconnect(),
            Adaptor::PubSub(adaptor) => adaptor.disconnect(),
            Adaptor::Manual(adaptor) => adaptor.disconnect(),
        }
    }

    pub fn as_manual(&self) -> Option<&ManualAdaptor> {
        match self {
            Adaptor::Manual(adaptor) => Some(adaptor),
            _ => None,
        }
    }
}

/// Decodes a raw frame: JSON when it parses, else a UTF-8 string, else the
/// bytes as an array of numbers.
pub(crate) fn decode_frame(bytes: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        return value;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::from(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_decode_json_then_text_then_bytes() {
        assert_eq!(decode_frame(br#"{"text":"hi"}"#), json!({"text": "hi"}));
        assert_eq!(decode_frame(b"plain words"), json!("plain words"));
        assert_eq!(decode_frame(&[0xff, 0x00]), json!([255, 0]));
    }
}
