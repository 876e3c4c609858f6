//! # Sinks
//!
//! The engine never renders anything itself. For every tag it asks a
//! [`SinkFactory`] for a [`Sink`] the first time a message reaches that tag,
//! keeps it for the rest of the run, and calls [`Sink::mount`] with each
//! resolved value.
//!
//! - **`recording`**: keeps every mount in memory.
//! - **`log_sink`**: writes every mount to the log and the console.

/// In-memory sink that records every mount.
pub mod recording;

/// Log and console sink.
#[cfg(feature = "loggers")]
pub mod log_sink;

use serde_json::Value;

use crate::core::model::{ActionKind, TagDeclaration};

#[cfg(feature = "loggers")]
pub use log_sink::LogSink;
pub use recording::{Mount, RecordingSink};

/// Applies resolved values onto one visual target.
pub trait Sink: Send {
    /// `value` is `None` when the tag's path matched nothing.
    fn mount(&mut self, target_id: &str, action: &ActionKind, value: Option<&Value>);
}

/// Creates the sink of a tag, once, on the tag's first delivered message.
pub trait SinkFactory: Send + Sync {
    fn create(&self, tag: &TagDeclaration, target_root: &str) -> Box<dyn Sink>;
}
