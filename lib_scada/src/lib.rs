//! # lib_scada
//!
//! Binds live, heterogeneous data feeds to named visual targets. A caller
//! declares sources (polled HTTP, WebSocket push, MQTT, or manually fed
//! values) and, per source, the tags that should receive projections of
//! every message. [`Scada`] wires one adaptor per source, fans its stream
//! out to the tags, gates delivery on its lifecycle state and tears
//! everything down on [`Scada::close`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use lib_scada::{ActionKind, Scada, ScadaOptions, SourceDeclaration, TagDeclaration, TransportKind};
//! use lib_scada::sinks::RecordingSink;
//! use serde_json::json;
//!
//! let options = ScadaOptions {
//!     auto_start: true,
//!     sources: vec![SourceDeclaration::new("s1", TransportKind::Manual)
//!         .with_tag(TagDeclaration::new("t1", ActionKind::Text).with_path("msg"))],
//!     ..Default::default()
//! };
//! let sink = Arc::new(RecordingSink::default());
//! let scada = Scada::new(options, sink.clone());
//! scada.feed("s1", json!({"msg": "hello"})).ok();
//! assert_eq!(sink.mounts().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod adaptors;
pub mod core;
pub mod loggers;
pub mod retrieve;
pub mod sinks;

#[cfg(feature = "configs")]
pub mod configs;

// --- Public API Re-exports ---
pub use crate::core::anomaly::{Anomaly, AnomalyKind};
pub use crate::core::model::{
    ActionKind, Params, Projector, ScadaOptions, SourceDeclaration, TagDeclaration, TransportKind,
};
pub use crate::core::ready_state::ReadyState;
pub use crate::core::scada::Scada;
pub use adaptors::{Adaptor, AdaptorError};
pub use sinks::{Sink, SinkFactory};
