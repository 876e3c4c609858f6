//! # Core Engine Module
//!
//! The subscription lifecycle engine. Everything that decides *when* a
//! message may travel from an adaptor to a sink lives here; everything
//! that decides *how* bytes arrive lives in [`crate::adaptors`].
//!
//! ## Core Components:
//!
//! - **`model`**: Immutable declarations (`ScadaOptions`, sources, tags).
//! - **`ready_state`**: The per-instance lifecycle flag and the read-only
//!   liveness check handed to gated streams.
//! - **`dispatcher`**: Listener registration and synchronous fan-out of one
//!   adaptor stream, with cancellable subscriptions.
//! - **`gated_stream`**: A dispatcher view whose delivery is suppressed
//!   whenever the instance is not `Ready`.
//! - **`projection`**: The pure message → value resolver.
//! - **`binding`**: Per-source and per-tag runtime records.
//! - **`anomaly`**: Recoverable conditions and the channel they are reported on.
//! - **`scada`**: The orchestrator.

#![forbid(unsafe_code)]

/// Recoverable conditions reported by the engine.
pub mod anomaly;
/// Per-source and per-tag runtime bookkeeping.
pub mod binding;
/// Cancellable, ordered fan-out of adaptor messages.
pub mod dispatcher;
/// Readiness-gated view over a dispatcher.
pub mod gated_stream;
/// Source, tag and instance declarations.
pub mod model;
/// Message → value resolution.
pub mod projection;
/// The lifecycle state machine flag.
pub mod ready_state;
/// The orchestrator.
pub mod scada;

pub use dispatcher::{Dispatcher, Message, Subscription};
pub use gated_stream::GatedStream;
pub use projection::{lookup_path, resolve, ResolutionError};
pub use ready_state::{Liveness, ReadyState};
