//! # Ready State
//!
//! One flag per `Scada` instance. The orchestrator is the only writer; gated
//! streams only ever see it through a [`Liveness`] check.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Read-only capability answering "may a message be delivered right now?".
/// Evaluated once per message, never cached.
pub type Liveness = Arc<dyn Fn() -> bool + Send + Sync>;

/// Lifecycle of a `Scada` instance.
///
/// `Init → Ready → Suspended`, `Ready | Suspended → Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ReadyState {
    Init = 0,
    Ready = 1,
    Suspended = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ReadyState::Init,
            1 => ReadyState::Ready,
            2 => ReadyState::Suspended,
            _ => ReadyState::Closed,
        }
    }
}

/// Shared storage behind the lifecycle flag.
#[derive(Debug)]
pub(crate) struct ReadyCell(AtomicU8);

impl ReadyCell {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(ReadyState::Init as u8)))
    }

    pub(crate) fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Probe that is true only while the state is `Ready`.
    pub(crate) fn liveness(self: &Arc<Self>) -> Liveness {
        let cell = Arc::clone(self);
        Arc::new(move || cell.get() == ReadyState::Ready)
    }
}
