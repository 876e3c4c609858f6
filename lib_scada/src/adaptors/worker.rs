use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::AdaptorError;

/// Last fatal transport error seen by a worker task.
#[derive(Debug, Clone, Default)]
pub(crate) struct FailureSlot(Arc<Mutex<Option<String>>>);

impl FailureSlot {
    pub(crate) fn record(&self, failure: impl Into<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure.into());
    }

    fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Background task bookkeeping shared by the network adaptors: spawn at
/// most once, stop through a cancellation token.
#[derive(Debug)]
pub(crate) struct Worker {
    kind: &'static str,
    token: CancellationToken,
    started: AtomicBool,
    failure: FailureSlot,
}

impl Worker {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
            failure: FailureSlot::default(),
        }
    }

    /// Spawns the task on the current tokio runtime unless it already ran or
    /// the worker was stopped. Without a runtime the failure is recorded and
    /// the stream simply stays silent.
    pub(crate) fn spawn_once<F, Fut>(&self, task: F)
    where
        F: FnOnce(CancellationToken, FailureSlot) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.token.is_cancelled() {
            log::debug!("{} adaptor disconnected before connect, not starting", self.kind);
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task(self.token.clone(), self.failure.clone()));
            }
            Err(e) => {
                log::error!("Cannot start {} adaptor outside a tokio runtime: {}", self.kind, e);
                self.failure.record(format!("no tokio runtime: {}", e));
            }
        }
    }

    pub(crate) fn stop(&self) -> Result<(), AdaptorError> {
        self.token.cancel();
        match self.failure.take() {
            Some(failure) => Err(AdaptorError::Transport(failure)),
            None => Ok(()),
        }
    }
}
