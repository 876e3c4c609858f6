//! # Anomalies
//!
//! Nothing that goes wrong inside the engine is fatal. Each recoverable
//! condition becomes an [`Anomaly`], is logged, and is pushed to the optional
//! observer channel given to `Scada::with_observer`.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::adaptors::AdaptorError;
use crate::core::projection::ResolutionError;
use crate::core::ready_state::ReadyState;

/// Broad class of an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// Bad or surprising configuration; the affected slice degrades.
    Configuration,
    /// One message could not be projected for one tag.
    Resolution,
    /// An adaptor reported a transport failure.
    Transport,
    /// An operation was called in a state where it has no effect.
    Lifecycle,
}

#[derive(Debug, Error, Clone)]
pub enum Anomaly {
    #[error("No sources assigned to instance {instance}. Nothing would happen.")]
    NoSources { instance: String },

    #[error("Duplicated source id: {0}")]
    DuplicateSource(String),

    #[error("Unknown transport '{kind}' for source {source_id}, using manual adaptor")]
    UnknownTransport { source_id: String, kind: String },

    #[error("Source {source_id} falls back to manual adaptor: {error}")]
    AdaptorFallback {
        source_id: String,
        #[source]
        error: AdaptorError,
    },

    #[error("No suitable source found for feeding by id {0}")]
    NoSuitableSource(String),

    #[error("Source {source_id} refused manual feed: {error}")]
    FeedRefused {
        source_id: String,
        #[source]
        error: AdaptorError,
    },

    #[error("Source {source_id}: {error}")]
    Resolution {
        source_id: String,
        #[source]
        error: ResolutionError,
    },

    #[error("Teardown of source {source_id} reported: {error}")]
    Teardown {
        source_id: String,
        #[source]
        error: AdaptorError,
    },

    #[error("{operation}() has no effect in state {state:?}")]
    Lifecycle {
        operation: &'static str,
        state: ReadyState,
    },
}

impl Anomaly {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            Anomaly::NoSources { .. }
            | Anomaly::DuplicateSource(_)
            | Anomaly::UnknownTransport { .. }
            | Anomaly::AdaptorFallback { .. }
            | Anomaly::NoSuitableSource(_)
            | Anomaly::FeedRefused { .. } => AnomalyKind::Configuration,
            Anomaly::Resolution { .. } => AnomalyKind::Resolution,
            Anomaly::Teardown { .. } => AnomalyKind::Transport,
            Anomaly::Lifecycle { .. } => AnomalyKind::Lifecycle,
        }
    }
}

/// Logs anomalies and forwards them to the observer, if any.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reporter {
    observer: Option<mpsc::UnboundedSender<Anomaly>>,
}

impl Reporter {
    pub(crate) fn new(observer: Option<mpsc::UnboundedSender<Anomaly>>) -> Self {
        Self { observer }
    }

    pub(crate) fn report(&self, anomaly: Anomaly) {
        match anomaly.kind() {
            AnomalyKind::Resolution | AnomalyKind::Transport => log::error!("{}", anomaly),
            AnomalyKind::Configuration | AnomalyKind::Lifecycle => log::warn!("{}", anomaly),
        }
        if let Some(observer) = &self.observer {
            // A dropped receiver only means nobody is watching any more.
            let _ = observer.send(anomaly);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_forwards_to_observer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = Reporter::new(Some(tx));
        reporter.report(Anomaly::DuplicateSource("s1".to_string()));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.kind(), AnomalyKind::Configuration);
        assert_eq!(received.to_string(), "Duplicated source id: s1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reporter_without_observer_only_logs() {
        Reporter::default().report(Anomaly::Lifecycle {
            operation: "start",
            state: ReadyState::Closed,
        });
    }
}
