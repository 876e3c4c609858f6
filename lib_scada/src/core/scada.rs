//! # Scada Orchestrator
//!
//! Owns the declared sources, the lifecycle flag and the set of live
//! bindings. Only `start` and `close` add or remove bindings; `feed` only
//! reads them.
//!
//! ## Lifecycle:
//!
//! ```text
//! Init --start--> Ready --suspend--> Suspended
//! Ready | Suspended --close--> Closed (terminal)
//! ```
//!
//! Calls that make no sense in the current state are no-ops reported as
//! [`Anomaly::Lifecycle`]. A second `close` is silently ignored.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::anomaly::{Anomaly, Reporter};
use crate::core::binding::SourceBinding;
use crate::core::model::ScadaOptions;
use crate::core::ready_state::{ReadyCell, ReadyState};
use crate::loggers;
use crate::sinks::SinkFactory;

pub struct Scada {
    options: ScadaOptions,
    state: Arc<ReadyCell>,
    /// Live bindings in declaration order. Empty before `start` and after `close`.
    bindings: Vec<SourceBinding>,
    sinks: Arc<dyn SinkFactory>,
    reporter: Reporter,
}

impl Scada {
    /// Creates an instance whose anomalies are only logged.
    pub fn new(options: ScadaOptions, sinks: Arc<dyn SinkFactory>) -> Self {
        Self::build(options, sinks, Reporter::default())
    }

    /// Creates an instance that also sends every anomaly to `observer`.
    pub fn with_observer(
        options: ScadaOptions,
        sinks: Arc<dyn SinkFactory>,
        observer: mpsc::UnboundedSender<Anomaly>,
    ) -> Self {
        Self::build(options, sinks, Reporter::new(Some(observer)))
    }

    fn build(options: ScadaOptions, sinks: Arc<dyn SinkFactory>, reporter: Reporter) -> Self {
        if options.debug {
            loggers::set_debug(true);
        }

        let mut scada = Self {
            options,
            state: ReadyCell::new(),
            bindings: Vec::new(),
            sinks,
            reporter,
        };

        if scada.options.sources.is_empty() {
            scada.reporter.report(Anomaly::NoSources {
                instance: scada.options.id.clone(),
            });
        }
        if scada.options.auto_start {
            scada.start();
        }
        scada
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    pub fn options(&self) -> &ScadaOptions {
        &self.options
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    /// Ids of the currently bound sources, in declaration order.
    pub fn source_ids(&self) -> Vec<&str> {
        self.bindings.iter().map(SourceBinding::id).collect()
    }

    /// # Start
    ///
    /// Binds every declared source, in order, then flips the state to
    /// `Ready`. A source whose id is already bound is skipped and reported.
    /// Only valid from `Init`.
    pub fn start(&mut self) {
        let state = self.state.get();
        if state != ReadyState::Init {
            self.reporter.report(Anomaly::Lifecycle {
                operation: "start",
                state,
            });
            return;
        }

        let live = self.state.liveness();
        for source in &self.options.sources {
            if self.bindings.iter().any(|binding| binding.id() == source.id) {
                self.reporter.report(Anomaly::DuplicateSource(source.id.clone()));
                continue;
            }
            let binding = SourceBinding::bind(
                source,
                Arc::clone(&live),
                &self.sinks,
                &self.options.svg,
                &self.reporter,
            );
            self.bindings.push(binding);
        }

        self.state.set(ReadyState::Ready);
        log::debug!(
            "Instance {} started with {} source(s)",
            self.options.id,
            self.bindings.len()
        );
    }

    /// Stops delivery without releasing anything. Only valid from `Ready`.
    /// There is no way back to `Ready`.
    pub fn suspend(&mut self) {
        let state = self.state.get();
        if state != ReadyState::Ready {
            self.reporter.report(Anomaly::Lifecycle {
                operation: "suspend",
                state,
            });
            return;
        }
        self.state.set(ReadyState::Suspended);
        log::debug!("Instance {} suspended", self.options.id);
    }

    /// # Close
    ///
    /// Tears down every binding (adaptor first, then its subscriptions) and
    /// moves to `Closed`. A teardown failure is reported and the remaining
    /// bindings are still torn down. Once this returns, no sink is invoked
    /// again.
    pub fn close(&mut self) {
        if self.state.get() == ReadyState::Closed {
            log::debug!("Instance {} already closed", self.options.id);
            return;
        }

        for binding in self.bindings.drain(..) {
            let source_id = binding.id().to_string();
            if let Err(error) = binding.teardown() {
                self.reporter.report(Anomaly::Teardown { source_id, error });
            }
        }

        self.state.set(ReadyState::Closed);
        log::debug!("Instance {} closed", self.options.id);
    }

    /// # Feed
    ///
    /// Injects `data` into the manual source `source_id`. Every refusal is
    /// reported and also returned:
    /// - after `close`: [`Anomaly::Lifecycle`];
    /// - unknown or non-manual source: [`Anomaly::NoSuitableSource`];
    /// - the adaptor has no subscribers or is disconnected: [`Anomaly::FeedRefused`].
    pub fn feed(&self, source_id: &str, data: Value) -> Result<(), Anomaly> {
        let state = self.state.get();
        if state == ReadyState::Closed {
            return self.refuse(Anomaly::Lifecycle {
                operation: "feed",
                state,
            });
        }

        let manual = self
            .bindings
            .iter()
            .find(|binding| binding.id() == source_id)
            .and_then(|binding| binding.adaptor().as_manual());
        let Some(manual) = manual else {
            return self.refuse(Anomaly::NoSuitableSource(source_id.to_string()));
        };

        match manual.feed(data) {
            Ok(0) => {
                log::trace!("Fed source {} while {:?}, nothing delivered", source_id, state);
                Ok(())
            }
            Ok(listeners) => {
                log::trace!("Fed source {} to {} listener(s)", source_id, listeners);
                Ok(())
            }
            Err(error) => self.refuse(Anomaly::FeedRefused {
                source_id: source_id.to_string(),
                error,
            }),
        }
    }

    fn refuse(&self, anomaly: Anomaly) -> Result<(), Anomaly> {
        self.reporter.report(anomaly.clone());
        Err(anomaly)
    }
}

impl Drop for Scada {
    fn drop(&mut self) {
        if self.state.get() != ReadyState::Closed {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptors::AdaptorError;
    use crate::core::anomaly::AnomalyKind;
    use crate::core::model::{ActionKind, SourceDeclaration, TagDeclaration, TransportKind};
    use crate::sinks::RecordingSink;
    use serde_json::json;

    fn options(sources: Vec<SourceDeclaration>) -> ScadaOptions {
        ScadaOptions {
            id: "test".to_string(),
            sources,
            ..Default::default()
        }
    }

    fn manual(id: &str) -> SourceDeclaration {
        SourceDeclaration::new(id, TransportKind::Manual)
            .with_tag(TagDeclaration::new("t1", ActionKind::Text).with_path("msg"))
    }

    fn observed(options: ScadaOptions) -> (Scada, RecordingSink, mpsc::UnboundedReceiver<Anomaly>) {
        let sink = RecordingSink::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let scada = Scada::with_observer(options, Arc::new(sink.clone()), tx);
        (scada, sink, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Anomaly>) -> Vec<Anomaly> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn state_machine_walks_forward() {
        let (mut scada, _sink, mut rx) = observed(options(vec![manual("s1")]));
        assert_eq!(scada.ready_state(), ReadyState::Init);

        scada.start();
        assert_eq!(scada.ready_state(), ReadyState::Ready);
        scada.suspend();
        assert_eq!(scada.ready_state(), ReadyState::Suspended);
        scada.close();
        assert_eq!(scada.ready_state(), ReadyState::Closed);
        assert!(scada.source_ids().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn misuse_is_reported_as_lifecycle_noop() {
        let (mut scada, _sink, mut rx) = observed(options(vec![manual("s1")]));
        scada.suspend();
        scada.start();
        scada.start();
        scada.close();
        scada.close();
        scada.suspend();
        assert_eq!(scada.ready_state(), ReadyState::Closed);

        let kinds: Vec<_> = drain(&mut rx).iter().map(Anomaly::kind).collect();
        assert_eq!(kinds, vec![AnomalyKind::Lifecycle; 3]);
    }

    #[test]
    fn empty_sources_are_reported_at_construction() {
        let (scada, _sink, mut rx) = observed(options(Vec::new()));
        assert_eq!(scada.ready_state(), ReadyState::Init);
        assert!(matches!(drain(&mut rx).as_slice(), [Anomaly::NoSources { instance }] if instance == "test"));
    }

    #[test]
    fn auto_start_binds_at_construction() {
        let mut opts = options(vec![manual("s1")]);
        opts.auto_start = true;
        let (scada, sink, _rx) = observed(opts);
        assert_eq!(scada.ready_state(), ReadyState::Ready);

        scada.feed("s1", json!({"msg": "hi"})).unwrap();
        assert_eq!(sink.mounts()[0].value, Some(json!("hi")));
    }

    #[test]
    fn feed_refusals_are_reported_and_returned() {
        let (mut scada, _sink, mut rx) = observed(options(vec![
            manual("s1"),
            SourceDeclaration::new("quiet", TransportKind::Manual),
        ]));
        assert!(matches!(scada.feed("s1", json!(1)), Err(Anomaly::NoSuitableSource(_))));

        scada.start();
        assert!(matches!(scada.feed("nope", json!(1)), Err(Anomaly::NoSuitableSource(_))));
        assert!(matches!(scada.feed("quiet", json!(1)), Err(Anomaly::FeedRefused { .. })));

        scada.close();
        assert!(matches!(scada.feed("s1", json!(1)), Err(Anomaly::Lifecycle { operation: "feed", .. })));
        assert_eq!(drain(&mut rx).len(), 4);
    }

    #[test]
    fn suspended_feed_is_accepted_but_delivers_nothing() {
        let (mut scada, sink, mut rx) = observed(options(vec![manual("s1")]));
        scada.start();
        let manual = scada.bindings[0].adaptor().as_manual().unwrap();
        assert_eq!(manual.feed(json!({"msg": "live"})), Ok(1));

        scada.suspend();
        let manual = scada.bindings[0].adaptor().as_manual().unwrap();
        assert_eq!(manual.feed(json!({"msg": "quiet"})), Ok(0));
        assert!(scada.feed("s1", json!({"msg": "quiet"})).is_ok());

        assert_eq!(sink.mounts().len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn teardown_continues_past_a_failing_adaptor() {
        // No runtime here, so the polling worker records a transport failure.
        let polled = SourceDeclaration::new("poll", TransportKind::Http).with_url("http://127.0.0.1:9/data");
        let (mut scada, _sink, mut rx) = observed(options(vec![polled, manual("s1")]));
        scada.start();
        assert_eq!(scada.source_ids(), vec!["poll", "s1"]);
        let source = Arc::clone(scada.bindings[1].stream().source());
        assert_eq!(source.listener_count(), 1);

        scada.close();

        let anomalies = drain(&mut rx);
        assert!(matches!(
            anomalies.as_slice(),
            [Anomaly::Teardown { source_id, error: AdaptorError::Transport(_) }] if source_id == "poll"
        ));
        assert!(source.is_closed());
        assert_eq!(source.listener_count(), 0);
        assert_eq!(scada.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn drop_closes_the_instance() {
        let sink = RecordingSink::default();
        let mut scada = Scada::new(options(vec![manual("s1")]), Arc::new(sink.clone()));
        scada.start();
        let source = Arc::clone(scada.bindings[0].stream().source());
        drop(scada);

        assert!(source.is_closed());
        assert_eq!(source.listener_count(), 0);
    }
}
