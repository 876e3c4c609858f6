//! # Bindings
//!
//! A [`SourceBinding`] ties one declared source to its adaptor, the gated
//! view of the adaptor's stream, and one subscription per tag. Each tag
//! subscription owns a [`TagBinding`], the per-tag runtime record whose sink
//! is created on the first delivered message and dropped together with the
//! subscription.

use std::sync::Arc;

use serde_json::Value;

use crate::adaptors::{resolve_adaptor, Adaptor, AdaptorError, Fallback};
use crate::core::anomaly::{Anomaly, Reporter};
use crate::core::dispatcher::{Message, Subscription};
use crate::core::gated_stream::GatedStream;
use crate::core::model::{SourceDeclaration, TagDeclaration};
use crate::core::projection::resolve;
use crate::core::ready_state::Liveness;
use crate::sinks::{Sink, SinkFactory};

pub(crate) struct TagBinding {
    source_id: String,
    tag: TagDeclaration,
    target_root: String,
    sinks: Arc<dyn SinkFactory>,
    /// Empty until the first delivered message, then set once.
    sink: Option<Box<dyn Sink>>,
    reporter: Reporter,
}

impl TagBinding {
    pub(crate) fn new(
        source_id: &str,
        tag: TagDeclaration,
        target_root: &str,
        sinks: Arc<dyn SinkFactory>,
        reporter: Reporter,
    ) -> Self {
        Self {
            source_id: source_id.to_string(),
            tag,
            target_root: target_root.to_string(),
            sinks,
            sink: None,
            reporter,
        }
    }

    /// Handles one message that passed the gate.
    pub(crate) fn deliver(&mut self, message: &Value) {
        let sink = self.sink.get_or_insert_with(|| {
            log::debug!("Creating sink for tag {} of source {}", self.tag.id, self.source_id);
            self.sinks.create(&self.tag, &self.target_root)
        });

        match resolve(message, &self.tag) {
            Ok(value) => sink.mount(&self.tag.id, &self.tag.action, value.as_ref()),
            Err(error) => self.reporter.report(Anomaly::Resolution {
                source_id: self.source_id.clone(),
                error,
            }),
        }
    }
}

/// # Source Binding
///
/// Created by `Scada::start`, destroyed by `Scada::close`.
pub struct SourceBinding {
    id: String,
    adaptor: Adaptor,
    stream: GatedStream,
    subscriptions: Vec<Subscription>,
}

impl SourceBinding {
    /// # Bind
    ///
    /// ## Workflow:
    /// 1.  Resolve the adaptor, reporting any fallback to Manual.
    /// 2.  Connect it and wrap its stream in the liveness gate.
    /// 3.  Subscribe one [`TagBinding`] per tag, in declaration order.
    pub(crate) fn bind(
        source: &SourceDeclaration,
        live: Liveness,
        sinks: &Arc<dyn SinkFactory>,
        target_root: &str,
        reporter: &Reporter,
    ) -> Self {
        let (adaptor, fallback) = resolve_adaptor(&source.kind, source.url.as_deref(), &source.params);
        match fallback {
            Some(Fallback::UnknownKind(kind)) => reporter.report(Anomaly::UnknownTransport {
                source_id: source.id.clone(),
                kind,
            }),
            Some(Fallback::Invalid(error)) => reporter.report(Anomaly::AdaptorFallback {
                source_id: source.id.clone(),
                error,
            }),
            None => {}
        }

        let stream = GatedStream::new(adaptor.connect(), live);

        let subscriptions = source
            .tags
            .iter()
            .map(|tag| {
                log::debug!("Subscribing tag {} to source {}", tag.id, source.id);
                let mut binding = TagBinding::new(
                    &source.id,
                    tag.clone(),
                    target_root,
                    Arc::clone(sinks),
                    reporter.clone(),
                );
                stream.subscribe(move |message: &Message| binding.deliver(message))
            })
            .collect();

        Self {
            id: source.id.clone(),
            adaptor,
            stream,
            subscriptions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn adaptor(&self) -> &Adaptor {
        &self.adaptor
    }

    pub fn stream(&self) -> &GatedStream {
        &self.stream
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Disconnects the adaptor, then cancels every subscription. All
    /// subscriptions are cancelled even when the adaptor reports a failure,
    /// which is returned afterwards.
    pub(crate) fn teardown(self) -> Result<(), AdaptorError> {
        let disconnected = self.adaptor.disconnect();
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
        log::debug!("Source {} torn down ({} subscriptions)", self.id, self.subscriptions.len());
        disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ActionKind, TransportKind};
    use crate::core::ready_state::{ReadyCell, ReadyState};
    use crate::sinks::RecordingSink;
    use serde_json::json;

    fn manual_source() -> SourceDeclaration {
        SourceDeclaration::new("s1", TransportKind::Manual)
            .with_tag(TagDeclaration::new("t1", ActionKind::Text).with_path("msg"))
            .with_tag(TagDeclaration::new("t2", ActionKind::Fill))
    }

    #[test]
    fn sink_is_created_lazily_and_once() {
        let recorder = Arc::new(RecordingSink::default());
        let sinks: Arc<dyn SinkFactory> = recorder.clone();
        let state = ReadyCell::new();
        state.set(ReadyState::Ready);

        let binding = SourceBinding::bind(&manual_source(), state.liveness(), &sinks, "body", &Reporter::default());
        assert_eq!(binding.subscription_count(), 2);
        assert!(recorder.created().is_empty());

        let manual = binding.adaptor().as_manual().unwrap();
        manual.feed(json!({"msg": "a"})).unwrap();
        manual.feed(json!({"msg": "b"})).unwrap();

        assert_eq!(recorder.created(), vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(recorder.mounts_for("t1").len(), 2);
        assert_eq!(recorder.mounts_for("t2")[1].value, Some(json!({"msg": "b"})));
    }

    #[test]
    fn teardown_cancels_every_subscription() {
        let recorder = Arc::new(RecordingSink::default());
        let sinks: Arc<dyn SinkFactory> = recorder.clone();
        let state = ReadyCell::new();
        state.set(ReadyState::Ready);

        let binding = SourceBinding::bind(&manual_source(), state.liveness(), &sinks, "body", &Reporter::default());
        let source = Arc::clone(binding.stream().source());
        assert_eq!(binding.teardown(), Ok(()));

        assert_eq!(source.listener_count(), 0);
        assert_eq!(source.broadcast(json!({"msg": "late"})), 0);
        assert!(recorder.mounts().is_empty());
    }

    #[test]
    fn resolution_failure_is_reported_and_skipped() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let recorder = Arc::new(RecordingSink::default());
        let sinks: Arc<dyn SinkFactory> = recorder.clone();
        let state = ReadyCell::new();
        state.set(ReadyState::Ready);

        let source = SourceDeclaration::new("s1", TransportKind::Manual).with_tag(
            TagDeclaration::new("t1", ActionKind::Text)
                .with_projector(|_| Err(anyhow::anyhow!("bad data"))),
        );
        let binding = SourceBinding::bind(&source, state.liveness(), &sinks, "body", &Reporter::new(Some(tx)));
        binding.adaptor().as_manual().unwrap().feed(json!(1)).unwrap();

        assert!(recorder.mounts().is_empty());
        assert!(matches!(rx.try_recv(), Ok(Anomaly::Resolution { .. })));
    }
}
