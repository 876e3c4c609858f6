//! # Gated Stream
//!
//! A view over an adaptor's dispatcher that suppresses delivery whenever its
//! liveness check says no. This is the single place where lifecycle state
//! meets transport data; adaptors never look at the instance state.

use std::sync::Arc;

use crate::core::dispatcher::{Dispatcher, Message, Subscription};
use crate::core::ready_state::Liveness;

#[derive(Clone)]
pub struct GatedStream {
    source: Arc<Dispatcher>,
    live: Liveness,
}

impl GatedStream {
    pub fn new(source: Arc<Dispatcher>, live: Liveness) -> Self {
        Self { source, live }
    }

    /// Registers `handler`; liveness is checked for every message, right
    /// before the handler would run. Suppressed messages do not count as
    /// delivered.
    pub fn subscribe<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(&Message) + Send + 'static,
    {
        let live = Arc::clone(&self.live);
        let label = self.source.label().to_string();
        self.source.subscribe_filtered(move |message: &Message| {
            if live() {
                handler(message);
                true
            } else {
                log::trace!("Gate closed on '{}', message suppressed", label);
                false
            }
        })
    }

    pub fn source(&self) -> &Arc<Dispatcher> {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn gate_is_evaluated_per_message() {
        let open = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&open);
        let stream = GatedStream::new(
            Dispatcher::new("gate"),
            Arc::new(move || flag.load(Ordering::SeqCst)),
        );

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = stream.subscribe(move |_: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(stream.source().broadcast(json!("before")), 0);
        open.store(true, Ordering::SeqCst);
        assert_eq!(stream.source().broadcast(json!("during")), 1);
        open.store(false, Ordering::SeqCst);
        assert_eq!(stream.source().broadcast(json!("after")), 0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
