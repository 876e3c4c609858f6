//! # Manual Adaptor
//!
//! A push-only sink standing in for a transport. It never emits on its own;
//! every message comes from [`ManualAdaptor::feed`], delivered synchronously
//! to all current subscribers before `feed` returns. Unknown or broken
//! transport declarations also end up here.

use std::sync::Arc;

use serde_json::Value;

use super::AdaptorError;
use crate::core::dispatcher::Dispatcher;

pub struct ManualAdaptor {
    dispatcher: Arc<Dispatcher>,
}

impl ManualAdaptor {
    pub fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new("manual"),
        }
    }

    pub fn connect(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn disconnect(&self) -> Result<(), AdaptorError> {
        self.dispatcher.close();
        Ok(())
    }

    /// Injects one message. Returns how many subscribers received it.
    pub fn feed(&self, data: Value) -> Result<usize, AdaptorError> {
        if self.dispatcher.is_closed() {
            return Err(AdaptorError::Disconnected);
        }
        if self.dispatcher.listener_count() == 0 {
            return Err(AdaptorError::NoSubscribers);
        }
        Ok(self.dispatcher.broadcast(data))
    }
}

impl Default for ManualAdaptor {
    fn default() -> Self {
        Self::new()
    }
}
