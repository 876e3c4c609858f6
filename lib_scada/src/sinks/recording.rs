use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use super::{Sink, SinkFactory};
use crate::core::model::{ActionKind, TagDeclaration};

/// One recorded `mount` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mount {
    pub target_id: String,
    pub action: ActionKind,
    pub value: Option<Value>,
}

impl Mount {
    pub fn new(target_id: impl Into<String>, action: ActionKind, value: Option<Value>) -> Self {
        Self {
            target_id: target_id.into(),
            action,
            value,
        }
    }
}

#[derive(Debug, Default)]
struct Journal {
    mounts: Vec<Mount>,
    created: Vec<String>,
}

/// # Recording Sink
///
/// A factory whose sinks append every mount to one shared journal. Cloning
/// shares the journal.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    journal: Arc<Mutex<Journal>>,
}

impl RecordingSink {
    /// Every mount so far, in call order.
    pub fn mounts(&self) -> Vec<Mount> {
        self.lock().mounts.clone()
    }

    /// Mounts of one target.
    pub fn mounts_for(&self, target_id: &str) -> Vec<Mount> {
        self.lock()
            .mounts
            .iter()
            .filter(|mount| mount.target_id == target_id)
            .cloned()
            .collect()
    }

    /// Tag ids for which a sink was created, in creation order.
    pub fn created(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SinkFactory for RecordingSink {
    fn create(&self, tag: &TagDeclaration, _target_root: &str) -> Box<dyn Sink> {
        self.lock().created.push(tag.id.clone());
        Box::new(self.clone())
    }
}

impl Sink for RecordingSink {
    fn mount(&mut self, target_id: &str, action: &ActionKind, value: Option<&Value>) {
        self.lock()
            .mounts
            .push(Mount::new(target_id, action.clone(), value.cloned()));
    }
}
