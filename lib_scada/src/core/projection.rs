//! # Projection Resolver
//!
//! Turns a raw message into the value a tag forwards. Pure; no state.
//!
//! Precedence: the tag's projector, then its path, then the message itself.
//! Path lookup is null-safe and understands dotted segments and `[n]`
//! indices (`payload.items[0].value`, `payload.items.0.value`). A missing
//! segment yields `None`, never an error.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use thiserror::Error;

use crate::core::model::TagDeclaration;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("projector of tag '{tag}' failed: {message}")]
    Projector { tag: String, message: String },

    #[error("projector of tag '{tag}' panicked: {message}")]
    Panicked { tag: String, message: String },
}

impl ResolutionError {
    pub fn tag(&self) -> &str {
        match self {
            ResolutionError::Projector { tag, .. } | ResolutionError::Panicked { tag, .. } => tag,
        }
    }
}

/// Resolves `message` for `tag`. `Ok(None)` means the path did not match.
pub fn resolve(message: &Value, tag: &TagDeclaration) -> Result<Option<Value>, ResolutionError> {
    if let Some(projector) = &tag.projector {
        return match panic::catch_unwind(AssertUnwindSafe(|| projector(message))) {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(e)) => Err(ResolutionError::Projector {
                tag: tag.id.clone(),
                message: format!("{:#}", e),
            }),
            Err(payload) => Err(ResolutionError::Panicked {
                tag: tag.id.clone(),
                message: panic_message(payload.as_ref()),
            }),
        };
    }

    match tag.path.as_deref() {
        Some(path) if !path.is_empty() => Ok(lookup_path(message, path).cloned()),
        _ => Ok(Some(message.clone())),
    }
}

/// Null-safe nested lookup.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(|c| c == '.' || c == '[' || c == ']')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
