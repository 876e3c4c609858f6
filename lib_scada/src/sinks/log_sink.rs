//! # Log Sink
//!
//! Stands in for a renderer when running headless: every mount becomes an
//! info log line and a coloured console line.

use colored::*;
use serde_json::Value;

use super::{Sink, SinkFactory};
use crate::core::model::{ActionKind, TagDeclaration};

/// Factory producing one [`LogSink`] per tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

/// Sink bound to one target.
#[derive(Debug)]
struct LogTarget {
    /// Selector when declared, otherwise `#<tag id>`.
    locator: String,
    root: String,
}

impl SinkFactory for LogSink {
    fn create(&self, tag: &TagDeclaration, target_root: &str) -> Box<dyn Sink> {
        let locator = locator(tag);
        log::debug!("Mounter created for {} under {}", locator, target_root);
        Box::new(LogTarget {
            locator,
            root: target_root.to_string(),
        })
    }
}

fn locator(tag: &TagDeclaration) -> String {
    tag.selector.clone().unwrap_or_else(|| format!("#{}", tag.id))
}

impl Sink for LogTarget {
    fn mount(&mut self, target_id: &str, action: &ActionKind, value: Option<&Value>) {
        let rendered = value.map_or_else(|| "undefined".to_string(), Value::to_string);
        log::info!(
            "mount {} {} ({}) {} = {}",
            self.root,
            self.locator,
            target_id,
            action,
            rendered
        );
        println!(
            "{} {} {}",
            format!("[{} {}]", self.root, self.locator).truecolor(128, 128, 128),
            action.to_string().bright_cyan(),
            rendered.bright_white()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selector_takes_precedence_over_id() {
        let tag = TagDeclaration::new("pump", ActionKind::Fill).with_selector("g.pump > rect");
        assert_eq!(locator(&tag), "g.pump > rect");
        assert_eq!(locator(&TagDeclaration::new("pump", ActionKind::Fill)), "#pump");

        let mut sink = LogSink.create(&tag, "#svg");
        sink.mount("pump", &ActionKind::Fill, Some(&json!("#0F0")));
        sink.mount("pump", &ActionKind::Fill, None);
    }
}
