//! # Declarations
//!
//! The immutable inputs of a `Scada` instance. Everything except projector
//! closures can be read from JSON/JSON5 (camelCase keys, `type` for the
//! transport and action kinds).

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Transport-specific connection parameters (`interval`, `headers`, `topics`, ...).
pub type Params = Map<String, Value>;

/// A user-supplied projection. Errors (and panics) are caught at the call
/// site and reported as resolution failures for that one message.
pub type Projector = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// # Transport Kind
///
/// The declared transport of a source. Anything unrecognised is kept as
/// `Unknown` so the adaptor factory can fall back to a manual adaptor
/// instead of failing the whole configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportKind {
    /// Periodic HTTP GET.
    Http,
    /// WebSocket push.
    Ws,
    /// MQTT publish/subscribe.
    Mqtt,
    /// Values injected through `Scada::feed`.
    Manual,
    /// Unsupported kind, carried verbatim.
    Unknown(String),
}

impl From<String> for TransportKind {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "http" | "https" => TransportKind::Http,
            "ws" | "wss" | "websocket" => TransportKind::Ws,
            "mqtt" => TransportKind::Mqtt,
            "manual" => TransportKind::Manual,
            _ => TransportKind::Unknown(raw),
        }
    }
}

impl From<&str> for TransportKind {
    fn from(raw: &str) -> Self {
        TransportKind::from(raw.to_string())
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("http"),
            TransportKind::Ws => f.write_str("ws"),
            TransportKind::Mqtt => f.write_str("mqtt"),
            TransportKind::Manual => f.write_str("manual"),
            TransportKind::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// # Action Kind
///
/// How a sink should apply a value to its target. Opaque to the engine,
/// which only passes it through to `Sink::mount`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Replace the text content of the target.
    Text,
    /// Set the fill colour.
    Fill,
    /// Set the stroke colour.
    Stroke,
    /// Set the opacity.
    Opacity,
    /// Show or hide the target.
    Visible,
    /// Any other sink-defined action.
    Custom(String),
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => ActionKind::Text,
            "fill" => ActionKind::Fill,
            "stroke" => ActionKind::Stroke,
            "opacity" => ActionKind::Opacity,
            "visible" => ActionKind::Visible,
            _ => ActionKind::Custom(raw),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(raw: &str) -> Self {
        ActionKind::from(raw.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Text => f.write_str("text"),
            ActionKind::Fill => f.write_str("fill"),
            ActionKind::Stroke => f.write_str("stroke"),
            ActionKind::Opacity => f.write_str("opacity"),
            ActionKind::Visible => f.write_str("visible"),
            ActionKind::Custom(raw) => f.write_str(raw),
        }
    }
}

/// # Tag Declaration
///
/// Maps the messages of one source onto one visual target. `projector`
/// takes precedence over `path`; with neither, the raw message is
/// forwarded.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDeclaration {
    /// Target identifier handed to the sink.
    pub id: String,
    /// Optional selector used by the sink instead of `id` to locate the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// What the sink should do with the value.
    #[serde(rename = "type")]
    pub action: ActionKind,
    /// Code-only projection, never read from configuration files.
    #[serde(skip)]
    pub projector: Option<Projector>,
    /// Nested-field path such as `payload.items[0].value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl TagDeclaration {
    pub fn new(id: impl Into<String>, action: impl Into<ActionKind>) -> Self {
        Self {
            id: id.into(),
            selector: None,
            action: action.into(),
            projector: None,
            path: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_projector<F>(mut self, projector: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.projector = Some(Arc::new(projector));
        self
    }
}

impl fmt::Debug for TagDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDeclaration")
            .field("id", &self.id)
            .field("selector", &self.selector)
            .field("action", &self.action)
            .field("projector", &self.projector.as_ref().map(|_| "<fn>"))
            .field("path", &self.path)
            .finish()
    }
}

/// # Source Declaration
///
/// One external feed. Bound to exactly one adaptor when the instance starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDeclaration {
    /// Unique within one instance; duplicates are skipped at start.
    pub id: String,
    /// Transport used to reach the feed.
    #[serde(rename = "type")]
    pub kind: TransportKind,
    /// Endpoint; unused by manual sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Tags fed by this source, in delivery order.
    #[serde(default)]
    pub tags: Vec<TagDeclaration>,
    /// Transport-specific parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Params,
}

impl SourceDeclaration {
    pub fn new(id: impl Into<String>, kind: impl Into<TransportKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            url: None,
            tags: Vec::new(),
            params: Params::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_tag(mut self, tag: TagDeclaration) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// # Scada Options
///
/// Construction input of a `Scada` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScadaOptions {
    /// Instance identifier, used in logs. Defaults to 8 random digits.
    pub id: String,
    /// Root of the visual targets, passed through to the sink factory.
    pub svg: String,
    /// Turns on the process-wide debug flag.
    pub debug: bool,
    /// Calls `start()` at the end of construction.
    pub auto_start: bool,
    /// Declared sources, bound in order.
    pub sources: Vec<SourceDeclaration>,
}

impl Default for ScadaOptions {
    fn default() -> Self {
        Self {
            id: random_instance_id(),
            svg: "body".to_string(),
            debug: false,
            auto_start: false,
            sources: Vec::new(),
        }
    }
}

fn random_instance_id() -> String {
    format!("{:08}", rand::rng().random_range(0..100_000_000u32))
}
