//! # MQTT Publish/Subscribe Adaptor
//!
//! Connects to a broker, subscribes to the topics listed in
//! `params.topics`, and broadcasts every incoming publish as one message.
//!
//! Messages carry an envelope so projections can address both parts:
//!
//! ```json
//! { "topic": "plant/line1/temp", "payload": { "value": 21.5 } }
//! ```
//!
//! Broker URLs: `mqtt://` or `tcp://` (plain), `mqtts://` or `ssl://` (TLS),
//! `ws://` or `wss://` (MQTT over WebSocket).

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeFilter, Transport,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::worker::{FailureSlot, Worker};
use super::{decode_frame, AdaptorError};
use crate::core::dispatcher::Dispatcher;
use crate::core::model::Params;

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTTS_PORT: u16 = 8883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 10;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// # PubSub Config
///
/// Params: `topics` (array of strings, or a single string), `qos` (0, 1
/// or 2; default 0), `clientId` (default `rscada-<random>`).
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    pub url: Url,
    pub client_id: String,
    pub topics: Vec<String>,
    pub qos: QoS,
}

impl PubSubConfig {
    pub fn from_params(url: Option<&str>, params: &Params) -> Result<Self, AdaptorError> {
        let raw = url.ok_or(AdaptorError::MissingUrl { kind: "mqtt" })?;
        let url = Url::parse(raw).map_err(|e| AdaptorError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "mqtt" | "tcp" | "mqtts" | "ssl" | "ws" | "wss") {
            return Err(AdaptorError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(AdaptorError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing broker host".to_string(),
            });
        }

        let topics = match params.get("topics") {
            None => Vec::new(),
            Some(Value::String(topic)) => vec![topic.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| AdaptorError::InvalidParam {
                        name: "topics",
                        reason: format!("expected a topic string, got {}", item),
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(AdaptorError::InvalidParam {
                    name: "topics",
                    reason: format!("expected an array of strings, got {}", other),
                })
            }
        };

        let qos = match params.get("qos") {
            None => QoS::AtMostOnce,
            Some(raw) => match raw.as_u64() {
                Some(0) => QoS::AtMostOnce,
                Some(1) => QoS::AtLeastOnce,
                Some(2) => QoS::ExactlyOnce,
                _ => {
                    return Err(AdaptorError::InvalidParam {
                        name: "qos",
                        reason: format!("expected 0, 1 or 2, got {}", raw),
                    })
                }
            },
        };

        let client_id = match params.get("clientId") {
            None => format!("rscada-{:08x}", rand::random::<u32>()),
            Some(raw) => raw
                .as_str()
                .filter(|id| !id.is_empty() && !id.starts_with(' '))
                .map(str::to_string)
                .ok_or_else(|| AdaptorError::InvalidParam {
                    name: "clientId",
                    reason: "expected a non-empty string not starting with a space".to_string(),
                })?,
        };

        Ok(Self {
            url,
            client_id,
            topics,
            qos,
        })
    }

    /// Broker connection options for the configured scheme.
    pub fn mqtt_options(&self) -> MqttOptions {
        let host = self.url.host_str().unwrap_or_default().to_string();
        let mut options = match self.url.scheme() {
            "ws" | "wss" => {
                // Websocket transports take the full URL as the host.
                let port = self.url.port_or_known_default().unwrap_or(80);
                let mut options = MqttOptions::new(&self.client_id, self.url.as_str(), port);
                options.set_transport(if self.url.scheme() == "wss" {
                    Transport::wss_with_default_config()
                } else {
                    Transport::Ws
                });
                options
            }
            "mqtts" | "ssl" => {
                let port = self.url.port().unwrap_or(DEFAULT_MQTTS_PORT);
                let mut options = MqttOptions::new(&self.client_id, host, port);
                options.set_transport(Transport::tls_with_default_config());
                options
            }
            _ => MqttOptions::new(&self.client_id, host, self.url.port().unwrap_or(DEFAULT_MQTT_PORT)),
        };
        options.set_keep_alive(KEEP_ALIVE);
        options
    }
}

/// The message broadcast for one publish.
pub(crate) fn envelope(topic: &str, payload: &[u8]) -> Value {
    json!({
        "topic": topic,
        "payload": decode_frame(payload),
    })
}

pub struct PubSubAdaptor {
    config: PubSubConfig,
    dispatcher: Arc<Dispatcher>,
    worker: Worker,
}

impl PubSubAdaptor {
    pub fn new(config: PubSubConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(format!("mqtt {}", config.url)),
            config,
            worker: Worker::new("mqtt"),
        }
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }

    pub fn connect(&self) -> Arc<Dispatcher> {
        let config = self.config.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        self.worker
            .spawn_once(move |token, failure| run(config, dispatcher, token, failure));
        Arc::clone(&self.dispatcher)
    }

    pub fn disconnect(&self) -> Result<(), AdaptorError> {
        self.dispatcher.close();
        self.worker.stop()
    }
}

async fn run(config: PubSubConfig, dispatcher: Arc<Dispatcher>, token: CancellationToken, failure: FailureSlot) {
    log::info!("Connecting to MQTT broker {} as {}", config.url, config.client_id);
    let (client, mut eventloop) = AsyncClient::new(config.mqtt_options(), REQUEST_CAPACITY);

    if config.topics.is_empty() {
        log::warn!("MQTT source {} has no topics; nothing will be received", config.url);
    } else {
        let filters = config
            .topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), config.qos));
        if let Err(e) = client.subscribe_many(filters).await {
            failure.record(format!("subscribe on {} failed: {}", config.url, e));
            return;
        }
    }

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                shutdown(&client, &mut eventloop).await;
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatcher.broadcast(envelope(&publish.topic, &publish.payload));
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    log::debug!("MQTT {} subscription acknowledged: {:?}", config.url, ack.return_codes);
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("MQTT {} connection error: {}", config.url, e);
                    failure.record(format!("connection to {} failed: {}", config.url, e));
                    break;
                }
            }
        }
    }

    log::debug!("MQTT worker for {} stopped", config.url);
}

/// Sends DISCONNECT and drives the event loop until it is written out,
/// bounded by a short grace period.
async fn shutdown(client: &AsyncClient, eventloop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }
    let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        log::debug!("MQTT disconnect was not acknowledged in time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn config_reads_topics_qos_and_client_id() {
        let config = PubSubConfig::from_params(
            Some("mqtt://broker.local"),
            &params(json!({"topics": ["a/b", "c/#"], "qos": 1, "clientId": "panel-7"})),
        )
        .unwrap();

        assert_eq!(config.topics, vec!["a/b".to_string(), "c/#".to_string()]);
        assert_eq!(config.qos, QoS::AtLeastOnce);
        assert_eq!(config.client_id, "panel-7");
        assert_eq!(config.mqtt_options().broker_address(), ("broker.local".to_string(), 1883));
    }

    #[test]
    fn config_defaults_and_rejections() {
        let config = PubSubConfig::from_params(Some("tcp://10.0.0.5:1884"), &Params::new()).unwrap();
        assert!(config.topics.is_empty());
        assert_eq!(config.qos, QoS::AtMostOnce);
        assert!(config.client_id.starts_with("rscada-"));
        assert_eq!(config.mqtt_options().broker_address().1, 1884);

        assert!(matches!(
            PubSubConfig::from_params(Some("http://broker"), &Params::new()),
            Err(AdaptorError::InvalidUrl { .. })
        ));
        assert!(matches!(
            PubSubConfig::from_params(Some("mqtt://broker"), &params(json!({"qos": 3}))),
            Err(AdaptorError::InvalidParam { name: "qos", .. })
        ));
        assert!(matches!(
            PubSubConfig::from_params(Some("mqtt://broker"), &params(json!({"topics": [1]}))),
            Err(AdaptorError::InvalidParam { name: "topics", .. })
        ));
    }

    #[test]
    fn websocket_broker_keeps_the_full_url() {
        let config = PubSubConfig::from_params(Some("ws://broker:8080/mqtt"), &Params::new()).unwrap();
        let (host, port) = config.mqtt_options().broker_address();
        assert_eq!(host, "ws://broker:8080/mqtt");
        assert_eq!(port, 8080);
    }

    #[test]
    fn publish_is_wrapped_with_its_topic() {
        assert_eq!(
            envelope("test/topic", br#"{"text":"hello"}"#),
            json!({"topic": "test/topic", "payload": {"text": "hello"}})
        );
        assert_eq!(envelope("t", b"42.5C")["payload"], json!("42.5C"));
    }
}
