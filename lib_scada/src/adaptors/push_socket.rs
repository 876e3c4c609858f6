//! # WebSocket Push Adaptor
//!
//! Opens one WebSocket connection on `connect` and broadcasts every inbound
//! text or binary frame as one message. There is no reconnection: when the
//! remote side closes or the socket errors, the stream goes quiet and the
//! failure is reported at `disconnect`.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::worker::{FailureSlot, Worker};
use super::{decode_frame, AdaptorError};
use crate::core::dispatcher::Dispatcher;

pub struct PushSocketAdaptor {
    url: Url,
    dispatcher: Arc<Dispatcher>,
    worker: Worker,
}

impl PushSocketAdaptor {
    /// Accepts only absolute `ws://` or `wss://` URLs.
    pub fn new(url: Option<&str>) -> Result<Self, AdaptorError> {
        let raw = url.ok_or(AdaptorError::MissingUrl { kind: "ws" })?;
        let url = Url::parse(raw).map_err(|e| AdaptorError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(AdaptorError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}', expected ws or wss", url.scheme()),
            });
        }

        Ok(Self {
            dispatcher: Dispatcher::new(format!("ws {}", url)),
            url,
            worker: Worker::new("ws"),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn connect(&self) -> Arc<Dispatcher> {
        let url = self.url.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        self.worker
            .spawn_once(move |token, failure| run(url, dispatcher, token, failure));
        Arc::clone(&self.dispatcher)
    }

    pub fn disconnect(&self) -> Result<(), AdaptorError> {
        self.dispatcher.close();
        self.worker.stop()
    }
}

async fn run(url: Url, dispatcher: Arc<Dispatcher>, token: CancellationToken, failure: FailureSlot) {
    log::info!("Connecting to WebSocket: {}", url);

    let connected = tokio::select! {
        _ = token.cancelled() => return,
        connected = connect_async(url.as_str()) => connected,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            log::error!("Failed to connect to {}: {}", url, e);
            failure.record(format!("connect to {} failed: {}", url, e));
            return;
        }
    };

    log::info!("Connected to {}", url);
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = write.close().await {
                    log::debug!("Closing {} failed: {}", url, e);
                }
                break;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.broadcast(decode_frame(text.as_str().as_bytes()));
                    }
                    Some(Ok(Message::Binary(bin))) => {
                        dispatcher.broadcast(decode_frame(&bin));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("WebSocket {} closed by remote host.", url);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::error!("WebSocket {} read error: {}", url, e);
                        failure.record(format!("read from {} failed: {}", url, e));
                        break;
                    }
                }
            }
        }
    }

    log::debug!("WebSocket worker for {} stopped", url);
}
