//! # Integration Test Support
//!
//! Loopback servers (HTTP, WebSocket, a minimal MQTT broker) and small
//! helpers shared by the `tests/` suites. Every server binds `127.0.0.1:0`,
//! so suites can run in parallel.

#![forbid(unsafe_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;

/// Installs `env_logger` once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// # HTTP Responder
///
/// Answers the n-th request with the n-th response and repeats the last one
/// afterwards. Every response closes its connection. Returns the address and
/// a counter of requests served.
pub async fn serve_http(responses: Vec<CannedResponse>) -> anyhow::Result<(SocketAddr, Arc<AtomicUsize>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let hits = Arc::new(AtomicUsize::new(0));
    let served = Arc::clone(&hits);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let index = served.fetch_add(1, Ordering::SeqCst);
            let Some(response) = responses.get(index).or(responses.last()).cloned() else {
                return;
            };
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    response.body.len(),
                    response.body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Ok((addr, hits))
}

/// # WebSocket Server
///
/// Accepts one client, sends `frames` in order, then keeps the connection
/// open until the client closes it. The returned counter reaches 1 once the
/// client's close has been seen.
pub async fn serve_ws(frames: Vec<Message>) -> anyhow::Result<(SocketAddr, Arc<AtomicUsize>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let closed = Arc::new(AtomicUsize::new(0));
    let seen_close = Arc::clone(&closed);

    tokio::spawn(async move {
        let Ok((socket, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
            return;
        };
        for frame in frames {
            if ws.send(frame).await.is_err() {
                return;
            }
        }
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                break;
            }
        }
        seen_close.fetch_add(1, Ordering::SeqCst);
    });

    Ok((addr, closed))
}

/// # MQTT Broker Stub
///
/// Speaks just enough MQTT 3.1.1 for one client: answers CONNECT with
/// CONNACK and SUBSCRIBE with SUBACK, then sends one QoS 0 PUBLISH of
/// `payload` on `topic`. Returns the address, the subscribed filters, and a
/// counter that reaches 1 once the client sent DISCONNECT or hung up.
pub async fn serve_mqtt(
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<(SocketAddr, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let subscribed = Arc::new(Mutex::new(Vec::new()));
    let filters = Arc::clone(&subscribed);
    let closed = Arc::new(AtomicUsize::new(0));
    let seen_close = Arc::clone(&closed);

    let mut publish = Vec::new();
    publish.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    publish.extend_from_slice(topic.as_bytes());
    publish.extend_from_slice(payload);

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        while let Some((header, body)) = read_mqtt_packet(&mut socket).await {
            let reply = match header >> 4 {
                // CONNECT
                1 => vec![0x20, 0x02, 0x00, 0x00],
                // SUBSCRIBE
                8 if body.len() >= 2 => {
                    let topics = subscribe_filters(&body[2..]);
                    let mut ack = vec![0x90];
                    encode_remaining_length(2 + topics.len(), &mut ack);
                    ack.extend_from_slice(&body[..2]);
                    ack.extend(std::iter::repeat_n(0x00, topics.len()));
                    filters.lock().unwrap_or_else(PoisonError::into_inner).extend(topics);

                    ack.push(0x30);
                    encode_remaining_length(publish.len(), &mut ack);
                    ack.extend_from_slice(&publish);
                    ack
                }
                // PINGREQ
                12 => vec![0xD0, 0x00],
                // DISCONNECT
                14 => break,
                _ => Vec::new(),
            };
            if socket.write_all(&reply).await.is_err() {
                break;
            }
        }
        seen_close.fetch_add(1, Ordering::SeqCst);
    });

    Ok((addr, subscribed, closed))
}

async fn read_mqtt_packet(socket: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let header = socket.read_u8().await.ok()?;
    let mut length = 0usize;
    for shift in (0..4).map(|i| i * 7) {
        let byte = socket.read_u8().await.ok()?;
        length |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
    }
    let mut body = vec![0u8; length];
    socket.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn encode_remaining_length(mut length: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (length % 128) as u8;
        length /= 128;
        if length > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if length == 0 {
            break;
        }
    }
}

/// Topic filters of a SUBSCRIBE payload: `(u16 length, filter, qos)` repeated.
fn subscribe_filters(mut payload: &[u8]) -> Vec<String> {
    let mut filters = Vec::new();
    while payload.len() >= 2 {
        let len = usize::from(u16::from_be_bytes([payload[0], payload[1]]));
        if payload.len() < 3 + len {
            break;
        }
        filters.push(String::from_utf8_lossy(&payload[2..2 + len]).into_owned());
        payload = &payload[3 + len..];
    }
    filters
}

/// Polls `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Runs `future` with a timeout, failing the test when it expires.
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(timeout, future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out after {:?}", timeout),
    }
}
