//! HTTP polling against a loopback responder.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lib_scada::adaptors::{PollingAdaptor, PollingConfig};
use lib_scada::core::Message;
use lib_scada::sinks::RecordingSink;
use lib_scada::{ActionKind, Scada, ScadaOptions, SourceDeclaration, TagDeclaration, TransportKind};
use project_tests::{serve_http, wait_for, CannedResponse};
use serde_json::{json, Value};

#[tokio::test]
async fn each_tick_is_one_message_and_failures_do_not_end_the_stream() {
    project_tests::init_logging();
    let (addr, hits) = serve_http(vec![
        CannedResponse::new(200, r#"{"temp": 20}"#),
        CannedResponse::new(500, "boom"),
        CannedResponse::new(200, "not json"),
        CannedResponse::new(200, r#"{"temp": 22}"#),
    ])
    .await
    .unwrap();

    let mut config = PollingConfig::new(format!("http://{}/data", addr));
    config.interval = Duration::from_millis(30);
    let adaptor = PollingAdaptor::new(config).unwrap();

    let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = Arc::clone(&seen);
    let stream = adaptor.connect();
    let _sub = stream.subscribe(move |message: &Message| sink.lock().unwrap().push((**message).clone()));

    assert!(wait_for(Duration::from_secs(5), || seen.lock().unwrap().len() >= 3).await);
    adaptor.disconnect().unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0], json!({"temp": 20}));
    assert_eq!(seen[1], json!("not json"));
    assert_eq!(seen[2], json!({"temp": 22}));
    assert!(hits.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn close_stops_polling_and_delivery() {
    project_tests::init_logging();
    let (addr, hits) = serve_http(vec![CannedResponse::new(200, r#"{"level": 7}"#)])
        .await
        .unwrap();

    let source = SourceDeclaration::new("tank", TransportKind::Http)
        .with_url(format!("http://{}/level", addr))
        .with_param("interval", json!(20))
        .with_tag(TagDeclaration::new("gauge", ActionKind::Text).with_path("level"));
    let sink = RecordingSink::default();
    let mut scada = Scada::new(
        ScadaOptions {
            auto_start: true,
            sources: vec![source],
            ..Default::default()
        },
        Arc::new(sink.clone()),
    );

    assert!(wait_for(Duration::from_secs(5), || sink.mounts().len() >= 2).await);
    assert_eq!(sink.mounts()[0].value, Some(json!(7)));

    scada.close();
    let mounted = sink.mounts().len();
    let requested = hits.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(sink.mounts().len(), mounted);
    // At most one request may already have been accepted when close ran.
    assert!(hits.load(Ordering::SeqCst) <= requested + 1);
}
