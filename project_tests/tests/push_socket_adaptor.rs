//! WebSocket push against a loopback server.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use lib_scada::sinks::RecordingSink;
use lib_scada::{ActionKind, Scada, ScadaOptions, SourceDeclaration, TagDeclaration, TransportKind};
use project_tests::{serve_ws, wait_for};
use serde_json::json;
use tokio_tungstenite::tungstenite::protocol::Message;

#[tokio::test]
async fn frames_fan_out_to_tags_and_close_releases_the_socket() {
    project_tests::init_logging();
    let (addr, closed) = serve_ws(vec![
        Message::text(r#"{"line": {"speed": 120, "state": "run"}}"#),
        Message::text("plain status"),
        Message::binary(br#"{"line": {"speed": 80, "state": "idle"}}"#.to_vec()),
    ])
    .await
    .unwrap();

    let source = SourceDeclaration::new("line1", TransportKind::Ws)
        .with_url(format!("ws://{}/", addr))
        .with_tag(TagDeclaration::new("speed", ActionKind::Text).with_path("line.speed"))
        .with_tag(TagDeclaration::new("state", ActionKind::Fill).with_path("line.state"));
    let sink = RecordingSink::default();
    let mut scada = Scada::new(
        ScadaOptions {
            auto_start: true,
            sources: vec![source],
            ..Default::default()
        },
        Arc::new(sink.clone()),
    );

    assert!(wait_for(Duration::from_secs(5), || sink.mounts().len() >= 6).await);

    let speeds: Vec<_> = sink.mounts_for("speed").into_iter().map(|m| m.value).collect();
    assert_eq!(speeds, vec![Some(json!(120)), None, Some(json!(80))]);
    assert_eq!(sink.mounts_for("state")[2].value, Some(json!("idle")));

    scada.close();
    assert!(wait_for(Duration::from_secs(5), || closed.load(Ordering::SeqCst) == 1).await);
}

#[tokio::test]
async fn refused_connection_surfaces_as_teardown_anomaly() {
    project_tests::init_logging();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut scada = Scada::with_observer(
        ScadaOptions {
            auto_start: true,
            sources: vec![SourceDeclaration::new("gone", TransportKind::Ws).with_url(format!("ws://{}/", addr))],
            ..Default::default()
        },
        Arc::new(RecordingSink::default()),
        tx,
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    scada.close();

    let anomaly = rx.try_recv().unwrap();
    assert!(matches!(anomaly, lib_scada::Anomaly::Teardown { ref source_id, .. } if source_id == "gone"));
}
