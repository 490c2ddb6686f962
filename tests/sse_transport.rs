use std::time::Duration;

use event_hub::{
    ConnectionState, EventChannel, EventHub, Frame, HubConfig, HubError, HubEvent, Severity,
    SseTransport, Transport,
};
use futures_util::{StreamExt, future};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serve a single HTTP response, returning the base URL and the request head
async fn serve_once(
    status: &'static str,
    content_type: &'static str,
    chunks: Vec<&'static str>,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (request_tx, request_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buffer = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&buffer[..read]);
        }
        let _ = request_tx.send(String::from_utf8_lossy(&request).to_lowercase());

        let head = format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n",
            status, content_type
        );
        socket.write_all(head.as_bytes()).await.unwrap();

        for chunk in chunks {
            socket.write_all(chunk.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            sleep(Duration::from_millis(10)).await;
        }

        let _ = socket.shutdown().await;
    });

    (base_url, request_rx)
}

#[tokio::test]
async fn reads_frames_from_an_event_stream() {
    init_tracing();
    let (base_url, request) = serve_once(
        "200 OK",
        "text/event-stream; charset=utf-8",
        vec![
            ": hello\n\nevent: connected\ndata: {\"client_id\":\"c-1\"}\n\n",
            "event: ale",
            "rt\ndata: {\"severity\":\"high\"}\n",
            "\n",
        ],
    )
    .await;

    let config = HubConfig::new(&base_url).with_header("x-client", "dashboard");
    let transport = SseTransport::new(&config).unwrap();
    assert_eq!(transport.endpoint().path(), "/events");

    // The client reports the server hanging up as a trailing error.
    let frames = transport.open().await.unwrap();
    let frames: Vec<Frame> = timeout(
        WAIT,
        frames
            .take_while(|frame| future::ready(frame.is_ok()))
            .map(Result::unwrap)
            .collect(),
    )
    .await
    .unwrap();

    assert_eq!(
        frames,
        vec![
            Frame::new("connected", r#"{"client_id":"c-1"}"#),
            Frame::new("alert", r#"{"severity":"high"}"#),
        ]
    );

    let request = request.await.unwrap();
    assert!(request.starts_with("get /events http/1.1"));
    assert!(request.contains("accept: text/event-stream"));
    assert!(request.contains("x-client: dashboard"));
}

#[tokio::test]
async fn rejects_error_status() {
    init_tracing();
    let (base_url, _request) = serve_once("503 Service Unavailable", "text/plain", vec![]).await;

    let transport = SseTransport::new(&HubConfig::new(&base_url)).unwrap();

    assert!(matches!(
        transport.open().await,
        Err(HubError::SseError(_))
    ));
}

#[tokio::test]
async fn fails_when_the_stream_closes_before_any_event() {
    init_tracing();
    let (base_url, _request) = serve_once("200 OK", "text/html", vec!["<html></html>"]).await;

    let transport = SseTransport::new(&HubConfig::new(&base_url)).unwrap();

    assert!(timeout(WAIT, transport.open()).await.unwrap().is_err());
}

#[tokio::test]
async fn times_out_when_the_server_stays_silent() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (release_tx, release_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        let _ = release_rx.await;
    });

    let config = HubConfig::new(&base_url).with_connect_timeout(Duration::from_secs(1));
    let transport = SseTransport::new(&config).unwrap();

    assert!(matches!(
        timeout(WAIT, transport.open()).await.unwrap(),
        Err(HubError::ConnectionError(_))
    ));
    let _ = release_tx.send(());
}

#[test]
fn invalid_config_fails_construction() {
    assert!(EventHub::new(HubConfig::new("localhost:8080")).is_err());
    assert!(matches!(
        SseTransport::new(&HubConfig::new("http://localhost").with_header("bad header", "x")),
        Err(HubError::ConfigError(_))
    ));
}

#[tokio::test]
async fn hub_routes_a_live_stream() {
    init_tracing();
    let (base_url, _request) = serve_once(
        "200 OK",
        "text/event-stream",
        vec![
            "event: connected\ndata: {}\n\n",
            "event: heartbeat\ndata: {}\n\n",
            "event: alert\ndata: {\"severity\":\"critical\",\"message\":\"spend limit\"}\n\n",
        ],
    )
    .await;

    let hub = EventHub::new(HubConfig::new(&base_url)).unwrap();

    let (state_tx, mut states) = mpsc::unbounded_channel();
    hub.on_connection_state_change(move |state| {
        let _ = state_tx.send(state);
    });
    let (event_tx, mut events) = mpsc::unbounded_channel();
    for channel in [EventChannel::Connected, EventChannel::Alert] {
        let event_tx = event_tx.clone();
        hub.subscribe(channel, move |event| {
            let _ = event_tx.send(event.clone());
        });
    }

    hub.connect();

    let mut seen = Vec::new();
    while seen.last() != Some(&ConnectionState::Disconnected) || seen.len() < 2 {
        seen.push(timeout(WAIT, states.recv()).await.unwrap().unwrap());
    }
    assert_eq!(
        seen,
        vec![
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );

    assert_eq!(events.recv().await.unwrap().channel(), EventChannel::Connected);
    match events.recv().await.unwrap() {
        HubEvent::Alert(alert) => {
            assert_eq!(alert.severity, Some(Severity::Critical));
            assert_eq!(alert.message.as_deref(), Some("spend limit"));
        }
        other => panic!("expected alert, got {:?}", other),
    }
    assert!(events.try_recv().is_err());
}
