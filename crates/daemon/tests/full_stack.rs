use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use emg_daemon::{RelayConfig, RelayServer};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestRelay {
    observer: SocketAddr,
    sensor: SocketAddr,
    http: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
    _static_dir: tempfile::TempDir,
}

impl TestRelay {
    async fn start() -> Self {
        Self::start_with_flush_interval(10).await
    }

    async fn start_with_flush_interval(flush_interval_ms: u64) -> Self {
        let static_dir = tempfile::tempdir().unwrap();
        let config = RelayConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            observer_port: 0,
            sensor_port: 0,
            http_port: 0,
            static_dir: static_dir.path().to_path_buf(),
            flush_interval_ms,
            ..RelayConfig::default()
        };

        let server = RelayServer::bind(config).await.unwrap();
        let observer = server.observer_addr().unwrap();
        let sensor = server.sensor_addr().unwrap();
        let http = server.http_addr().unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.run(shutdown.clone()));

        Self {
            observer,
            sensor,
            http,
            shutdown,
            task,
            _static_dir: static_dir,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("relay did not shut down");
        result.unwrap().unwrap();
    }
}

async fn connect(addr: SocketAddr, path: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    socket
}

/// Next JSON event of the given type, skipping any others.
async fn next_event(socket: &mut Socket, kind: &str) -> Value {
    let wait = async {
        while let Some(message) = socket.next().await {
            if let Message::Text(text) = message.unwrap() {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == kind {
                    return value;
                }
            }
        }
        panic!("socket closed while waiting for {kind}");
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

#[tokio::test]
async fn sensor_samples_reach_observers() {
    let relay = TestRelay::start().await;

    let mut observer = connect(relay.observer, "/").await;
    let snapshot = next_event(&mut observer, "mpu_status").await;
    assert_eq!(snapshot["available"], false);

    let mut sensor = connect(relay.sensor, "/esp32").await;
    let status = next_event(&mut observer, "esp32_status").await;
    assert_eq!(status["status"], "connected");
    assert!(status["clientInfo"].as_str().unwrap().starts_with("127.0.0.1:"));
    // Each observer gets at most one event per throttle window.
    tokio::time::sleep(Duration::from_millis(50)).await;

    sensor.send(Message::Text("abc,def".into())).await.unwrap();
    sensor.send(Message::Text("1,2,3".into())).await.unwrap();
    sensor.send(Message::Text("1,2".into())).await.unwrap();

    let data = next_event(&mut observer, "emg_data").await;
    assert_eq!(data["raw1"], 1.0);
    assert_eq!(data["raw2"], 2.0);
    assert!(data["filtered1"].as_f64().unwrap().is_finite());

    tokio::time::sleep(Duration::from_millis(50)).await;
    sensor.close(None).await.unwrap();
    let status = next_event(&mut observer, "esp32_status").await;
    assert_eq!(status["status"], "disconnected");

    relay.stop().await;
}

#[tokio::test]
async fn disconnect_is_reported_while_samples_are_buffered() {
    // No periodic flush fires during the test, so the sample is still buffered
    // when the sensor goes away.
    let relay = TestRelay::start_with_flush_interval(60_000).await;
    let mut observer = connect(relay.observer, "/").await;
    next_event(&mut observer, "mpu_status").await;

    let mut sensor = connect(relay.sensor, "/").await;
    next_event(&mut observer, "esp32_status").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    sensor.send(Message::Text("1,2".into())).await.unwrap();
    sensor.close(None).await.unwrap();

    let status = next_event(&mut observer, "esp32_status").await;
    assert_eq!(status["status"], "disconnected");

    relay.stop().await;
}

#[tokio::test]
async fn stats_are_forwarded_without_filtering() {
    let relay = TestRelay::start().await;
    let mut observer = connect(relay.observer, "/").await;
    next_event(&mut observer, "mpu_status").await;

    let mut sensor = connect(relay.sensor, "/").await;
    next_event(&mut observer, "esp32_status").await;
    // Leave the throttle window opened by the status event.
    tokio::time::sleep(Duration::from_millis(50)).await;

    sensor
        .send(Message::Text("STATS,10,20,1,2,0.25,5,-5".into()))
        .await
        .unwrap();
    let stats = next_event(&mut observer, "emg_stats").await;
    assert_eq!(stats["rms1"], 10.0);
    assert_eq!(stats["imbalance"], 0.25);
    assert_eq!(stats["pitch"], 5.0);

    // A dashboard joining now learns that orientation data is flowing.
    let mut late = connect(relay.observer, "/").await;
    let snapshot = next_event(&mut late, "mpu_status").await;
    assert_eq!(snapshot["available"], true);

    relay.stop().await;
}

#[tokio::test]
async fn invalid_observer_message_keeps_connection() {
    let relay = TestRelay::start().await;
    let mut observer = connect(relay.observer, "/").await;
    next_event(&mut observer, "mpu_status").await;

    observer.send(Message::Text("not json".into())).await.unwrap();
    observer
        .send(Message::Text(r#"{"type":"subscribe"}"#.into()))
        .await
        .unwrap();
    observer
        .send(Message::Text(
            r#"{"type":"filter_settings","notch_enabled":false,"low_pass_cutoff":250}"#.into(),
        ))
        .await
        .unwrap();

    let mut sensor = connect(relay.sensor, "/").await;
    next_event(&mut observer, "esp32_status").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    sensor.send(Message::Text("3,4".into())).await.unwrap();

    let data = next_event(&mut observer, "emg_data").await;
    assert_eq!(data["raw1"], 3.0);

    relay.stop().await;
}

#[tokio::test]
async fn health_endpoint_over_tcp() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let relay = TestRelay::start().await;
    let mut stream = TcpStream::connect(relay.http).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("Server is running"));

    relay.stop().await;
}
