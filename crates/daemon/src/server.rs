use std::any::Any;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as CorsAny, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::ingest::handle_sensor_socket;
use crate::observer::handle_observer_socket;
use crate::relay::{self, RelayHandle, RelayService};

const FALLBACK_INDEX: &str = "<html><body><h1>EMG Relay</h1>\
<p>index.html not found in static directory.</p></body></html>";

#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
    pub config: Arc<RelayConfig>,
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };

    error!("Handler panicked: {}", details);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal Server Error: {}", details),
    )
        .into_response()
}

async fn sensor_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let flush_period = state.config.flush_interval();
    ws.on_upgrade(move |socket| handle_sensor_socket(socket, peer, state.relay, flush_period))
}

async fn observer_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::debug!(%peer, "Observer upgrade");
    let depth = state.config.client_queue_depth;
    ws.on_upgrade(move |socket| handle_observer_socket(socket, state.relay, depth))
}

/// Accepts sensor WebSocket upgrades on any path.
pub fn sensor_router(state: AppState) -> Router {
    Router::new()
        .fallback(sensor_upgrade)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Accepts dashboard WebSocket upgrades on any path.
pub fn observer_router(state: AppState) -> Router {
    Router::new()
        .fallback(observer_upgrade)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "Server is running"
}

async fn index(State(static_dir): State<Arc<PathBuf>>) -> Html<String> {
    let path = static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Html(contents),
        Err(e) => {
            warn!("index.html not available at {}: {}", path.display(), e);
            Html(FALLBACK_INDEX.to_string())
        }
    }
}

/// Static dashboard assets plus the liveness endpoint.
pub fn static_router(static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .with_state(Arc::new(static_dir.to_path_buf()))
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(CorsAny)
                .allow_methods(CorsAny)
                .allow_headers(CorsAny),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Creates the static directory if needed and logs what it holds.
pub fn prepare_static_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.exists() {
        warn!("Static directory not found at {}, creating it", dir.display());
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create static directory {}", dir.display()))?;
    }

    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let files: Vec<String> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            info!("Serving static files from {}: {:?}", dir.display(), files);
        }
        Err(e) => warn!("Could not list static directory {}: {}", dir.display(), e),
    }
    Ok(())
}

/// The three bound listeners plus the relay service behind them.
pub struct RelayServer {
    config: Arc<RelayConfig>,
    observer: TcpListener,
    sensor: TcpListener,
    http: TcpListener,
}

impl RelayServer {
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let observer = bind(&config, config.observer_port, "observer").await?;
        let sensor = bind(&config, config.sensor_port, "sensor").await?;
        let http = bind(&config, config.http_port, "HTTP").await?;
        Ok(Self {
            config: Arc::new(config),
            observer,
            sensor,
            http,
        })
    }

    pub fn observer_addr(&self) -> std::io::Result<SocketAddr> {
        self.observer.local_addr()
    }

    pub fn sensor_addr(&self) -> std::io::Result<SocketAddr> {
        self.sensor.local_addr()
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let service = RelayService::new(&self.config).context("Invalid startup filter settings")?;
        let (relay, relay_task) = relay::spawn(service, self.config.command_queue_depth, shutdown.clone());

        prepare_static_dir(&self.config.static_dir)?;
        let state = AppState {
            relay,
            config: self.config.clone(),
        };

        info!("Observer WebSocket listening on {}", self.observer.local_addr()?);
        info!("Sensor WebSocket listening on {}", self.sensor.local_addr()?);
        info!("HTTP server for static files listening on {}", self.http.local_addr()?);

        let mut servers = JoinSet::new();
        servers.spawn(serve(self.observer, observer_router(state.clone()), shutdown.clone()));
        servers.spawn(serve(self.sensor, sensor_router(state), shutdown.clone()));
        servers.spawn(serve(
            self.http,
            static_router(&self.config.static_dir),
            shutdown.clone(),
        ));

        let mut result = Ok(());
        while let Some(joined) = servers.join_next().await {
            let outcome = joined.context("Server task panicked").and_then(|r| r);
            if let Err(e) = outcome {
                error!("Server stopped: {:#}", e);
                shutdown.cancel();
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        shutdown.cancel();
        relay_task.await.context("Relay service panicked")?;
        result
    }
}

async fn bind(config: &RelayConfig, port: u16, role: &str) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::new(config.bind_address, port);
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {} listener on {}", role, addr))
}

async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> anyhow::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    Ok(())
}
