//! Relay Server Shell
//!
//! Axum router (`/`, `/health`, `/ws`) with permissive CORS, WebSocket
//! upgrade wiring, and startup/shutdown. Session semantics live entirely in
//! the registry and dispatch modules; nothing in here may let one
//! connection's failure touch another.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::codes::RandomCodeGenerator;
use crate::connection::run_connection;
use crate::registry::SessionRegistry;

/// Banner served at the root endpoint.
const BANNER: &str = "Home Page";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Depth of each connection's outbound delivery queue.
    pub queue_depth: usize,
    /// Length of generated room codes.
    pub code_length: usize,
    /// How long a removed room code is withheld from reuse.
    pub reuse_quarantine: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().unwrap(),
            queue_depth: 64,
            code_length: 5,
            reuse_quarantine: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Defaults with the listen port overridable via the `PORT` environment
    /// variable, the convention most container platforms inject.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.bind_addr.set_port(port),
                Err(_) => warn!(%port, "ignoring unparseable PORT override"),
            }
        }
        config
    }
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the listen address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Shared state handed to axum handlers.
#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    queue_depth: usize,
}

/// Build the axum router with all routes.
///
/// CORS is deliberately permissive: the relay is reached from embedded and
/// cross-origin clients, and room membership is the only access control.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn home_handler() -> &'static str {
    BANNER
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "bingo-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(socket, state.registry, state.queue_depth))
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
}

impl RelayServer {
    /// Create a server from its configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind and start serving. Returns once the listener is live.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let registry = Arc::new(SessionRegistry::new(
            Box::new(RandomCodeGenerator::new(self.config.code_length)),
            self.config.reuse_quarantine,
        ));
        let state = AppState {
            registry: Arc::clone(&registry),
            queue_depth: self.config.queue_depth,
        };
        let router = build_router(state);

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(%err, "serve loop ended with error");
            }
        });

        info!(addr = %local_addr, "relay server listening");
        Ok(ServerHandle {
            local_addr,
            registry,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }
}

/// Handle to a running server: bound address, registry access for
/// introspection, and shutdown control.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener actually bound (relevant with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The server's session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Trigger graceful shutdown. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the serve loop to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.queue_depth, 64);
        assert_eq!(config.code_length, 5);
        assert_eq!(config.reuse_quarantine, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn server_starts_and_shuts_down() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let mut handle = RelayServer::new(config).start().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        assert_eq!(handle.registry().live_count().await, 0);

        handle.shutdown();
        handle.shutdown(); // idempotent
        handle.join().await;
    }
}
