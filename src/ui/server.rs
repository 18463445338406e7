//! Control API server

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::UiConfig;
use crate::error::Result;
use crate::fleet::Fleet;
use crate::ui::handlers;

/// Fleet shared between the acquisition owner and the HTTP handlers
pub type SharedFleet = Arc<Mutex<Fleet>>;

pub struct AppState {
    pub fleet: SharedFleet,
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, fleet: SharedFleet) -> Self {
        Self {
            config,
            state: Arc::new(AppState { fleet }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(|| async { Json(serde_json::json!({"status": "ok"})) }))
            .route("/api/status", get(handlers::get_status))
            .route("/api/info", get(handlers::get_info))
            .route("/api/probes", get(handlers::get_probes))
            .route("/api/probes/:slot/:port/:dock", get(handlers::get_probe))
            .route("/api/probes/:slot/:port/:dock/select", post(handlers::select_probe))
            .route("/api/probes/:slot/:port/:dock/channels", put(handlers::set_channels))
            .route("/api/probes/:slot/:port/:dock/reference", put(handlers::set_reference))
            .route("/api/basestations/:slot/fill", get(handlers::get_fill))
            .route("/api/sync", post(handlers::set_sync))
            .route("/api/acquisition/start", post(handlers::start_acquisition))
            .route("/api/acquisition/stop", post(handlers::stop_acquisition))
            .route("/api/recording/start", post(handlers::start_recording))
            .route("/api/recording/stop", post(handlers::stop_recording))
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self.state.clone())
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Control API listening on http://{}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
