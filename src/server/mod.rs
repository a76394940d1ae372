//! HTTP surface.
//!
//! | Route                          | Handler                               |
//! |--------------------------------|---------------------------------------|
//! | `POST /api/symptom-checker`    | one conversation turn                 |
//! | `POST /api/symptom-tracker`    | alias of the above                    |
//! | `POST /api/verify`             | verification ensemble                 |
//! | `GET /api/assessments`         | filtered, paginated assessment list   |
//! | `GET /api/assessments/{id}`    | one assessment                        |
//! | `GET /health`                  | liveness                              |

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use api::{AppState, SharedState};

/// Listener settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Permissive CORS, for a browser front end on another origin.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5328,
            cors: false,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn start_server(config: ServerConfig, state: Arc<AppState>) -> Result<()> {
    let mut app = build_router(state);

    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, cors = config.cors, "triage server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
