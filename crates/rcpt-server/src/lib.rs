//! HTTP service for receipt extraction.
//!
//! Routes:
//! - `/api/process-receipt`: multipart upload (field `receipt`) to expense report JSON
//! - `GET /health`: liveness probe

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use rcpt_core::ReceiptExtractor;
use rcpt_core::models::config::ServerConfig;

pub use error::{ApiError, ErrorBody, ErrorResponse};
pub use handlers::{ReceiptMetadata, ReceiptResponse, RECEIPT_FIELD};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no provider credential is configured; uploads then fail
    /// with a configuration error instead of the service refusing to start.
    pub extractor: Option<ReceiptExtractor>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create state from a server configuration.
    pub fn new(config: ServerConfig, extractor: Option<ReceiptExtractor>) -> Self {
        Self {
            extractor,
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/process-receipt", any(handlers::process_receipt))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let bind = state.config.bind.clone();

    if state.extractor.is_none() {
        warn!("No inference credential configured; uploads will fail with 500");
    }
    if !state.config.production {
        warn!("Running outside production mode; error details are returned to clients");
    }

    let listener = TcpListener::bind(&bind).await?;
    info!("Receipt service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
