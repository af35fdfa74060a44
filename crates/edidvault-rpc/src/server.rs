//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use edidvault_core::EdidVault;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    /// Core API (dump library, transports, workflows)
    pub vault: EdidVault,
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(vault: EdidVault, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let state = Arc::new(AppState { vault });

    // The panel is served from the device itself; CORS stays permissive
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server error");
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edidvault_core::SysfsDrmView;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_server_starts_and_answers_health() {
        let temp_dir = TempDir::new().unwrap();
        let vault = EdidVault::new(
            temp_dir.path(),
            Arc::new(crate::i2cdev::I2cDevTransport::new()),
            Arc::new(SysfsDrmView::new()),
        )
        .unwrap();

        let addr = start_server(vault, "127.0.0.1", 0).await.unwrap();
        assert_ne!(addr.port(), 0);
    }
}
