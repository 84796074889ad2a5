//! The dashboard: upload PDFs, read the reconstruction, inspect evidence.
//!
//! Server-rendered pages (minijinja) over an Axum router. The only client-side
//! code is the PDF viewer, which renders pages with pdf.js and positions the
//! highlight boxes computed by [`crate::pipeline::evidence`].

pub mod error;
pub mod handlers;
pub mod router;
pub mod session;
pub mod state;

use crate::config::{ReconstructionConfig, ServerConfig, API_KEY_ENV};
use crate::error::PathwayError;
use tracing::{info, warn};

pub use router::build_router;
pub use state::{AppState, SharedState};

/// Bind `server.bind_addr()` and serve the dashboard until Ctrl-C.
pub async fn serve(server: ServerConfig, config: ReconstructionConfig) -> Result<(), PathwayError> {
    if config.api_key.is_none() && config.provider.is_none() {
        warn!(
            "{} is not set; analyses will fail until it is configured",
            API_KEY_ENV
        );
    }

    let addr = server.bind_addr();
    let state = AppState::new(config, &server)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PathwayError::Internal(format!("could not bind {addr}: {e}")))?;
    info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| PathwayError::Internal(format!("server error: {e}")))
}
