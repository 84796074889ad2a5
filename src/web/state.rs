//! Shared application state for the dashboard server.

use crate::config::{ReconstructionConfig, ServerConfig};
use crate::error::PathwayError;
use crate::web::session::SessionStore;
use minijinja::Environment;
use std::sync::Arc;
use std::time::Duration;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: ReconstructionConfig,
    pub sessions: SessionStore,
    pub templates: Environment<'static>,
}

impl AppState {
    pub fn new(config: ReconstructionConfig, server: &ServerConfig) -> Result<Self, PathwayError> {
        Ok(Self {
            config,
            sessions: SessionStore::new(Duration::from_secs(server.session_ttl_secs)),
            templates: templates()?,
        })
    }
}

pub type SharedState = Arc<AppState>;

/// Template environment with the bundled pages.
fn templates() -> Result<Environment<'static>, PathwayError> {
    let mut env = Environment::new();
    let pages = [
        ("base.html", include_str!("templates/base.html")),
        ("dashboard.html", include_str!("templates/dashboard.html")),
        ("viewer.html", include_str!("templates/viewer.html")),
    ];
    for (name, source) in pages {
        env.add_template(name, source)
            .map_err(|e| PathwayError::Internal(format!("template {name}: {e}")))?;
    }
    Ok(env)
}
