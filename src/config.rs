//! Configuration types for pathway reconstruction.
//!
//! Every knob lives in [`ReconstructionConfig`], built via its
//! [`ReconstructionConfigBuilder`] or read from the environment with
//! [`ReconstructionConfig::from_env`]. The dashboard keeps one config in its
//! shared state and hands a reference to every reconstruction pass.

use crate::error::PathwayError;
use crate::pipeline::graph::GraphOptions;
use crate::pipeline::request::ExtractionProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST base URL (v1beta).
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Configuration for a reconstruction pass.
///
/// # Example
/// ```rust
/// use pathway_recon::ReconstructionConfig;
///
/// let config = ReconstructionConfig::builder()
///     .api_key("AIza-test")
///     .model("gemini-2.5-pro")
///     .fuzzy_threshold(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-2.5-pro");
/// ```
#[derive(Clone)]
pub struct ReconstructionConfig {
    /// Gemini model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Gemini API key. Never logged.
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API, without a trailing slash.
    pub api_base_url: String,

    /// Pre-constructed provider. Takes precedence over `api_key`.
    pub provider: Option<Arc<dyn ExtractionProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 65 536.
    ///
    /// The answer carries a full JSON model plus an explanation; a low cap
    /// truncates the JSON and the parser then finds nothing.
    pub max_output_tokens: u32,

    /// Timeout for the single extraction request, in seconds. Default: 600.
    pub api_timeout_secs: u64,

    /// Custom extraction prompt. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Minimum similarity (0–100) for an evidence quote to be highlighted. Default: 85.
    pub fuzzy_threshold: u8,

    /// Largest accepted upload per file, in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Graph-building options.
    pub graph: GraphOptions,

    /// Graphviz `dot` executable. Default: `dot` (resolved through `PATH`).
    pub dot_binary: PathBuf,

    /// DPI injected into the DOT source for the PNG export. Default: 300.
    pub export_dpi: u32,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            provider: None,
            temperature: 0.2,
            max_output_tokens: 65_536,
            api_timeout_secs: 600,
            prompt: None,
            fuzzy_threshold: 85,
            max_upload_bytes: 50 * 1024 * 1024,
            graph: GraphOptions::default(),
            dot_binary: PathBuf::from("dot"),
            export_dpi: 300,
        }
    }
}

impl fmt::Debug for ReconstructionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconstructionConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field(
                "provider",
                &self.provider.as_ref().map(|_| "<dyn ExtractionProvider>"),
            )
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("graph", &self.graph)
            .field("dot_binary", &self.dot_binary)
            .field("export_dpi", &self.export_dpi)
            .finish()
    }
}

impl ReconstructionConfig {
    /// Create a new builder for `ReconstructionConfig`.
    pub fn builder() -> ReconstructionConfigBuilder {
        ReconstructionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config from the process environment.
    ///
    /// Loads `.env` first (if present), then reads `GOOGLE_API_KEY`,
    /// `PATHWAY_MODEL`, `PATHWAY_API_BASE_URL` and `PATHWAY_DOT_BINARY`.
    /// A missing key is not an error here; the first extraction reports it.
    pub fn from_env() -> Result<Self, PathwayError> {
        let _ = dotenvy::dotenv();

        let mut builder = Self::builder();
        if let Some(key) = env_non_empty(API_KEY_ENV) {
            builder = builder.api_key(key);
        }
        if let Some(model) = env_non_empty("PATHWAY_MODEL") {
            builder = builder.model(model);
        }
        if let Some(url) = env_non_empty("PATHWAY_API_BASE_URL") {
            builder = builder.api_base_url(url);
        }
        if let Some(dot) = env_non_empty("PATHWAY_DOT_BINARY") {
            builder = builder.dot_binary(dot);
        }
        builder.build()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Strip whitespace and one layer of surrounding quotes.
///
/// Container runtimes pass `.env` values through literally, so
/// `GOOGLE_API_KEY="abc"` arrives with its quotes.
pub fn sanitize_api_key(raw: &str) -> String {
    raw.trim()
        .trim_matches('\'')
        .trim_matches('"')
        .trim()
        .to_string()
}

/// Builder for [`ReconstructionConfig`].
#[derive(Debug)]
pub struct ReconstructionConfigBuilder {
    config: ReconstructionConfig,
}

impl ReconstructionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl AsRef<str>) -> Self {
        let key = sanitize_api_key(key.as_ref());
        self.config.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ExtractionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn fuzzy_threshold(mut self, threshold: u8) -> Self {
        self.config.fuzzy_threshold = threshold;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn graph(mut self, options: GraphOptions) -> Self {
        self.config.graph = options;
        self
    }

    pub fn hide_cofactors(mut self, v: bool) -> Self {
        self.config.graph.hide_cofactors = v;
        self
    }

    pub fn dot_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dot_binary = path.into();
        self
    }

    pub fn export_dpi(mut self, dpi: u32) -> Self {
        self.config.export_dpi = dpi;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReconstructionConfig, PathwayError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(PathwayError::InvalidConfig("model must not be empty".into()));
        }
        if !c.api_base_url.starts_with("http://") && !c.api_base_url.starts_with("https://") {
            return Err(PathwayError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.fuzzy_threshold > 100 {
            return Err(PathwayError::InvalidConfig(format!(
                "fuzzy threshold must be 0–100, got {}",
                c.fuzzy_threshold
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(PathwayError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        if !(72..=1200).contains(&c.export_dpi) {
            return Err(PathwayError::InvalidConfig(format!(
                "export DPI must be 72–1200, got {}",
                c.export_dpi
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(PathwayError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Settings for the dashboard server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sessions idle for longer than this are dropped. Default: 2 hours.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            session_ttl_secs: 2 * 60 * 60,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ReconstructionConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.fuzzy_threshold, 85);
        assert_eq!(c.export_dpi, 300);
        assert!(c.graph.hide_cofactors);
        assert!(c.api_key.is_none());
    }

    #[test]
    fn api_key_quotes_are_stripped() {
        assert_eq!(sanitize_api_key("  \"AIza123\" \n"), "AIza123");
        assert_eq!(sanitize_api_key("'AIza123'"), "AIza123");
        let c = ReconstructionConfig::builder()
            .api_key("\"\"")
            .build()
            .unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn debug_redacts_key() {
        let c = ReconstructionConfig::builder()
            .api_key("AIza-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("AIza-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = ReconstructionConfig::builder()
            .api_base_url("http://localhost:9999/v1beta/")
            .build()
            .unwrap();
        assert_eq!(c.api_base_url, "http://localhost:9999/v1beta");
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(ReconstructionConfig::builder().model(" ").build().is_err());
        assert!(ReconstructionConfig::builder()
            .fuzzy_threshold(101)
            .build()
            .is_err());
        assert!(ReconstructionConfig::builder()
            .api_base_url("ftp://x")
            .build()
            .is_err());
        assert!(ReconstructionConfig::builder().export_dpi(10).build().is_err());
    }

    #[test]
    fn server_bind_addr() {
        let s = ServerConfig::default();
        assert_eq!(s.bind_addr(), "127.0.0.1:8501");
    }
}
