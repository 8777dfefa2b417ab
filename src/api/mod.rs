//! HTTP API server for the vox gateway

pub mod health;
pub mod pages;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
use crate::pipeline::Pipeline;
use crate::Result;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    /// Directory holding `templates/` and `static/`
    pub web_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ApiState {
    /// State with default web directory and upload limit
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            web_dir: PathBuf::from("web"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    pipeline: Arc<Pipeline>,
    host: String,
    port: u16,
    web_dir: PathBuf,
    max_upload_bytes: usize,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            host: "0.0.0.0".to_string(),
            port: 8000,
            web_dir: PathBuf::from("web"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            tls_cert: None,
            tls_key: None,
        }
    }

    /// Apply every server setting from the resolved configuration
    #[must_use]
    pub fn server_config(self, config: &ServerConfig) -> Self {
        let mut builder = self
            .host(config.host.clone())
            .port(config.port)
            .web_dir(config.web_dir.clone())
            .max_upload_bytes(config.max_upload_bytes);
        builder.tls_cert.clone_from(&config.tls_cert);
        builder.tls_key.clone_from(&config.tls_key);
        builder
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the directory holding the page template and static assets
    #[must_use]
    pub fn web_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.web_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            pipeline: self.pipeline,
            web_dir: self.web_dir,
            max_upload_bytes: self.max_upload_bytes,
        });

        ApiServer {
            state,
            host: self.host,
            port: self.port,
            tls_cert: self.tls_cert,
            tls_key: self.tls_key,
        }
    }
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let static_dir = state.web_dir.join("static");

    // CORS layer for cross-origin requests from frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(process::router(state.clone()))
        .merge(pages::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
}

impl ApiServer {
    /// Router for this server's state
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);

        if let Some((cert, key)) = self.tls_paths() {
            return self.run_tls(&addr, &cert, &key).await;
        }

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Certificate and key when both are configured and present on disk
    fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) if cert.is_file() && key.is_file() => {
                if cfg!(feature = "tls") {
                    Some((cert.clone(), key.clone()))
                } else {
                    tracing::warn!(
                        "TLS certificate configured but built without the `tls` feature"
                    );
                    None
                }
            }
            (Some(_), _) | (_, Some(_)) => {
                tracing::warn!(
                    "TLS certificate or key missing, serving plain HTTP; \
                     browsers only allow microphone access on HTTPS or localhost"
                );
                None
            }
            (None, None) => None,
        }
    }

    #[cfg(feature = "tls")]
    async fn run_tls(self, addr: &str, cert: &Path, key: &Path) -> Result<()> {
        use axum_server::tls_rustls::RustlsConfig;

        let config = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|e| crate::Error::Config(format!("invalid TLS certificate or key: {e}")))?;
        let addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| crate::Error::Config(format!("invalid listen address {addr}: {e}")))?;

        tracing::info!(addr = %addr, cert = %cert.display(), "API server listening (HTTPS)");

        axum_server::bind_rustls(addr, config)
            .serve(self.router().into_make_service())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    #[cfg(not(feature = "tls"))]
    #[allow(clippy::unused_async, clippy::unused_self)]
    async fn run_tls(self, _addr: &str, _cert: &Path, _key: &Path) -> Result<()> {
        Err(crate::Error::Config("built without the `tls` feature".to_string()))
    }
}
