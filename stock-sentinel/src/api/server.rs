//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Router, extract::Request, response::Response};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, MakeSpan, OnRequest, OnResponse,
    TraceLayer,
};
use tracing::{Level, Span, info};

use crate::api::routes;
use crate::logging::LoggingConfig;
use crate::monitor::PageMonitor;
use crate::{Error, Result};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5001,
            enable_cors: true,
        }
    }
}

impl ApiServerConfig {
    /// Load API server config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `API_PORT`, or `PORT` as used by most PaaS runtimes
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(bind_address) = std::env::var("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address;
        }

        let port = std::env::var("API_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port
            && let Ok(parsed) = port.trim().parse::<u16>()
        {
            config.port = parsed;
        }

        config
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub monitor: Arc<PageMonitor>,
    /// Present when the process installed the global subscriber.
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    pub fn new(monitor: Arc<PageMonitor>) -> Self {
        Self {
            start_time: Instant::now(),
            monitor,
            logging_config: None,
        }
    }

    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }
}

fn is_health_check(req: &Request) -> bool {
    req.uri().path().starts_with("/health")
}

/// Request span, disabled for health checks so supervisors don't flood the log.
fn request_span(req: &Request) -> Span {
    if is_health_check(req) {
        return Span::none();
    }
    DefaultMakeSpan::new().level(Level::INFO).make_span(req)
}

fn log_request(req: &Request, span: &Span) {
    if !span.is_disabled() {
        DefaultOnRequest::new().level(Level::INFO).on_request(req, span);
    }
}

fn log_response(res: &Response, latency: Duration, span: &Span) {
    if !span.is_disabled() {
        DefaultOnResponse::new()
            .level(Level::INFO)
            .on_response(res, latency, span);
    }
}

/// The API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Share an existing token so one signal stops the whole process.
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Routes plus CORS and request tracing.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(log_request)
                .on_response(log_response),
        )
    }

    /// Bind the configured address and serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::ApiError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener. Returns once connections drain.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("API server listening on http://{}", addr);
        }

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("API server shutting down");
            })
            .await
            .map_err(|e| Error::ApiError(format!("Server error: {}", e)))
    }
}
