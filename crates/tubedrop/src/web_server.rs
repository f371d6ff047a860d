//! Public web server.
//!
//! Serves the search page, the search and download APIs, the finished files
//! and the health/metrics endpoints on WEB_PORT (default 3000).

use axum::{
    body::Body,
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_SECURITY_POLICY, CONTENT_TYPE},
        HeaderName, StatusCode,
    },
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::services::ServeDir;

use dropcore::core::validation::DownloadUrl;
use dropcore::relay::ScriptLauncher;
use dropcore::search::{SearchResponse, YtDlpSearch};
use dropcore::{AppConfig, AppError, DownloadRelay, SearchService};

use crate::page;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub relay: DownloadRelay,
    pub search: SearchService,
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(relay: DownloadRelay, search: SearchService, config: AppConfig) -> Self {
        Self {
            relay,
            search,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Production wiring: the configured downloader script and yt-dlp search.
    pub fn from_config(config: AppConfig) -> Self {
        let relay = DownloadRelay::new(Arc::new(ScriptLauncher::from_config(&config)), config.relay_settings());
        let search = SearchService::new(
            Arc::new(YtDlpSearch::new(config.ytdl_bin.clone())),
            config.search_max_results,
        )
        .with_thumbnail_hosts(config.thumbnail_hosts.clone());
        Self::new(relay, search, config)
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    url: Option<String>,
}

/// Builds the router with every public route.
pub fn build_router(state: AppState) -> Router {
    let downloads = ServeDir::new(&state.config.download_dir);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/search", get(search_handler))
        .route("/api/download", get(download_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest_service("/downloads", downloads)
        .with_state(state)
}

/// Start the public web server and run until Ctrl-C.
pub async fn start_web_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.socket_addr()?;
    let listener = TcpListener::bind(&addr).await?;

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /                 - Search page");
    log::info!("  /api/search       - Search (JSON)");
    log::info!("  /api/download     - Download progress (text/event-stream)");
    log::info!("  /downloads/{{f}}    - Finished files");
    log::info!("  /health           - Health check");
    log::info!("  /metrics          - Prometheus metrics");

    serve(listener, state, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("🛑 Shutdown requested, waiting for open connections");
}

/// GET /: the search page.
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let hosts = &state.config.thumbnail_hosts;
    (
        [(CONTENT_SECURITY_POLICY, page::content_security_policy(hosts))],
        Html(page::render_index(hosts)),
    )
}

/// GET /api/search?query=<text>
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let response = state.search.search(params.query.as_deref()).await?;
    Ok(Json(response))
}

/// GET /api/download?url=<url>: relays downloader progress as server-sent events.
///
/// The URL is validated before anything is spawned. The response body owns
/// the relay stream, so a client disconnect drops it and kills the child.
async fn download_handler(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, AppError> {
    let url = DownloadUrl::parse(params.url.as_deref()).inspect_err(|_| {
        log::warn!("Rejected download request for {:?}", params.url);
    })?;
    log::info!("📥 Download requested: {}", url);

    let frames = state
        .relay
        .start(url)
        .map(|event| Ok::<_, Infallible>(Bytes::from(event.to_frame())));

    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// GET /health: liveness with uptime.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health_status = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "tubedrop",
        "version": env!("CARGO_PKG_VERSION"),
    });

    (StatusCode::OK, Json(health_status))
}

/// GET /metrics: Prometheus text exposition.
async fn metrics_handler() -> Response {
    match dropcore::core::metrics::gather_text() {
        Ok((content_type, body)) => ([(CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
