use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::data_paths::DataPaths;
use crate::error::{ApiError, Result};
use crate::ingest_metrics::{IngestMetricsResponse, IngestMetricsService, DEFAULT_WINDOW_DAYS};
use crate::outlets::{OutletsResponse, OutletsService};
use crate::status::{StatusResponse, StatusService};

/// Shared, read-only services behind the API routes
#[derive(Clone)]
pub struct AppState {
    pub ingest_metrics: Arc<IngestMetricsService>,
    pub outlets: Arc<OutletsService>,
    pub status: Arc<StatusService>,
    pub max_days: i64,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let paths = DataPaths::new(&config.data_dir);
        Self {
            ingest_metrics: Arc::new(IngestMetricsService::new(&paths)),
            outlets: Arc::new(OutletsService::new(&paths)),
            status: Arc::new(StatusService::new(paths.data_dir())),
            max_days: config.server.max_days,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestMetricsParams {
    pub days: Option<i64>,
    pub country: Option<String>,
}

/// Reject windows larger than the configured cap; non-positive windows pass
/// through and yield the empty result.
pub fn check_window_days(days: i64, max_days: i64) -> Result<()> {
    if days > max_days {
        return Err(ApiError::BadRequest(format!(
            "days must be at most {}, got {}",
            max_days, days
        )));
    }
    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "basednews-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ingest_metrics(
    State(state): State<AppState>,
    Query(params): Query<IngestMetricsParams>,
) -> Result<Json<IngestMetricsResponse>> {
    let days = params.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    check_window_days(days, state.max_days)?;

    let service = state.ingest_metrics.clone();
    let response = blocking(move || service.get_metrics(days, params.country.as_deref())).await?;
    Ok(Json(response))
}

async fn outlets(State(state): State<AppState>) -> Result<Json<OutletsResponse>> {
    let service = state.outlets.clone();
    Ok(Json(blocking(move || service.load_outlets()).await?))
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let service = state.status.clone();
    Ok(Json(blocking(move || service.get_status()).await?))
}

/// Prometheus exposition of the service's own metrics
async fn prometheus() -> impl IntoResponse {
    match crate::metrics::render() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Run file-reading service calls off the async worker threads
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Create the HTTP router with all API routes
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus))
        .route("/api/ingest-metrics", get(ingest_metrics))
        .route("/api/outlets", get(outlets))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors_layer(cors_origins)))
}

/// Start the HTTP server and serve until the process exits
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let app = create_router(state, &config.server.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!(data_dir = %config.data_dir.display(), "serving basednews data");
    info!("HTTP server running on http://{}", addr);
    info!("Ingest metrics: http://{}/api/ingest-metrics?days=7", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
