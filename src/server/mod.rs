//! HTTP surface of the dashboard.
//!
//! Serves the observer WebSocket plus a small set of plain endpoints: the
//! merged table schema, finished query results as CSV, and a root info
//! document. Failures behind any endpoint come back as plain text with a
//! 503, so the dashboard can show the message as-is.

pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::ResultCache;
use crate::error::{LakeviewError, Result};
use crate::lifecycle::TrackerHandle;
use crate::schema::SchemaCatalog;
use crate::service::{ExecutionId, SharedQueryService};

/// Shared state of the web layer.
#[derive(Clone)]
pub struct AppState {
    pub tracker: TrackerHandle,
    pub service: SharedQueryService,
    pub catalog: Arc<SchemaCatalog>,
    /// Cache of fetched result CSVs, keyed by execution id.
    pub results: Arc<ResultCache<String>>,
}

impl AppState {
    pub fn new(
        tracker: TrackerHandle,
        service: SharedQueryService,
        catalog: Arc<SchemaCatalog>,
    ) -> Self {
        Self {
            tracker,
            service,
            catalog,
            results: Arc::new(ResultCache::new()),
        }
    }
}

/// Builds the dashboard router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/schema", get(schema_handler))
        .route("/query-result", get(query_result_handler))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Serves the dashboard until the shutdown token fires.
pub async fn serve(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LakeviewError::config(format!("Failed to bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| LakeviewError::internal(format!("Failed to read listen address: {e}")))?;
    info!("Dashboard listening on http://{local}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| LakeviewError::internal(format!("Server error: {e}")))
}

/// `GET /` - service name and version.
pub async fn info_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /schema` - the merged table schema.
pub async fn schema_handler(State(state): State<AppState>) -> Response {
    match state.catalog.merged().await {
        Ok(schema) => Json(schema).into_response(),
        Err(e) => service_unavailable(e),
    }
}

/// Query string of `GET /query-result`.
#[derive(Debug, Deserialize)]
pub struct QueryResultParams {
    pub id: String,
}

/// `GET /query-result?id=...` - CSV result of a finished execution.
///
/// Results are immutable once written, so each one is fetched from the
/// service once and served from the cache afterwards.
pub async fn query_result_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryResultParams>,
) -> Response {
    if params.id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Execution id must not be empty".to_string(),
        )
            .into_response();
    }

    let id = ExecutionId::new(params.id);
    let service = Arc::clone(&state.service);
    let fetch_id = id.clone();
    let fetched = state
        .results
        .get_or_fetch("query_result", &id, || async move {
            service.fetch_result(&fetch_id).await
        })
        .await;
    match fetched {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(e) => service_unavailable(e),
    }
}

fn service_unavailable(error: LakeviewError) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, error.to_string()).into_response()
}
