//! Web layer integration tests.
//!
//! Invokes the handlers directly with manually constructed extractors; no
//! network listener is involved.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use lakeview::config::SchemaConfig;
use lakeview::error::Result;
use lakeview::lifecycle::QueryTracker;
use lakeview::schema::{FieldSpec, SchemaCatalog, TableSchema};
use lakeview::server::{
    info_handler, query_result_handler, schema_handler, AppState, QueryResultParams,
};
use lakeview::service::{
    ExecutionId, FailingQueryService, MockQueryService, QueryService, SharedQueryService,
    StatusPayload,
};

fn app_state(service: SharedQueryService) -> AppState {
    let schema = SchemaConfig::default().to_schema().unwrap();
    let catalog = Arc::new(SchemaCatalog::new(schema, Arc::clone(&service)));
    let (tracker, actor) =
        QueryTracker::spawn(Arc::clone(&catalog), Arc::clone(&service), Duration::from_millis(5));
    tokio::spawn(actor.run());
    AppState::new(tracker, service, catalog)
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_schema_endpoint_merges_static_over_discovered() {
    let service = Arc::new(
        MockQueryService::succeeding()
            .with_column("ds", FieldSpec::string())
            .with_column("useragent", FieldSpec::string()),
    );
    let state = app_state(service);

    let response = schema_handler(State(state)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let schema: TableSchema = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(schema.table, "access_logs_db.cdn_logs");
    // The static declaration of ds keeps its derived expression; the
    // discovered-only column comes through as declared by the service.
    assert!(schema.fields["ds"].derived.is_some());
    assert_eq!(schema.fields["useragent"], FieldSpec::string());
}

#[tokio::test]
async fn test_schema_endpoint_reports_discovery_failure() {
    let state = app_state(Arc::new(FailingQueryService));

    let response = schema_handler(State(state)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(response).await.contains("Service error"));
}

#[tokio::test]
async fn test_query_result_is_served_as_csv() {
    let service = Arc::new(
        MockQueryService::succeeding().with_result_csv("bucket,hits\nlogs,3\n"),
    );
    let state = app_state(service);

    let response = query_result_handler(
        State(state),
        Query(QueryResultParams {
            id: "exec-1".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    assert_eq!(body_text(response).await, "bucket,hits\nlogs,3\n");
}

#[tokio::test]
async fn test_query_result_rejects_empty_id() {
    let state = app_state(Arc::new(MockQueryService::succeeding()));

    let response = query_result_handler(
        State(state),
        Query(QueryResultParams { id: String::new() }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Execution id must not be empty");
}

#[tokio::test]
async fn test_query_result_reports_fetch_failure() {
    let state = app_state(Arc::new(FailingQueryService));

    let response = query_result_handler(
        State(state),
        Query(QueryResultParams {
            id: "exec-1".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(response).await.contains("Service error"));
}

/// Counts result fetches while delegating everything to the mock.
struct CountingService {
    inner: MockQueryService,
    result_fetches: AtomicUsize,
}

#[async_trait]
impl QueryService for CountingService {
    async fn submit_query(&self, sql: &str) -> Result<ExecutionId> {
        self.inner.submit_query(sql).await
    }

    async fn query_status(&self, id: &ExecutionId) -> Result<StatusPayload> {
        self.inner.query_status(id).await
    }

    async fn fetch_result(&self, id: &ExecutionId) -> Result<String> {
        self.result_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_result(id).await
    }

    async fn table_schema(&self, table: &str) -> Result<BTreeMap<String, FieldSpec>> {
        self.inner.table_schema(table).await
    }
}

#[tokio::test]
async fn test_query_results_are_cached_per_execution() {
    let service = Arc::new(CountingService {
        inner: MockQueryService::succeeding(),
        result_fetches: AtomicUsize::new(0),
    });
    let state = app_state(service.clone());

    for _ in 0..2 {
        let response = query_result_handler(
            State(state.clone()),
            Query(QueryResultParams {
                id: "exec-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(service.result_fetches.load(Ordering::SeqCst), 1);

    let response = query_result_handler(
        State(state),
        Query(QueryResultParams {
            id: "exec-2".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.result_fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_info_endpoint_names_the_server() {
    let response = info_handler().await.into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let info: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(info["name"], "lakeview");
    assert!(info["version"].is_string());
}
