//! HTTP client for the managed query gateway.
//!
//! The gateway fronts the actual query engine and object store: it accepts
//! SQL submissions, reports execution status, serves finished results as CSV
//! and lists table columns. Requests are plain JSON over HTTP with a shared
//! timeout; failures map onto service errors without any retrying.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{LakeviewError, Result};
use crate::schema::{FieldSpec, FieldType};

use super::{ExecutionId, QueryService, QueryState, StatusPayload};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the query gateway.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the gateway, e.g. `https://queries.example.com`.
    pub endpoint: String,
    /// Result location submitted with every query, e.g. an object store
    /// prefix the gateway writes CSVs under.
    pub output_location: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn new(endpoint: impl Into<String>, output_location: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            output_location: output_location.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Query service backed by the HTTP gateway.
pub struct HttpQueryService {
    config: ServiceConfig,
    client: reqwest::Client,
}

impl HttpQueryService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LakeviewError::service(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Maps a non-success gateway response to a service error, preferring
    /// the structured error message when the body carries one.
    fn parse_error(status: StatusCode, body: &str) -> LakeviewError {
        if let Ok(parsed) = serde_json::from_str::<GatewayErrorResponse>(body) {
            return LakeviewError::service(format!(
                "Query gateway error ({}): {}",
                status, parsed.error.message
            ));
        }
        LakeviewError::service(format!("Query gateway error ({status}): {body}"))
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn submit_query(&self, sql: &str) -> Result<ExecutionId> {
        let request = StartQueryRequest {
            sql: sql.to_string(),
            output_location: self.config.output_location.clone(),
        };
        let response = self
            .client
            .post(self.url("queries"))
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let started: StartQueryResponse = serde_json::from_str(&body)
            .map_err(|e| LakeviewError::service(format!("Unexpected submission response: {e}")))?;
        Ok(ExecutionId::new(started.query_execution_id))
    }

    async fn query_status(&self, id: &ExecutionId) -> Result<StatusPayload> {
        let response = self
            .client
            .get(self.url(&format!("queries/{id}")))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LakeviewError::service(format!("Unexpected status response: {e}")))?;
        let state = raw
            .get("state")
            .and_then(|s| s.as_str())
            .ok_or_else(|| LakeviewError::service("Status response carries no state"))?;
        Ok(StatusPayload {
            state: QueryState::from_service(state),
            raw,
        })
    }

    async fn fetch_result(&self, id: &ExecutionId) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("queries/{id}/results")))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }
        Ok(body)
    }

    async fn table_schema(&self, table: &str) -> Result<BTreeMap<String, FieldSpec>> {
        let response = self
            .client
            .get(self.url(&format!("tables/{table}/columns")))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let listed: TableColumnsResponse = serde_json::from_str(&body)
            .map_err(|e| LakeviewError::service(format!("Unexpected columns response: {e}")))?;
        Ok(listed
            .columns
            .into_iter()
            .map(|col| {
                let spec = match field_type_of(&col.column_type) {
                    FieldType::Number => FieldSpec::number(),
                    FieldType::String => FieldSpec::string(),
                };
                (col.name, spec)
            })
            .collect())
    }
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| LakeviewError::service(format!("Failed to read gateway response: {e}")))
}

fn request_error(e: reqwest::Error) -> LakeviewError {
    if e.is_timeout() {
        LakeviewError::service("Query gateway request timed out")
    } else if e.is_connect() {
        LakeviewError::service(format!("Failed to reach query gateway: {e}"))
    } else {
        LakeviewError::service(format!("Query gateway request failed: {e}"))
    }
}

/// Maps a service column type to the coarse dashboard type. Numeric types
/// can be aggregated; everything else is treated as text.
fn field_type_of(column_type: &str) -> FieldType {
    match column_type {
        "tinyint" | "smallint" | "int" | "integer" | "bigint" | "double" | "float" | "real"
        | "decimal" => FieldType::Number,
        _ => FieldType::String,
    }
}

// Gateway API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartQueryRequest {
    sql: String,
    output_location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartQueryResponse {
    query_execution_id: String,
}

#[derive(Debug, Deserialize)]
struct TableColumnsResponse {
    columns: Vec<TableColumn>,
}

#[derive(Debug, Deserialize)]
struct TableColumn {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorResponse {
    error: GatewayError,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    message: String,
}
