//! Query service abstraction.
//!
//! Everything downstream of SQL generation goes through the [`QueryService`]
//! trait: submitting statements, polling execution status, fetching result
//! CSVs and discovering table columns. The production implementation talks
//! to the query gateway over HTTP; the mock backs the integration tests and
//! the `--mock-service` mode.

pub mod http;
pub mod mock;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::FieldSpec;

pub use http::{HttpQueryService, ServiceConfig};
pub use mock::{FailingQueryService, MockQueryService};

/// Identifier of one submitted query execution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ExecutionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a query execution.
///
/// Executions move from queued through running into exactly one of the two
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl QueryState {
    /// Whether the execution has finished and will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Maps a state string reported by the query service. Anything beyond
    /// the known states (cancellations, future additions) counts as failed,
    /// so polling always terminates.
    pub fn from_service(state: &str) -> Self {
        match state {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        write!(f, "{name}")
    }
}

/// Status report for one execution: the mapped state plus the raw status
/// document the service returned, kept for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub state: QueryState,
    pub raw: serde_json::Value,
}

/// Client-side interface to the managed query service.
///
/// None of the operations retry internally; every failure surfaces to the
/// caller.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a SQL statement and returns the id of the new execution.
    async fn submit_query(&self, sql: &str) -> Result<ExecutionId>;

    /// Reports the current status of an execution.
    async fn query_status(&self, id: &ExecutionId) -> Result<StatusPayload>;

    /// Fetches the CSV result of a finished execution.
    async fn fetch_result(&self, id: &ExecutionId) -> Result<String>;

    /// Discovers the columns of a table.
    async fn table_schema(&self, table: &str) -> Result<BTreeMap<String, FieldSpec>>;
}

/// Shared handle to a query service implementation.
pub type SharedQueryService = Arc<dyn QueryService>;

/// Connects to the query gateway described by the config.
pub fn connect(config: &ServiceConfig) -> Result<SharedQueryService> {
    Ok(Arc::new(HttpQueryService::new(config.clone())?))
}

/// Creates an in-process mock service for running without a gateway.
pub fn connect_mock() -> SharedQueryService {
    Arc::new(MockQueryService::succeeding())
}
