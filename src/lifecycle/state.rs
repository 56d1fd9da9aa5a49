//! Replicated dashboard state.
//!
//! One [`ServerState`] value describes everything observers can see: the
//! tracked query executions and the server-side failures recorded along the
//! way. Observers always receive the full state; there are no deltas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::QueryDescriptor;
use crate::service::{ExecutionId, QueryState, StatusPayload};

/// One tracked query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecution {
    pub id: ExecutionId,
    /// SQL that was submitted.
    pub sql: String,
    /// Descriptor the SQL was built from.
    pub descriptor: QueryDescriptor,
    pub state: QueryState,
    /// Raw status document from the latest poll, stored verbatim for display.
    pub last_status_payload: serde_json::Value,
}

/// One recorded server-side failure, kept for operator display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Which operation failed, including its input.
    pub message: String,
    /// Underlying error text.
    pub detail: String,
}

/// Full dashboard state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerState {
    pub query_executions: BTreeMap<ExecutionId, QueryExecution>,
    pub server_errors: Vec<ServerError>,
}

impl ServerState {
    /// Inserts or replaces a tracked execution.
    pub fn upsert(&mut self, execution: QueryExecution) {
        self.query_executions
            .insert(execution.id.clone(), execution);
    }

    /// Merges a fresh status report into a tracked execution. Reports for
    /// executions that are not tracked are dropped; a poll task can outlive
    /// interest in its execution.
    pub fn merge_status(&mut self, id: &ExecutionId, status: StatusPayload) {
        if let Some(execution) = self.query_executions.get_mut(id) {
            execution.state = status.state;
            execution.last_status_payload = status.raw;
        }
    }

    /// Records a server-side failure.
    pub fn record_error(&mut self, message: impl Into<String>, detail: impl Into<String>) {
        self.server_errors.push(ServerError {
            message: message.into(),
            detail: detail.into(),
        });
    }

    pub fn get(&self, id: &ExecutionId) -> Option<&QueryExecution> {
        self.query_executions.get(id)
    }
}
