//! Mock query services for tests and offline development.
//!
//! [`MockQueryService`] walks every submitted execution through a scripted
//! state sequence and serves canned results, which is enough to exercise the
//! full submission and polling flow without a gateway. [`FailingQueryService`]
//! fails every operation, for testing error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LakeviewError, Result};
use crate::schema::FieldSpec;

use super::{ExecutionId, QueryService, QueryState, StatusPayload};

/// Query service that advances each execution through a scripted sequence of
/// states, one step per status poll.
pub struct MockQueryService {
    script: Vec<QueryState>,
    result_csv: String,
    columns: BTreeMap<String, FieldSpec>,
    next_id: AtomicU64,
    polls: Mutex<BTreeMap<ExecutionId, usize>>,
    submitted: Mutex<Vec<String>>,
}

impl MockQueryService {
    /// Executions queue, run, then succeed.
    pub fn succeeding() -> Self {
        Self::with_script(vec![
            QueryState::Queued,
            QueryState::Running,
            QueryState::Succeeded,
        ])
    }

    /// Executions queue, run, then fail.
    pub fn failing_query() -> Self {
        Self::with_script(vec![
            QueryState::Queued,
            QueryState::Running,
            QueryState::Failed,
        ])
    }

    /// Executions step through `script`; once exhausted, the last state
    /// repeats on every further poll.
    pub fn with_script(script: Vec<QueryState>) -> Self {
        Self {
            script,
            result_csv: "bucket,transfer_sum_agg\nlogs,1024\n".to_string(),
            columns: BTreeMap::new(),
            next_id: AtomicU64::new(1),
            polls: Mutex::new(BTreeMap::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result_csv(mut self, csv: impl Into<String>) -> Self {
        self.result_csv = csv.into();
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.columns.insert(name.into(), spec);
        self
    }

    /// SQL statements submitted so far, in submission order.
    pub fn submitted_sql(&self) -> Vec<String> {
        self.submitted
            .lock()
            .map(|submitted| submitted.clone())
            .unwrap_or_default()
    }
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self::succeeding()
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn submit_query(&self, sql: &str) -> Result<ExecutionId> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(sql.to_string());
        }
        Ok(ExecutionId::new(format!("mock-{n}")))
    }

    async fn query_status(&self, id: &ExecutionId) -> Result<StatusPayload> {
        let mut polls = self
            .polls
            .lock()
            .map_err(|_| LakeviewError::internal("Mock poll state lock poisoned"))?;
        let cursor = polls.entry(id.clone()).or_insert(0);
        let idx = (*cursor).min(self.script.len().saturating_sub(1));
        *cursor += 1;

        let state = self.script.get(idx).copied().unwrap_or(QueryState::Succeeded);
        Ok(StatusPayload {
            state,
            raw: serde_json::json!({
                "queryExecutionId": id.as_str(),
                "state": state,
            }),
        })
    }

    async fn fetch_result(&self, _id: &ExecutionId) -> Result<String> {
        Ok(self.result_csv.clone())
    }

    async fn table_schema(&self, _table: &str) -> Result<BTreeMap<String, FieldSpec>> {
        Ok(self.columns.clone())
    }
}

/// Query service whose every operation fails with a service error.
pub struct FailingQueryService;

#[async_trait]
impl QueryService for FailingQueryService {
    async fn submit_query(&self, _sql: &str) -> Result<ExecutionId> {
        Err(LakeviewError::service("Mock submission failure"))
    }

    async fn query_status(&self, _id: &ExecutionId) -> Result<StatusPayload> {
        Err(LakeviewError::service("Mock status failure"))
    }

    async fn fetch_result(&self, _id: &ExecutionId) -> Result<String> {
        Err(LakeviewError::service("Mock result failure"))
    }

    async fn table_schema(&self, _table: &str) -> Result<BTreeMap<String, FieldSpec>> {
        Err(LakeviewError::service("Mock schema failure"))
    }
}
