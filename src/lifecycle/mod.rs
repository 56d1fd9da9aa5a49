//! Query lifecycle tracking.
//!
//! A single [`QueryTracker`] actor owns the dashboard state. Commands arrive
//! over a channel from the web layer and from the background tasks the
//! tracker spawns itself (submission, status polling); every state change is
//! broadcast to subscribers as a full snapshot.

pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{LakeviewError, Result};
use crate::query::{build_query, QueryDescriptor};
use crate::schema::SchemaCatalog;
use crate::service::{ExecutionId, QueryState, SharedQueryService, StatusPayload};

pub use state::{QueryExecution, ServerError, ServerState};

/// Capacity of the state broadcast channel. Subscribers that fall further
/// behind than this see a lag notice and resume with the newest snapshot.
const BROADCAST_CAPACITY: usize = 64;

/// Commands processed by the tracker actor.
enum TrackerCommand {
    Submit {
        descriptor: QueryDescriptor,
        reply: oneshot::Sender<Result<ExecutionId>>,
    },
    Refresh {
        id: ExecutionId,
    },
    Register {
        execution: QueryExecution,
    },
    Merge {
        id: ExecutionId,
        status: StatusPayload,
    },
    Fault {
        message: String,
        detail: String,
    },
    Subscribe {
        reply: oneshot::Sender<(Arc<ServerState>, broadcast::Receiver<Arc<ServerState>>)>,
    },
    Snapshot {
        reply: oneshot::Sender<Arc<ServerState>>,
    },
    Shutdown,
}

/// Cloneable handle for talking to the query tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    sender: mpsc::Sender<TrackerCommand>,
}

impl TrackerHandle {
    /// Builds and submits the query described by `descriptor`.
    ///
    /// On success the new execution is tracked and polled until it reaches a
    /// terminal state. Build and submission failures are recorded in the
    /// server state as well as returned.
    pub async fn submit_query(&self, descriptor: QueryDescriptor) -> Result<ExecutionId> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(TrackerCommand::Submit { descriptor, reply })
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))?;
        response
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))?
    }

    /// Requests a one-off status refresh for an execution.
    pub async fn refresh_status(&self, id: ExecutionId) -> Result<()> {
        if id.is_empty() {
            return Err(LakeviewError::validation("Execution id must not be empty"));
        }
        self.sender
            .send(TrackerCommand::Refresh { id })
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))
    }

    /// Subscribes to state broadcasts, returning the current snapshot and a
    /// receiver for every later one.
    pub async fn subscribe(
        &self,
    ) -> Result<(Arc<ServerState>, broadcast::Receiver<Arc<ServerState>>)> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(TrackerCommand::Subscribe { reply })
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))?;
        response
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))
    }

    /// Returns the current state snapshot.
    pub async fn snapshot(&self) -> Result<Arc<ServerState>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(TrackerCommand::Snapshot { reply })
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))?;
        response
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))
    }

    /// Asks the tracker to stop. Commands queued before the shutdown are
    /// still processed.
    pub async fn close(&self) -> Result<()> {
        self.sender
            .send(TrackerCommand::Shutdown)
            .await
            .map_err(|_| LakeviewError::internal("Query tracker closed"))
    }
}

/// Actor owning the dashboard state.
pub struct QueryTracker {
    receiver: mpsc::Receiver<TrackerCommand>,
    /// Clone handed to the background tasks the actor spawns.
    sender: mpsc::Sender<TrackerCommand>,
    catalog: Arc<SchemaCatalog>,
    service: SharedQueryService,
    broadcast: broadcast::Sender<Arc<ServerState>>,
    state: ServerState,
    /// Cached copy of `state` shared with subscribers.
    snapshot: Arc<ServerState>,
    poll_interval: Duration,
}

impl QueryTracker {
    /// Creates the tracker and its handle. The caller drives the actor,
    /// usually via `tokio::spawn(tracker.run())`.
    pub fn spawn(
        catalog: Arc<SchemaCatalog>,
        service: SharedQueryService,
        poll_interval: Duration,
    ) -> (TrackerHandle, QueryTracker) {
        let (sender, receiver) = mpsc::channel(32);
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        let state = ServerState::default();
        let snapshot = Arc::new(state.clone());
        let tracker = QueryTracker {
            receiver,
            sender: sender.clone(),
            catalog,
            service,
            broadcast,
            state,
            snapshot,
            poll_interval,
        };
        (TrackerHandle { sender }, tracker)
    }

    /// Processes commands until asked to shut down.
    pub async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            match command {
                TrackerCommand::Submit { descriptor, reply } => {
                    self.handle_submit(descriptor, reply);
                }
                TrackerCommand::Refresh { id } => self.handle_refresh(id),
                TrackerCommand::Register { execution } => {
                    self.state.upsert(execution);
                    self.publish();
                }
                TrackerCommand::Merge { id, status } => {
                    self.state.merge_status(&id, status);
                    self.publish();
                }
                TrackerCommand::Fault { message, detail } => {
                    warn!("{message}: {detail}");
                    self.state.record_error(message, detail);
                    self.publish();
                }
                TrackerCommand::Subscribe { reply } => {
                    let _ = reply.send((Arc::clone(&self.snapshot), self.broadcast.subscribe()));
                }
                TrackerCommand::Snapshot { reply } => {
                    let _ = reply.send(Arc::clone(&self.snapshot));
                }
                TrackerCommand::Shutdown => break,
            }
        }
        debug!("Query tracker stopped");
    }

    /// Refreshes the cached snapshot and fans it out to subscribers.
    fn publish(&mut self) {
        self.snapshot = Arc::new(self.state.clone());
        let _ = self.broadcast.send(Arc::clone(&self.snapshot));
    }

    /// Starts the submission task for a descriptor. Polling begins once the
    /// submission comes back with an execution id.
    fn handle_submit(&self, descriptor: QueryDescriptor, reply: oneshot::Sender<Result<ExecutionId>>) {
        let catalog = Arc::clone(&self.catalog);
        let service = Arc::clone(&self.service);
        let sender = self.sender.clone();
        let poll_interval = self.poll_interval;
        tokio::spawn(async move {
            match submit_and_register(catalog, Arc::clone(&service), sender.clone(), descriptor)
                .await
            {
                Ok(id) => {
                    let _ = reply.send(Ok(id.clone()));
                    poll_until_terminal(service, sender, id, poll_interval).await;
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            }
        });
    }

    /// Starts a single status poll for an execution.
    fn handle_refresh(&self, id: ExecutionId) {
        let service = Arc::clone(&self.service);
        let sender = self.sender.clone();
        tokio::spawn(async move {
            match service.query_status(&id).await {
                Ok(status) => {
                    let _ = sender.send(TrackerCommand::Merge { id, status }).await;
                }
                Err(e) => {
                    fault(&sender, format!("Failed to poll status for query {id}"), &e).await;
                }
            }
        });
    }
}

/// Builds the SQL for `descriptor` and submits it, registering the new
/// execution on success. Failures are recorded in the server state before
/// being returned.
async fn submit_and_register(
    catalog: Arc<SchemaCatalog>,
    service: SharedQueryService,
    sender: mpsc::Sender<TrackerCommand>,
    descriptor: QueryDescriptor,
) -> Result<ExecutionId> {
    let input = serde_json::to_string(&descriptor).unwrap_or_else(|_| "<descriptor>".to_string());

    let schema = match catalog.merged().await {
        Ok(schema) => schema,
        Err(e) => {
            // Submission still works against the static schema when
            // discovery is down.
            warn!("Schema discovery failed, using static schema: {e}");
            catalog.static_schema().clone()
        }
    };

    let sql = match build_query(&descriptor, &schema) {
        Ok(sql) => sql,
        Err(e) => {
            fault(&sender, format!("Failed to build query for {input}"), &e).await;
            return Err(e);
        }
    };

    match service.submit_query(&sql).await {
        Ok(id) => {
            let execution = QueryExecution {
                id: id.clone(),
                sql,
                descriptor,
                state: QueryState::Queued,
                last_status_payload: serde_json::Value::Null,
            };
            let _ = sender.send(TrackerCommand::Register { execution }).await;
            Ok(id)
        }
        Err(e) => {
            fault(&sender, format!("Failed to submit query {sql}"), &e).await;
            Err(e)
        }
    }
}

/// Polls an execution until it reaches a terminal state, merging every
/// status report into the server state. Poll failures are recorded and end
/// the loop; there is no retry.
async fn poll_until_terminal(
    service: SharedQueryService,
    sender: mpsc::Sender<TrackerCommand>,
    id: ExecutionId,
    poll_interval: Duration,
) {
    loop {
        tokio::time::sleep(poll_interval).await;
        match service.query_status(&id).await {
            Ok(status) => {
                let terminal = status.state.is_terminal();
                let merge = TrackerCommand::Merge {
                    id: id.clone(),
                    status,
                };
                if sender.send(merge).await.is_err() || terminal {
                    return;
                }
            }
            Err(e) => {
                fault(&sender, format!("Failed to poll status for query {id}"), &e).await;
                return;
            }
        }
    }
}

/// Records a failure in the server state.
async fn fault(sender: &mpsc::Sender<TrackerCommand>, message: String, error: &LakeviewError) {
    let _ = sender
        .send(TrackerCommand::Fault {
            message,
            detail: error.to_string(),
        })
        .await;
}
