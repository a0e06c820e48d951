use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::OperationPipeline;
use super::ProcessManager;
use super::ProcessManagerError;
use crate::event_bus::EventBus;
use crate::event_bus::PopEvent;
use crate::locks::tokio::AtomicRw;
use crate::models::operation::MiningOperationState;
use crate::models::operation::OperationId;
use crate::models::operation::SharedOperation;
use crate::store::OperationStore;

/// Runs every operation on its own tokio task.
///
/// At most one task exists per operation id.  After each pipeline step the
/// operation is persisted while its write lock is held, so saves of one
/// operation never land out of order.  A step that made no progress is
/// retried after the poll interval.  When the operation terminates, its
/// final state is persisted and an [PopEvent::OperationCompleted] is
/// published.
#[derive(Debug)]
pub struct TaskProcessManager {
    pipeline: Arc<dyn OperationPipeline>,
    store: Arc<dyn OperationStore>,
    events: EventBus,
    poll_interval: Duration,

    active: AtomicRw<HashSet<OperationId>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TaskProcessManager {
    pub fn new(
        pipeline: Arc<dyn OperationPipeline>,
        store: Arc<dyn OperationStore>,
        events: EventBus,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pipeline,
            store,
            events,
            poll_interval,
            active: AtomicRw::from((HashSet::new(), Some("TaskProcessManager::active"))),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// number of operations with a running task.
    pub async fn active_count(&self) -> usize {
        self.active.lock(|a| a.len()).await
    }

    async fn spawn(&self, operation: SharedOperation, origin: &str) -> Result<(), ProcessManagerError> {
        if self.cancel.is_cancelled() {
            return Err(ProcessManagerError::ShutDown);
        }

        let (id, terminal) = operation
            .lock(|s| (s.operation_id().clone(), s.is_terminal()))
            .await;
        if terminal {
            return Err(ProcessManagerError::Terminated(id));
        }

        let mut active = self.active.clone();
        let inserted = active.lock_mut(|a| a.insert(id.clone())).await;
        if !inserted {
            debug!("operation {} already has an active task; ignoring {}", id, origin);
            return Ok(());
        }

        info!("{} operation {}", origin, id);
        let worker = OperationWorker {
            id,
            pipeline: self.pipeline.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
            poll_interval: self.poll_interval,
            active,
            cancel: self.cancel.child_token(),
        };
        self.tracker.spawn(worker.run(operation));
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProcessManager for TaskProcessManager {
    async fn submit(&self, operation: SharedOperation) -> Result<(), ProcessManagerError> {
        self.spawn(operation, "submitting").await
    }

    async fn restore(&self, operation: SharedOperation) -> Result<(), ProcessManagerError> {
        self.spawn(operation, "restoring").await
    }

    async fn shutdown(&self) {
        info!("process manager shutting down");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Drives a single operation.
struct OperationWorker {
    id: OperationId,
    pipeline: Arc<dyn OperationPipeline>,
    store: Arc<dyn OperationStore>,
    events: EventBus,
    poll_interval: Duration,
    active: AtomicRw<HashSet<OperationId>>,
    cancel: CancellationToken,
}

impl OperationWorker {
    async fn run(mut self, mut operation: SharedOperation) {
        operation.lock_mut(|s| s.begin()).await;

        loop {
            let before = operation.lock(|s| s.clone()).await;
            if before.is_terminal() {
                // failed from outside the worker, e.g. by expiry.
                let state = operation.lock_guard_mut().await;
                self.persist(&state).await;
                break;
            }

            // the step works on a copy so that a forced failure arriving
            // meanwhile is not overwritten.
            let mut working = before.clone();
            let step = AssertUnwindSafe(self.pipeline.advance(&mut working)).catch_unwind();
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("operation {} cancelled in {}", self.id, before.current_action());
                    self.release().await;
                    return;
                }
                outcome = step => outcome,
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("operation {} failed in {}: {:#}", self.id, before.current_action(), e);
                    working.fail(format!("{:#}", e));
                }
                Err(_) => {
                    error!("operation {} panicked in {}", self.id, before.current_action());
                    working.fail(format!("Unexpected error in {}", before.current_action().label()));
                }
            }

            let current = {
                let mut state = operation.lock_guard_mut().await;
                if !state.is_terminal() {
                    *state = working;
                }
                self.persist(&state).await;
                state.clone()
            };

            if !current.is_terminal() && current.current_action() == before.current_action() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.release().await;
                        return;
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        debug!("operation {} terminated", self.id);
        self.release().await;
        self.events.publish(PopEvent::OperationCompleted(self.id.clone()));
    }

    async fn persist(&self, state: &MiningOperationState) {
        if let Err(e) = self.store.save_operation(state).await {
            warn!("unable to persist operation {}: {:#}", self.id, anyhow::Error::from(e));
        }
    }

    async fn release(&mut self) {
        let id = &self.id;
        self.active.lock_mut(|a| a.remove(id)).await;
    }
}
