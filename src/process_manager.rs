//! Advancing mining operations through their phases.
//!
//! The miner never changes an operation's phase itself.  It hands each
//! operation to a [ProcessManager], which owns the per-phase work until the
//! operation reaches a terminal phase.
//!
//! [TaskProcessManager] runs one tokio task per operation.  The phase
//! specific work (talking to NodeCore and the bitcoin wallet) is supplied
//! as an [OperationPipeline].

pub mod errors;
mod pipeline;
mod task_manager;

pub use errors::ProcessManagerError;
pub use pipeline::OperationPipeline;
pub use task_manager::TaskProcessManager;

use crate::models::operation::SharedOperation;

#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync + std::fmt::Debug {
    /// starts processing a new operation, or resumes one resubmitted by the
    /// user.
    async fn submit(&self, operation: SharedOperation) -> Result<(), ProcessManagerError>;

    /// resumes an operation loaded from persistent storage after a restart.
    async fn restore(&self, operation: SharedOperation) -> Result<(), ProcessManagerError>;

    /// stops all processing.  in-flight operations stay persisted in their
    /// last phase.
    async fn shutdown(&self);
}
