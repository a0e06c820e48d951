use crate::models::operation::MiningOperationState;

/// The phase-specific work of an endorsement.
///
/// Each call performs the work of the operation's current phase and records
/// the produced artifact through the matching `record_*` method, which moves
/// the operation to its next phase.  Returning `Ok` without changing the
/// phase means the work is not possible yet (eg the endorsement transaction
/// is unconfirmed) and the call should be retried later.  Returning `Err`
/// fails the operation.
#[async_trait::async_trait]
pub trait OperationPipeline: Send + Sync + std::fmt::Debug {
    async fn advance(&self, state: &mut MiningOperationState) -> anyhow::Result<()>;
}
