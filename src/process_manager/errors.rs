use crate::models::operation::OperationId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProcessManagerError {
    #[error("process manager is shut down")]
    ShutDown,

    #[error("operation {0} has already terminated")]
    Terminated(OperationId),
}
