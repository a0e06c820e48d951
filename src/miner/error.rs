use std::path::PathBuf;

use crate::models::operation::OperationId;
use crate::services::SendFailure;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExportError {
    #[error("export destination {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("unable to write private keys to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported to callers of the [PopMiner](super::PopMiner).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MinerError {
    #[error("PoP miner is not ready: {}", reasons.join("; "))]
    NotReady { reasons: Vec<String> },

    #[error("too many operations pending: {pending} endorsements are waiting in the bitcoin mempool (limit {limit})")]
    TooManyPending { pending: usize, limit: usize },

    #[error("operation {0} not found")]
    NotFound(OperationId),

    #[error(transparent)]
    SendFailed(#[from] SendFailure),

    #[error(transparent)]
    ExportFailed(#[from] ExportError),

    #[error("unable to reach the {0}")]
    ServiceUnavailable(&'static str),

    #[error("PoP miner is shutting down")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl MinerError {
    /// one line per reason, as presented to the user.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::NotReady { reasons } => reasons.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_lists_every_reason() {
        let err = MinerError::NotReady {
            reasons: vec!["a".into(), "b".into()],
        };
        assert_eq!(vec!["a".to_owned(), "b".to_owned()], err.messages());
        assert_eq!("PoP miner is not ready: a; b", err.to_string());
    }

    #[test]
    fn send_failures_keep_their_message() {
        let err = MinerError::from(SendFailure::ExceededMaxFee);
        assert_eq!(
            vec![SendFailure::ExceededMaxFee.to_string()],
            err.messages()
        );
    }
}
