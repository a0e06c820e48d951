use serde::Deserialize;
use serde::Serialize;

use super::MiningInstruction;
use super::OperationAction;
use super::OperationId;
use crate::locks::tokio::AtomicRw;

/// A mining operation shared between the registry, the orchestrator and the
/// process manager task advancing it.
pub type SharedOperation = AtomicRw<MiningOperationState>;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum OperationStatus {
    #[default]
    Unknown,
    Running,
    Completed,
    Failed,
}

/// confirmation state of the endorsement transaction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum TransactionStatus {
    #[default]
    Unconfirmed,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("invalid operation transition from {from} to {to}")]
    InvalidTransition {
        from: OperationAction,
        to: OperationAction,
    },

    #[error("operation artifact `{0}` is already set")]
    ArtifactAlreadySet(&'static str),
}

/// One attempt to endorse a NodeCore block via a bitcoin transaction.
///
/// Artifacts accumulate as the pipeline progresses.  Each `record_*` method
/// belongs to exactly one phase, moves the operation into that phase and
/// refuses to overwrite an artifact that is already set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningOperationState {
    operation_id: OperationId,
    block_number: Option<u64>,
    current_action: OperationAction,
    status: OperationStatus,
    transaction_status: TransactionStatus,
    message: String,

    mining_instruction: Option<MiningInstruction>,
    transaction_bytes: Option<Vec<u8>>,
    submitted_transaction_id: Option<String>,
    bitcoin_block_header_of_proof_bytes: Option<Vec<u8>>,
    bitcoin_context_blocks_bytes: Option<Vec<Vec<u8>>>,
    merkle_path: Option<String>,
    pop_transaction_id: Option<String>,
}

impl MiningOperationState {
    /// a fresh operation at [OperationAction::Start] with no artifacts.
    ///
    /// `block_number` is `None` when the latest block should be endorsed.
    pub fn new(operation_id: OperationId, block_number: Option<u64>) -> Self {
        Self {
            operation_id,
            block_number,
            current_action: OperationAction::Start,
            status: OperationStatus::Unknown,
            transaction_status: TransactionStatus::Unconfirmed,
            message: String::new(),
            mining_instruction: None,
            transaction_bytes: None,
            submitted_transaction_id: None,
            bitcoin_block_header_of_proof_bytes: None,
            bitcoin_context_blocks_bytes: None,
            merkle_path: None,
            pop_transaction_id: None,
        }
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }

    pub fn current_action(&self) -> OperationAction {
        self.current_action
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn mining_instruction(&self) -> Option<&MiningInstruction> {
        self.mining_instruction.as_ref()
    }

    pub fn transaction_bytes(&self) -> Option<&[u8]> {
        self.transaction_bytes.as_deref()
    }

    pub fn submitted_transaction_id(&self) -> Option<&str> {
        self.submitted_transaction_id.as_deref()
    }

    pub fn bitcoin_block_header_of_proof_bytes(&self) -> Option<&[u8]> {
        self.bitcoin_block_header_of_proof_bytes.as_deref()
    }

    pub fn bitcoin_context_blocks_bytes(&self) -> Option<&[Vec<u8>]> {
        self.bitcoin_context_blocks_bytes.as_deref()
    }

    pub fn merkle_path(&self) -> Option<&str> {
        self.merkle_path.as_deref()
    }

    pub fn pop_transaction_id(&self) -> Option<&str> {
        self.pop_transaction_id.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.current_action.is_terminal()
    }

    /// height of the endorsed block, known once the mining instruction
    /// has arrived.
    pub fn endorsed_block_number(&self) -> Option<u64> {
        self.mining_instruction
            .as_ref()
            .map(|i| i.endorsed_block_height)
    }

    /// height used for settlement expiry: the endorsed block if known, else
    /// the requested block.
    pub fn staleness_height(&self) -> Option<u64> {
        self.endorsed_block_number().or(self.block_number)
    }

    /// marks the operation as picked up for processing.
    pub fn begin(&mut self) {
        if self.status == OperationStatus::Unknown && !self.is_terminal() {
            self.status = OperationStatus::Running;
            self.message = "Operation started".to_owned();
        }
    }

    pub fn record_instruction(
        &mut self,
        instruction: MiningInstruction,
    ) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::InstructionReceived)?;
        ensure_unset(&self.mining_instruction, "mining_instruction")?;

        self.block_number = Some(instruction.endorsed_block_height);
        let message = format!(
            "Received mining instruction for block {}",
            instruction.endorsed_block_height
        );
        self.mining_instruction = Some(instruction);
        self.advance(OperationAction::InstructionReceived, message);
        Ok(())
    }

    pub fn record_endorsement_transaction(
        &mut self,
        transaction_bytes: Vec<u8>,
    ) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::EndorsementTransactionCreated)?;
        ensure_unset(&self.transaction_bytes, "transaction_bytes")?;

        self.transaction_bytes = Some(transaction_bytes);
        self.advance(
            OperationAction::EndorsementTransactionCreated,
            "Endorsement transaction created".to_owned(),
        );
        Ok(())
    }

    pub fn record_broadcast(&mut self, transaction_id: String) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::Wait)?;
        ensure_unset(&self.submitted_transaction_id, "submitted_transaction_id")?;

        let message = format!("Endorsement transaction {} broadcast", transaction_id);
        self.submitted_transaction_id = Some(transaction_id);
        self.advance(OperationAction::Wait, message);
        Ok(())
    }

    pub fn record_confirmation(
        &mut self,
        block_header_of_proof: Vec<u8>,
        merkle_path: String,
    ) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::EndorsementTransactionConfirmed)?;
        ensure_unset(
            &self.bitcoin_block_header_of_proof_bytes,
            "bitcoin_block_header_of_proof_bytes",
        )?;
        ensure_unset(&self.merkle_path, "merkle_path")?;

        self.bitcoin_block_header_of_proof_bytes = Some(block_header_of_proof);
        self.merkle_path = Some(merkle_path);
        self.transaction_status = TransactionStatus::Confirmed;
        self.advance(
            OperationAction::EndorsementTransactionConfirmed,
            "Endorsement transaction confirmed".to_owned(),
        );
        Ok(())
    }

    pub fn record_proof_of_proof(
        &mut self,
        context_blocks: Vec<Vec<u8>>,
    ) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::ProofOfProofAssembled)?;
        ensure_unset(
            &self.bitcoin_context_blocks_bytes,
            "bitcoin_context_blocks_bytes",
        )?;

        self.bitcoin_context_blocks_bytes = Some(context_blocks);
        self.advance(
            OperationAction::ProofOfProofAssembled,
            "Proof of proof assembled".to_owned(),
        );
        Ok(())
    }

    pub fn record_pop_submission(
        &mut self,
        pop_transaction_id: String,
    ) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::SubmittedToNodeCore)?;
        ensure_unset(&self.pop_transaction_id, "pop_transaction_id")?;

        let message = format!("PoP transaction {} submitted to NodeCore", pop_transaction_id);
        self.pop_transaction_id = Some(pop_transaction_id);
        self.advance(OperationAction::SubmittedToNodeCore, message);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.ensure_can_advance(OperationAction::Done)?;
        self.advance(OperationAction::Done, "Operation completed".to_owned());
        Ok(())
    }

    /// moves the operation to [OperationAction::Failed].
    ///
    /// returns false, leaving the state untouched, if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.current_action = OperationAction::Failed;
        self.status = OperationStatus::Failed;
        self.message = reason.into();
        tracing::debug!(
            "operation {} failed: {}",
            self.operation_id,
            self.message
        );
        true
    }

    fn ensure_can_advance(&self, next: OperationAction) -> Result<(), TransitionError> {
        match self.current_action.can_transition_to(next) {
            true => Ok(()),
            false => Err(TransitionError::InvalidTransition {
                from: self.current_action,
                to: next,
            }),
        }
    }

    // caller must have checked ensure_can_advance()
    fn advance(&mut self, next: OperationAction, message: String) {
        tracing::debug!(
            "operation {}: {} -> {}",
            self.operation_id,
            self.current_action,
            next
        );
        self.current_action = next;
        self.status = match next {
            OperationAction::Done => OperationStatus::Completed,
            _ => OperationStatus::Running,
        };
        self.message = message;
    }
}

fn ensure_unset<T>(slot: &Option<T>, name: &'static str) -> Result<(), TransitionError> {
    match slot {
        Some(_) => Err(TransitionError::ArtifactAlreadySet(name)),
        None => Ok(()),
    }
}
