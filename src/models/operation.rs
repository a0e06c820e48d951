//! Mining operations: one attempt to endorse a NodeCore block with a bitcoin
//! transaction.

pub mod mining_instruction;
pub mod mining_operation_state;
pub mod operation_action;
pub mod operation_id;
pub mod registry;

pub use mining_instruction::MiningInstruction;
pub use mining_operation_state::MiningOperationState;
pub use mining_operation_state::OperationStatus;
pub use mining_operation_state::SharedOperation;
pub use mining_operation_state::TransactionStatus;
pub use mining_operation_state::TransitionError;
pub use operation_action::OperationAction;
pub use operation_id::OperationId;
pub use registry::OperationRegistry;
