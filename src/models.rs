pub mod amount;
pub mod block_tip;
pub mod operation;
pub mod readiness;
