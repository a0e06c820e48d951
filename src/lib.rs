//! Proof-of-Proof (PoP) miner orchestration.
//!
//! The [PopMiner](miner::PopMiner) coordinates a local bitcoin wallet service
//! and a remote NodeCore node.  It tracks whether every precondition for
//! mining holds, accepts `mine` / `resubmit` requests, hands individual
//! endorsement operations to a [ProcessManager](process_manager::ProcessManager)
//! and retires them once they complete or go stale.
//!
//! Collaborators (bitcoin wallet, NodeCore client, persistence) are consumed
//! through traits so that the orchestration logic can be exercised without
//! any network access.
#![deny(clippy::shadow_unrelated)]

pub mod config_models;
pub mod event_bus;
pub mod locks;
pub mod macros;
pub mod miner;
pub mod models;
pub mod process_manager;
pub mod scheduler;
pub mod services;
pub mod store;


pub use miner::PopMiner;
