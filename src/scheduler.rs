//! Periodic mining.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::miner::PopMiner;
use crate::models::operation::OperationId;

/// Starts a mining operation for the latest block at a fixed interval,
/// whenever the miner is ready.
#[derive(Debug, Clone, Copy)]
pub struct AutoMineScheduler {
    interval: Duration,
}

impl AutoMineScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// ticks until `cancel` fires.  the first operation is started one
    /// interval after the call.
    pub async fn run(self, miner: Arc<PopMiner>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(&miner).await;
                }
            }
        }
        debug!("auto-mine scheduler stopped");
    }

    /// a single scheduled attempt.
    pub async fn tick(&self, miner: &PopMiner) -> Option<OperationId> {
        if !miner.is_ready() {
            debug!("auto-mine skipped: {}", miner.pending_reasons().join("; "));
            return None;
        }

        match miner.mine(None).await {
            Ok(id) => {
                info!("auto-mine started operation {}", id);
                Some(id)
            }
            Err(e) => {
                warn!("auto-mine failed: {}", e.messages().join("; "));
                None
            }
        }
    }
}
