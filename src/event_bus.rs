//! In-process publish / subscribe for miner events.
//!
//! A single [EventBus] is constructed by the embedding application and
//! handed to every component that produces or consumes events.  Both the
//! inbound domain events (wallet, NodeCore, operations) and the miner's own
//! outbound notifications travel over it.

use tokio::sync::broadcast;
use tracing::warn;

use crate::models::amount::Amount;
use crate::models::block_tip::BlockTip;
use crate::models::operation::OperationId;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum PopEvent {
    /// an operation reached a terminal phase.
    OperationCompleted(OperationId),

    CoinsReceived {
        amount: Amount,
    },

    /// the wallet balance dropped below what mining requires.
    InsufficientFunds,

    BitcoinServiceReady,
    BitcoinServiceNotReady,
    BlockchainDownloaded,

    NodeCoreHealthy,
    NodeCoreUnhealthy,
    NodeCoreSynchronized,
    NodeCoreDesynchronized,

    /// miner settings were modified, eg the maximum transaction fee.
    ConfigurationChanged,

    /// NodeCore announced a new tip.
    NewChainTip(BlockTip),

    // ---- notifications published by the miner ----
    MinerReady,
    MinerNotReady {
        reason: String,
    },
    Info(String),

    /// the wallet seed has not been acknowledged by the user yet.
    WalletSeedAgreementMissing,
}

impl PopEvent {
    pub fn get_type(&self) -> &str {
        match self {
            PopEvent::OperationCompleted(_) => "operation completed",
            PopEvent::CoinsReceived { .. } => "coins received",
            PopEvent::InsufficientFunds => "insufficient funds",
            PopEvent::BitcoinServiceReady => "bitcoin service ready",
            PopEvent::BitcoinServiceNotReady => "bitcoin service not ready",
            PopEvent::BlockchainDownloaded => "blockchain downloaded",
            PopEvent::NodeCoreHealthy => "nodecore healthy",
            PopEvent::NodeCoreUnhealthy => "nodecore unhealthy",
            PopEvent::NodeCoreSynchronized => "nodecore synchronized",
            PopEvent::NodeCoreDesynchronized => "nodecore desynchronized",
            PopEvent::ConfigurationChanged => "configuration changed",
            PopEvent::NewChainTip(_) => "new chain tip",
            PopEvent::MinerReady => "miner ready",
            PopEvent::MinerNotReady { .. } => "miner not ready",
            PopEvent::Info(_) => "info",
            PopEvent::WalletSeedAgreementMissing => "wallet seed agreement missing",
        }
    }

    /// true for events the miner publishes rather than reacts to.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            PopEvent::MinerReady
                | PopEvent::MinerNotReady { .. }
                | PopEvent::Info(_)
                | PopEvent::WalletSeedAgreementMissing
        )
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PopEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// delivers `event` to every current subscriber.  publishing without
    /// subscribers is not an error.
    pub fn publish(&self, event: PopEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<PopEvent>,
}

impl EventSubscription {
    /// next event, or None once every publisher is gone.
    ///
    /// a subscriber that falls behind loses the oldest events and carries on.
    pub async fn recv(&mut self) -> Option<PopEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<PopEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, {} events dropped", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(PopEvent::MinerReady);

        assert_eq!(Some(PopEvent::MinerReady), first.recv().await);
        assert_eq!(Some(PopEvent::MinerReady), second.recv().await);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(PopEvent::InsufficientFunds);
        assert_eq!(0, bus.subscriber_count());
    }

    #[traced_test]
    #[tokio::test]
    async fn lagging_subscriber_keeps_receiving() {
        let bus = EventBus::new(2);
        let mut subscription = bus.subscribe();

        for height in 0..5 {
            bus.publish(PopEvent::NewChainTip(BlockTip::at_height(height)));
        }

        assert_eq!(
            Some(PopEvent::NewChainTip(BlockTip::at_height(3))),
            subscription.recv().await
        );
        assert!(logs_contain("lagged"));
        assert_eq!(
            Some(PopEvent::NewChainTip(BlockTip::at_height(4))),
            subscription.try_recv()
        );
        assert_eq!(None, subscription.try_recv());
    }

    #[tokio::test]
    async fn closed_bus_ends_subscription() {
        let bus = EventBus::new(2);
        let mut subscription = bus.subscribe();
        drop(bus);
        assert_eq!(None, subscription.recv().await);
    }

    #[test]
    fn notifications_are_distinguished() {
        assert!(PopEvent::MinerReady.is_notification());
        assert!(!PopEvent::BitcoinServiceReady.is_notification());
        assert_eq!("new chain tip", PopEvent::NewChainTip(BlockTip::at_height(1)).get_type());
    }
}
