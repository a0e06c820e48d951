//! Preconditions for mining and the derived ready / not ready state.
//!
//! Each [PopMinerDependency] is satisfied independently.  The miner is ready
//! when every required dependency is held.  The held set is a bitmask in an
//! atomic, so concurrent event handlers can add and remove conditions
//! without a lock, and exactly one caller observes each ready edge.

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use strum::EnumIter;
use strum::IntoEnumIterator;

use crate::models::amount::Amount;
use crate::services::BitcoinService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display)]
#[repr(u8)]
pub enum PopMinerDependency {
    BitcoinServiceReady = 1,
    BlockchainDownloaded = 2,
    SufficientFunds = 4,
    NodeCoreConnected = 8,
    SynchronizedNodeCore = 16,
}

impl PopMinerDependency {
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// explanation shown to users while this dependency is missing.
    pub fn reason(self) -> &'static str {
        match self {
            Self::BitcoinServiceReady => "Bitcoin service is not ready",
            Self::BlockchainDownloaded => "Bitcoin blockchain is not downloaded",
            Self::SufficientFunds => "PoP wallet does not contain sufficient funds",
            Self::NodeCoreConnected => "Waiting for connection to NodeCore",
            Self::SynchronizedNodeCore => "Waiting for NodeCore to synchronize",
        }
    }
}

/// A set of [PopMinerDependency] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DependencySet(u8);

impl DependencySet {
    pub const EMPTY: Self = Self(0);

    /// the dependencies required for mining.
    pub fn required(require_synchronized_nodecore: bool) -> Self {
        let base = [
            PopMinerDependency::BitcoinServiceReady,
            PopMinerDependency::BlockchainDownloaded,
            PopMinerDependency::SufficientFunds,
            PopMinerDependency::NodeCoreConnected,
        ]
        .into_iter()
        .collect::<Self>();

        match require_synchronized_nodecore {
            true => base.with(PopMinerDependency::SynchronizedNodeCore),
            false => base,
        }
    }

    pub fn with(self, dependency: PopMinerDependency) -> Self {
        Self(self.0 | dependency.bit())
    }

    pub fn contains(self, dependency: PopMinerDependency) -> bool {
        self.0 & dependency.bit() != 0
    }

    pub fn is_superset_of(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// members of `self` that are not in `other`, in declaration order.
    pub fn difference(self, other: Self) -> impl Iterator<Item = PopMinerDependency> {
        let bits = self.0 & !other.0;
        PopMinerDependency::iter().filter(move |d| bits & d.bit() != 0)
    }

    pub fn iter(self) -> impl Iterator<Item = PopMinerDependency> {
        self.difference(Self::EMPTY)
    }
}

impl FromIterator<PopMinerDependency> for DependencySet {
    fn from_iter<I: IntoIterator<Item = PopMinerDependency>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// Effect of a single add / remove on the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessUpdate {
    /// the held set was modified.
    pub changed: bool,

    /// this call completed the required set.
    pub became_ready: bool,

    /// this call broke a complete required set.
    pub became_not_ready: bool,
}

#[derive(Debug)]
pub struct ReadinessTracker {
    held: AtomicU8,
    required: DependencySet,
}

impl ReadinessTracker {
    pub fn new(required: DependencySet) -> Self {
        Self {
            held: AtomicU8::new(0),
            required,
        }
    }

    pub fn required(&self) -> DependencySet {
        self.required
    }

    pub fn is_required(&self, dependency: PopMinerDependency) -> bool {
        self.required.contains(dependency)
    }

    pub fn held(&self) -> DependencySet {
        DependencySet(self.held.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.satisfies(self.held.load(Ordering::SeqCst))
    }

    /// adds `dependency` to the held set.  idempotent.
    pub fn add_condition(&self, dependency: PopMinerDependency) -> ReadinessUpdate {
        let previous = self.held.fetch_or(dependency.bit(), Ordering::SeqCst);
        let current = previous | dependency.bit();

        ReadinessUpdate {
            changed: previous != current,
            became_ready: !self.satisfies(previous) && self.satisfies(current),
            became_not_ready: false,
        }
    }

    /// removes `dependency` from the held set, if present.
    pub fn remove_condition(&self, dependency: PopMinerDependency) -> ReadinessUpdate {
        let previous = self.held.fetch_and(!dependency.bit(), Ordering::SeqCst);
        let current = previous & !dependency.bit();

        ReadinessUpdate {
            changed: previous != current,
            became_ready: false,
            became_not_ready: self.satisfies(previous) && !self.satisfies(current),
        }
    }

    /// dependencies still missing for readiness.
    pub fn missing(&self) -> Vec<PopMinerDependency> {
        self.required.difference(self.held()).collect()
    }

    /// reasons for every missing dependency, in declaration order.
    pub fn pending_reasons(&self) -> Vec<String> {
        self.missing()
            .into_iter()
            .map(|d| d.reason().to_owned())
            .collect()
    }

    fn satisfies(&self, held: u8) -> bool {
        DependencySet(held).is_superset_of(self.required)
    }
}

/// The wallet-derived conditions, as observed by one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolledConditions {
    pub bitcoin_service_ready: bool,
    pub blockchain_downloaded: bool,
    pub sufficient_funds: bool,
}

impl PolledConditions {
    pub fn get(&self, dependency: PopMinerDependency) -> Option<bool> {
        match dependency {
            PopMinerDependency::BitcoinServiceReady => Some(self.bitcoin_service_ready),
            PopMinerDependency::BlockchainDownloaded => Some(self.blockchain_downloaded),
            PopMinerDependency::SufficientFunds => Some(self.sufficient_funds),
            PopMinerDependency::NodeCoreConnected | PopMinerDependency::SynchronizedNodeCore => {
                None
            }
        }
    }
}

/// queries the wallet for every condition it is responsible for.
///
/// funds are sufficient when the balance covers at least one maximum fee.
pub fn poll_conditions(bitcoin: &dyn BitcoinService, max_fee: Amount) -> PolledConditions {
    PolledConditions {
        bitcoin_service_ready: bitcoin.service_ready(),
        blockchain_downloaded: bitcoin.blockchain_downloaded(),
        sufficient_funds: bitcoin.balance() >= max_fee,
    }
}
