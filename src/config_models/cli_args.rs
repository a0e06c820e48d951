use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::models::amount::Amount;
use crate::models::readiness::DependencySet;

/// Declarative specification of the miner's command-line arguments.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// The data directory that contains persisted operations and settings.
    ///
    /// Defaults to the platform's data directory, e.g.
    /// `~/.local/share/pop-miner` on Linux.
    #[clap(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Maximum fee the miner pays for an endorsement transaction, in BTC.
    ///
    /// The wallet must hold at least this much for the miner to be ready.
    #[clap(long, default_value = "0.0005", value_parser = Amount::from_str)]
    pub max_transaction_fee: Amount,

    /// Maximum number of endorsement transactions waiting in the bitcoin
    /// mempool.  Bitcoin Core refuses to relay longer chains of unconfirmed
    /// transactions.
    #[clap(long, default_value = "24")]
    pub mempool_chain_limit: usize,

    /// Number of NodeCore blocks after which an unconfirmed endorsement is
    /// abandoned.
    #[clap(long, default_value = "400")]
    pub settlement_interval: u64,

    /// Skip the check that the user has acknowledged the wallet seed.
    #[clap(long)]
    pub bypass_acknowledgement: bool,

    /// Require NodeCore to report itself synchronized before mining.
    #[clap(long)]
    pub require_synchronized_nodecore: bool,

    /// Mine automatically at this interval, e.g. `10m`.  Disabled when unset.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub auto_mine_interval: Option<Duration>,

    /// How long an operation task waits before retrying a step that made no
    /// progress.
    #[clap(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub operation_poll_interval: Duration,

    /// Capacity of the in-process event channel.
    #[clap(long, default_value = "1024")]
    pub event_channel_capacity: usize,
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}

impl Args {
    pub fn required_dependencies(&self) -> DependencySet {
        DependencySet::required(self.require_synchronized_nodecore)
    }
}
