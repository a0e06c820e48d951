//! The PoP miner: readiness gating, operation bookkeeping and event handling.
//!
//! [PopMiner] owns the readiness state and the registry of live operations.
//! It has no worker of its own beyond a single event listener task; the
//! operations themselves are advanced by the [ProcessManager].

pub mod error;

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use futures::FutureExt;
use serde::Deserialize;
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

pub use self::error::ExportError;
pub use self::error::MinerError;
use crate::config_models::cli_args::Args;
use crate::config_models::data_directory::DataDirectory;
use crate::event_bus::EventBus;
use crate::event_bus::PopEvent;
use crate::macros::fn_name;
use crate::models::amount::Amount;
use crate::models::operation::MiningOperationState;
use crate::models::operation::OperationAction;
use crate::models::operation::OperationId;
use crate::models::operation::OperationRegistry;
use crate::models::operation::OperationStatus;
use crate::models::operation::SharedOperation;
use crate::models::operation::TransactionStatus;
use crate::models::readiness::poll_conditions;
use crate::models::readiness::PopMinerDependency;
use crate::models::readiness::ReadinessTracker;
use crate::process_manager::ProcessManager;
use crate::process_manager::ProcessManagerError;
use crate::scheduler::AutoMineScheduler;
use crate::services::BitcoinBlockInfo;
use crate::services::BitcoinService;
use crate::services::FeeEstimate;
use crate::services::NodeCoreClient;
use crate::services::TransactionHandle;
use crate::services::WalletSeed;
use crate::store::KeyValueStore;
use crate::store::OperationStore;
use crate::store::WALLET_SEED_VIEWED_KEY;

/// The components a [PopMiner] drives.
#[derive(Debug, Clone)]
pub struct MinerCollaborators {
    pub bitcoin: Arc<dyn BitcoinService>,
    pub nodecore: Arc<dyn NodeCoreClient>,
    pub process_manager: Arc<dyn ProcessManager>,
    pub operations: Arc<dyn OperationStore>,
    pub settings: Arc<dyn KeyValueStore>,
    pub events: EventBus,
}

/// A live operation, as presented in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub operation_id: OperationId,

    /// -1 until the mining instruction has been received.
    pub endorsed_block_number: i64,

    pub status: OperationStatus,
    pub current_action_label: String,
    pub message: String,
}

impl From<&MiningOperationState> for OperationSummary {
    fn from(state: &MiningOperationState) -> Self {
        Self {
            operation_id: state.operation_id().clone(),
            endorsed_block_number: state
                .endorsed_block_number()
                .and_then(|h| i64::try_from(h).ok())
                .unwrap_or(-1),
            status: state.status(),
            current_action_label: state.current_action().label().to_owned(),
            message: state.message().to_owned(),
        }
    }
}

#[derive(Debug)]
pub struct PopMiner {
    args: Args,
    data_dir: DataDirectory,

    bitcoin: Arc<dyn BitcoinService>,
    nodecore: Arc<dyn NodeCoreClient>,
    process_manager: Arc<dyn ProcessManager>,
    operations: Arc<dyn OperationStore>,
    settings: Arc<dyn KeyValueStore>,
    events: EventBus,

    readiness: ReadinessTracker,
    registry: OperationRegistry,
    max_transaction_fee: AtomicU64,

    operations_restored: AtomicBool,
    running: AtomicBool,
    shutting_down: AtomicBool,

    // event listener and scheduler
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl PopMiner {
    pub fn new(args: Args, collaborators: MinerCollaborators) -> anyhow::Result<Arc<Self>> {
        let data_dir = DataDirectory::get(args.data_dir.clone())?;
        let MinerCollaborators {
            bitcoin,
            nodecore,
            process_manager,
            operations,
            settings,
            events,
        } = collaborators;

        Ok(Arc::new(Self {
            readiness: ReadinessTracker::new(args.required_dependencies()),
            registry: OperationRegistry::new(),
            max_transaction_fee: AtomicU64::new(args.max_transaction_fee.to_sat()),
            operations_restored: AtomicBool::new(false),
            running: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
            args,
            data_dir,
            bitcoin,
            nodecore,
            process_manager,
            operations,
            settings,
            events,
        }))
    }

    /// starts the miner: initializes the bitcoin service, checks the wallet
    /// seed acknowledgement and starts listening for events.
    pub async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("PoP miner is already running");
            return Ok(());
        }

        self.bitcoin
            .initialize()
            .await
            .context("unable to initialize the bitcoin service")?;

        if !self.args.bypass_acknowledgement && !self.wallet_seed_acknowledged().await {
            info!("wallet seed has not been acknowledged");
            self.events.publish(PopEvent::WalletSeedAgreementMissing);
        }

        // subscribe before spawning so no event published from here on is missed.
        let mut subscription = self.events.subscribe();
        let miner = self.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = subscription.recv() => match event {
                        Some(event) => miner.handle_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("event listener stopped");
        });

        if let Some(interval) = self.args.auto_mine_interval {
            info!("auto mining every {}", humantime::format_duration(interval));
            let scheduler = AutoMineScheduler::new(interval);
            self.tasks
                .spawn(scheduler.run(self.clone(), self.cancel.child_token()));
        }

        self.refresh_readiness().await;
        info!("PoP miner running in {}", self.data_dir);
        Ok(())
    }

    /// stops the miner.  collaborators are shut down in dependency order:
    /// process manager, bitcoin service, then NodeCore.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("PoP miner shutting down");

        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;

        self.process_manager.shutdown().await;
        if let Err(e) = self.bitcoin.shutdown().await {
            warn!("error shutting down bitcoin service: {:#}", e);
        }
        if let Err(e) = self.nodecore.shutdown().await {
            warn!("error shutting down NodeCore client: {:#}", e);
        }
        info!("PoP miner stopped");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// reasons the miner is not ready, empty when ready.
    pub fn pending_reasons(&self) -> Vec<String> {
        self.readiness.pending_reasons()
    }

    pub fn max_transaction_fee(&self) -> Amount {
        Amount::from_sat(self.max_transaction_fee.load(Ordering::SeqCst))
    }

    /// changes the fee ceiling and announces the configuration change, which
    /// re-evaluates the funds condition.
    pub fn set_max_transaction_fee(&self, fee: Amount) {
        self.max_transaction_fee.store(fee.to_sat(), Ordering::SeqCst);
        info!("maximum transaction fee set to {}", fee);
        self.events.publish(PopEvent::ConfigurationChanged);
    }

    // ---- readiness ----

    pub async fn add_condition(&self, dependency: PopMinerDependency) {
        let update = self.readiness.add_condition(dependency);
        if update.changed {
            debug!("condition satisfied: {}", dependency);
        }
        if update.became_ready {
            self.on_ready().await;
        }
    }

    pub fn remove_condition(&self, dependency: PopMinerDependency) {
        let update = self.readiness.remove_condition(dependency);
        if update.changed && self.readiness.is_required(dependency) {
            info!("PoP miner not ready: {}", dependency.reason());
            self.events.publish(PopEvent::MinerNotReady {
                reason: dependency.reason().to_owned(),
            });
        }
    }

    /// re-polls the bitcoin service for the conditions it owns.
    pub async fn refresh_readiness(&self) {
        let polled = poll_conditions(self.bitcoin.as_ref(), self.max_transaction_fee());
        for dependency in PopMinerDependency::iter() {
            match polled.get(dependency) {
                Some(true) => self.add_condition(dependency).await,
                Some(false) => self.remove_condition(dependency),
                None => {}
            }
        }
    }

    async fn evaluate_funds(&self) {
        let balance = self.bitcoin.balance();
        let max_fee = self.max_transaction_fee();
        if balance >= max_fee {
            self.add_condition(PopMinerDependency::SufficientFunds).await;
        } else {
            debug!("balance {} is below the maximum fee {}", balance, max_fee);
            self.remove_condition(PopMinerDependency::SufficientFunds);
        }
    }

    async fn on_ready(&self) {
        if !self.operations_restored.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.restore_operations().await {
                error!("unable to restore operations: {:#}", e);
                // retried on the next ready edge
                self.operations_restored.store(false, Ordering::SeqCst);
            }
        }

        info!("PoP miner is ready");
        self.events.publish(PopEvent::MinerReady);
    }

    async fn restore_operations(&self) -> anyhow::Result<()> {
        let states = self
            .operations
            .get_active_operations()
            .await
            .context("unable to load active operations")?;

        let mut restored = 0;
        for state in states {
            let id = state.operation_id().clone();
            let operation = SharedOperation::from(state);
            if !self.registry.insert_if_absent(operation.clone()).await {
                warn!("operation {} is already registered; not restoring", id);
                continue;
            }
            match self.process_manager.restore(operation).await {
                Ok(()) => restored += 1,
                Err(e) => warn!("unable to restore operation {}: {}", id, e),
            }
        }

        info!("restored {} operations", restored);
        Ok(())
    }

    // ---- operations ----

    /// starts a new mining operation, endorsing `block_number` or the latest
    /// NodeCore block.
    pub async fn mine(&self, block_number: Option<u64>) -> Result<OperationId, MinerError> {
        self.ensure_ready().await?;

        let pending = self.registry.count_in_action(OperationAction::Wait).await;
        let limit = self.args.mempool_chain_limit;
        if pending >= limit {
            return Err(MinerError::TooManyPending { pending, limit });
        }

        let id = OperationId::random();
        let state = MiningOperationState::new(id.clone(), block_number);
        let operation = SharedOperation::from(state.clone());
        if !self.registry.insert_if_absent(operation.clone()).await {
            error!("generated duplicate operation id {}", id);
            return Err(MinerError::Internal(format!("duplicate operation id {}", id)));
        }

        if let Err(e) = self.operations.save_operation(&state).await {
            warn!("unable to persist new operation {}: {:#}", id, anyhow::Error::from(e));
        }

        if let Err(e) = self.process_manager.submit(operation).await {
            self.registry.remove(&id).await;
            return Err(Self::submit_error(e));
        }

        match block_number {
            Some(height) => info!("mining operation {} started for block {}", id, height),
            None => info!("mining operation {} started for the latest block", id),
        }
        Ok(id)
    }

    /// hands a live operation to the process manager again, continuing from
    /// its current phase.
    pub async fn resubmit(&self, id: &OperationId) -> Result<(), MinerError> {
        self.ensure_ready().await?;

        let operation = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| MinerError::NotFound(id.clone()))?;

        self.process_manager
            .submit(operation)
            .await
            .map_err(Self::submit_error)?;

        info!("resubmitted operation {}", id);
        Ok(())
    }

    async fn ensure_ready(&self) -> Result<(), MinerError> {
        if self.is_shutting_down() {
            return Err(MinerError::ShuttingDown);
        }
        self.refresh_readiness().await;
        match self.readiness.is_ready() {
            true => Ok(()),
            false => Err(MinerError::NotReady {
                reasons: self.readiness.pending_reasons(),
            }),
        }
    }

    fn submit_error(e: ProcessManagerError) -> MinerError {
        match e {
            ProcessManagerError::ShutDown => MinerError::ShuttingDown,
            other => MinerError::Internal(other.to_string()),
        }
    }

    /// live operations, ordered by endorsed block.
    pub async fn list_operations(&self) -> Vec<OperationSummary> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(OperationSummary::from)
            .collect()
    }

    /// the persisted state of any operation, live or finished.
    pub async fn get_operation_state(
        &self,
        id: &OperationId,
    ) -> Result<MiningOperationState, MinerError> {
        match self.operations.get_operation(id).await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Err(MinerError::NotFound(id.clone())),
            Err(e) => {
                error!("unable to load operation {}: {:#}", id, anyhow::Error::from(e));
                Err(MinerError::ServiceUnavailable("operation store"))
            }
        }
    }

    /// fails every unconfirmed operation whose endorsed block is more than
    /// the settlement interval behind `tip_height`.
    async fn expire_stale_operations(&self, tip_height: u64) {
        let interval = self.args.settlement_interval;

        for mut operation in self.registry.handles().await {
            // fail and persist under the write lock so a worker cannot
            // persist an older state of the operation after this one.
            let mut state = operation.lock_guard_mut().await;
            if state.is_terminal() || state.transaction_status() != TransactionStatus::Unconfirmed {
                continue;
            }
            let Some(height) = state.staleness_height() else {
                continue;
            };
            if tip_height.saturating_sub(height) <= interval {
                continue;
            }

            state.fail(format!("Endorsement of block {} is no longer relevant", height));
            info!(
                "operation {} expired: endorsed block {} is more than {} blocks behind tip {}",
                state.operation_id(),
                height,
                interval,
                tip_height
            );
            if let Err(e) = self.operations.save_operation(&state).await {
                warn!(
                    "unable to persist expired operation {}: {:#}",
                    state.operation_id(),
                    anyhow::Error::from(e)
                );
            }
            let id = state.operation_id().clone();
            drop(state);
            self.events.publish(PopEvent::OperationCompleted(id));
        }
    }

    // ---- events ----

    /// reacts to a single event.  errors and panics are logged, never
    /// propagated, so one bad event cannot stop event delivery.
    pub async fn handle_event(&self, event: PopEvent) {
        if self.is_shutting_down() || event.is_notification() {
            return;
        }
        debug!("handling event: {}", event.get_type());

        let event_type = event.get_type().to_owned();
        match AssertUnwindSafe(self.dispatch_event(event)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("{}: error handling {}: {:#}", fn_name!(), event_type, e),
            Err(_) => error!("{}: panic while handling {}", fn_name!(), event_type),
        }
    }

    async fn dispatch_event(&self, event: PopEvent) -> anyhow::Result<()> {
        match event {
            PopEvent::OperationCompleted(id) => {
                if self.registry.remove(&id).await.is_none() {
                    debug!("completed operation {} is not registered", id);
                }
            }
            PopEvent::CoinsReceived { amount } => {
                info!("received {} into the PoP wallet", amount);
                self.publish_info(format!("Received {} into the PoP wallet", amount));
                self.evaluate_funds().await;
            }
            PopEvent::InsufficientFunds => {
                self.remove_condition(PopMinerDependency::SufficientFunds);
            }
            PopEvent::BitcoinServiceReady => {
                self.add_condition(PopMinerDependency::BitcoinServiceReady)
                    .await;
                if !self.is_ready() {
                    for reason in self.readiness.pending_reasons() {
                        self.events.publish(PopEvent::MinerNotReady { reason });
                    }
                }
            }
            PopEvent::BitcoinServiceNotReady => {
                self.remove_condition(PopMinerDependency::BitcoinServiceReady);
            }
            PopEvent::BlockchainDownloaded => {
                self.add_condition(PopMinerDependency::BlockchainDownloaded)
                    .await;
                self.evaluate_funds().await;
                self.publish_info(format!(
                    "PoP wallet balance: {}",
                    self.bitcoin.balance()
                ));
                self.publish_info(format!(
                    "Send bitcoin to {} to fund the PoP wallet",
                    self.bitcoin.current_receive_address()
                ));
            }
            PopEvent::NodeCoreHealthy => {
                self.add_condition(PopMinerDependency::NodeCoreConnected)
                    .await;
            }
            PopEvent::NodeCoreUnhealthy => {
                self.remove_condition(PopMinerDependency::NodeCoreConnected);
            }
            PopEvent::NodeCoreSynchronized => {
                self.add_condition(PopMinerDependency::SynchronizedNodeCore)
                    .await;
            }
            PopEvent::NodeCoreDesynchronized => {
                self.remove_condition(PopMinerDependency::SynchronizedNodeCore);
            }
            PopEvent::ConfigurationChanged => self.evaluate_funds().await,
            PopEvent::NewChainTip(tip) => self.expire_stale_operations(tip.height).await,
            PopEvent::MinerReady
            | PopEvent::MinerNotReady { .. }
            | PopEvent::Info(_)
            | PopEvent::WalletSeedAgreementMissing => {}
        }
        Ok(())
    }

    fn publish_info(&self, message: String) {
        self.events.publish(PopEvent::Info(message));
    }

    // ---- wallet and node ----

    /// the NodeCore mining address, or `None` when NodeCore cannot be reached.
    pub async fn miner_address(&self) -> Option<String> {
        match self.nodecore.miner_address().await {
            Ok(address) => Some(address),
            Err(e) => {
                warn!("unable to get miner address: {:#}", e);
                None
            }
        }
    }

    pub fn bitcoin_balance(&self) -> Amount {
        self.bitcoin.balance()
    }

    pub fn bitcoin_receive_address(&self) -> String {
        self.bitcoin.current_receive_address()
    }

    pub async fn send_bitcoin_to_address(
        &self,
        address: &str,
        amount: Amount,
    ) -> Result<TransactionHandle, MinerError> {
        let handle = self.bitcoin.send_coins(address, amount).await?;
        info!("sent {} to {} in transaction {}", amount, address, handle.txid);
        Ok(handle)
    }

    /// the wallet seed, until the user has acknowledged storing it.
    pub async fn wallet_seed(&self) -> Result<Option<WalletSeed>, MinerError> {
        if self.wallet_seed_acknowledged().await {
            return Ok(None);
        }
        self.bitcoin
            .mnemonic_seed()
            .map(Some)
            .map_err(|e| Self::wallet_unavailable("read wallet seed", e))
    }

    /// records that the user has seen and stored the wallet seed.
    pub async fn agree_to_wallet_seed_requirement(&self) -> Result<(), MinerError> {
        self.settings
            .set_value(WALLET_SEED_VIEWED_KEY, "true")
            .await
            .map_err(|e| {
                error!("unable to store seed acknowledgement: {:#}", anyhow::Error::from(e));
                MinerError::ServiceUnavailable("settings store")
            })
    }

    async fn wallet_seed_acknowledged(&self) -> bool {
        match self.settings.get_value(WALLET_SEED_VIEWED_KEY).await {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!("unable to read seed acknowledgement: {:#}", anyhow::Error::from(e));
                false
            }
        }
    }

    /// replaces the bitcoin wallet with the one restored from `words`.
    /// returns whether the import succeeded.
    pub async fn import_wallet(
        &self,
        words: &[String],
        creation_time: Option<DateTime<Utc>>,
    ) -> bool {
        if let Err(e) = self.bitcoin.import_wallet(words, creation_time).await {
            warn!("bitcoin service: unable to import wallet: {:#}", e);
            return false;
        }
        info!("imported bitcoin wallet");
        self.refresh_readiness().await;
        true
    }

    pub async fn reset_bitcoin_wallet(&self) -> Result<(), MinerError> {
        self.bitcoin
            .reset_wallet()
            .await
            .map_err(|e| Self::wallet_unavailable("reset wallet", e))?;
        info!("bitcoin wallet reset");
        self.refresh_readiness().await;
        Ok(())
    }

    /// writes every wallet private key, one per line, to a new file in the
    /// data directory and returns its path.  an existing file is never
    /// overwritten.
    pub async fn export_bitcoin_private_keys(&self) -> Result<PathBuf, MinerError> {
        let keys = self
            .bitcoin
            .export_private_keys()
            .map_err(|e| Self::wallet_unavailable("export private keys", e))?;

        let path = self.data_dir.private_keys_file_path();
        let io_err = |source| ExportError::Io {
            path: path.clone(),
            source,
        };

        DataDirectory::create_dir_if_not_exists(&self.data_dir.root_dir_path())
            .await
            .map_err(|e| {
                warn!("{:#}", e);
                io_err(std::io::Error::other(e.to_string()))
            })?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => ExportError::AlreadyExists(path.clone()),
                _ => io_err(e),
            })?;

        let mut contents = keys.join("\n");
        contents.push('\n');
        file.write_all(contents.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        info!("exported {} private keys to {}", keys.len(), path.display());
        Ok(path)
    }

    pub async fn last_bitcoin_block(&self) -> Result<BitcoinBlockInfo, MinerError> {
        self.bitcoin
            .last_block()
            .await
            .map_err(|e| Self::wallet_unavailable("get last block", e))
    }

    pub async fn bitcoin_fee_estimate(&self) -> Result<FeeEstimate, MinerError> {
        self.bitcoin
            .calculate_fees_from_latest_block()
            .await
            .map_err(|e| Self::wallet_unavailable("calculate fees", e))
    }

    fn wallet_unavailable(what: &str, e: anyhow::Error) -> MinerError {
        warn!("bitcoin service: unable to {}: {:#}", what, e);
        MinerError::ServiceUnavailable("bitcoin service")
    }
}
