use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use nodecore_pop_miner::config_models::cli_args::Args;
use nodecore_pop_miner::config_models::data_directory::DataDirectory;
use nodecore_pop_miner::event_bus::EventBus;
use nodecore_pop_miner::event_bus::EventSubscription;
use nodecore_pop_miner::event_bus::PopEvent;
use nodecore_pop_miner::miner::MinerCollaborators;
use nodecore_pop_miner::process_manager::OperationPipeline;
use nodecore_pop_miner::process_manager::TaskProcessManager;
use nodecore_pop_miner::store::FileStore;
use nodecore_pop_miner::PopMiner;
use rand::distr::Alphanumeric;
use rand::distr::SampleString;

use super::fakes::FakeBitcoin;
use super::fakes::FakeNodeCore;

/// A miner backed by a [FileStore] and a [TaskProcessManager], with fake
/// bitcoin and NodeCore collaborators.
pub struct PopNode {
    pub miner: Arc<PopMiner>,
    pub events: EventBus,
    pub store: Arc<FileStore>,
}

impl PopNode {
    /// Create a randomly named `DataDirectory` so filesystem-bound tests can run
    /// in parallel.
    pub fn integration_test_data_directory() -> anyhow::Result<DataDirectory> {
        let mut rng = rand::rng();
        let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
        let tmp_root: PathBuf = std::env::temp_dir()
            .join(format!("pop-miner-integration-tests-{}", user))
            .join(Path::new(&Alphanumeric.sample_string(&mut rng, 16)));

        DataDirectory::get(Some(tmp_root))
    }

    pub fn default_args(data_dir: &DataDirectory) -> Args {
        Args {
            data_dir: Some(data_dir.root_dir_path()),
            bypass_acknowledgement: true,
            operation_poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    pub fn start(
        args: Args,
        pipeline: Arc<dyn OperationPipeline>,
    ) -> anyhow::Result<Self> {
        let data_dir = DataDirectory::get(args.data_dir.clone())?;
        let events = EventBus::new(args.event_channel_capacity);
        let store = Arc::new(FileStore::new(data_dir));
        let process_manager = Arc::new(TaskProcessManager::new(
            pipeline,
            store.clone(),
            events.clone(),
            args.operation_poll_interval,
        ));

        let miner = PopMiner::new(
            args,
            MinerCollaborators {
                bitcoin: Arc::new(FakeBitcoin),
                nodecore: Arc::new(FakeNodeCore),
                process_manager,
                operations: store.clone(),
                settings: store.clone(),
                events: events.clone(),
            },
        )?;

        Ok(Self {
            miner,
            events,
            store,
        })
    }

    /// runs the miner and reports NodeCore as healthy, waiting until the
    /// miner announces it is ready.
    pub async fn run_until_ready(&self) -> anyhow::Result<()> {
        let mut subscription = self.events.subscribe();
        self.miner.run().await?;
        self.events.publish(PopEvent::NodeCoreHealthy);
        wait_for(&mut subscription, |e| *e == PopEvent::MinerReady).await?;
        Ok(())
    }
}

/// waits (at most 10 seconds) for the first event matching `predicate`.
pub async fn wait_for(
    subscription: &mut EventSubscription,
    predicate: impl Fn(&PopEvent) -> bool,
) -> anyhow::Result<PopEvent> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = subscription.recv().await {
            if predicate(&event) {
                return Ok(event);
            }
        }
        bail!("event bus closed")
    })
    .await?
}
