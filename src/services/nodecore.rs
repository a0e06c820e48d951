/// Client of the remote NodeCore node.
///
/// Connection health and synchronization are not polled; they reach the
/// miner as [PopEvent](crate::event_bus::PopEvent)s.
#[async_trait::async_trait]
pub trait NodeCoreClient: Send + Sync + std::fmt::Debug {
    /// address PoP rewards are paid to.
    async fn miner_address(&self) -> anyhow::Result<String>;

    async fn shutdown(&self) -> anyhow::Result<()>;
}
