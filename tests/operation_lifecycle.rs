mod common;

use std::sync::Arc;
use std::time::Duration;

use common::fakes::EndorsementPipeline;
use common::logging::tracing_logger;
use common::pop_node::wait_for;
use common::pop_node::PopNode;
use nodecore_pop_miner::event_bus::PopEvent;
use nodecore_pop_miner::models::block_tip::BlockTip;
use nodecore_pop_miner::models::operation::OperationAction;
use nodecore_pop_miner::models::operation::OperationStatus;
use nodecore_pop_miner::models::operation::TransactionStatus;
use nodecore_pop_miner::store::OperationStore;

/// mine() drives an operation through every phase; once done it leaves the
/// live listing but stays queryable from disk.
#[tokio::test(flavor = "multi_thread")]
pub async fn operation_runs_to_completion() -> anyhow::Result<()> {
    tracing_logger();
    let data_dir = PopNode::integration_test_data_directory()?;
    let node = PopNode::start(
        PopNode::default_args(&data_dir),
        Arc::new(EndorsementPipeline::confirmed()),
    )?;
    node.run_until_ready().await?;

    let mut events = node.events.subscribe();
    let id = node.miner.mine(Some(321)).await?;
    let completed = id.clone();
    wait_for(&mut events, |e| *e == PopEvent::OperationCompleted(completed.clone())).await?;

    let state = node.miner.get_operation_state(&id).await?;
    assert_eq!(OperationAction::Done, state.current_action());
    assert_eq!(OperationStatus::Completed, state.status());
    assert_eq!(TransactionStatus::Confirmed, state.transaction_status());
    assert_eq!(Some(321), state.endorsed_block_number());
    assert!(state.pop_transaction_id().is_some());

    // the listener removes the operation shortly after the completion event.
    tokio::time::timeout(Duration::from_secs(5), async {
        while !node.miner.list_operations().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    node.miner.shutdown().await;
    Ok(())
}

/// an endorsement that never confirms is abandoned once NodeCore moves more
/// than the settlement interval past the endorsed block.
#[tokio::test(flavor = "multi_thread")]
pub async fn unconfirmed_operation_expires_on_new_tip() -> anyhow::Result<()> {
    tracing_logger();
    let data_dir = PopNode::integration_test_data_directory()?;
    let node = PopNode::start(
        PopNode::default_args(&data_dir),
        Arc::new(EndorsementPipeline::default()),
    )?;
    node.run_until_ready().await?;

    let id = node.miner.mine(Some(100)).await?;
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let listed = node.miner.list_operations().await;
            if listed.first().map(|o| o.endorsed_block_number) == Some(100)
                && node.store.get_operation(&id).await.ok().flatten().map(|s| s.current_action())
                    == Some(OperationAction::Wait)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let mut events = node.events.subscribe();
    node.events.publish(PopEvent::NewChainTip(BlockTip::at_height(501)));
    let expired = id.clone();
    wait_for(&mut events, |e| *e == PopEvent::OperationCompleted(expired.clone())).await?;

    let state = node.miner.get_operation_state(&id).await?;
    assert_eq!(OperationAction::Failed, state.current_action());
    assert_eq!(OperationStatus::Failed, state.status());

    node.miner.shutdown().await;
    Ok(())
}
