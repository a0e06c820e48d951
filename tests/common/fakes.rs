use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use nodecore_pop_miner::models::amount::Amount;
use nodecore_pop_miner::models::operation::MiningInstruction;
use nodecore_pop_miner::models::operation::MiningOperationState;
use nodecore_pop_miner::models::operation::OperationAction;
use nodecore_pop_miner::process_manager::OperationPipeline;
use nodecore_pop_miner::services::BitcoinBlockInfo;
use nodecore_pop_miner::services::BitcoinService;
use nodecore_pop_miner::services::FeeEstimate;
use nodecore_pop_miner::services::NodeCoreClient;
use nodecore_pop_miner::services::SendFailure;
use nodecore_pop_miner::services::TransactionHandle;
use nodecore_pop_miner::services::WalletSeed;

/// A synchronized wallet holding one bitcoin.
#[derive(Debug, Default)]
pub struct FakeBitcoin;

#[async_trait::async_trait]
impl BitcoinService for FakeBitcoin {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn service_ready(&self) -> bool {
        true
    }

    fn blockchain_downloaded(&self) -> bool {
        true
    }

    fn balance(&self) -> Amount {
        Amount::from_sat(100_000_000)
    }

    fn current_receive_address(&self) -> String {
        "mfWxJ45yp2SFn7UciZyNpvDKrzbhyfKrY8".to_owned()
    }

    async fn send_coins(
        &self,
        _address: &str,
        _amount: Amount,
    ) -> Result<TransactionHandle, SendFailure> {
        Err(SendFailure::LockUnavailable)
    }

    fn mnemonic_seed(&self) -> Result<WalletSeed> {
        Ok(WalletSeed {
            words: vec!["abandon".to_owned(); 12],
            creation_time: Utc::now(),
        })
    }

    async fn import_wallet(
        &self,
        _words: &[String],
        _creation_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Ok(())
    }

    async fn reset_wallet(&self) -> Result<()> {
        Ok(())
    }

    fn export_private_keys(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn calculate_fees_from_latest_block(&self) -> Result<FeeEstimate> {
        Ok(FeeEstimate {
            fee_per_kb: Amount::from_sat(10_000),
            block_height: 1,
        })
    }

    async fn last_block(&self) -> Result<BitcoinBlockInfo> {
        Ok(BitcoinBlockInfo {
            hash: "00".repeat(32),
            height: 1,
            header: vec![0; 80],
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeNodeCore;

#[async_trait::async_trait]
impl NodeCoreClient for FakeNodeCore {
    async fn miner_address(&self) -> Result<String> {
        Ok("V1integration".to_owned())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Produces placeholder artifacts for every phase.  The endorsement
/// transaction stays unconfirmed until [EndorsementPipeline::confirm] is
/// called.
#[derive(Debug, Default, Clone)]
pub struct EndorsementPipeline {
    confirmed: Arc<AtomicBool>,
}

impl EndorsementPipeline {
    pub fn confirmed() -> Self {
        let pipeline = Self::default();
        pipeline.confirm();
        pipeline
    }

    pub fn confirm(&self) {
        self.confirmed.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl OperationPipeline for EndorsementPipeline {
    async fn advance(&self, state: &mut MiningOperationState) -> Result<()> {
        let id = state.operation_id().to_string();
        match state.current_action() {
            OperationAction::Start => state.record_instruction(MiningInstruction::new(
                state.block_number().unwrap_or(200),
                id.into_bytes(),
                "V1integration".into(),
            ))?,
            OperationAction::InstructionReceived => {
                state.record_endorsement_transaction(vec![1, 2, 3])?
            }
            OperationAction::EndorsementTransactionCreated => {
                state.record_broadcast(format!("btc-{}", id))?
            }
            OperationAction::Wait if self.confirmed.load(Ordering::SeqCst) => {
                state.record_confirmation(vec![0; 80], "path".into())?
            }
            OperationAction::Wait => {}
            OperationAction::EndorsementTransactionConfirmed => {
                state.record_proof_of_proof(vec![vec![0; 80]])?
            }
            OperationAction::ProofOfProofAssembled => {
                state.record_pop_submission(format!("pop-{}", id))?
            }
            OperationAction::SubmittedToNodeCore => state.complete()?,
            OperationAction::Done | OperationAction::Failed => {}
        }
        Ok(())
    }
}
