//! EVM ledger adapter
//!
//! Submits custody transitions to the PharmaTrace contract and reads back
//! confirmed batch state.

use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use tracing::{info, warn};

use crate::domain::{OnchainBatch, TxId};
use crate::error::{PharmaError, Result};

use super::{LedgerClient, LedgerOp, PendingTx};

// Generate contract bindings
sol! {
    #[sol(rpc)]
    interface IPharmaTrace {
        function createBatch(string batchId, string drug, uint256 mfg, uint256 exp, address distributor) external;

        function ship(string batchId) external;

        function receiveAtPharmacy(string batchId, address pharmacy) external;

        function markSold(string batchId) external;

        function getBatch(string batchId) external view returns (
            string drug,
            string batchNo,
            uint256 mfg,
            uint256 exp,
            address manufacturer,
            address distributor,
            address pharmacy,
            uint8 state
        );
    }
}

/// Ledger adapter configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// RPC URL for the chain
    pub rpc_url: String,
    /// PharmaTrace contract address
    pub contract_address: Address,
    /// Private key for signing transactions
    pub private_key: String,
    /// Chain ID
    pub chain_id: u64,
    /// Receipt polling interval while awaiting confirmation
    pub poll_interval: Duration,
}

impl LedgerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Option<Self> {
        let rpc_url = std::env::var("RPC_URL").ok()?;
        let contract_address = std::env::var("CONTRACT_ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())?;
        let private_key = std::env::var("PRIVATE_KEY").ok()?;
        let chain_id = std::env::var("CHAIN_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(80002);

        Some(Self {
            rpc_url,
            contract_address,
            private_key,
            chain_id,
            poll_interval: Duration::from_secs(2),
        })
    }
}

/// EVM-backed ledger client
pub struct EvmLedgerClient {
    config: LedgerConfig,
}

impl EvmLedgerClient {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn signer(&self) -> Result<PrivateKeySigner> {
        self.config
            .private_key
            .parse()
            .map_err(|e| PharmaError::Configuration(format!("invalid private key: {}", e)))
    }

    fn parse_address(value: &str, what: &str) -> Result<Address> {
        value
            .parse()
            .map_err(|_| PharmaError::Internal(format!("invalid {} address: {}", what, value)))
    }
}

#[async_trait::async_trait]
impl LedgerClient for EvmLedgerClient {
    async fn submit(&self, op: &LedgerOp) -> Result<PendingTx> {
        let signer = self.signer()?;
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(
                self.config
                    .rpc_url
                    .parse()
                    .map_err(|e| PharmaError::Configuration(format!("invalid RPC URL: {}", e)))?,
            );

        let contract = IPharmaTrace::new(self.config.contract_address, &provider);

        let kind = op.kind();
        let batch_id = op.batch_id().to_string();

        // Each call builder must outlive the pending-transaction handle that
        // borrows it, so the owned hash is extracted inside the arm.
        let sent = match op {
            LedgerOp::CreateBatch {
                batch_id,
                drug_name,
                manufacture_date,
                expiry_date,
                distributor,
            } => {
                let distributor = Self::parse_address(distributor, "distributor")?;
                let call = contract.createBatch(
                    batch_id.clone(),
                    drug_name.clone(),
                    U256::from(*manufacture_date as u64),
                    U256::from(*expiry_date as u64),
                    distributor,
                );
                call.send().await.map(|p| *p.tx_hash())
            }
            LedgerOp::Ship { batch_id } => {
                let call = contract.ship(batch_id.clone());
                call.send().await.map(|p| *p.tx_hash())
            }
            LedgerOp::ReceiveAtPharmacy { batch_id, pharmacy } => {
                let pharmacy = Self::parse_address(pharmacy, "pharmacy")?;
                let call = contract.receiveAtPharmacy(batch_id.clone(), pharmacy);
                call.send().await.map(|p| *p.tx_hash())
            }
            LedgerOp::MarkSold { batch_id } => {
                let call = contract.markSold(batch_id.clone());
                call.send().await.map(|p| *p.tx_hash())
            }
        }
        .map_err(|e| PharmaError::LedgerRejected {
            batch_id: batch_id.clone(),
            kind: kind.to_string(),
            reason: format!("failed to send transaction: {}", e),
        })?;

        let tx_hash = TxId::new(format!("{:?}", sent));
        info!(%batch_id, %kind, tx_hash = %tx_hash, "Transition transaction sent");

        Ok(PendingTx {
            tx_hash,
            kind,
            batch_id,
        })
    }

    async fn await_confirmation(&self, pending: &PendingTx, timeout: Duration) -> Result<TxId> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| PharmaError::Configuration(format!("invalid RPC URL: {}", e)))?,
        );

        let hash: B256 = pending.tx_hash.as_str().parse().map_err(|_| {
            PharmaError::Internal(format!("invalid transaction hash: {}", pending.tx_hash))
        })?;

        let poll_interval = self.config.poll_interval;
        let wait = async {
            loop {
                match provider.get_transaction_receipt(hash).await {
                    Ok(Some(receipt)) => {
                        if receipt.status() {
                            info!(
                                batch_id = %pending.batch_id,
                                kind = %pending.kind,
                                tx_hash = %pending.tx_hash,
                                block = receipt.block_number.unwrap_or(0),
                                "Transition confirmed on ledger"
                            );
                            return Ok(pending.tx_hash.clone());
                        }
                        return Err(PharmaError::LedgerRejected {
                            batch_id: pending.batch_id.clone(),
                            kind: pending.kind.to_string(),
                            reason: "transaction reverted".to_string(),
                        });
                    }
                    Ok(None) => tokio::time::sleep(poll_interval).await,
                    Err(e) => {
                        // A failed lookup is indistinguishable from a network
                        // blip; only the deadline decides the outcome.
                        warn!(
                            batch_id = %pending.batch_id,
                            kind = %pending.kind,
                            error = %e,
                            "Receipt lookup failed, retrying"
                        );
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(PharmaError::LedgerTimeout {
                batch_id: pending.batch_id.clone(),
                kind: pending.kind.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn fetch_onchain_state(&self, batch_id: &str) -> Result<Option<OnchainBatch>> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| PharmaError::Configuration(format!("invalid RPC URL: {}", e)))?,
        );
        let contract = IPharmaTrace::new(self.config.contract_address, &provider);

        let raw = contract
            .getBatch(batch_id.to_string())
            .call()
            .await
            .map_err(|e| PharmaError::Internal(format!("contract call failed: {}", e)))?;

        // The contract returns a zeroed record for unknown ids.
        if raw.batchNo.is_empty() {
            return Ok(None);
        }

        Ok(Some(OnchainBatch {
            batch_id: raw.batchNo,
            drug_name: raw.drug,
            manufacture_date: raw.mfg.to::<u64>() as i64,
            expiry_date: raw.exp.to::<u64>() as i64,
            manufacturer: format!("{:?}", raw.manufacturer),
            distributor: format!("{:?}", raw.distributor),
            pharmacy: format!("{:?}", raw.pharmacy),
            state_raw: raw.state,
        }))
    }
}
