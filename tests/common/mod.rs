//! Shared test fixtures: an in-memory ledger double with controllable
//! failure modes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use pharmatrace::domain::{OnchainBatch, TxId};
use pharmatrace::error::PharmaError;
use pharmatrace::ledger::{LedgerClient, LedgerOp, PendingTx};
use pharmatrace::Result;

/// How the ledger double should fail, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// `submit` fails with `LedgerRejected`
    RejectOnSubmit,
    /// `await_confirmation` fails with `LedgerTimeout`
    TimeoutOnConfirm,
    /// `await_confirmation` fails with `LedgerRejected`
    RejectOnConfirm,
}

/// In-memory ledger that tracks on-chain batch state and confirms
/// transitions instantly (or after a configured delay).
#[derive(Default)]
pub struct MemoryLedger {
    chain: Mutex<HashMap<String, OnchainBatch>>,
    pending: Mutex<HashMap<String, LedgerOp>>,
    tx_counter: AtomicU64,
    fail_mode: Mutex<Option<FailMode>>,
    confirm_delay: Mutex<Option<Duration>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_mode(&self, mode: Option<FailMode>) {
        *self.fail_mode.lock().unwrap() = mode;
    }

    pub fn set_confirm_delay(&self, delay: Option<Duration>) {
        *self.confirm_delay.lock().unwrap() = delay;
    }

    /// Force the on-chain state of a batch, to simulate divergence.
    pub fn set_onchain_state(&self, batch_id: &str, state_raw: u8) {
        if let Some(record) = self.chain.lock().unwrap().get_mut(batch_id) {
            record.state_raw = state_raw;
        }
    }

    pub fn submitted_count(&self) -> u64 {
        self.tx_counter.load(Ordering::SeqCst)
    }

    fn apply(&self, op: &LedgerOp) {
        let mut chain = self.chain.lock().unwrap();
        match op {
            LedgerOp::CreateBatch {
                batch_id,
                drug_name,
                manufacture_date,
                expiry_date,
                distributor,
            } => {
                chain.insert(
                    batch_id.clone(),
                    OnchainBatch {
                        batch_id: batch_id.clone(),
                        drug_name: drug_name.clone(),
                        manufacture_date: *manufacture_date,
                        expiry_date: *expiry_date,
                        manufacturer: "0x0000000000000000000000000000000000000001".to_string(),
                        distributor: distributor.clone(),
                        pharmacy: String::new(),
                        state_raw: 0,
                    },
                );
            }
            LedgerOp::Ship { batch_id } => {
                if let Some(record) = chain.get_mut(batch_id) {
                    record.state_raw = 1;
                }
            }
            LedgerOp::ReceiveAtPharmacy { batch_id, pharmacy } => {
                if let Some(record) = chain.get_mut(batch_id) {
                    record.state_raw = 2;
                    record.pharmacy = pharmacy.clone();
                }
            }
            LedgerOp::MarkSold { batch_id } => {
                if let Some(record) = chain.get_mut(batch_id) {
                    record.state_raw = 3;
                }
            }
        }
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit(&self, op: &LedgerOp) -> Result<PendingTx> {
        if *self.fail_mode.lock().unwrap() == Some(FailMode::RejectOnSubmit) {
            return Err(PharmaError::LedgerRejected {
                batch_id: op.batch_id().to_string(),
                kind: op.kind().to_string(),
                reason: "submission refused".to_string(),
            });
        }

        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = TxId::new(format!("0x{:064x}", n));
        self.pending
            .lock()
            .unwrap()
            .insert(tx_hash.as_str().to_string(), op.clone());

        Ok(PendingTx {
            tx_hash,
            kind: op.kind(),
            batch_id: op.batch_id().to_string(),
        })
    }

    async fn await_confirmation(&self, pending: &PendingTx, timeout: Duration) -> Result<TxId> {
        match *self.fail_mode.lock().unwrap() {
            Some(FailMode::TimeoutOnConfirm) => {
                return Err(PharmaError::LedgerTimeout {
                    batch_id: pending.batch_id.clone(),
                    kind: pending.kind.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Some(FailMode::RejectOnConfirm) => {
                return Err(PharmaError::LedgerRejected {
                    batch_id: pending.batch_id.clone(),
                    kind: pending.kind.to_string(),
                    reason: "transaction reverted".to_string(),
                });
            }
            _ => {}
        }

        let delay = *self.confirm_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let op = self
            .pending
            .lock()
            .unwrap()
            .remove(pending.tx_hash.as_str())
            .expect("unknown pending transaction");
        self.apply(&op);

        Ok(pending.tx_hash.clone())
    }

    async fn fetch_onchain_state(&self, batch_id: &str) -> Result<Option<OnchainBatch>> {
        Ok(self.chain.lock().unwrap().get(batch_id).cloned())
    }
}
