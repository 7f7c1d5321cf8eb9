//! Batch lifecycle engine
//!
//! Enforces the custody state machine and the anchoring discipline: a
//! transition is submitted to the ledger, confirmed under a deadline, and
//! only then written to the store. Transitions on the same batch are
//! serialized through a per-`batch_id` lock held across the whole
//! read-submit-confirm-write window; `verify` and read projections take no
//! lock and tolerate a stale-by-one view, surfaced through the divergence
//! flag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::crypto::{batch_record_hash, transfer_hash, ManufacturerKey};
use crate::domain::{
    Batch, BatchState, BatchView, LedgerRefs, NewBatch, TransferReceipt, TransitionKind,
    VerificationResult, MARK_SOLD,
};
use crate::error::{PharmaError, Result};
use crate::ledger::{LedgerClient, LedgerOp};
use crate::store::BatchStore;
use crate::verifier;

/// Per-key lock table. Lock entries are created on first use and kept for
/// the lifetime of the engine; the batch population is bounded by the
/// catalog, not by request volume.
#[derive(Default)]
struct BatchLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BatchLocks {
    fn lock_for(&self, batch_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("batch lock table poisoned");
        map.entry(batch_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// The core orchestrator: state machine, anchoring, verification, custody.
pub struct LifecycleEngine {
    store: Arc<dyn BatchStore>,
    ledger: Arc<dyn LedgerClient>,
    signer: ManufacturerKey,
    config: EngineConfig,
    locks: BatchLocks,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn BatchStore>,
        ledger: Arc<dyn LedgerClient>,
        signer: ManufacturerKey,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            signer,
            config,
            locks: BatchLocks::default(),
        }
    }

    /// Create a new batch: sign the canonical record, anchor the `create`
    /// transition, then persist. All-or-nothing: any ledger failure leaves
    /// the store untouched.
    pub async fn create_batch(&self, new: NewBatch) -> Result<Batch> {
        new.validate()?;

        let lock = self.locks.lock_for(&new.batch_id);
        let _guard = lock.lock().await;

        if self.store.get(&new.batch_id).await?.is_some() {
            return Err(PharmaError::DuplicateBatch(new.batch_id));
        }

        let record_hash = batch_record_hash(
            &new.batch_id,
            &new.name,
            &new.manufacturer,
            new.manufacture_date,
            new.expiry_date,
        );
        let signature = self.signer.sign(&record_hash);

        let op = LedgerOp::CreateBatch {
            batch_id: new.batch_id.clone(),
            drug_name: new.name.clone(),
            manufacture_date: new.manufacture_date,
            expiry_date: new.expiry_date,
            distributor: new.distributor_or_default().to_string(),
        };

        let pending = self.ledger.submit(&op).await?;
        let tx = self
            .ledger
            .await_confirmation(&pending, self.config.confirmation_timeout)
            .await?;

        let mut ledger_refs = LedgerRefs::default();
        ledger_refs.record(TransitionKind::Create, tx);

        let batch = Batch {
            batch_id: new.batch_id,
            name: new.name,
            current_owner: new.manufacturer.clone(),
            manufacturer: new.manufacturer,
            manufacture_date: new.manufacture_date,
            expiry_date: new.expiry_date,
            scratch_secret: new.scratch_secret,
            state: BatchState::Created,
            signature,
            manufacturer_pubkey: self.signer.public_key_bytes(),
            ledger_refs,
            created_at: Utc::now(),
        };

        self.store.put(&batch).await?;

        info!(
            batch_id = %batch.batch_id,
            manufacturer = %batch.manufacturer,
            "Batch created and anchored"
        );

        Ok(batch)
    }

    /// Transfer custody of a batch one step along the chain.
    ///
    /// The sentinel `to_owner == "markSold"` drives the terminal
    /// `Received -> Sold` transition; every other value is treated as the
    /// next custodian's address.
    pub async fn transfer(
        &self,
        batch_id: &str,
        to_owner: &str,
        presented_scratch: &str,
    ) -> Result<TransferReceipt> {
        let lock = self.locks.lock_for(batch_id);
        let _guard = lock.lock().await;

        let mut batch = self
            .store
            .get(batch_id)
            .await?
            .ok_or_else(|| PharmaError::BatchNotFound(batch_id.to_string()))?;

        if !verifier::scratch_matches(&batch.scratch_secret, presented_scratch) {
            warn!(
                batch_id = %batch.batch_id,
                to_owner = %to_owner,
                "Transfer refused: scratch card mismatch"
            );
            return Err(PharmaError::AuthenticationFailed(batch.batch_id));
        }

        let kind = self.next_transition(&batch, to_owner)?;

        let op = match kind {
            TransitionKind::Ship => LedgerOp::Ship {
                batch_id: batch.batch_id.clone(),
            },
            TransitionKind::Receive => LedgerOp::ReceiveAtPharmacy {
                batch_id: batch.batch_id.clone(),
                pharmacy: to_owner.to_string(),
            },
            TransitionKind::Sell => LedgerOp::MarkSold {
                batch_id: batch.batch_id.clone(),
            },
            TransitionKind::Create => unreachable!("create is not a transfer"),
        };

        let pending = self.ledger.submit(&op).await?;
        let tx = self
            .ledger
            .await_confirmation(&pending, self.config.confirmation_timeout)
            .await?;

        let from_owner = batch.current_owner.clone();
        let transferred_at = Utc::now();

        // Ledger confirmation happens-before the store mutation; the write
        // below is the single atomic record update.
        batch.state = kind.target_state();
        if kind != TransitionKind::Sell {
            batch.current_owner = to_owner.to_string();
        }
        batch.ledger_refs.record(kind, tx.clone());
        self.store.put(&batch).await?;

        let transfer_signature = self.signer.sign(&transfer_hash(
            &batch.batch_id,
            kind.as_str(),
            &from_owner,
            to_owner,
            transferred_at.timestamp_millis(),
        ));

        info!(
            batch_id = %batch.batch_id,
            %kind,
            from = %from_owner,
            to = %to_owner,
            state = %batch.state,
            "Custody transferred"
        );

        Ok(TransferReceipt {
            batch_id: batch.batch_id,
            kind,
            from_owner,
            to_owner: to_owner.to_string(),
            tx_id: tx,
            transfer_signature,
            state: kind.target_state(),
            transferred_at,
        })
    }

    /// Dual-factor authenticity check. Read-only and lock-free; all three
    /// checks are computed independently so a caller can distinguish which
    /// factor failed. Only an unknown id is a hard error.
    pub async fn verify(&self, batch_id: &str, presented_scratch: &str) -> Result<VerificationResult> {
        let batch = self
            .store
            .get(batch_id)
            .await?
            .ok_or_else(|| PharmaError::BatchNotFound(batch_id.to_string()))?;

        let scratch_card_match = verifier::scratch_matches(&batch.scratch_secret, presented_scratch);
        let digital_signature_valid = verifier::signature_valid(&batch);

        // On-chain state is fetched fresh, not from the store, so divergence
        // between the two is observable.
        let onchain = match self.ledger.fetch_onchain_state(batch_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(batch_id = %batch.batch_id, error = %e, "On-chain state unavailable during verify");
                None
            }
        };

        let state_diverged = onchain
            .as_ref()
            .and_then(|o| o.state())
            .map(|s| s != batch.state)
            .unwrap_or(false);

        if !scratch_card_match || !digital_signature_valid || state_diverged {
            // Attempted fraudulent verification is auditable data, not noise.
            warn!(
                batch_id = %batch.batch_id,
                scratch_card_match,
                digital_signature_valid,
                state_diverged,
                "Verification check failed"
            );
        }

        Ok(VerificationResult {
            batch_id: batch.batch_id,
            scratch_card_match,
            digital_signature_valid,
            offchain_state: batch.state,
            onchain,
            state_diverged,
            verified_at: Utc::now(),
        })
    }

    /// Public projections of every stored batch, for audit/debug callers.
    pub async fn list_batches(&self) -> Result<Vec<BatchView>> {
        let all = self.store.list_all().await?;
        Ok(all.iter().map(Batch::view).collect())
    }

    /// Determine the transition a transfer request maps to, or reject it.
    fn next_transition(&self, batch: &Batch, to_owner: &str) -> Result<TransitionKind> {
        if to_owner == MARK_SOLD {
            if batch.state == BatchState::Received {
                return Ok(TransitionKind::Sell);
            }
            return Err(PharmaError::InvalidStateTransition {
                batch_id: batch.batch_id.clone(),
                from: batch.state,
                attempted: "sell".to_string(),
            });
        }

        // A transfer to the party already holding the batch is a replay of
        // the transition just taken, not a step forward.
        if to_owner == batch.current_owner {
            return Err(PharmaError::InvalidStateTransition {
                batch_id: batch.batch_id.clone(),
                from: batch.state,
                attempted: format!("transfer to current owner {}", to_owner),
            });
        }

        batch.state.next_shipment().ok_or_else(|| {
            let attempted = if batch.state == BatchState::Received {
                // The only exit from Received is the markSold sentinel.
                "transfer (expected markSold)".to_string()
            } else {
                "transfer".to_string()
            };
            PharmaError::InvalidStateTransition {
                batch_id: batch.batch_id.clone(),
                from: batch.state,
                attempted,
            }
        })
    }
}
