//! Ledger client: transport adapter for the external append-only ledger
//!
//! Owns no business logic. The lifecycle engine submits a transition, waits
//! for confirmation under its own deadline, and only then mutates the store.

mod evm;

pub use evm::{EvmLedgerClient, LedgerConfig};

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{OnchainBatch, TransitionKind, TxId};
use crate::error::Result;

/// A state-transition operation to anchor on the ledger.
///
/// Variants mirror the contract surface: one function per custody
/// transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    CreateBatch {
        batch_id: String,
        drug_name: String,
        manufacture_date: i64,
        expiry_date: i64,
        distributor: String,
    },
    Ship {
        batch_id: String,
    },
    ReceiveAtPharmacy {
        batch_id: String,
        pharmacy: String,
    },
    MarkSold {
        batch_id: String,
    },
}

impl LedgerOp {
    pub fn kind(&self) -> TransitionKind {
        match self {
            LedgerOp::CreateBatch { .. } => TransitionKind::Create,
            LedgerOp::Ship { .. } => TransitionKind::Ship,
            LedgerOp::ReceiveAtPharmacy { .. } => TransitionKind::Receive,
            LedgerOp::MarkSold { .. } => TransitionKind::Sell,
        }
    }

    pub fn batch_id(&self) -> &str {
        match self {
            LedgerOp::CreateBatch { batch_id, .. }
            | LedgerOp::Ship { batch_id }
            | LedgerOp::ReceiveAtPharmacy { batch_id, .. }
            | LedgerOp::MarkSold { batch_id } => batch_id,
        }
    }
}

/// A submitted but not yet confirmed ledger transaction
#[derive(Debug, Clone)]
pub struct PendingTx {
    pub tx_hash: TxId,
    pub kind: TransitionKind,
    pub batch_id: String,
}

/// Transport adapter for the external ledger.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a transition transaction. Returns as soon as the ledger has
    /// accepted the submission; confirmation is a separate wait.
    async fn submit(&self, op: &LedgerOp) -> Result<PendingTx>;

    /// Block until the transaction is confirmed or the deadline elapses.
    ///
    /// Errors with `LedgerTimeout` on deadline and `LedgerRejected` when the
    /// ledger reverts the transaction.
    async fn await_confirmation(&self, pending: &PendingTx, timeout: Duration) -> Result<TxId>;

    /// Fetch the current confirmed on-chain record for a batch.
    /// `None` when the ledger has no record for the identifier.
    async fn fetch_onchain_state(&self, batch_id: &str) -> Result<Option<OnchainBatch>>;
}
