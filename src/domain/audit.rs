//! Audit trail and verification result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::{sig64_hex, BatchState, BatchView, OnchainBatch, Signature64, TransitionKind, TxId};

/// One ledger-anchored transition in a batch's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: TransitionKind,
    pub tx_id: TxId,
    /// `Some(true)` when the ledger confirms the transition has been
    /// reached on-chain; `None` when no cross-check was performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_onchain: Option<bool>,
}

/// Ordered, replayable projection of a batch's transition history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub batch_id: String,
    pub batch: BatchView,
    /// Events in lifecycle order, omitting transitions not yet reached
    pub events: Vec<AuditEvent>,
    pub assembled_at: DateTime<Utc>,
}

/// Outcome of the dual-factor authenticity check.
///
/// All three checks are computed independently; a failed check is a normal,
/// reportable outcome rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub batch_id: String,
    /// Presented scratch value matched the stored secret
    pub scratch_card_match: bool,
    /// Signature over the stored immutable fields is valid
    pub digital_signature_valid: bool,
    /// State recorded in the off-chain store
    pub offchain_state: BatchState,
    /// Fresh on-chain snapshot, when the ledger was reachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onchain: Option<OnchainBatch>,
    /// Off-chain and on-chain state disagree
    pub state_diverged: bool,
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Both authenticity factors passed and no divergence was observed.
    pub fn is_authentic(&self) -> bool {
        self.scratch_card_match && self.digital_signature_valid && !self.state_diverged
    }
}

/// Receipt for a confirmed custody transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub batch_id: String,
    pub kind: TransitionKind,
    pub from_owner: String,
    pub to_owner: String,
    pub tx_id: TxId,
    /// Ed25519 signature over the canonical transfer encoding
    #[serde(with = "sig64_hex")]
    pub transfer_signature: Signature64,
    /// State after the transfer
    pub state: BatchState,
    pub transferred_at: DateTime<Utc>,
}
