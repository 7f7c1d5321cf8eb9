//! Batch record and state machine types
//!
//! The `Batch` is the central entity: one manufactured lot tracked from
//! manufacturer to customer. Its `state` field is the single source of truth
//! for custody progress; `ledger_refs` is a purely auditable annex of the
//! on-chain transactions that anchored each transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PharmaError, Result};

/// Sentinel `to_owner` value that drives the terminal `Received -> Sold`
/// transition instead of an address-based transfer.
pub const MARK_SOLD: &str = "markSold";

/// 64-byte Ed25519 signature
pub type Signature64 = [u8; 64];

/// 32-byte Ed25519 public key
pub type PublicKey32 = [u8; 32];

/// Confirmed ledger transaction identifier (0x-prefixed hex string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Custody state of a batch.
///
/// States advance monotonically `Created -> Shipped -> Received -> Sold`;
/// the derived ordering reflects that progression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Created,
    Shipped,
    Received,
    Sold,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Created => "created",
            BatchState::Shipped => "shipped",
            BatchState::Received => "received",
            BatchState::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(BatchState::Created),
            "shipped" => Some(BatchState::Shipped),
            "received" => Some(BatchState::Received),
            "sold" => Some(BatchState::Sold),
            _ => None,
        }
    }

    /// Decode the numeric state stored by the on-chain contract.
    pub fn from_onchain(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(BatchState::Created),
            1 => Some(BatchState::Shipped),
            2 => Some(BatchState::Received),
            3 => Some(BatchState::Sold),
            _ => None,
        }
    }

    /// The address-based transition leaving this state, if any.
    ///
    /// `Received` has no address-based exit: the only way out is the
    /// `markSold` sentinel, and `Sold` is terminal.
    pub fn next_shipment(&self) -> Option<TransitionKind> {
        match self {
            BatchState::Created => Some(TransitionKind::Ship),
            BatchState::Shipped => Some(TransitionKind::Receive),
            BatchState::Received | BatchState::Sold => None,
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of ledger-anchored transition
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Create,
    Ship,
    Receive,
    Sell,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Create => "create",
            TransitionKind::Ship => "ship",
            TransitionKind::Receive => "receive",
            TransitionKind::Sell => "sell",
        }
    }

    /// State a batch enters once this transition is confirmed.
    pub fn target_state(&self) -> BatchState {
        match self {
            TransitionKind::Create => BatchState::Created,
            TransitionKind::Ship => BatchState::Shipped,
            TransitionKind::Receive => BatchState::Received,
            TransitionKind::Sell => BatchState::Sold,
        }
    }

    /// State a batch must currently hold for this transition to be legal.
    /// `Create` has no source state (the batch does not exist yet).
    pub fn required_source(&self) -> Option<BatchState> {
        match self {
            TransitionKind::Create => None,
            TransitionKind::Ship => Some(BatchState::Created),
            TransitionKind::Receive => Some(BatchState::Shipped),
            TransitionKind::Sell => Some(BatchState::Received),
        }
    }

    /// All kinds in canonical lifecycle order.
    pub const ALL: [TransitionKind; 4] = [
        TransitionKind::Create,
        TransitionKind::Ship,
        TransitionKind::Receive,
        TransitionKind::Sell,
    ];
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only map from transition kind to the confirmed ledger transaction
/// that anchored it. At most one entry per kind; the first recorded
/// transaction wins, which makes replaying a confirmed mutation idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRefs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<TxId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship: Option<TxId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive: Option<TxId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell: Option<TxId>,
}

impl LedgerRefs {
    pub fn get(&self, kind: TransitionKind) -> Option<&TxId> {
        match kind {
            TransitionKind::Create => self.create.as_ref(),
            TransitionKind::Ship => self.ship.as_ref(),
            TransitionKind::Receive => self.receive.as_ref(),
            TransitionKind::Sell => self.sell.as_ref(),
        }
    }

    /// Record the anchoring transaction for `kind`. Returns `false` when an
    /// entry already exists; the existing reference is kept.
    pub fn record(&mut self, kind: TransitionKind, tx: TxId) -> bool {
        let slot = match kind {
            TransitionKind::Create => &mut self.create,
            TransitionKind::Ship => &mut self.ship,
            TransitionKind::Receive => &mut self.receive,
            TransitionKind::Sell => &mut self.sell,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(tx);
        true
    }

    /// Populated entries in canonical lifecycle order.
    pub fn entries(&self) -> Vec<(TransitionKind, &TxId)> {
        TransitionKind::ALL
            .iter()
            .filter_map(|&kind| self.get(kind).map(|tx| (kind, tx)))
            .collect()
    }
}

/// Shared-secret value printed under the scratch panel of the packaging.
///
/// Write-only: redacted from `Debug`, never serialized, and compared only
/// through the constant-time check in [`crate::verifier`].
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ScratchSecret(String);

impl ScratchSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret bytes, for persistence and constant-time comparison only.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ScratchSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScratchSecret(<redacted>)")
    }
}

/// Creation request for a new batch
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    pub batch_id: String,
    pub name: String,
    pub manufacturer: String,
    /// Unix seconds
    pub manufacture_date: i64,
    /// Unix seconds
    pub expiry_date: i64,
    pub scratch_secret: ScratchSecret,
    /// Distributor address for the on-chain record; defaults to the
    /// manufacturer address when absent.
    #[serde(default)]
    pub distributor: Option<String>,
}

impl NewBatch {
    pub fn validate(&self) -> Result<()> {
        if self.manufacture_date >= self.expiry_date {
            return Err(PharmaError::InvalidDates {
                batch_id: self.batch_id.clone(),
                manufacture_date: self.manufacture_date,
                expiry_date: self.expiry_date,
            });
        }
        Ok(())
    }

    pub fn distributor_or_default(&self) -> &str {
        self.distributor.as_deref().unwrap_or(&self.manufacturer)
    }
}

/// The authoritative off-chain batch record.
///
/// `batch_id`, `name`, `manufacturer` and the two dates are immutable after
/// creation and are the exact fields covered by `signature`. Only the
/// lifecycle engine mutates `current_owner`, `state` and `ledger_refs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub name: String,
    pub manufacturer: String,
    pub manufacture_date: i64,
    pub expiry_date: i64,

    /// Never serialized outward; defaults to empty on deserialization of an
    /// external projection.
    #[serde(skip_serializing, default)]
    pub scratch_secret: ScratchSecret,

    pub current_owner: String,
    pub state: BatchState,

    /// Ed25519 signature over the canonical immutable-field encoding,
    /// computed once at creation and never recomputed.
    #[serde(with = "sig64_hex")]
    pub signature: Signature64,

    /// Public half of the key that produced `signature`.
    #[serde(with = "pubkey32_hex")]
    pub manufacturer_pubkey: PublicKey32,

    pub ledger_refs: LedgerRefs,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        now_unix >= self.expiry_date
    }

    /// Externally readable projection of this record. Carries everything a
    /// caller may see; the scratch secret is not part of it by construction.
    pub fn view(&self) -> BatchView {
        BatchView {
            batch_id: self.batch_id.clone(),
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            manufacture_date: self.manufacture_date,
            expiry_date: self.expiry_date,
            current_owner: self.current_owner.clone(),
            state: self.state,
            signature: format!("0x{}", hex::encode(self.signature)),
            ledger_refs: self.ledger_refs.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public projection of a batch record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchView {
    pub batch_id: String,
    pub name: String,
    pub manufacturer: String,
    pub manufacture_date: i64,
    pub expiry_date: i64,
    pub current_owner: String,
    pub state: BatchState,
    pub signature: String,
    pub ledger_refs: LedgerRefs,
    pub created_at: DateTime<Utc>,
}

/// Batch record as reported by the on-chain contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnchainBatch {
    pub batch_id: String,
    pub drug_name: String,
    pub manufacture_date: i64,
    pub expiry_date: i64,
    pub manufacturer: String,
    pub distributor: String,
    pub pharmacy: String,
    /// Raw contract state value
    pub state_raw: u8,
}

impl OnchainBatch {
    pub fn state(&self) -> Option<BatchState> {
        BatchState::from_onchain(self.state_raw)
    }
}

/// Serde module for 64-byte signatures as 0x-prefixed hex
pub mod sig64_hex {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let hex_str = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(hex_str).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 bytes for signature"))
    }
}

/// Serde module for 32-byte public keys as 0x-prefixed hex
pub mod pubkey32_hex {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let hex_str = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(hex_str).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes for public key"))
    }
}
