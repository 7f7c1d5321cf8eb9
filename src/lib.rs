//! PharmaTrace Core Library
//!
//! Ledger-anchored custody tracking for pharmaceutical batches. A batch
//! moves manufacturer -> distributor -> pharmacy -> customer; every
//! transition is confirmed on an external append-only ledger before the
//! off-chain record advances, and any party can verify authenticity with a
//! scratch-card secret plus a digital signature over the batch record.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (batches, states, audit trails)
//! - [`crypto`] - Cryptographic utilities (canonical hashing, Ed25519 signing)
//! - [`verifier`] - Pure authenticity checks (scratch card, signature)
//! - [`ledger`] - Ledger client trait and EVM adapter
//! - [`store`] - Batch record persistence (in-memory, SQLite)
//! - [`engine`] - The batch lifecycle engine
//! - [`audit`] - Audit trail assembly
//! - [`telemetry`] - Logging initialization

pub mod audit;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod store;
pub mod telemetry;
pub mod verifier;

// Re-export commonly used types
pub use audit::AuditAssembler;
pub use config::EngineConfig;
pub use domain::{
    AuditEvent, AuditTrail, Batch, BatchState, BatchView, LedgerRefs, NewBatch, OnchainBatch,
    ScratchSecret, TransferReceipt, TransitionKind, TxId, VerificationResult, MARK_SOLD,
};
pub use engine::LifecycleEngine;
pub use error::{PharmaError, Result};
pub use ledger::{EvmLedgerClient, LedgerClient, LedgerConfig, LedgerOp, PendingTx};
pub use store::{BatchStore, MemoryBatchStore, SqliteBatchStore};
