//! Core domain types for batch custody tracking

mod audit;
mod batch;

pub use audit::{AuditEvent, AuditTrail, TransferReceipt, VerificationResult};
pub use batch::{
    Batch, BatchState, BatchView, LedgerRefs, NewBatch, OnchainBatch, PublicKey32, ScratchSecret,
    Signature64, TransitionKind, TxId, MARK_SOLD,
};
