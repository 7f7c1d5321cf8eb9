//! Error taxonomy for the custody-chain core
//!
//! Every fallible operation returns [`PharmaError`]. Variants carry the batch
//! identifier wherever one is known so callers can log and route failures
//! without re-deriving context.

use thiserror::Error;

use crate::domain::BatchState;

#[derive(Debug, Error)]
pub enum PharmaError {
    /// A batch with this identifier already exists in the store.
    #[error("batch {0} already exists")]
    DuplicateBatch(String),

    /// Manufacture date is not strictly before the expiry date.
    #[error("batch {batch_id}: manufacture date {manufacture_date} must precede expiry date {expiry_date}")]
    InvalidDates {
        batch_id: String,
        manufacture_date: i64,
        expiry_date: i64,
    },

    /// No record for this batch identifier.
    #[error("batch {0} not found")]
    BatchNotFound(String),

    /// Presented scratch-card value does not match the stored secret.
    #[error("authentication failed for batch {0}")]
    AuthenticationFailed(String),

    /// Requested transition is not legal from the batch's current state.
    #[error("batch {batch_id}: cannot {attempted} from state {from}")]
    InvalidStateTransition {
        batch_id: String,
        from: BatchState,
        attempted: String,
    },

    /// Ledger confirmation did not arrive within the deadline.
    #[error("ledger confirmation timed out for batch {batch_id} ({kind}) after {timeout_ms}ms")]
    LedgerTimeout {
        batch_id: String,
        kind: String,
        timeout_ms: u64,
    },

    /// The ledger refused or reverted the transaction.
    #[error("ledger rejected {kind} for batch {batch_id}: {reason}")]
    LedgerRejected {
        batch_id: String,
        kind: String,
        reason: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PharmaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_batch_context() {
        let err = PharmaError::InvalidStateTransition {
            batch_id: "B1".to_string(),
            from: BatchState::Sold,
            attempted: "ship".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("B1"));
        assert!(rendered.contains("sold"));
        assert!(rendered.contains("ship"));
    }

    #[test]
    fn timeout_reports_deadline() {
        let err = PharmaError::LedgerTimeout {
            batch_id: "B1".to_string(),
            kind: "create".to_string(),
            timeout_ms: 30_000,
        };
        assert!(err.to_string().contains("30000ms"));
    }
}
