//! Batch record store: the authoritative off-chain mirror of on-chain state
//!
//! One record per `batch_id`; the record is the unit of atomicity. The
//! lifecycle engine is the only writer and serializes writes per key, so a
//! `put` only needs to be linearizable with respect to other calls on the
//! same id.

mod memory;
mod sqlite;

pub use memory::MemoryBatchStore;
pub use sqlite::SqliteBatchStore;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::Batch;
use crate::error::Result;

/// Key-value persistence of batch records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Fetch a record by batch id
    async fn get(&self, batch_id: &str) -> Result<Option<Batch>>;

    /// Upsert a record. Ledger references already present in the stored
    /// record are preserved, so replaying a confirmed mutation is safe.
    async fn put(&self, batch: &Batch) -> Result<()>;

    /// All records, for audit and debug collaborators
    async fn list_all(&self) -> Result<Vec<Batch>>;
}
