//! In-memory batch store
//!
//! Backs tests and single-process deployments. Writes merge ledger
//! references append-only, matching the SQLite implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Batch, TransitionKind};
use crate::error::Result;

use super::BatchStore;

/// Map-backed store keyed by `batch_id`
#[derive(Default)]
pub struct MemoryBatchStore {
    records: RwLock<HashMap<String, Batch>>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn get(&self, batch_id: &str) -> Result<Option<Batch>> {
        Ok(self.records.read().await.get(batch_id).cloned())
    }

    async fn put(&self, batch: &Batch) -> Result<()> {
        let mut records = self.records.write().await;
        let mut incoming = batch.clone();
        if let Some(existing) = records.get(&batch.batch_id) {
            // First recorded reference wins per transition kind.
            for kind in TransitionKind::ALL {
                if let Some(tx) = existing.ledger_refs.get(kind) {
                    incoming.ledger_refs.record(kind, tx.clone());
                }
            }
        }
        records.insert(incoming.batch_id.clone(), incoming);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Batch>> {
        let records = self.records.read().await;
        let mut all: Vec<Batch> = records.values().cloned().collect();
        all.sort_by(|a, b| a.batch_id.cmp(&b.batch_id));
        Ok(all)
    }
}
