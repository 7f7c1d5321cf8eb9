//! Audit trail assembly
//!
//! Projects a stored batch record and its ledger references into an ordered,
//! replayable trail. Never mutates state; safe to call concurrently.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::domain::{AuditEvent, AuditTrail};
use crate::error::{PharmaError, Result};
use crate::ledger::LedgerClient;
use crate::store::BatchStore;

/// Assembles audit trails from the store and, optionally, the ledger.
pub struct AuditAssembler {
    store: Arc<dyn BatchStore>,
    ledger: Arc<dyn LedgerClient>,
}

impl AuditAssembler {
    pub fn new(store: Arc<dyn BatchStore>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { store, ledger }
    }

    /// Build the trail from the store alone. Events appear in lifecycle
    /// order; transitions not yet reached are omitted.
    pub async fn build(&self, batch_id: &str) -> Result<AuditTrail> {
        let batch = self
            .store
            .get(batch_id)
            .await?
            .ok_or_else(|| PharmaError::BatchNotFound(batch_id.to_string()))?;

        let events = batch
            .ledger_refs
            .entries()
            .into_iter()
            .map(|(kind, tx)| AuditEvent {
                kind,
                tx_id: tx.clone(),
                confirmed_onchain: None,
            })
            .collect();

        Ok(AuditTrail {
            batch_id: batch.batch_id.clone(),
            batch: batch.view(),
            events,
            assembled_at: Utc::now(),
        })
    }

    /// Build the trail and cross-check each event against the ledger.
    ///
    /// An event counts as confirmed when the fresh on-chain state has
    /// reached (or passed) the event's target state. When the ledger is
    /// unreachable the trail is still produced, with the cross-check left
    /// open.
    pub async fn build_verified(&self, batch_id: &str) -> Result<AuditTrail> {
        let mut trail = self.build(batch_id).await?;

        let onchain_state = match self.ledger.fetch_onchain_state(batch_id).await {
            Ok(snapshot) => snapshot.and_then(|o| o.state()),
            Err(e) => {
                warn!(%batch_id, error = %e, "On-chain cross-check unavailable");
                None
            }
        };

        if let Some(onchain_state) = onchain_state {
            for event in &mut trail.events {
                event.confirmed_onchain = Some(onchain_state >= event.kind.target_state());
            }
        }

        Ok(trail)
    }
}
