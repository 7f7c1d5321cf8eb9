//! SQLite batch store
//!
//! One row per batch. The upsert keeps already-recorded ledger references
//! via COALESCE, so re-applying a confirmed mutation after a crash cannot
//! overwrite the anchoring transaction ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, FromRow};

use crate::domain::{Batch, BatchState, LedgerRefs, ScratchSecret, TxId};
use crate::error::{PharmaError, Result};

use super::BatchStore;

/// SQLite-backed store keyed by `batch_id`
pub struct SqliteBatchStore {
    pool: SqlitePool,
}

impl SqliteBatchStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new store from a database path
    pub async fn from_path(path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(path).await?;
        Ok(Self { pool })
    }

    /// Create a store backed by an in-memory database
    pub async fn in_memory() -> Result<Self> {
        Self::from_path("sqlite::memory:").await
    }

    /// Initialize the database schema
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS batches (
                batch_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                manufacture_date INTEGER NOT NULL,
                expiry_date INTEGER NOT NULL,
                scratch_secret TEXT NOT NULL,
                current_owner TEXT NOT NULL,
                state TEXT NOT NULL,
                signature TEXT NOT NULL,
                manufacturer_pubkey TEXT NOT NULL,
                create_tx TEXT,
                ship_tx TEXT,
                receive_tx TEXT,
                sell_tx TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_batches_state ON batches (state)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl BatchStore for SqliteBatchStore {
    async fn get(&self, batch_id: &str) -> Result<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT batch_id, name, manufacturer, manufacture_date, expiry_date,
                   scratch_secret, current_owner, state, signature,
                   manufacturer_pubkey, create_tx, ship_tx, receive_tx, sell_tx,
                   created_at
            FROM batches
            WHERE batch_id = ?
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Batch::try_from).transpose()
    }

    async fn put(&self, batch: &Batch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO batches (
                batch_id, name, manufacturer, manufacture_date, expiry_date,
                scratch_secret, current_owner, state, signature,
                manufacturer_pubkey, create_tx, ship_tx, receive_tx, sell_tx,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(batch_id) DO UPDATE SET
                current_owner = excluded.current_owner,
                state = excluded.state,
                create_tx = COALESCE(batches.create_tx, excluded.create_tx),
                ship_tx = COALESCE(batches.ship_tx, excluded.ship_tx),
                receive_tx = COALESCE(batches.receive_tx, excluded.receive_tx),
                sell_tx = COALESCE(batches.sell_tx, excluded.sell_tx)
            "#,
        )
        .bind(&batch.batch_id)
        .bind(&batch.name)
        .bind(&batch.manufacturer)
        .bind(batch.manufacture_date)
        .bind(batch.expiry_date)
        .bind(batch.scratch_secret.expose())
        .bind(&batch.current_owner)
        .bind(batch.state.as_str())
        .bind(hex::encode(batch.signature))
        .bind(hex::encode(batch.manufacturer_pubkey))
        .bind(batch.ledger_refs.create.as_ref().map(|t| t.as_str().to_string()))
        .bind(batch.ledger_refs.ship.as_ref().map(|t| t.as_str().to_string()))
        .bind(batch.ledger_refs.receive.as_ref().map(|t| t.as_str().to_string()))
        .bind(batch.ledger_refs.sell.as_ref().map(|t| t.as_str().to_string()))
        .bind(batch.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT batch_id, name, manufacturer, manufacture_date, expiry_date,
                   scratch_secret, current_owner, state, signature,
                   manufacturer_pubkey, create_tx, ship_tx, receive_tx, sell_tx,
                   created_at
            FROM batches
            ORDER BY batch_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Batch::try_from).collect()
    }
}

/// Database row for a batch record
#[derive(Debug, FromRow)]
struct BatchRow {
    batch_id: String,
    name: String,
    manufacturer: String,
    manufacture_date: i64,
    expiry_date: i64,
    scratch_secret: String,
    current_owner: String,
    state: String,
    signature: String,
    manufacturer_pubkey: String,
    create_tx: Option<String>,
    ship_tx: Option<String>,
    receive_tx: Option<String>,
    sell_tx: Option<String>,
    created_at: String,
}

impl TryFrom<BatchRow> for Batch {
    type Error = PharmaError;

    fn try_from(row: BatchRow) -> Result<Batch> {
        let state = BatchState::parse(&row.state).ok_or_else(|| {
            PharmaError::Internal(format!("unknown state in store: {}", row.state))
        })?;

        let signature: [u8; 64] = hex::decode(&row.signature)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| PharmaError::Internal("malformed signature in store".to_string()))?;

        let manufacturer_pubkey: [u8; 32] = hex::decode(&row.manufacturer_pubkey)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| PharmaError::Internal("malformed public key in store".to_string()))?;

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| PharmaError::Internal(format!("malformed timestamp in store: {}", e)))?
            .with_timezone(&Utc);

        Ok(Batch {
            batch_id: row.batch_id,
            name: row.name,
            manufacturer: row.manufacturer,
            manufacture_date: row.manufacture_date,
            expiry_date: row.expiry_date,
            scratch_secret: ScratchSecret::new(row.scratch_secret),
            current_owner: row.current_owner,
            state,
            signature,
            manufacturer_pubkey,
            ledger_refs: LedgerRefs {
                create: row.create_tx.map(TxId::new),
                ship: row.ship_tx.map(TxId::new),
                receive: row.receive_tx.map(TxId::new),
                sell: row.sell_tx.map(TxId::new),
            },
            created_at,
        })
    }
}
