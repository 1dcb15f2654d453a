//! Persistence for the singleton [`MonitorCursor`] (spec §3 "MonitorCursor").

use sqlx::PgPool;

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::timestamp::UnixTimestamp;

use super::models::MonitorCursor;

#[derive(Clone)]
pub struct CursorStore {
    pool: PgPool,
}

impl CursorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> Result<Option<MonitorCursor>, TransientError> {
        let row: Option<(i32, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT last_scanned_height, last_scanned_at FROM monitor_cursor WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(row.map(|(height, at)| MonitorCursor {
            last_scanned_height: height,
            last_scanned_at: UnixTimestamp::from_chrono(at),
        }))
    }

    pub async fn advance(&self, height: i32) -> Result<(), TransientError> {
        sqlx::query(
            r#"
            INSERT INTO monitor_cursor (id, last_scanned_height, last_scanned_at)
            VALUES (1, $1, now())
            ON CONFLICT (id) DO UPDATE SET last_scanned_height = $1, last_scanned_at = now()
            "#,
        )
        .bind(height)
        .execute(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(())
    }

    /// Rewinds the cursor to `height`, used by the reorg handler (spec
    /// §4.2 "Reorg handler": "the cursor is rewound to `newTip - safetyDepth`").
    pub async fn rewind(&self, height: i32) -> Result<(), TransientError> {
        self.advance(height).await
    }

    /// Crash-safe recovery on start: the highest `blockHeight` across
    /// `confirmed` TxRecords, else the node's current tip (spec §3
    /// "MonitorCursor").
    pub async fn recover(&self, rpc: &dyn ZcashRpcClient) -> Result<i32, TransientError> {
        if let Some(cursor) = self.load().await? {
            return Ok(cursor.last_scanned_height);
        }
        let highest_confirmed: Option<(Option<i32>,)> = sqlx::query_as(
            "SELECT MAX(block_height) FROM tx_records WHERE status = 'confirmed'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(TransientError::Database)?;

        if let Some((Some(height),)) = highest_confirmed {
            return Ok(height);
        }
        rpc.get_block_count().await.map(|h| h as i32)
    }
}
