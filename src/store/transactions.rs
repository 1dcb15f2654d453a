//! Persistence for [`TxRecord`]s (spec §3 "TxRecord").

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::TransientError;
use crate::money::Zec;

use super::models::{TxRecord, TxStatus};

#[derive(sqlx::FromRow)]
struct TxRecordRow {
    txid: String,
    payment_intent_id: Uuid,
    amount: Decimal,
    from_address: String,
    to_address: String,
    block_height: Option<i32>,
    confirmations: i32,
    first_seen_at: chrono::DateTime<chrono::Utc>,
    last_checked_at: chrono::DateTime<chrono::Utc>,
    status: TxStatus,
}

impl TryFrom<TxRecordRow> for TxRecord {
    type Error = TransientError;

    fn try_from(row: TxRecordRow) -> Result<Self, Self::Error> {
        Ok(TxRecord {
            txid: row.txid,
            payment_intent_id: row.payment_intent_id,
            amount: Zec(row.amount)
                .to_zatoshis()
                .map_err(|e| TransientError::Database(sqlx::Error::Decode(Box::new(e))))?,
            from: row.from_address,
            to: row.to_address,
            block_height: row.block_height,
            confirmations: row.confirmations,
            first_seen_at: crate::timestamp::UnixTimestamp::from_chrono(row.first_seen_at),
            last_checked_at: crate::timestamp::UnixTimestamp::from_chrono(row.last_checked_at),
            status: row.status,
        })
    }
}

#[derive(Clone)]
pub struct TxStore {
    pool: PgPool,
}

impl TxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_txid(&self, txid: &str) -> Result<Option<TxRecord>, TransientError> {
        let row = sqlx::query_as::<_, TxRecordRow>("SELECT * FROM tx_records WHERE txid = $1")
            .bind(txid)
            .fetch_optional(&self.pool)
            .await
            .map_err(TransientError::Database)?;
        row.map(TryInto::try_into).transpose()
    }

    /// Binds `txid` to `payment_intent_id` if (and only if) it is not
    /// already bound to a different intent (spec §4.2 "Match rules").
    /// Returns the bound intent id, which differs from `payment_intent_id`
    /// if another intent already owns the txid.
    #[allow(clippy::too_many_arguments)]
    pub async fn first_seen(
        &self,
        txid: &str,
        payment_intent_id: Uuid,
        amount: crate::money::Zatoshis,
        from: &str,
        to: &str,
        block_height: Option<i32>,
        confirmations: i32,
        status: TxStatus,
    ) -> Result<Uuid, TransientError> {
        let now = chrono::Utc::now();
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO tx_records
                (txid, payment_intent_id, amount, from_address, to_address,
                 block_height, confirmations, first_seen_at, last_checked_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9)
            ON CONFLICT (txid) DO UPDATE SET last_checked_at = $8
            RETURNING payment_intent_id
            "#,
        )
        .bind(txid)
        .bind(payment_intent_id)
        .bind(amount.to_zec().0)
        .bind(from)
        .bind(to)
        .bind(block_height)
        .bind(confirmations)
        .bind(now)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(row.0)
    }

    pub async fn update_confirmations(
        &self,
        txid: &str,
        block_height: Option<i32>,
        confirmations: i32,
        status: TxStatus,
    ) -> Result<(), TransientError> {
        sqlx::query(
            r#"
            UPDATE tx_records
            SET block_height = $2, confirmations = $3, status = $4, last_checked_at = now()
            WHERE txid = $1
            "#,
        )
        .bind(txid)
        .bind(block_height)
        .bind(confirmations)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(())
    }

    /// TxRecords within reorg safety depth of `new_tip`, for the reorg
    /// handler to re-query (spec §4.2 "Reorg handler").
    pub async fn near_tip(
        &self,
        new_tip: i32,
        safety_depth: i32,
    ) -> Result<Vec<TxRecord>, TransientError> {
        let rows = sqlx::query_as::<_, TxRecordRow>(
            "SELECT * FROM tx_records WHERE block_height >= $1",
        )
        .bind(new_tip - safety_depth)
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
