//! The durable payment-intent store: the single serializer of PaymentIntent
//! state transitions (spec §4.3).

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::ZcashNetwork;
use crate::error::{StoreError, TransientError};
use crate::money::{Zatoshis, Zec};
use crate::protocol::Scheme;
use crate::timestamp::UnixTimestamp;

use super::models::{is_valid_transition, PaymentIntent, PaymentState};

/// Database-shaped row; converted into the domain [`PaymentIntent`] so the
/// rest of the crate never sees `Decimal`/`DateTime<Utc>` directly.
#[derive(sqlx::FromRow)]
struct PaymentIntentRow {
    id: Uuid,
    merchant_id: String,
    amount: Decimal,
    currency: String,
    resource: String,
    pay_to_address: String,
    scheme: Scheme,
    network: ZcashNetwork,
    metadata: JsonValue,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    state: PaymentState,
    observed_txid: Option<String>,
    observed_from: Option<String>,
    observed_at: Option<chrono::DateTime<chrono::Utc>>,
    confirmations: i32,
    settled_at: Option<chrono::DateTime<chrono::Utc>>,
    refunded_at: Option<chrono::DateTime<chrono::Utc>>,
    refund_amount: Option<Decimal>,
    refund_reason: Option<String>,
}

impl TryFrom<PaymentIntentRow> for PaymentIntent {
    type Error = TransientError;

    fn try_from(row: PaymentIntentRow) -> Result<Self, Self::Error> {
        Ok(PaymentIntent {
            id: row.id,
            merchant_id: row.merchant_id,
            amount: Zec(row.amount)
                .to_zatoshis()
                .map_err(|e| TransientError::Database(sqlx::Error::Decode(Box::new(e))))?,
            currency: row.currency,
            resource: row.resource,
            pay_to_address: row.pay_to_address,
            scheme: row.scheme,
            network: row.network,
            metadata: row.metadata,
            created_at: UnixTimestamp::from_chrono(row.created_at),
            expires_at: UnixTimestamp::from_chrono(row.expires_at),
            state: row.state,
            observed_txid: row.observed_txid,
            observed_from: row.observed_from,
            observed_at: row.observed_at.map(UnixTimestamp::from_chrono),
            confirmations: row.confirmations,
            settled_at: row.settled_at.map(UnixTimestamp::from_chrono),
            refunded_at: row.refunded_at.map(UnixTimestamp::from_chrono),
            refund_amount: row
                .refund_amount
                .map(|d| Zec(d).to_zatoshis())
                .transpose()
                .map_err(|e| TransientError::Database(sqlx::Error::Decode(Box::new(e))))?,
            refund_reason: row.refund_reason,
        })
    }
}

/// Fields a caller may set when creating a transition's side effects; not
/// every transition touches every field.
#[derive(Debug, Default)]
pub struct TransitionPatch {
    pub observed_txid: Option<String>,
    pub observed_from: Option<String>,
    pub observed_at: Option<UnixTimestamp>,
    pub confirmations: Option<i32>,
    pub settled_at: Option<UnixTimestamp>,
    pub refunded_at: Option<UnixTimestamp>,
    pub refund_amount: Option<Zatoshis>,
    pub refund_reason: Option<String>,
    pub clear_observed: bool,
}

/// The webhook event enqueued alongside a transition, matching the closed
/// set of events in spec §6 "Webhook outbound".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventType {
    Pending,
    Verified,
    Settled,
    Failed,
    Expired,
    Refunded,
}

impl WebhookEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEventType::Pending => "payment.pending",
            WebhookEventType::Verified => "payment.verified",
            WebhookEventType::Settled => "payment.settled",
            WebhookEventType::Failed => "payment.failed",
            WebhookEventType::Expired => "payment.expired",
            WebhookEventType::Refunded => "payment.refunded",
        }
    }
}

#[derive(Clone)]
pub struct PaymentStore {
    pool: PgPool,
}

impl PaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<PaymentIntent, StoreError> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(
            "SELECT * FROM payment_intents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(TransientError::Database)?
        .ok_or(StoreError::IntentNotFound(id))?;
        row.try_into().map_err(StoreError::Transient)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        merchant_id: &str,
        amount: Zatoshis,
        resource: &str,
        pay_to_address: &str,
        scheme: Scheme,
        network: ZcashNetwork,
        metadata: JsonValue,
        expires_at: UnixTimestamp,
    ) -> Result<PaymentIntent, StoreError> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(
            r#"
            INSERT INTO payment_intents
                (id, merchant_id, amount, currency, resource, pay_to_address, scheme,
                 network, metadata, created_at, expires_at, state, confirmations)
            VALUES
                ($1, $2, $3, 'ZEC', $4, $5, $6, $7, $8, now(), $9, 'created', 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(merchant_id)
        .bind(amount.to_zec().0)
        .bind(resource)
        .bind(pay_to_address)
        .bind(scheme)
        .bind(network)
        .bind(metadata)
        .bind(expires_at.to_chrono())
        .fetch_one(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        row.try_into().map_err(StoreError::Transient)
    }

    /// Compare-and-set transition from `from` to `to`, applying `patch` and
    /// enqueueing `event` as a `pending` webhook delivery, all in one
    /// transaction (spec §4.3 `TryTransition` + webhook coupling).
    ///
    /// A "no rows affected" CAS miss is not itself an error: the caller
    /// re-reads current state and, per spec §4.3, treats a current state
    /// already equal to `to` as a successful retry.
    #[allow(clippy::too_many_arguments)]
    pub async fn try_transition(
        &self,
        id: Uuid,
        merchant_id: &str,
        from: PaymentState,
        to: PaymentState,
        patch: TransitionPatch,
        event: WebhookEventType,
        payload: &JsonValue,
    ) -> Result<bool, StoreError> {
        if !is_valid_transition(from, to) {
            return Err(StoreError::InvalidTransition {
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            });
        }

        let mut tx = self.pool.begin().await.map_err(TransientError::Database)?;

        let (observed_txid, observed_from, observed_at) = (
            patch.observed_txid,
            patch.observed_from,
            patch.observed_at.map(|t| t.to_chrono()),
        );

        // `clear_observed` must actually null the columns out, not just skip
        // overwriting them: COALESCE($n, col) would keep the old value when
        // $n is bound NULL, so the clear needs its own CASE arm.
        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET state = $3,
                observed_txid = CASE WHEN $12 THEN NULL ELSE COALESCE($4, observed_txid) END,
                observed_from = CASE WHEN $12 THEN NULL ELSE COALESCE($5, observed_from) END,
                observed_at = CASE WHEN $12 THEN NULL ELSE COALESCE($6, observed_at) END,
                confirmations = COALESCE($7, confirmations),
                settled_at = COALESCE($8, settled_at),
                refunded_at = COALESCE($9, refunded_at),
                refund_amount = COALESCE($10, refund_amount),
                refund_reason = COALESCE($11, refund_reason)
            WHERE id = $1 AND state = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(observed_txid)
        .bind(observed_from)
        .bind(observed_at)
        .bind(patch.confirmations)
        .bind(patch.settled_at.map(|t| t.to_chrono()))
        .bind(patch.refunded_at.map(|t| t.to_chrono()))
        .bind(patch.refund_amount.map(|a| a.to_zec().0))
        .bind(patch.refund_reason)
        .bind(patch.clear_observed)
        .execute(&mut *tx)
        .await
        .map_err(TransientError::Database)?;

        let applied = result.rows_affected() == 1;
        if applied {
            sqlx::query(
                r#"
                INSERT INTO webhook_deliveries
                    (id, payment_intent_id, merchant_id, event_type, payload, state,
                     attempts, max_attempts, created_at, next_attempt_at)
                VALUES
                    ($1, $2, $3, $4, $5, 'pending', 0, $6, now(), now())
                ON CONFLICT (payment_intent_id, event_type) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(merchant_id)
            .bind(event.as_str())
            .bind(serde_json::to_vec(payload).unwrap_or_default())
            .bind(5i32)
            .execute(&mut *tx)
            .await
            .map_err(TransientError::Database)?;
        }

        tx.commit().await.map_err(TransientError::Database)?;
        Ok(applied)
    }

    /// Intents the monitor must keep scanning: non-terminal and unexpired
    /// (spec §4.3 query surface).
    pub async fn open_intents(&self) -> Result<Vec<PaymentIntent>, TransientError> {
        let rows = sqlx::query_as::<_, PaymentIntentRow>(
            r#"
            SELECT * FROM payment_intents
            WHERE state IN ('created', 'awaiting_confirmation', 'verified')
              AND expires_at > now()
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Intents the expiry sweep should close (spec §4.5 "Expiry sweep").
    pub async fn past_expiry_intents(&self) -> Result<Vec<PaymentIntent>, TransientError> {
        let rows = sqlx::query_as::<_, PaymentIntentRow>(
            r#"
            SELECT * FROM payment_intents
            WHERE state IN ('created', 'awaiting_confirmation')
              AND expires_at <= now()
              AND observed_txid IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Intents in `Verified` the auto-settle sweep should re-check
    /// (spec §4.5 "Auto-settle sweep").
    pub async fn verified_intents(&self) -> Result<Vec<PaymentIntent>, TransientError> {
        let rows = sqlx::query_as::<_, PaymentIntentRow>(
            "SELECT * FROM payment_intents WHERE state = 'verified'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Lists intents for a merchant, optionally filtered by state and a
    /// `[since, until)` creation-time window (spec §4.3 query surface).
    pub async fn list_by_merchant(
        &self,
        merchant_id: &str,
        state: Option<PaymentState>,
        since: Option<UnixTimestamp>,
        until: Option<UnixTimestamp>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentIntent>, TransientError> {
        let rows = sqlx::query_as::<_, PaymentIntentRow>(
            r#"
            SELECT * FROM payment_intents
            WHERE merchant_id = $1
              AND ($2::payment_state IS NULL OR state = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(merchant_id)
        .bind(state)
        .bind(since.map(|t| t.to_chrono()))
        .bind(until.map(|t| t.to_chrono()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Aggregate counts and amount totals by state within `[since, until)`
    /// (spec §4.3 query surface).
    pub async fn aggregate_by_state(
        &self,
        merchant_id: &str,
        since: UnixTimestamp,
        until: UnixTimestamp,
    ) -> Result<Vec<(PaymentState, i64, Decimal)>, TransientError> {
        let rows: Vec<(PaymentState, i64, Decimal)> = sqlx::query_as(
            r#"
            SELECT state, COUNT(*), COALESCE(SUM(amount), 0)
            FROM payment_intents
            WHERE merchant_id = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY state
            "#,
        )
        .bind(merchant_id)
        .bind(since.to_chrono())
        .bind(until.to_chrono())
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(rows)
    }
}
