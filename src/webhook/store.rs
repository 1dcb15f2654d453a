//! Query surface the dispatcher uses: due deliveries, mark-sent,
//! mark-failed, manual retry (spec §4.4).

use uuid::Uuid;

use crate::error::TransientError;
use crate::timestamp::UnixTimestamp;

use super::models::{DeliveryState, WebhookDelivery};

#[derive(sqlx::FromRow)]
struct DueDeliveryRow {
    id: Uuid,
    payment_intent_id: Uuid,
    merchant_id: String,
    event_type: String,
    payload: Vec<u8>,
    state: DeliveryState,
    attempts: i32,
    max_attempts: i32,
    last_http_code: Option<i32>,
    last_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    next_attempt_at: chrono::DateTime<chrono::Utc>,
    last_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
    delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    cfg_target_url: String,
    cfg_secret: String,
}

/// A delivery joined with the merchant's configured webhook target and
/// signing secret. Deliveries for merchants with no webhook configured are
/// never selected — they remain `pending` until configuration exists.
pub struct DueDelivery {
    pub delivery: WebhookDelivery,
    pub target_url: String,
    pub secret: String,
}

impl From<DueDeliveryRow> for DueDelivery {
    fn from(row: DueDeliveryRow) -> Self {
        DueDelivery {
            delivery: WebhookDelivery {
                id: row.id,
                payment_intent_id: row.payment_intent_id,
                merchant_id: row.merchant_id,
                event_type: row.event_type,
                payload: row.payload,
                target_url: row.cfg_target_url.clone(),
                state: row.state,
                attempts: row.attempts,
                max_attempts: row.max_attempts,
                last_http_code: row.last_http_code,
                last_error: row.last_error,
                created_at: UnixTimestamp::from_chrono(row.created_at),
                next_attempt_at: UnixTimestamp::from_chrono(row.next_attempt_at),
                last_attempt_at: row.last_attempt_at.map(UnixTimestamp::from_chrono),
                delivered_at: row.delivered_at.map(UnixTimestamp::from_chrono),
            },
            target_url: row.cfg_target_url,
            secret: row.cfg_secret,
        }
    }
}

#[derive(Clone)]
pub struct WebhookStore {
    pool: sqlx::PgPool,
}

impl WebhookStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Rows in `pending`/`retrying` whose `nextAttemptAt <= now`, joined
    /// against the merchant's webhook configuration, ordered so a single
    /// `(merchantId, targetUrl)` pair's deliveries stay in enqueue order
    /// (spec §4.4 "Ordering").
    pub async fn due_deliveries(&self, batch_size: i64) -> Result<Vec<DueDelivery>, TransientError> {
        let rows = sqlx::query_as::<_, DueDeliveryRow>(
            r#"
            SELECT
                d.id, d.payment_intent_id, d.merchant_id, d.event_type, d.payload,
                d.state, d.attempts, d.max_attempts, d.last_http_code, d.last_error,
                d.created_at, d.next_attempt_at, d.last_attempt_at, d.delivered_at,
                c.target_url AS cfg_target_url, c.secret AS cfg_secret
            FROM webhook_deliveries d
            JOIN merchant_webhook_configs c ON c.merchant_id = d.merchant_id
            WHERE d.state IN ('pending', 'retrying') AND d.next_attempt_at <= now()
            ORDER BY d.created_at ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(rows.into_iter().map(DueDelivery::from).collect())
    }

    pub async fn mark_sent(&self, id: Uuid, http_code: i32) -> Result<(), TransientError> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET state = 'sent', attempts = attempts + 1, last_http_code = $2,
                last_attempt_at = now(), delivered_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(http_code)
        .execute(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(())
    }

    /// Records a failed attempt and either schedules a retry or marks the
    /// delivery terminally `failed`, depending on `max_attempts`.
    pub async fn record_failed_attempt(
        &self,
        id: Uuid,
        http_code: Option<i32>,
        error: &str,
        retry_in_seconds: Option<u64>,
    ) -> Result<(), TransientError> {
        match retry_in_seconds {
            Some(seconds) => {
                sqlx::query(
                    r#"
                    UPDATE webhook_deliveries
                    SET state = 'retrying', attempts = attempts + 1, last_http_code = $2,
                        last_error = $3, last_attempt_at = now(),
                        next_attempt_at = now() + make_interval(secs => $4)
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(http_code)
                .bind(error)
                .bind(seconds as f64)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE webhook_deliveries
                    SET state = 'failed', attempts = attempts + 1, last_http_code = $2,
                        last_error = $3, last_attempt_at = now()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(http_code)
                .bind(error)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(TransientError::Database)?;
        Ok(())
    }

    /// Resets a `failed` delivery for one more attempt (spec §4.4 "a manual
    /// retry operation resets `attempts` to its prior value + 1").
    pub async fn manual_retry(&self, id: Uuid) -> Result<(), TransientError> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET state = 'retrying', next_attempt_at = now()
            WHERE id = $1 AND state = 'failed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(TransientError::Database)?;
        Ok(())
    }
}
