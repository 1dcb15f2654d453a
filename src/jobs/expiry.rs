//! Expiry sweep (spec §4.5): every 60 s, closes out unbound intents whose
//! `expiresAt` has passed. Bound intents (a tx is already observed) are left
//! for the monitor rather than expired out from under it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::error::TransientError;
use crate::store::{PaymentState, PaymentStore, TransitionPatch, WebhookEventType};
use crate::timestamp::UnixTimestamp;

use super::advisory_lock::with_lock;

const LOCK_KEY: i64 = 0x4558_5049; // "EXPI"

pub struct ExpirySweep {
    pool: PgPool,
    payments: PaymentStore,
}

impl ExpirySweep {
    pub fn new(pool: PgPool, payments: PaymentStore) -> Self {
        Self { pool, payments }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("expiry sweep shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = with_lock(&self.pool, LOCK_KEY, || self.sweep_once()).await {
                        tracing::warn!(%error, "expiry sweep tick failed");
                    }
                }
            }
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn sweep_once(&self) -> Result<(), TransientError> {
        let expired = self.payments.past_expiry_intents().await?;
        let now = UnixTimestamp::try_now()?;
        for intent in expired {
            self.payments
                .try_transition(
                    intent.id,
                    &intent.merchant_id,
                    intent.state,
                    PaymentState::Expired,
                    TransitionPatch::default(),
                    WebhookEventType::Expired,
                    &json!({
                        "id": intent.id,
                        "type": "payment.expired",
                        "data": { "paymentIntentId": intent.id },
                        "timestamp": now.seconds_since_epoch(),
                    }),
                )
                .await
                .ok();
        }
        Ok(())
    }
}
