//! Auto-settle sweep (spec §4.5): every 5 min, refreshes every `Verified`
//! intent's confirmation count once and settles it if the threshold is met.
//! A safety net for payments the block scanner's own transition missed a
//! tick on.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::store::{PaymentState, PaymentStore, TransitionPatch, TxStatus, TxStore, WebhookEventType};
use crate::timestamp::UnixTimestamp;

use super::advisory_lock::with_lock;

const LOCK_KEY: i64 = 0x4155_544f; // "AUTO"

pub struct AutoSettleSweep {
    pool: PgPool,
    rpc: Arc<dyn ZcashRpcClient>,
    payments: PaymentStore,
    transactions: TxStore,
    required_confirmations: u32,
}

impl AutoSettleSweep {
    pub fn new(
        pool: PgPool,
        rpc: Arc<dyn ZcashRpcClient>,
        payments: PaymentStore,
        transactions: TxStore,
        required_confirmations: u32,
    ) -> Self {
        Self {
            pool,
            rpc,
            payments,
            transactions,
            required_confirmations,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("auto-settle sweep shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = with_lock(&self.pool, LOCK_KEY, || self.sweep_once()).await {
                        tracing::warn!(%error, "auto-settle sweep tick failed");
                    }
                }
            }
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn sweep_once(&self) -> Result<(), TransientError> {
        let verified = self.payments.verified_intents().await?;
        let tip = self.rpc.get_block_count().await? as i32;
        for intent in verified {
            let Some(txid) = &intent.observed_txid else {
                continue; // invariant violation, nothing to refresh against
            };
            let Some(raw_tx) = self.rpc.get_raw_transaction(txid).await? else {
                continue;
            };
            let confirmations = raw_tx.confirmations.max(0) as i32;
            let block_height = crate::chain::types::block_height_from_confirmations(tip, confirmations);
            self.transactions
                .update_confirmations(txid, block_height, confirmations, TxStatus::Confirmed)
                .await?;

            if confirmations >= self.required_confirmations as i32 {
                let now = UnixTimestamp::try_now()?;
                self.payments
                    .try_transition(
                        intent.id,
                        &intent.merchant_id,
                        PaymentState::Verified,
                        PaymentState::Settled,
                        TransitionPatch {
                            confirmations: Some(confirmations),
                            settled_at: Some(now),
                            ..Default::default()
                        },
                        WebhookEventType::Settled,
                        &json!({
                            "id": intent.id,
                            "type": "payment.settled",
                            "data": { "paymentIntentId": intent.id, "confirmations": confirmations },
                            "timestamp": now.seconds_since_epoch(),
                        }),
                    )
                    .await
                    .ok();
            }
        }
        Ok(())
    }
}
