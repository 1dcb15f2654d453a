//! Re-verification sweep (spec §4.5): every 2 min, force-refreshes any
//! `AwaitingConfirmation` intent whose bound transaction hasn't been
//! checked by the monitor in the last `scanInterval * 2` — a safety net for
//! a bound tx the block scanner's own height window skipped.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::store::{PaymentState, PaymentStore, TxStatus, TxStore};
use crate::timestamp::UnixTimestamp;

use super::advisory_lock::with_lock;

const LOCK_KEY: i64 = 0x5245_5645; // "REVE"

pub struct ReverifySweep {
    pool: PgPool,
    rpc: Arc<dyn ZcashRpcClient>,
    payments: PaymentStore,
    transactions: TxStore,
    staleness_threshold_seconds: u64,
}

impl ReverifySweep {
    pub fn new(
        pool: PgPool,
        rpc: Arc<dyn ZcashRpcClient>,
        payments: PaymentStore,
        transactions: TxStore,
        scan_interval: Duration,
    ) -> Self {
        Self {
            pool,
            rpc,
            payments,
            transactions,
            staleness_threshold_seconds: scan_interval.as_secs() * 2,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("re-verification sweep shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = with_lock(&self.pool, LOCK_KEY, || self.sweep_once()).await {
                        tracing::warn!(%error, "re-verification sweep tick failed");
                    }
                }
            }
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn sweep_once(&self) -> Result<(), TransientError> {
        let now = UnixTimestamp::try_now()?;
        let open = self.payments.open_intents().await?;
        let tip = self.rpc.get_block_count().await? as i32;

        for intent in open {
            if intent.state != PaymentState::AwaitingConfirmation {
                continue;
            }
            let Some(txid) = &intent.observed_txid else {
                continue;
            };
            let Some(record) = self.transactions.find_by_txid(txid).await? else {
                continue;
            };
            if now.abs_diff(record.last_checked_at) < self.staleness_threshold_seconds {
                continue; // the monitor touched it recently enough
            }

            let Some(raw_tx) = self.rpc.get_raw_transaction(txid).await? else {
                continue;
            };
            let confirmations = raw_tx.confirmations.max(0) as i32;
            let block_height = crate::chain::types::block_height_from_confirmations(tip, confirmations);
            let status = if confirmations == 0 {
                TxStatus::Mempool
            } else {
                TxStatus::Confirming
            };
            self.transactions
                .update_confirmations(txid, block_height, confirmations, status)
                .await?;
        }
        Ok(())
    }
}
