//! The mempool scan driver loop (spec §4.2, loop 2 "Mempool scan") — finds
//! first-seen-unconfirmed matches faster than waiting for the next block.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::money::Zatoshis;
use crate::store::{PaymentStore, TransitionPatch, TxStatus, TxStore, WebhookEventType};
use crate::timestamp::UnixTimestamp;

use super::events::MonitorEvent;
use super::matcher;

pub struct MempoolScanner {
    rpc: Arc<dyn ZcashRpcClient>,
    payments: PaymentStore,
    transactions: TxStore,
    events: broadcast::Sender<MonitorEvent>,
}

impl MempoolScanner {
    pub fn new(
        rpc: Arc<dyn ZcashRpcClient>,
        payments: PaymentStore,
        transactions: TxStore,
        events: broadcast::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            rpc,
            payments,
            transactions,
            events,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("mempool scanner shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.scan_once().await {
                        tracing::warn!(%error, "mempool scan tick failed, will retry next interval");
                        let _ = self.events.send(MonitorEvent::Error { message: error.to_string() });
                    }
                }
            }
        }
    }

    /// One pass: walk the mempool, match unbound txids against `Created`
    /// intents, and bind the first match (spec §4.2 "Match rules").
    #[tracing::instrument(skip(self), err)]
    async fn scan_once(&self) -> Result<(), TransientError> {
        let txids = self.rpc.get_raw_mempool().await?;
        if txids.is_empty() {
            return Ok(());
        }

        let open_intents: Vec<_> = self
            .payments
            .open_intents()
            .await?
            .into_iter()
            .filter(|intent| intent.state == crate::store::PaymentState::Created)
            .collect();
        if open_intents.is_empty() {
            return Ok(());
        }

        let tip = self.rpc.get_block_count().await? as i32;

        for txid in txids {
            if self.transactions.find_by_txid(&txid).await?.is_some() {
                continue; // already seen, scan_once of the owning intent keeps it fresh
            }
            let Some(raw_tx) = self.rpc.get_raw_transaction(&txid).await? else {
                continue;
            };
            for intent in &open_intents {
                let Some(matched) = matcher::matches(&raw_tx, intent, false) else {
                    continue;
                };
                self.bind_match(intent, &raw_tx, matched.amount, tip).await?;
                break;
            }
        }
        Ok(())
    }

    async fn bind_match(
        &self,
        intent: &crate::store::PaymentIntent,
        raw_tx: &crate::chain::types::RawTransaction,
        amount: Zatoshis,
        tip: i32,
    ) -> Result<(), TransientError> {
        let from = raw_tx
            .vout
            .first()
            .and_then(|v| v.script_pub_key.addresses.first())
            .cloned()
            .unwrap_or_default();

        // A transaction can already have confirmations by the time it's
        // matched here if the node's mempool listing lagged a block behind.
        let confirmations = raw_tx.confirmations.max(0) as i32;
        let block_height = crate::chain::types::block_height_from_confirmations(tip, confirmations);
        let status = if confirmations == 0 {
            TxStatus::Mempool
        } else {
            TxStatus::Confirming
        };

        let bound_to = self
            .transactions
            .first_seen(
                &raw_tx.txid,
                intent.id,
                amount,
                &from,
                &intent.pay_to_address,
                block_height,
                confirmations,
                status,
            )
            .await?;
        if bound_to != intent.id {
            return Ok(()); // lost the race to another intent
        }

        let now = UnixTimestamp::try_now()?;
        self.payments
            .try_transition(
                intent.id,
                &intent.merchant_id,
                crate::store::PaymentState::Created,
                crate::store::PaymentState::AwaitingConfirmation,
                TransitionPatch {
                    observed_txid: Some(raw_tx.txid.clone()),
                    observed_from: Some(from),
                    observed_at: Some(now),
                    confirmations: Some(confirmations),
                    ..Default::default()
                },
                WebhookEventType::Pending,
                &json!({
                    "id": intent.id,
                    "type": "payment.pending",
                    "data": { "paymentIntentId": intent.id, "txid": raw_tx.txid },
                    "timestamp": now.seconds_since_epoch(),
                }),
            )
            .await
            .ok();

        let _ = self.events.send(MonitorEvent::PaymentDetected {
            payment_intent_id: intent.id,
            txid: raw_tx.txid.clone(),
        });
        Ok(())
    }
}
