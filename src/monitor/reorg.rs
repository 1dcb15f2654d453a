//! Reorg detection and recovery (spec §4.2 "Reorg handler").
//!
//! Runs after every block scan tick with the node's current tip: any
//! previously-confirmed transaction within `safetyDepth` of that tip that
//! the node no longer reports (or now reports at zero confirmations) has
//! been reorged out. Its intent is unbound back to `Created` so the scan
//! loops can re-detect the payment under its new txid, if any.

use std::sync::Arc;

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::store::{PaymentState, PaymentStore, TransitionPatch, TxStatus, TxStore, WebhookEventType};

use super::cursor::Cursor;
use super::events::MonitorEvent;

pub struct ReorgHandler {
    rpc: Arc<dyn ZcashRpcClient>,
    payments: PaymentStore,
    transactions: TxStore,
    events: tokio::sync::broadcast::Sender<MonitorEvent>,
    safety_depth: i32,
}

impl ReorgHandler {
    pub fn new(
        rpc: Arc<dyn ZcashRpcClient>,
        payments: PaymentStore,
        transactions: TxStore,
        events: tokio::sync::broadcast::Sender<MonitorEvent>,
        safety_depth: i32,
    ) -> Self {
        Self {
            rpc,
            payments,
            transactions,
            events,
            safety_depth,
        }
    }

    /// Checks every tx record within `safetyDepth` of `new_tip` and unbinds
    /// any that the node no longer confirms. Returns `true` if a reorg was
    /// found and handled.
    #[tracing::instrument(skip(self, cursor), err)]
    pub async fn check(&self, new_tip: i32, cursor: &mut Cursor) -> Result<bool, TransientError> {
        let candidates = self.transactions.near_tip(new_tip, self.safety_depth).await?;
        let mut reorged = false;

        for record in candidates {
            if !matches!(record.status, TxStatus::Confirming | TxStatus::Confirmed) {
                continue;
            }
            let still_confirmed = match self.rpc.get_raw_transaction(&record.txid).await? {
                Some(tx) => tx.confirmations > 0,
                None => false,
            };
            if still_confirmed {
                continue;
            }

            reorged = true;
            self.transactions
                .update_confirmations(&record.txid, None, 0, TxStatus::Lost)
                .await?;

            let intent = self.payments.get(record.payment_intent_id).await;
            if let Ok(intent) = intent {
                if !intent.state.is_terminal() {
                    self.payments
                        .try_transition(
                            intent.id,
                            &intent.merchant_id,
                            intent.state,
                            PaymentState::Created,
                            TransitionPatch {
                                clear_observed: true,
                                confirmations: Some(0),
                                ..Default::default()
                            },
                            WebhookEventType::Pending,
                            &serde_json::json!({}),
                        )
                        .await
                        .ok();
                }
            }

            let _ = self.events.send(MonitorEvent::TransactionLost {
                payment_intent_id: record.payment_intent_id,
                txid: record.txid.clone(),
            });
        }

        if reorged {
            let rewind_to = (new_tip - self.safety_depth).max(0);
            cursor.rewind_to(rewind_to).await?;
            let _ = self.events.send(MonitorEvent::ReorgHandled { new_tip });
        }

        Ok(reorged)
    }
}
