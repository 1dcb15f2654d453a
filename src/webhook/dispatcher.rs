//! The periodic webhook delivery driver (spec §4.4 "Delivery driver").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::timestamp::UnixTimestamp;

use super::models::{backoff_for_attempt, DEFAULT_BACKOFF_SCHEDULE_SECONDS};
use super::signer;
use super::store::{DueDelivery, WebhookStore};

const BATCH_SIZE: i64 = 100;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// A non-2xx response that is not `429` may be shortcut to `failed` after
/// two attempts rather than exhausting the full schedule (spec §4.4).
const NON_RETRYABLE_SHORTCUT_AFTER_ATTEMPTS: i32 = 2;

pub struct WebhookDispatcher {
    store: WebhookStore,
    http: Client,
    backoff_schedule: Vec<u64>,
}

impl WebhookDispatcher {
    pub fn new(store: WebhookStore, backoff_schedule: Vec<u64>) -> Self {
        let http = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .expect("reqwest client builds with a well-formed default configuration");
        Self {
            store,
            http,
            backoff_schedule: if backoff_schedule.is_empty() {
                DEFAULT_BACKOFF_SCHEDULE_SECONDS.to_vec()
            } else {
                backoff_schedule
            },
        }
    }

    /// Runs the dispatch loop every `interval` until `cancel` fires.
    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("webhook dispatcher shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.dispatch_due().await {
                        tracing::warn!(%error, "webhook dispatch tick failed");
                    }
                }
            }
        }
    }

    /// Selects due deliveries and dispatches them, serially per
    /// `(merchantId, targetUrl)` to preserve per-intent ordering (spec §4.4
    /// "Ordering"), concurrently across distinct targets.
    #[tracing::instrument(skip(self), err)]
    async fn dispatch_due(&self) -> Result<(), crate::error::TransientError> {
        let due = self.store.due_deliveries(BATCH_SIZE).await?;

        let mut by_target: HashMap<(String, String), Vec<DueDelivery>> = HashMap::new();
        for delivery in due {
            by_target
                .entry((delivery.delivery.merchant_id.clone(), delivery.target_url.clone()))
                .or_default()
                .push(delivery);
        }

        let tasks: Vec<_> = by_target
            .into_values()
            .map(|group| self.dispatch_group(group))
            .collect();
        futures_util::future::join_all(tasks).await;
        Ok(())
    }

    async fn dispatch_group(&self, group: Vec<DueDelivery>) {
        for due in group {
            self.dispatch_one(due).await;
        }
    }

    async fn dispatch_one(&self, due: DueDelivery) {
        let DueDelivery {
            delivery,
            target_url,
            secret,
        } = due;

        let now = match UnixTimestamp::try_now() {
            Ok(now) => now,
            Err(error) => {
                tracing::warn!(%error, "system clock error, skipping webhook delivery this tick");
                return;
            }
        };
        let headers = signer::build_headers(
            &secret,
            now.seconds_since_epoch(),
            &delivery.payload,
            &delivery.event_type,
            &delivery.id.to_string(),
        );

        let result = self
            .http
            .post(&target_url)
            .header("X-Signature", headers.signature)
            .header("X-Timestamp", headers.timestamp)
            .header("X-Event-Type", headers.event_type)
            .header("X-Delivery-Id", headers.delivery_id)
            .header("Content-Type", "application/json")
            .body(delivery.payload.clone())
            .send()
            .await;

        self.record_outcome(delivery.id, delivery.attempts, delivery.max_attempts, result)
            .await;
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        attempts_so_far: i32,
        max_attempts: i32,
        result: Result<reqwest::Response, reqwest::Error>,
    ) {
        match result {
            Ok(response) if response.status().is_success() => {
                if let Err(error) = self.store.mark_sent(id, response.status().as_u16() as i32).await
                {
                    tracing::warn!(%error, "failed to record successful webhook delivery");
                }
            }
            Ok(response) => {
                let status = response.status();
                let shortcut_terminal = status.as_u16() != 429
                    && status.is_client_error()
                    && attempts_so_far + 1 >= NON_RETRYABLE_SHORTCUT_AFTER_ATTEMPTS;
                self.finish_failed_attempt(
                    id,
                    Some(status.as_u16() as i32),
                    &format!("http status {status}"),
                    attempts_so_far,
                    max_attempts,
                    shortcut_terminal,
                )
                .await;
            }
            Err(error) => {
                self.finish_failed_attempt(
                    id,
                    None,
                    &error.to_string(),
                    attempts_so_far,
                    max_attempts,
                    false,
                )
                .await;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_failed_attempt(
        &self,
        id: Uuid,
        http_code: Option<i32>,
        error: &str,
        attempts_so_far: i32,
        max_attempts: i32,
        force_terminal: bool,
    ) {
        let exhausted = force_terminal || attempts_so_far + 1 >= max_attempts;
        let retry_in = if exhausted {
            None
        } else {
            Some(backoff_for_attempt(&self.backoff_schedule, attempts_so_far))
        };
        if let Err(store_error) = self
            .store
            .record_failed_attempt(id, http_code, error, retry_in)
            .await
        {
            tracing::warn!(error = %store_error, "failed to record webhook delivery failure");
        }
    }
}
