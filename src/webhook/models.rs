//! Domain types for webhook delivery (spec §3 "WebhookDelivery", §4.4).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timestamp::UnixTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "delivery_state", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum DeliveryState {
    Pending,
    Retrying,
    Sent,
    Failed,
}

/// One attempt record per (event, target) (spec §3 "WebhookDelivery").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub payment_intent_id: Uuid,
    pub merchant_id: String,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub target_url: String,
    pub state: DeliveryState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_http_code: Option<i32>,
    pub last_error: Option<String>,
    pub created_at: UnixTimestamp,
    pub next_attempt_at: UnixTimestamp,
    pub last_attempt_at: Option<UnixTimestamp>,
    pub delivered_at: Option<UnixTimestamp>,
}

/// The fixed backoff schedule of spec §4.4: `{1s, 5s, 15s, 60s, 300s}`.
pub const DEFAULT_BACKOFF_SCHEDULE_SECONDS: [u64; 5] = [1, 5, 15, 60, 300];

/// Seconds to wait before the next attempt, given how many attempts have
/// already been made (0-indexed). Saturates at the schedule's last entry.
pub fn backoff_for_attempt(schedule: &[u64], attempts_made: i32) -> u64 {
    let idx = attempts_made.max(0) as usize;
    schedule
        .get(idx)
        .copied()
        .unwrap_or_else(|| *schedule.last().unwrap_or(&300))
}
