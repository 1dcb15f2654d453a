//! Domain types owned by the lifecycle store (spec §3, §4.3).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::config::ZcashNetwork;
use crate::money::Zatoshis;
use crate::protocol::Scheme;
use crate::timestamp::UnixTimestamp;

/// `PaymentIntent.state` (spec §4.3 state machine table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_state", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum PaymentState {
    Created,
    AwaitingConfirmation,
    Verified,
    Settled,
    Expired,
    Refunded,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentState::Settled
                | PaymentState::Expired
                | PaymentState::Refunded
                | PaymentState::Failed
        )
    }
}

/// Returns whether `(from, to)` is a transition the state machine in
/// spec §4.3 permits.
pub fn is_valid_transition(from: PaymentState, to: PaymentState) -> bool {
    use PaymentState::*;
    matches!(
        (from, to),
        (Created, AwaitingConfirmation)
            | (Created, Expired)
            | (AwaitingConfirmation, Verified)
            | (AwaitingConfirmation, Created)
            | (AwaitingConfirmation, Expired)
            | (Verified, Settled)
            | (Verified, Created)
            | (Settled, Refunded)
    ) || (!from.is_terminal() && to == Failed)
}

/// `TxRecord.status` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tx_status", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum TxStatus {
    Mempool,
    Confirming,
    Confirmed,
    Lost,
}

/// The authoritative record for a single payment request (spec §3
/// "PaymentIntent").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: Uuid,
    pub merchant_id: String,
    pub amount: Zatoshis,
    pub currency: String,
    pub resource: String,
    pub pay_to_address: String,
    pub scheme: Scheme,
    pub network: ZcashNetwork,
    pub metadata: JsonValue,
    pub created_at: UnixTimestamp,
    pub expires_at: UnixTimestamp,
    pub state: PaymentState,
    pub observed_txid: Option<String>,
    pub observed_from: Option<String>,
    pub observed_at: Option<UnixTimestamp>,
    pub confirmations: i32,
    pub settled_at: Option<UnixTimestamp>,
    pub refunded_at: Option<UnixTimestamp>,
    pub refund_amount: Option<Zatoshis>,
    pub refund_reason: Option<String>,
}

/// A per-on-chain-transaction audit record linked to at most one
/// PaymentIntent (spec §3 "TxRecord").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub txid: String,
    pub payment_intent_id: Uuid,
    pub amount: Zatoshis,
    pub from: String,
    pub to: String,
    pub block_height: Option<i32>,
    pub confirmations: i32,
    pub first_seen_at: UnixTimestamp,
    pub last_checked_at: UnixTimestamp,
    pub status: TxStatus,
}

/// Singleton cursor tracking how far the monitor has scanned (spec §3
/// "MonitorCursor").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorCursor {
    pub last_scanned_height: i32,
    pub last_scanned_at: UnixTimestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentState::*;

    #[test]
    fn matches_the_spec_transition_table() {
        assert!(is_valid_transition(Created, AwaitingConfirmation));
        assert!(is_valid_transition(Created, Expired));
        assert!(is_valid_transition(AwaitingConfirmation, Expired));
        assert!(is_valid_transition(AwaitingConfirmation, Verified));
        assert!(is_valid_transition(AwaitingConfirmation, Created));
        assert!(is_valid_transition(Verified, Settled));
        assert!(is_valid_transition(Verified, Created));
        assert!(is_valid_transition(Settled, Refunded));
        assert!(is_valid_transition(Created, Failed));
        assert!(is_valid_transition(AwaitingConfirmation, Failed));
        assert!(is_valid_transition(Verified, Failed));
    }

    #[test]
    fn terminal_states_reject_everything_but_the_refund_path() {
        assert!(!is_valid_transition(Settled, AwaitingConfirmation));
        assert!(!is_valid_transition(Expired, Created));
        assert!(!is_valid_transition(Failed, Created));
        assert!(!is_valid_transition(Refunded, Settled));
    }

    #[test]
    fn rejects_skipping_states() {
        assert!(!is_valid_transition(Created, Verified));
        assert!(!is_valid_transition(Created, Settled));
    }
}
