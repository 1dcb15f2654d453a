//! The shared match predicate used by both the block scan and mempool scan
//! loops (spec §4.2 "Match rules").

use crate::chain::types::RawTransaction;
use crate::money::Zatoshis;
use crate::store::PaymentIntent;

pub const AMOUNT_TOLERANCE_ZATOSHIS: u64 = 1;

/// A candidate on-chain output that matched a payment intent's recipient
/// address, extracted from a [`RawTransaction`]'s outputs.
pub struct MatchedOutput {
    pub amount: Zatoshis,
}

/// Returns the matching output's amount if `tx` pays `intent.pay_to_address`
/// within tolerance and `tx.txid` is not already bound to a different
/// intent. Spec §4.2: `tx.to == I.payToAddress`, `|tx.amount - I.amount| ≤ 1
/// zatoshi`, and the txid isn't bound elsewhere.
pub fn matches(
    tx: &RawTransaction,
    intent: &PaymentIntent,
    bound_to_other_intent: bool,
) -> Option<MatchedOutput> {
    if bound_to_other_intent {
        return None;
    }
    for vout in &tx.vout {
        if !vout.script_pub_key.addresses.contains(&intent.pay_to_address) {
            continue;
        }
        let amount = zec_value_to_zatoshis(vout.value);
        if amount.abs_diff(intent.amount) <= AMOUNT_TOLERANCE_ZATOSHIS {
            return Some(MatchedOutput { amount });
        }
    }
    None
}

fn zec_value_to_zatoshis(value: f64) -> Zatoshis {
    // Node RPC reports amounts as decimal ZEC; round to the nearest zatoshi
    // rather than truncate, since floating point addition can land a hair
    // under the true value.
    Zatoshis::new((value * crate::money::ZATOSHIS_PER_ZEC as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::{RawTransaction, ScriptPubKey, TxOut};
    use crate::config::ZcashNetwork;
    use crate::protocol::Scheme;
    use crate::timestamp::UnixTimestamp;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_intent(pay_to: &str, amount: Zatoshis) -> PaymentIntent {
        PaymentIntent {
            id: Uuid::new_v4(),
            merchant_id: "merchant-1".to_string(),
            amount,
            currency: "ZEC".to_string(),
            resource: "https://example.com/report".to_string(),
            pay_to_address: pay_to.to_string(),
            scheme: Scheme::Transparent,
            network: ZcashNetwork::Testnet,
            metadata: json!({}),
            created_at: UnixTimestamp::from_seconds(0),
            expires_at: UnixTimestamp::from_seconds(3600),
            state: crate::store::PaymentState::Created,
            observed_txid: None,
            observed_from: None,
            observed_at: None,
            confirmations: 0,
            settled_at: None,
            refunded_at: None,
            refund_amount: None,
            refund_reason: None,
        }
    }

    fn tx_paying(address: &str, value: f64) -> RawTransaction {
        RawTransaction {
            txid: "deadbeef".to_string(),
            confirmations: 0,
            block_hash: None,
            vout: vec![TxOut {
                value,
                script_pub_key: ScriptPubKey {
                    addresses: vec![address.to_string()],
                },
            }],
        }
    }

    #[test]
    fn matches_exact_amount() {
        let intent = sample_intent("t1pay", Zatoshis::new(100_000_000));
        let tx = tx_paying("t1pay", 1.0);
        assert!(matches(&tx, &intent, false).is_some());
    }

    #[test]
    fn rejects_underpayment_beyond_tolerance() {
        let intent = sample_intent("t1pay", Zatoshis::new(100_000_000));
        let tx = tx_paying("t1pay", 0.99999998);
        assert!(matches(&tx, &intent, false).is_none());
    }

    #[test]
    fn rejects_already_bound_txid() {
        let intent = sample_intent("t1pay", Zatoshis::new(100_000_000));
        let tx = tx_paying("t1pay", 1.0);
        assert!(matches(&tx, &intent, true).is_none());
    }

    #[test]
    fn rejects_wrong_recipient() {
        let intent = sample_intent("t1pay", Zatoshis::new(100_000_000));
        let tx = tx_paying("t1someoneelse", 1.0);
        assert!(matches(&tx, &intent, false).is_none());
    }
}
