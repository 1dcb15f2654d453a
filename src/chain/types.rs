//! DTOs for the subset of the Zcash node JSON-RPC surface the monitor uses.

use serde::Deserialize;

/// Result shape of `getrawtransaction <txid> 1`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(rename = "blockhash", default)]
    pub block_hash: Option<String>,
    pub vout: Vec<TxOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOut {
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Result shape of `getblock <hash> 1`.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub height: u32,
    #[serde(default)]
    pub previousblockhash: Option<String>,
    pub tx: Vec<String>,
}

/// Result shape of `validateaddress <address>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateAddressResult {
    #[serde(rename = "isvalid")]
    pub is_valid: bool,
}

/// Derives the absolute height a transaction was mined at from the node's
/// current tip and `getrawtransaction`'s `confirmations` field (the
/// containing block itself counts as one confirmation). `None` for a
/// still-unconfirmed (mempool) transaction.
pub fn block_height_from_confirmations(tip: i32, confirmations: i32) -> Option<i32> {
    if confirmations <= 0 {
        None
    } else {
        Some(tip - confirmations + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_transaction_in_the_tip_block_has_one_confirmation() {
        assert_eq!(block_height_from_confirmations(100, 1), Some(100));
    }

    #[test]
    fn confirmations_count_back_from_the_tip() {
        assert_eq!(block_height_from_confirmations(100, 5), Some(96));
    }

    #[test]
    fn zero_confirmations_means_unconfirmed() {
        assert_eq!(block_height_from_confirmations(100, 0), None);
    }
}
