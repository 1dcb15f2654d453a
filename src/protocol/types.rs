//! Wire types for the 402 challenge and payment-authorization protocol
//! (spec §3 "ChallengeRecord", §6 "External interfaces").

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ZcashNetwork;
use crate::money::Zatoshis;
use crate::timestamp::UnixTimestamp;

/// `scheme` ∈ {transparent, shielded} (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_scheme", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Transparent,
    Shielded,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Transparent => write!(f, "transparent"),
            Scheme::Shielded => write!(f, "shielded"),
        }
    }
}

/// The requirements a presented authorization must satisfy, as pinned into
/// a signed challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub payment_intent_id: Uuid,
    pub amount: Zatoshis,
    pub pay_to: String,
    pub scheme: Scheme,
    pub network: ZcashNetwork,
}

/// A 128-bit random challenge nonce, hex-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(#[serde(with = "hex_nonce")] pub [u8; 16]);

mod hex_nonce {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 16], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 16], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decoded = hex::decode(&s).map_err(serde::de::Error::custom)?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("nonce must be 16 bytes"))
    }
}

/// The signed challenge material handed to a client in a 402 response
/// (spec §3 "ChallengeRecord").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    pub payment_intent_id: Uuid,
    pub amount: Zatoshis,
    pub pay_to: String,
    pub scheme: Scheme,
    pub network: ZcashNetwork,
    pub nonce: Nonce,
    pub issued_at: UnixTimestamp,
    pub expires_at: UnixTimestamp,
    pub facilitator_sig: String,
}

/// Full JSON body of a `402 Payment Required` response (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub payment_id: Uuid,
    pub amount: Zatoshis,
    pub currency: &'static str,
    pub pay_to: String,
    pub resource: String,
    pub expires_at: UnixTimestamp,
    pub nonce: Nonce,
    pub signature: String,
    pub scheme: Scheme,
    pub network: ZcashNetwork,
    pub version: u8,
}

/// Transparent-scheme authorization payload (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparentAuthorizationPayload {
    pub txid: String,
    pub amount: Zatoshis,
    pub from: String,
    pub to: String,
    #[serde(with = "hex_signature")]
    pub signature: Vec<u8>,
    pub timestamp: UnixTimestamp,
}

mod hex_signature {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Shielded-scheme authorization payload; signature checking is optional
/// here, on-chain existence is authoritative (spec §9 open question).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldedAuthorizationPayload {
    pub txid: String,
    pub amount: Zatoshis,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorizationPayload {
    Transparent(TransparentAuthorizationPayload),
    Shielded(ShieldedAuthorizationPayload),
}

impl AuthorizationPayload {
    pub fn txid(&self) -> &str {
        match self {
            AuthorizationPayload::Transparent(p) => &p.txid,
            AuthorizationPayload::Shielded(p) => &p.txid,
        }
    }

    pub fn amount(&self) -> Zatoshis {
        match self {
            AuthorizationPayload::Transparent(p) => p.amount,
            AuthorizationPayload::Shielded(p) => p.amount,
        }
    }

    pub fn to(&self) -> &str {
        match self {
            AuthorizationPayload::Transparent(p) => &p.to,
            AuthorizationPayload::Shielded(p) => &p.to,
        }
    }
}

/// Decoded `X-Payment` header contents (spec §4.1 `DecodeAuthorizationHeader`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub x402_version: u8,
    pub scheme: Scheme,
    pub network: ZcashNetwork,
    pub payload: AuthorizationPayload,
}

/// `X-Payment-Response` body returned on acceptance (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponseBody {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub confirmations: u32,
    pub settled_at: Option<UnixTimestamp>,
}
