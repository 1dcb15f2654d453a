//! Authorization header decoding and validation (spec §4.1
//! `DecodeAuthorizationHeader`, `ValidateAuthorization`).
//!
//! Rules are checked in the fixed order spec §4.1 lists them in, and
//! validation stops at the first failing rule.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::ZcashNetwork;
use crate::money::Zatoshis;
use crate::timestamp::UnixTimestamp;

use super::address;
use super::challenge::{self, ChallengeError};
use super::signature::{self, SignatureError};
use super::types::{Authorization, AuthorizationPayload, ChallengeRecord, Scheme};

pub const PROTOCOL_VERSION: u8 = 1;
pub const AMOUNT_TOLERANCE_ZATOSHIS: u64 = 1;

/// The single rule a presented authorization failed, in the checking order
/// defined by spec §4.1.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    #[error("unsupported x402 protocol version: {0}")]
    UnsupportedVersion(u8),
    #[error("authorization scheme does not match the challenge")]
    SchemeMismatch,
    #[error("authorization network does not match the challenge")]
    NetworkMismatch,
    #[error("challenge signature is invalid: {0}")]
    BadChallengeSignature(String),
    #[error("challenge has expired")]
    ChallengeExpired,
    #[error("authorization timestamp is not within the allowed freshness window")]
    StaleTimestamp,
    #[error("authorization amount does not match the required amount")]
    AmountMismatch,
    #[error("authorization recipient does not match the required payee")]
    RecipientMismatch,
    #[error("transparent signature verification failed: {0}")]
    BadSignature(String),
    #[error("transaction id has already been bound to another payment")]
    DuplicateTxid,
    #[error("address is malformed: {0}")]
    MalformedAddress(String),
    #[error("authorization header is not valid base64")]
    BadHeaderEncoding,
    #[error("authorization header is not valid JSON")]
    BadHeaderJson,
}

impl From<ChallengeError> for InvalidReason {
    fn from(err: ChallengeError) -> Self {
        InvalidReason::BadChallengeSignature(err.to_string())
    }
}

impl From<SignatureError> for InvalidReason {
    fn from(err: SignatureError) -> Self {
        InvalidReason::BadSignature(err.to_string())
    }
}

impl From<address::AddressError> for InvalidReason {
    fn from(err: address::AddressError) -> Self {
        InvalidReason::MalformedAddress(err.to_string())
    }
}

/// Decodes the base64 `X-Payment` header value into an [`Authorization`].
pub fn decode_authorization_header(header_value: &str) -> Result<Authorization, InvalidReason> {
    let decoded = BASE64
        .decode(header_value.trim())
        .map_err(|_| InvalidReason::BadHeaderEncoding)?;
    serde_json::from_slice(&decoded).map_err(|_| InvalidReason::BadHeaderJson)
}

/// Checks `authorization` against `challenge`, in the order spec §4.1 lists:
/// protocol version, scheme/network match, challenge signature and
/// freshness, authorization timestamp freshness, amount tolerance,
/// recipient match, transparent signature verification, then the
/// double-spend guard supplied by `is_txid_bound_elsewhere`.
pub fn validate_authorization(
    authorization: &Authorization,
    challenge_record: &ChallengeRecord,
    signing_secret: &str,
    now: UnixTimestamp,
    freshness_window_seconds: u64,
    is_txid_bound_elsewhere: impl FnOnce(&str) -> bool,
) -> Result<(), InvalidReason> {
    if authorization.x402_version != PROTOCOL_VERSION {
        return Err(InvalidReason::UnsupportedVersion(authorization.x402_version));
    }
    if authorization.scheme != challenge_record.scheme {
        return Err(InvalidReason::SchemeMismatch);
    }
    if authorization.network != challenge_record.network {
        return Err(InvalidReason::NetworkMismatch);
    }

    challenge::verify_facilitator_challenge(signing_secret, challenge_record)?;
    if now > challenge_record.expires_at {
        return Err(InvalidReason::ChallengeExpired);
    }

    if let AuthorizationPayload::Transparent(payload) = &authorization.payload {
        let delta = now.abs_diff(payload.timestamp);
        if delta > freshness_window_seconds {
            return Err(InvalidReason::StaleTimestamp);
        }
    }

    let presented_amount = authorization.payload.amount();
    if presented_amount.abs_diff(challenge_record.amount) > AMOUNT_TOLERANCE_ZATOSHIS {
        return Err(InvalidReason::AmountMismatch);
    }

    if authorization.payload.to() != challenge_record.pay_to {
        return Err(InvalidReason::RecipientMismatch);
    }

    match &authorization.payload {
        AuthorizationPayload::Transparent(payload) => {
            address::decode_transparent(&payload.from, authorization.network)?;
            address::decode_transparent(&payload.to, authorization.network)?;
            signature::verify_transparent_signature(
                transparent_signing_message(payload).as_bytes(),
                &payload.signature,
                &payload.from,
                authorization.network,
            )?;
        }
        AuthorizationPayload::Shielded(payload) => {
            address::validate_shielded_format(&payload.to, authorization.network)?;
        }
    }

    if is_txid_bound_elsewhere(authorization.payload.txid()) {
        return Err(InvalidReason::DuplicateTxid);
    }

    Ok(())
}

/// Canonical message a transparent-scheme client signs to authorize a
/// payment: the fields a forger would need to control, joined with `|`.
fn transparent_signing_message(
    payload: &super::types::TransparentAuthorizationPayload,
) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        payload.txid,
        payload.amount.0,
        payload.from,
        payload.to,
        payload.timestamp.seconds_since_epoch()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::address as addr;
    use crate::protocol::types::TransparentAuthorizationPayload;
    use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
    use uuid::Uuid;

    fn signed_transparent_payload(
        secret: &SecretKey,
        network: ZcashNetwork,
        txid: &str,
        amount: Zatoshis,
        to: &str,
        timestamp: UnixTimestamp,
    ) -> TransparentAuthorizationPayload {
        let secp = Secp256k1::new();
        let pubkey = PublicKey::from_secret_key(&secp, secret);
        let hash160 = addr::hash160(&pubkey.serialize());
        let from = addr::encode_transparent_p2pkh(&hash160, network);

        let payload = TransparentAuthorizationPayload {
            txid: txid.to_string(),
            amount,
            from: from.clone(),
            to: to.to_string(),
            signature: Vec::new(),
            timestamp,
        };
        let message = transparent_signing_message(&payload);
        let hash = signature::message_hash(message.as_bytes());
        let msg = Message::from_digest(hash);
        let (recid, compact) = secp.sign_ecdsa_recoverable(&msg, secret).serialize_compact();
        let mut sig = Vec::with_capacity(65);
        sig.push(31 + recid.to_i32() as u8);
        sig.extend_from_slice(&compact);

        TransparentAuthorizationPayload {
            signature: sig,
            ..payload
        }
    }

    #[test]
    fn accepts_well_formed_transparent_authorization() {
        let network = ZcashNetwork::Testnet;
        let secret = SecretKey::from_slice(&[0x22; 32]).unwrap();
        let to = {
            let hash = [9u8; 20];
            addr::encode_transparent_p2pkh(&hash, network)
        };
        let amount = Zatoshis::new(250_000);
        let now = UnixTimestamp::try_now().unwrap();

        let challenge_record = challenge::issue_challenge(
            "secret",
            Uuid::new_v4(),
            amount,
            to.clone(),
            Scheme::Transparent,
            network,
            3600,
        )
        .unwrap();

        let payload = signed_transparent_payload(&secret, network, "deadbeef", amount, &to, now);
        let authorization = Authorization {
            x402_version: PROTOCOL_VERSION,
            scheme: Scheme::Transparent,
            network,
            payload: AuthorizationPayload::Transparent(payload),
        };

        validate_authorization(&authorization, &challenge_record, "secret", now, 3600, |_| false)
            .unwrap();
    }

    #[test]
    fn rejects_unsupported_version() {
        let network = ZcashNetwork::Testnet;
        let to = addr::encode_transparent_p2pkh(&[1u8; 20], network);
        let amount = Zatoshis::new(10);
        let challenge_record = challenge::issue_challenge(
            "secret",
            Uuid::new_v4(),
            amount,
            to.clone(),
            Scheme::Transparent,
            network,
            3600,
        )
        .unwrap();
        let authorization = Authorization {
            x402_version: 99,
            scheme: Scheme::Transparent,
            network,
            payload: AuthorizationPayload::Transparent(TransparentAuthorizationPayload {
                txid: "abc".to_string(),
                amount,
                from: to.clone(),
                to,
                signature: vec![0u8; 65],
                timestamp: UnixTimestamp::from_seconds(0),
            }),
        };
        let err = validate_authorization(
            &authorization,
            &challenge_record,
            "secret",
            UnixTimestamp::from_seconds(0),
            3600,
            |_| false,
        )
        .unwrap_err();
        assert_eq!(err, InvalidReason::UnsupportedVersion(99));
    }

    #[test]
    fn decode_header_rejects_bad_base64() {
        let err = decode_authorization_header("not-valid-base64!!").unwrap_err();
        assert_eq!(err, InvalidReason::BadHeaderEncoding);
    }
}
