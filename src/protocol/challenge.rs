//! Challenge issuance and verification (spec §4.1.3).
//!
//! The facilitator commits to every field of a [`ChallengeRecord`] with an
//! HMAC-SHA256 tag keyed by `facilitatorSigningSecret`, so a client cannot
//! tamper with the amount, recipient, or expiry between issuance and
//! presentation.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::ZcashNetwork;
use crate::money::Zatoshis;
use crate::timestamp::UnixTimestamp;

use super::types::{ChallengeRecord, Nonce, Scheme};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("challenge signature is malformed")]
    MalformedSignature,
    #[error("challenge signature does not match expected value")]
    BadSignature,
    #[error("challenge has expired")]
    Expired,
}

/// Canonical bytes a challenge signature commits to. Field order is fixed
/// so the facilitator and any verifier derive the same tag.
fn signing_input(
    payment_intent_id: &Uuid,
    amount: Zatoshis,
    pay_to: &str,
    scheme: Scheme,
    network: ZcashNetwork,
    nonce: &Nonce,
    issued_at: UnixTimestamp,
    expires_at: UnixTimestamp,
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(payment_intent_id.as_bytes());
    buf.extend_from_slice(&amount.0.to_le_bytes());
    buf.extend_from_slice(pay_to.as_bytes());
    buf.extend_from_slice(scheme.to_string().as_bytes());
    buf.extend_from_slice(&[network as u8]);
    buf.extend_from_slice(&nonce.0);
    buf.extend_from_slice(&issued_at.seconds_since_epoch().to_le_bytes());
    buf.extend_from_slice(&expires_at.seconds_since_epoch().to_le_bytes());
    buf
}

fn sign(secret: &str, input: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(input);
    hex::encode(mac.finalize().into_bytes())
}

/// Issues a freshly signed challenge for `payment_intent_id`, valid for
/// `ttl_seconds` from now.
pub fn issue_challenge(
    signing_secret: &str,
    payment_intent_id: Uuid,
    amount: Zatoshis,
    pay_to: String,
    scheme: Scheme,
    network: ZcashNetwork,
    ttl_seconds: u64,
) -> Result<ChallengeRecord, crate::error::TransientError> {
    let mut nonce_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce(nonce_bytes);

    let issued_at = UnixTimestamp::try_now()?;
    let expires_at = issued_at + ttl_seconds;

    let input = signing_input(
        &payment_intent_id,
        amount,
        &pay_to,
        scheme,
        network,
        &nonce,
        issued_at,
        expires_at,
    );
    let facilitator_sig = sign(signing_secret, &input);

    Ok(ChallengeRecord {
        payment_intent_id,
        amount,
        pay_to,
        scheme,
        network,
        nonce,
        issued_at,
        expires_at,
        facilitator_sig,
    })
}

/// Recomputes the expected tag for `record` and compares it in constant
/// time against `record.facilitator_sig`. Does not check expiry; callers
/// check freshness separately against the current time (spec §4.1 rule 3).
pub fn verify_facilitator_challenge(
    signing_secret: &str,
    record: &ChallengeRecord,
) -> Result<(), ChallengeError> {
    let input = signing_input(
        &record.payment_intent_id,
        record.amount,
        &record.pay_to,
        record.scheme,
        record.network,
        &record.nonce,
        record.issued_at,
        record.expires_at,
    );
    let expected = sign(signing_secret, &input);

    let provided = hex::decode(&record.facilitator_sig)
        .map_err(|_| ChallengeError::MalformedSignature)?;
    let expected_bytes = hex::decode(&expected).expect("hex::encode output is valid hex");

    if provided.len() != expected_bytes.len()
        || !constant_time_eq(&provided, &expected_bytes)
    {
        return Err(ChallengeError::BadSignature);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_and_verifies_round_trip() {
        let record = issue_challenge(
            "signing-secret",
            Uuid::new_v4(),
            Zatoshis::new(500_000),
            "t1exampleaddress".to_string(),
            Scheme::Transparent,
            ZcashNetwork::Testnet,
            3600,
        )
        .unwrap();
        verify_facilitator_challenge("signing-secret", &record).unwrap();
    }

    #[test]
    fn rejects_tampered_amount() {
        let mut record = issue_challenge(
            "signing-secret",
            Uuid::new_v4(),
            Zatoshis::new(500_000),
            "t1exampleaddress".to_string(),
            Scheme::Transparent,
            ZcashNetwork::Testnet,
            3600,
        )
        .unwrap();
        record.amount = Zatoshis::new(999_999);
        let err = verify_facilitator_challenge("signing-secret", &record).unwrap_err();
        assert_eq!(err, ChallengeError::BadSignature);
    }

    #[test]
    fn rejects_wrong_secret() {
        let record = issue_challenge(
            "signing-secret",
            Uuid::new_v4(),
            Zatoshis::new(500_000),
            "t1exampleaddress".to_string(),
            Scheme::Transparent,
            ZcashNetwork::Testnet,
            3600,
        )
        .unwrap();
        let err = verify_facilitator_challenge("wrong-secret", &record).unwrap_err();
        assert_eq!(err, ChallengeError::BadSignature);
    }
}
