//! Black-box coverage of the protocol engine's public surface: a client
//! presents an authorization against a facilitator-issued challenge, and
//! the engine either accepts it or names the first rule it violates.

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use uuid::Uuid;

use zcash_x402_facilitator::config::ZcashNetwork;
use zcash_x402_facilitator::money::Zatoshis;
use zcash_x402_facilitator::protocol::challenge;
use zcash_x402_facilitator::protocol::validate::{validate_authorization, InvalidReason};
use zcash_x402_facilitator::protocol::{
    Authorization, AuthorizationPayload, Scheme, TransparentAuthorizationPayload,
};
use zcash_x402_facilitator::timestamp::UnixTimestamp;

fn keypair() -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[0x41; 32]).unwrap();
    let public = PublicKey::from_secret_key(&secp, &secret);
    (secret, public)
}

fn transparent_address(public: &PublicKey, network: ZcashNetwork) -> String {
    use zcash_x402_facilitator::protocol::address::{encode_transparent_p2pkh, hash160};
    encode_transparent_p2pkh(&hash160(&public.serialize()), network)
}

fn sign_payload(
    secret: &SecretKey,
    txid: &str,
    amount: Zatoshis,
    from: String,
    to: String,
    timestamp: UnixTimestamp,
) -> TransparentAuthorizationPayload {
    // Mirrors the canonical message the facilitator's own validator hashes;
    // grounded in protocol::validate's private `transparent_signing_message`.
    let message = format!(
        "{}|{}|{}|{}|{}",
        txid,
        amount.0,
        from,
        to,
        timestamp.seconds_since_epoch()
    );
    let secp = Secp256k1::new();
    let hash = zcash_x402_facilitator::protocol::signature::message_hash(message.as_bytes());
    let msg = Message::from_digest(hash);
    let (recid, compact) = secp.sign_ecdsa_recoverable(&msg, secret).serialize_compact();
    let mut signature = Vec::with_capacity(65);
    signature.push(31 + recid.to_i32() as u8);
    signature.extend_from_slice(&compact);

    TransparentAuthorizationPayload {
        txid: txid.to_string(),
        amount,
        from,
        to,
        signature,
        timestamp,
    }
}

#[test]
fn full_round_trip_accepts_a_correctly_signed_payment() {
    let network = ZcashNetwork::Testnet;
    let (secret, public) = keypair();
    let from = transparent_address(&public, network);
    let to = transparent_address(&keypair().1, network);
    let amount = Zatoshis::new(1_000_000);
    let now = UnixTimestamp::try_now().unwrap();

    let record = challenge::issue_challenge(
        "shared-secret",
        Uuid::new_v4(),
        amount,
        to.clone(),
        Scheme::Transparent,
        network,
        3600,
    )
    .unwrap();

    let payload = sign_payload(&secret, "cafef00d", amount, from, to, now);
    let authorization = Authorization {
        x402_version: 1,
        scheme: Scheme::Transparent,
        network,
        payload: AuthorizationPayload::Transparent(payload),
    };

    validate_authorization(&authorization, &record, "shared-secret", now, 3600, |_| false)
        .expect("well-formed authorization should validate");
}

#[test]
fn rejects_a_tampered_recipient() {
    let network = ZcashNetwork::Testnet;
    let (secret, public) = keypair();
    let from = transparent_address(&public, network);
    let pinned_to = transparent_address(&keypair().1, network);
    let diverted_to = transparent_address(&keypair().1, network);
    let amount = Zatoshis::new(42_000_000);
    let now = UnixTimestamp::try_now().unwrap();

    let record = challenge::issue_challenge(
        "shared-secret",
        Uuid::new_v4(),
        amount,
        pinned_to,
        Scheme::Transparent,
        network,
        3600,
    )
    .unwrap();

    let payload = sign_payload(&secret, "beadfeed", amount, from, diverted_to, now);
    let authorization = Authorization {
        x402_version: 1,
        scheme: Scheme::Transparent,
        network,
        payload: AuthorizationPayload::Transparent(payload),
    };

    let err = validate_authorization(&authorization, &record, "shared-secret", now, 3600, |_| false)
        .unwrap_err();
    assert_eq!(err, InvalidReason::RecipientMismatch);
}

#[test]
fn rejects_a_txid_already_bound_to_another_intent() {
    let network = ZcashNetwork::Testnet;
    let (secret, public) = keypair();
    let from = transparent_address(&public, network);
    let to = transparent_address(&keypair().1, network);
    let amount = Zatoshis::new(7_500_000);
    let now = UnixTimestamp::try_now().unwrap();

    let record = challenge::issue_challenge(
        "shared-secret",
        Uuid::new_v4(),
        amount,
        to.clone(),
        Scheme::Transparent,
        network,
        3600,
    )
    .unwrap();

    let payload = sign_payload(&secret, "decafbad", amount, from, to, now);
    let authorization = Authorization {
        x402_version: 1,
        scheme: Scheme::Transparent,
        network,
        payload: AuthorizationPayload::Transparent(payload),
    };

    let err =
        validate_authorization(&authorization, &record, "shared-secret", now, 3600, |_| true)
            .unwrap_err();
    assert_eq!(err, InvalidReason::DuplicateTxid);
}

#[test]
fn rejects_an_expired_challenge() {
    let network = ZcashNetwork::Testnet;
    let (secret, public) = keypair();
    let from = transparent_address(&public, network);
    let to = transparent_address(&keypair().1, network);
    let amount = Zatoshis::new(1_000);

    let record = challenge::issue_challenge(
        "shared-secret",
        Uuid::new_v4(),
        amount,
        to.clone(),
        Scheme::Transparent,
        network,
        1,
    )
    .unwrap();

    let far_future = record.expires_at + 10_000;
    let payload = sign_payload(&secret, "aaaa", amount, from, to, far_future);
    let authorization = Authorization {
        x402_version: 1,
        scheme: Scheme::Transparent,
        network,
        payload: AuthorizationPayload::Transparent(payload),
    };

    let err = validate_authorization(
        &authorization,
        &record,
        "shared-secret",
        far_future,
        3600,
        |_| false,
    )
    .unwrap_err();
    assert_eq!(err, InvalidReason::ChallengeExpired);
}
