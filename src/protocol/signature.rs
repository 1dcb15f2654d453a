//! Transparent-scheme signature verification (spec §4.1.1, §9).
//!
//! A 65-byte "Bitcoin Signed Message" signature is verified by recovering
//! the signer's secp256k1 public key from the message hash, hashing it to
//! a P2PKH address, and comparing against the claimed `from` address. The
//! facilitator never rolls its own EC math — recovery is delegated to the
//! `secp256k1` library.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};

use crate::config::ZcashNetwork;
use crate::protocol::address;

const MESSAGE_PREFIX: &str = "\x18Bitcoin Signed Message:\n";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature must be exactly 65 bytes")]
    BadLength,
    #[error("signature recovery id out of range")]
    BadRecoveryId,
    #[error("signature is malformed")]
    Malformed,
    #[error("public key recovery failed")]
    RecoveryFailed,
    #[error("recovered address does not match claimed sender")]
    AddressMismatch,
}

/// Bitcoin-compatible varint encoding of a message's byte length.
fn varint(len: usize) -> Vec<u8> {
    let len = len as u64;
    if len < 0xfd {
        vec![len as u8]
    } else if len <= 0xffff {
        let mut out = vec![0xfd];
        out.extend_from_slice(&(len as u16).to_le_bytes());
        out
    } else if len <= 0xffff_ffff {
        let mut out = vec![0xfe];
        out.extend_from_slice(&(len as u32).to_le_bytes());
        out
    } else {
        let mut out = vec![0xff];
        out.extend_from_slice(&len.to_le_bytes());
        out
    }
}

/// `doubleSHA256("\x18Bitcoin Signed Message:\n" | varint(len(msg)) | msg)`.
pub fn message_hash(message: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(MESSAGE_PREFIX.len() + 9 + message.len());
    buf.extend_from_slice(MESSAGE_PREFIX.as_bytes());
    buf.extend_from_slice(&varint(message.len()));
    buf.extend_from_slice(message);
    let first = Sha256::digest(&buf);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// Recovers the signer's address from a 65-byte compact signature
/// (`header(1) | r(32) | s(32)`, header = 27 + recovery_id + (4 if the
/// recovered key should be serialized compressed)) and compares it to
/// `expected_from`.
pub fn verify_transparent_signature(
    message: &[u8],
    signature: &[u8],
    expected_from: &str,
    network: ZcashNetwork,
) -> Result<(), SignatureError> {
    if signature.len() != 65 {
        return Err(SignatureError::BadLength);
    }
    let header = signature[0];
    if !(27..=34).contains(&header) {
        return Err(SignatureError::BadRecoveryId);
    }
    let compressed = header >= 31;
    let recid_value = if compressed {
        (header - 31) as i32
    } else {
        (header - 27) as i32
    };
    let recovery_id = RecoveryId::from_i32(recid_value).map_err(|_| SignatureError::BadRecoveryId)?;

    let mut compact = [0u8; 64];
    compact.copy_from_slice(&signature[1..65]);
    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|_| SignatureError::Malformed)?;

    let hash = message_hash(message);
    let msg = Message::from_digest(hash);

    let secp = Secp256k1::verification_only();
    let pubkey: PublicKey = secp
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    let pubkey_bytes = if compressed {
        pubkey.serialize().to_vec()
    } else {
        pubkey.serialize_uncompressed().to_vec()
    };
    let hash160 = address::hash160(&pubkey_bytes);
    let recovered_address = address::encode_transparent_p2pkh(&hash160, network);

    if recovered_address == expected_from {
        Ok(())
    } else {
        Err(SignatureError::AddressMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    #[test]
    fn recovers_and_matches_signer_address() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &secret);
        let message = b"pay-intent-authorization";
        let hash = message_hash(message);
        let msg = Message::from_digest(hash);
        let (recid, compact) = secp.sign_ecdsa_recoverable(&msg, &secret).serialize_compact();

        let mut signature = Vec::with_capacity(65);
        signature.push(31 + recid.to_i32() as u8); // compressed header
        signature.extend_from_slice(&compact);

        let hash160 = address::hash160(&pubkey.serialize());
        let from = address::encode_transparent_p2pkh(&hash160, ZcashNetwork::Testnet);

        verify_transparent_signature(message, &signature, &from, ZcashNetwork::Testnet).unwrap();
    }

    #[test]
    fn rejects_wrong_length() {
        let err = verify_transparent_signature(b"msg", &[0u8; 10], "tmAddress", ZcashNetwork::Testnet)
            .unwrap_err();
        assert_eq!(err, SignatureError::BadLength);
    }
}
