//! Zcash address validation (spec §4.1.2).
//!
//! Transparent addresses are Base58Check-decoded and matched against the
//! known mainnet/testnet P2PKH and P2SH version-prefix constants. Shielded
//! addresses are only format-validated here (human-readable prefix and
//! length band); cryptographic validity is delegated to the Zcash node.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::config::ZcashNetwork;

/// Two-byte Base58Check version prefixes for Zcash transparent addresses.
mod prefix {
    /// t1..., mainnet P2PKH.
    pub const MAINNET_P2PKH: [u8; 2] = [0x1C, 0xB8];
    /// t3..., mainnet P2SH.
    pub const MAINNET_P2SH: [u8; 2] = [0x1C, 0xBD];
    /// tm..., testnet P2PKH.
    pub const TESTNET_P2PKH: [u8; 2] = [0x1D, 0x25];
    /// t2..., testnet P2SH.
    pub const TESTNET_P2SH: [u8; 2] = [0x1C, 0xBA];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparentAddressKind {
    P2pkh,
    P2sh,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("base58check decode failed")]
    Base58,
    #[error("address checksum mismatch")]
    BadChecksum,
    #[error("unrecognized address version prefix")]
    UnknownPrefix,
    #[error("address network does not match required network")]
    NetworkMismatch,
    #[error("shielded address format is invalid")]
    BadShieldedFormat,
}

/// Base58Check-decode `address`, verify its double-SHA256 checksum, and
/// classify it against the known transparent version prefixes for
/// `network`. Returns the 20-byte pubkey/script hash on success.
pub fn decode_transparent(
    address: &str,
    network: ZcashNetwork,
) -> Result<(TransparentAddressKind, [u8; 20]), AddressError> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::Base58)?;
    if raw.len() != 2 + 20 + 4 {
        return Err(AddressError::Base58);
    }
    let (payload, checksum) = raw.split_at(raw.len() - 4);
    let digest = Sha256::digest(Sha256::digest(payload));
    if &digest[0..4] != checksum {
        return Err(AddressError::BadChecksum);
    }
    let version = [payload[0], payload[1]];
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[2..]);

    let (kind, expected_network) = match version {
        v if v == prefix::MAINNET_P2PKH => (TransparentAddressKind::P2pkh, ZcashNetwork::Mainnet),
        v if v == prefix::MAINNET_P2SH => (TransparentAddressKind::P2sh, ZcashNetwork::Mainnet),
        v if v == prefix::TESTNET_P2PKH => (TransparentAddressKind::P2pkh, ZcashNetwork::Testnet),
        v if v == prefix::TESTNET_P2SH => (TransparentAddressKind::P2sh, ZcashNetwork::Testnet),
        _ => return Err(AddressError::UnknownPrefix),
    };
    if expected_network != network {
        return Err(AddressError::NetworkMismatch);
    }
    Ok((kind, hash))
}

/// Base58Check-encode a 20-byte P2PKH hash for `network`.
pub fn encode_transparent_p2pkh(hash: &[u8; 20], network: ZcashNetwork) -> String {
    let version = match network {
        ZcashNetwork::Mainnet => prefix::MAINNET_P2PKH,
        ZcashNetwork::Testnet => prefix::TESTNET_P2PKH,
    };
    let mut payload = Vec::with_capacity(2 + 20);
    payload.extend_from_slice(&version);
    payload.extend_from_slice(hash);
    let checksum = Sha256::digest(Sha256::digest(&payload));
    payload.extend_from_slice(&checksum[0..4]);
    bs58::encode(payload).into_string()
}

/// RIPEMD-160(SHA-256(pubkey)), the public-key hash used inside a P2PKH
/// transparent address (spec §4.1.1).
pub fn hash160(pubkey: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(pubkey);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Format-validate (not cryptographically validate) a Sapling shielded
/// address: human-readable prefix (`zs`/`ztestsapling`) and a length band
/// of roughly 50-100 characters (spec §4.1.2).
pub fn validate_shielded_format(
    address: &str,
    network: ZcashNetwork,
) -> Result<(), AddressError> {
    let expected_prefix = match network {
        ZcashNetwork::Mainnet => "zs",
        ZcashNetwork::Testnet => "ztestsapling",
    };
    if !address.starts_with(expected_prefix) {
        return Err(AddressError::BadShieldedFormat);
    }
    if !(50..=100).contains(&address.len()) {
        return Err(AddressError::BadShieldedFormat);
    }
    if !address
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AddressError::BadShieldedFormat);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mainnet_p2pkh() {
        let hash = [7u8; 20];
        let encoded = encode_transparent_p2pkh(&hash, ZcashNetwork::Mainnet);
        assert!(encoded.starts_with('t'));
        let (kind, decoded) = decode_transparent(&encoded, ZcashNetwork::Mainnet).unwrap();
        assert_eq!(kind, TransparentAddressKind::P2pkh);
        assert_eq!(decoded, hash);
    }

    #[test]
    fn rejects_wrong_network() {
        let hash = [1u8; 20];
        let encoded = encode_transparent_p2pkh(&hash, ZcashNetwork::Testnet);
        let err = decode_transparent(&encoded, ZcashNetwork::Mainnet).unwrap_err();
        assert_eq!(err, AddressError::NetworkMismatch);
    }

    #[test]
    fn rejects_bad_checksum() {
        let hash = [1u8; 20];
        let mut encoded_bytes = bs58::decode(encode_transparent_p2pkh(&hash, ZcashNetwork::Mainnet))
            .into_vec()
            .unwrap();
        let last = encoded_bytes.len() - 1;
        encoded_bytes[last] ^= 0xFF;
        let tampered = bs58::encode(encoded_bytes).into_string();
        let err = decode_transparent(&tampered, ZcashNetwork::Mainnet).unwrap_err();
        assert_eq!(err, AddressError::BadChecksum);
    }

    #[test]
    fn shielded_prefix_and_length_band() {
        let too_short = "zs1abc";
        assert_eq!(
            validate_shielded_format(too_short, ZcashNetwork::Mainnet).unwrap_err(),
            AddressError::BadShieldedFormat
        );
        let plausible = format!("zs1{}", "a".repeat(60));
        assert!(validate_shielded_format(&plausible, ZcashNetwork::Mainnet).is_ok());
    }
}
