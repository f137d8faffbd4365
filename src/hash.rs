//! Hashing helpers
//!
//! All double hashing goes through the `sha256d` engine; HASH160 is
//! RIPEMD160(SHA256(x)) as used by address derivation.

use crate::error::DecodeError;
use crate::types::Hash;
use bitcoin_hashes::{sha256d, Hash as BitcoinHash, HashEngine};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

/// SHA256(SHA256(left || right))
pub fn double_sha256_pair(left: &[u8], right: &[u8]) -> Hash {
    let mut engine = sha256d::Hash::engine();
    engine.input(left);
    engine.input(right);
    sha256d::Hash::from_engine(engine).into_inner()
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    out
}

/// Envelope checksum: first four bytes of the double hash
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let hash = double_sha256(payload);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Hex in display order (byte-reversed), as explorers and JSON show hashes
pub fn to_display_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a display-order hex hash into internal byte order
pub fn hash_from_display_hex(s: &str) -> Result<Hash, DecodeError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(DecodeError::Malformed(format!(
            "hash must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    hash.reverse();
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256_empty() {
        assert_eq!(
            hex::encode(double_sha256(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_pair_matches_concat() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let mut joined = a.to_vec();
        joined.extend_from_slice(&b);
        assert_eq!(double_sha256_pair(&a, &b), double_sha256(&joined));
    }

    #[test]
    fn test_checksum_empty_payload() {
        // Well-known checksum of an empty payload (verack)
        assert_eq!(checksum(&[]), [0x5d, 0xf6, 0xe0, 0xe2]);
    }

    #[test]
    fn test_display_hex_roundtrip() {
        let display = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let hash = hash_from_display_hex(display).unwrap();
        assert_eq!(hash[0], 0x6f);
        assert_eq!(to_display_hex(&hash), display);
    }

    #[test]
    fn test_display_hex_wrong_length() {
        assert!(hash_from_display_hex("abcd").is_err());
        assert!(hash_from_display_hex("zz").is_err());
    }

    #[test]
    fn test_hash160_length() {
        let h = hash160(b"hello world");
        assert_eq!(hex::encode(h), "d7d5ee7824ff93f94c3055af9382c86c68b5ca92");
    }
}
