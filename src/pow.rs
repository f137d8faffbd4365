//! Proof-of-work header check

use crate::block::{BlockHeader, HeaderCheck};
use crate::hash::hash_from_display_hex;
use crate::params::NetworkParams;

/// CheckProofOfWork: ℋ → {true, false}
///
/// A header passes when its compact target is well formed, does not exceed
/// the network's proof-of-work limit, and the header hash (read as a
/// little-endian 256-bit integer) is at or below that target.
#[derive(Debug, Clone, Copy)]
pub struct ProofOfWork {
    params: &'static NetworkParams,
}

impl ProofOfWork {
    pub fn new(params: &'static NetworkParams) -> Self {
        Self { params }
    }
}

impl HeaderCheck for ProofOfWork {
    fn check_header(&self, header: &BlockHeader) -> Result<(), String> {
        let target = expand_target(header.bits)?;
        let limit = hash_from_display_hex(self.params.pow_limit)
            .map(|bytes| U256::from_le_bytes(&bytes))
            .map_err(|e| format!("bad pow limit: {}", e))?;

        if target.is_zero() || target > limit {
            return Err("target out of range".to_string());
        }
        if U256::from_le_bytes(&header.hash()) > target {
            return Err("high-hash".to_string());
        }
        Ok(())
    }
}

/// 256-bit integer for target comparisons, least significant word first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct U256([u64; 4]);

impl U256 {
    fn zero() -> Self {
        U256([0; 4])
    }

    fn is_zero(&self) -> bool {
        self.0.iter().all(|&x| x == 0)
    }

    fn shl(&self, shift: u32) -> Self {
        if shift >= 256 {
            return U256::zero();
        }

        let mut result = U256::zero();
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;

        for i in 0..4 {
            if i + word_shift < 4 {
                result.0[i + word_shift] |= self.0[i] << bit_shift;
                if bit_shift > 0 && i + word_shift + 1 < 4 {
                    result.0[i + word_shift + 1] |= self.0[i] >> (64 - bit_shift);
                }
            }
        }

        result
    }

    fn from_le_bytes(bytes: &[u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_le_bytes(buf);
        }
        U256(words)
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

/// Expand a compact target.
///
/// Format `0x1d00ffff`: the high byte is the size in bytes, the low three
/// bytes the mantissa. Target = mantissa * 256^(size - 3). The mantissa's
/// top bit is a sign bit; negative targets are rejected.
fn expand_target(bits: u32) -> Result<U256, String> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;

    if bits & 0x0080_0000 != 0 && mantissa != 0 {
        return Err("negative target".to_string());
    }

    if exponent <= 3 {
        let value = mantissa >> (8 * (3 - exponent));
        return Ok(U256([value as u64, 0, 0, 0]));
    }

    // The mantissa has 23 significant bits at most
    let shift = 8 * (exponent - 3);
    let significant = 32 - mantissa.leading_zeros();
    if mantissa != 0 && shift + significant > 256 {
        return Err("target overflow".to_string());
    }

    Ok(U256([mantissa as u64, 0, 0, 0]).shl(shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::params::{MAIN, REGTEST};

    #[test]
    fn test_expand_target_genesis_bits() {
        let target = expand_target(0x1d00ffff).unwrap();
        // 0xffff << 208: bits 208..224 set, which is word 3 bits 16..32
        assert_eq!(target, U256([0, 0, 0, 0xffff_0000]));
    }

    #[test]
    fn test_expand_target_small_exponent() {
        assert_eq!(expand_target(0x0300ffff).unwrap(), U256([0xffff, 0, 0, 0]));
        assert_eq!(expand_target(0x0200ffff).unwrap(), U256([0xff, 0, 0, 0]));
        assert!(expand_target(0x01003456).unwrap().is_zero());
    }

    #[test]
    fn test_expand_target_rejects() {
        assert!(expand_target(0x04923456).is_err());
        assert!(expand_target(0xff123456).is_err());
        // Regtest's limit still fits
        assert!(expand_target(0x207fffff).is_ok());
    }

    #[test]
    fn test_genesis_has_valid_pow() {
        let genesis = Block::genesis(&MAIN).unwrap();
        assert!(ProofOfWork::new(&MAIN).check_header(genesis.header()).is_ok());
    }

    #[test]
    fn test_high_hash_rejected() {
        let mut header = *Block::genesis(&MAIN).unwrap().header();
        header.nonce = header.nonce.wrapping_add(1);
        assert_eq!(
            ProofOfWork::new(&MAIN).check_header(&header),
            Err("high-hash".to_string())
        );
    }

    #[test]
    fn test_target_above_limit() {
        let mut header = *Block::genesis(&MAIN).unwrap().header();
        header.bits = 0x207fffff;
        assert_eq!(
            ProofOfWork::new(&MAIN).check_header(&header),
            Err("target out of range".to_string())
        );
        // Regtest accepts almost any hash at that target
        assert_ne!(
            ProofOfWork::new(&REGTEST).check_header(&header),
            Err("target out of range".to_string())
        );
    }
}
