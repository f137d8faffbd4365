//! Merkle root over transaction ids

use crate::hash::double_sha256_pair;
use crate::types::Hash;

/// ComputeMerkleRoot: ℍ* → ℍ ∪ {⊥}
///
/// Pairs adjacent leaves and double-hashes their concatenation, level by
/// level. An odd level duplicates its last node. No leaves means no root.
pub fn merkle_root(leaves: &[Hash]) -> Option<Hash> {
    if leaves.is_empty() {
        return None;
    }

    let mut level = leaves.to_vec();

    // Build the tree bottom-up
    while level.len() > 1 {
        let mut next_level = Vec::with_capacity((level.len() + 1) / 2);

        for chunk in level.chunks(2) {
            let left = &chunk[0];
            // Odd number: duplicate the last hash
            let right = chunk.get(1).unwrap_or(left);
            next_level.push(double_sha256_pair(left, right));
        }

        level = next_level;
    }

    Some(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_root() {
        assert_eq!(merkle_root(&[]), None);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = [0x42u8; 32];
        assert_eq!(merkle_root(&[leaf]), Some(leaf));
    }

    #[test]
    fn test_two_leaves() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(merkle_root(&[a, b]), Some(double_sha256_pair(&a, &b)));
    }

    #[test]
    fn test_three_leaves_duplicates_last() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        let ab = double_sha256_pair(&a, &b);
        let cc = double_sha256_pair(&c, &c);
        let expected = double_sha256_pair(&ab, &cc);
        assert_eq!(merkle_root(&[a, b, c]), Some(expected));
        // Explicitly duplicating the last leaf gives the same root
        assert_eq!(merkle_root(&[a, b, c, c]), Some(expected));
    }

    #[test]
    fn test_order_matters() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }
}
