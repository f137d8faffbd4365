//! Core shared types

use serde::{Deserialize, Serialize};

/// Hash type: 256-bit hash, internal (wire) byte order
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Witness stack: ordered byte strings attached to one input
pub type Witness = Vec<ByteString>;

/// The all-zero hash
pub const ZERO_HASH: Hash = [0u8; 32];

/// OutPoint: ℍ × ℕ₃₂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// The prevout every coinbase input spends
    pub fn null() -> Self {
        Self {
            hash: ZERO_HASH,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash == ZERO_HASH && self.index == u32::MAX
    }
}
