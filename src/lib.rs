//! # Consensus-Wire
//!
//! Wire-protocol parsing and block-level consensus checks for a Bitcoin-style
//! peer-to-peer node.
//!
//! The crate turns raw peer bytes into typed messages, assembles and
//! structurally verifies blocks, canonicalizes ECDSA signatures and models
//! transaction outputs as immutable values. It never performs I/O and never
//! installs a logger; diagnostics go through the `log` facade.
//!
//! ## Layers
//!
//! - Framing: [`parser::Parser`] splits a byte stream into checksummed envelopes
//! - Payloads: [`network`] decodes each command's body into a record
//! - Consensus objects: [`transaction`], [`block`], [`output`], [`coin`]
//! - Rules: [`merkle`], [`segwit`], [`economic`], [`pow`], [`signature`]
//!
//! ## Usage
//!
//! ```rust
//! use consensus_wire::{ConsensusWire, Network, Event, Payload};
//!
//! let node = ConsensusWire::new(Network::Main);
//! let mut parser = node.parser();
//!
//! let raw = node.frame("ping", &7u64.to_le_bytes()).unwrap();
//! let events = parser.feed(&raw).unwrap();
//! assert!(matches!(
//!     &events[0],
//!     Event::Message { payload: Payload::Ping(7), .. }
//! ));
//! ```

pub mod types;
pub mod constants;
pub mod params;
pub mod error;
pub mod hash;
pub mod codec;
pub mod script;
pub mod amount;
pub mod output;
pub mod transaction;
pub mod coin;
pub mod merkle;
pub mod segwit;
pub mod economic;
pub mod pow;
pub mod block;
pub mod signature;
pub mod network;
pub mod parser;

// Re-export commonly used types
pub use types::*;
pub use amount::Amount;
pub use block::{AcceptHeaders, Block, BlockHeader, BlockSummary, CompactBlockView, HeaderCheck};
pub use coin::Coin;
pub use error::{
    ConsensusError, DecodeError, FrameError, Result, SignatureError, ValueError, VerifyError,
};
pub use network::Payload;
pub use output::Output;
pub use params::{Network, NetworkParams};
pub use parser::{frame_message, Event, Parser, ParserState};
pub use pow::ProofOfWork;
pub use signature::{CurveBackend, K256Backend, Secp256k1Backend, VerifyMode};
pub use transaction::{Input, Transaction, TransactionBuilder};

/// Entry point bound to one network
///
/// # Examples
///
/// ```
/// use consensus_wire::{ConsensusWire, Block, Network};
///
/// let node = ConsensusWire::new(Network::Main);
/// let genesis = Block::genesis(node.params()).unwrap();
///
/// assert!(node.verify_block(&genesis).is_ok());
/// assert_eq!(node.block_reward(0), 5_000_000_000);
/// assert_eq!(node.block_reward(210_000), 2_500_000_000);
/// ```
pub struct ConsensusWire {
    params: &'static NetworkParams,
    backend: Secp256k1Backend,
}

impl ConsensusWire {
    pub fn new(network: Network) -> Self {
        Self {
            params: network.params(),
            backend: Secp256k1Backend::new(),
        }
    }

    pub fn params(&self) -> &'static NetworkParams {
        self.params
    }

    /// Fresh framer for one connection
    pub fn parser(&self) -> Parser {
        Parser::new(self.params)
    }

    /// Envelope `payload` under `command` for this network
    pub fn frame(&self, command: &str, payload: &[u8]) -> std::result::Result<Vec<u8>, FrameError> {
        frame_message(self.params, command, payload)
    }

    /// Structural verification with proof-of-work as the header check
    pub fn verify_block(&self, block: &Block) -> std::result::Result<(), VerifyError> {
        block.verify(&ProofOfWork::new(self.params))
    }

    /// Subsidy at `height` on this network's halving schedule
    pub fn block_reward(&self, height: i64) -> u64 {
        economic::block_reward(height, self.params.halving_interval)
    }

    pub fn verify_signature(&self, msg: &[u8], sig: &[u8], key: &[u8], mode: VerifyMode) -> bool {
        signature::verify(&self.backend, msg, sig, key, mode)
    }

    /// Low-S DER signature over a 32-byte digest
    pub fn sign(
        &self,
        msg: &[u8],
        private_key: &[u8],
    ) -> std::result::Result<Vec<u8>, SignatureError> {
        signature::sign(&self.backend, msg, private_key)
    }
}

impl Default for ConsensusWire {
    fn default() -> Self {
        Self::new(Network::Main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_binds_network() {
        let node = ConsensusWire::new(Network::Regtest);
        assert_eq!(node.params().network, Network::Regtest);
        assert_eq!(node.block_reward(150), 2_500_000_000);

        let raw = node.frame("verack", &[]).unwrap();
        assert_eq!(&raw[..4], &node.params().magic.to_le_bytes());
        assert_eq!(node.parser().feed(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_facade_sign_verify() {
        let node = ConsensusWire::default();
        let msg = [0x42u8; 32];
        let key = [0x11u8; 32];
        let public = signature::public_key_create(&node.backend, &key, true).unwrap();
        let sig = node.sign(&msg, &key).unwrap();
        assert!(signature::is_low_s(&sig));
        assert!(node.verify_signature(&msg, &sig, &public, VerifyMode::Strict));
        assert!(!node.verify_signature(&[0u8; 32], &sig, &public, VerifyMode::Strict));
    }
}
