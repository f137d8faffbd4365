//! Network parameter tables
//!
//! Static, read-only configuration per network. The wire and consensus code
//! only ever reads these through `&'static NetworkParams`.

use crate::constants::MAX_MESSAGE_SIZE;
use crate::hash::hash_from_display_hex;
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base58 version bytes for each address kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPrefixes {
    pub pubkeyhash: u8,
    pub scripthash: u8,
    pub witnesspubkeyhash: u8,
    pub witnessscripthash: u8,
}

/// Per-network consensus and wire parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    pub magic: u32,
    pub port: u16,
    pub address: AddressPrefixes,
    /// Witness program version used by witness addresses
    pub witness_version: u8,
    pub privkey_prefix: u8,
    pub xpubkey: u32,
    pub xprivkey: u32,
    /// Proof-of-work limit, display order hex
    pub pow_limit: &'static str,
    pub halving_interval: u64,
    /// `None` when BIP34 is never enforced by height
    pub bip34_height: Option<u32>,
    pub segwit_height: u32,
    pub max_message_size: usize,
    /// Genesis block hash, display order hex
    pub genesis_hash: &'static str,
    /// Raw genesis block, hex
    pub genesis_block: &'static str,
    /// Checkpoints as (height, display order hex hash)
    pub checkpoints: &'static [(u32, &'static str)],
}

impl NetworkParams {
    /// Genesis hash in internal byte order
    pub fn genesis_hash(&self) -> Hash {
        hash_from_display_hex(self.genesis_hash).unwrap_or([0u8; 32])
    }

    /// Checkpoint hash at `height`, internal byte order
    pub fn checkpoint(&self, height: u32) -> Option<Hash> {
        self.checkpoints
            .iter()
            .find(|(h, _)| *h == height)
            .and_then(|(_, hash)| hash_from_display_hex(hash).ok())
    }

    /// Highest checkpointed height
    pub fn last_checkpoint(&self) -> Option<u32> {
        self.checkpoints.iter().map(|(h, _)| *h).max()
    }
}

/// Network selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Testnet,
    Regtest,
    Segnet,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Main,
        Network::Testnet,
        Network::Regtest,
        Network::Segnet,
    ];

    pub fn params(self) -> &'static NetworkParams {
        match self {
            Network::Main => &MAIN,
            Network::Testnet => &TESTNET,
            Network::Regtest => &REGTEST,
            Network::Segnet => &SEGNET,
        }
    }

    /// Look up a network by its wire magic
    pub fn from_magic(magic: u32) -> Option<Network> {
        Self::ALL.into_iter().find(|n| n.params().magic == magic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
            Network::Segnet => "segnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "main" | "mainnet" => Ok(Network::Main),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            "segnet" => Ok(Network::Segnet),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

const MAIN_GENESIS_BLOCK: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c0101000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

const SEGNET_GENESIS_BLOCK: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a7d719856ffff001d000000000101000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

pub static MAIN: NetworkParams = NetworkParams {
    network: Network::Main,
    magic: 0xd9b4bef9,
    port: 8333,
    address: AddressPrefixes {
        pubkeyhash: 0,
        scripthash: 5,
        witnesspubkeyhash: 6,
        witnessscripthash: 10,
    },
    witness_version: 0,
    privkey_prefix: 128,
    xpubkey: 0x0488b21e,
    xprivkey: 0x0488ade4,
    pow_limit: "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    halving_interval: 210_000,
    bip34_height: Some(227_931),
    segwit_height: 2_000_000_000,
    max_message_size: MAX_MESSAGE_SIZE,
    genesis_hash: "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
    genesis_block: MAIN_GENESIS_BLOCK,
    checkpoints: &[
        (11111, "0000000069e244f73d78e8fd29ba2fd2ed618bd6fa2ee92559f542fdb26e7c1d"),
        (33333, "000000002dd5588a74784eaa7ab0507a18ad16a236e7b1ce69f00d7ddfb5d0a6"),
        (74000, "0000000000573993a3c9e41ce34471c079dcf5f52a0e824a81e7f953b8661a20"),
        (105000, "00000000000291ce28027faea320c8d2b054b2e0fe44a773f3eefb151d6bdc97"),
        (134444, "00000000000005b12ffd4cd315cd34ffd4a594f430ac814c91184a0d42d2b0fe"),
        (168000, "000000000000099e61ea72015e79632f216fe6cb33d7899acb35b75c8303b763"),
        (193000, "000000000000059f452a5f7340de6682a977387c17010ff6e6c3bd83ca8b1317"),
        (210000, "000000000000048b95347e83192f69cf0366076336c639f9b7228e9ba171342e"),
        (216116, "00000000000001b4f4b433e81ee46494af945cf96014816a4e2370f11b23df4e"),
        (225430, "00000000000001c108384350f74090433e7fcf79a606b8e797f065b130575932"),
        (250000, "000000000000003887df1f29024b06fc2200b55f8af8f35453d7be294df2d214"),
        (279000, "0000000000000001ae8c72a0b0c301f67e3afca10e819efa9041e458e9bd7e40"),
        (295000, "00000000000000004d9b4ef50f0f9d686fd69db2e03af35a100370c64632a983"),
    ],
};

pub static TESTNET: NetworkParams = NetworkParams {
    network: Network::Testnet,
    magic: 0x0709110b,
    port: 18333,
    address: AddressPrefixes {
        pubkeyhash: 111,
        scripthash: 196,
        witnesspubkeyhash: 3,
        witnessscripthash: 40,
    },
    witness_version: 0,
    privkey_prefix: 239,
    xpubkey: 0x043587cf,
    xprivkey: 0x04358394,
    pow_limit: "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    halving_interval: 210_000,
    bip34_height: Some(21_111),
    segwit_height: 2_000_000_000,
    max_message_size: MAX_MESSAGE_SIZE,
    genesis_hash: "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943",
    genesis_block: "",
    checkpoints: &[(546, "000000002a936ca763904c3c35fce2f3556c559c0214345d31b1bcebf76acb70")],
};

pub static REGTEST: NetworkParams = NetworkParams {
    network: Network::Regtest,
    magic: 0xdab5bffa,
    port: 18444,
    address: AddressPrefixes {
        pubkeyhash: 111,
        scripthash: 196,
        witnesspubkeyhash: 3,
        witnessscripthash: 40,
    },
    witness_version: 0,
    privkey_prefix: 239,
    xpubkey: 0x043587cf,
    xprivkey: 0x04358394,
    pow_limit: "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    halving_interval: 150,
    bip34_height: None,
    segwit_height: 0,
    max_message_size: MAX_MESSAGE_SIZE,
    genesis_hash: "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206",
    genesis_block: "",
    checkpoints: &[],
};

pub static SEGNET: NetworkParams = NetworkParams {
    network: Network::Segnet,
    magic: 0xcaea962e,
    port: 28333,
    address: AddressPrefixes {
        pubkeyhash: 30,
        scripthash: 50,
        witnesspubkeyhash: 3,
        witnessscripthash: 40,
    },
    witness_version: 0,
    privkey_prefix: 158,
    xpubkey: 0x053587cf,
    xprivkey: 0x05358394,
    pow_limit: "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    halving_interval: 210_000,
    bip34_height: None,
    segwit_height: 0,
    max_message_size: MAX_MESSAGE_SIZE,
    genesis_hash: "0d5b9c518ddf053fcac71730830df4526a9949c08f34acf6a1d30464d22f02aa",
    genesis_block: SEGNET_GENESIS_BLOCK,
    checkpoints: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_str_roundtrip() {
        for network in Network::ALL {
            assert_eq!(network.as_str().parse::<Network>().unwrap(), network);
        }
        assert!("dogecoin".parse::<Network>().is_err());
    }

    #[test]
    fn test_from_magic() {
        assert_eq!(Network::from_magic(0xd9b4bef9), Some(Network::Main));
        assert_eq!(Network::from_magic(0xdab5bffa), Some(Network::Regtest));
        assert_eq!(Network::from_magic(0), None);
    }

    #[test]
    fn test_main_checkpoints() {
        let params = Network::Main.params();
        let hash = params.checkpoint(210000).unwrap();
        // Internal order is reversed display order
        assert_eq!(hash[31], 0x00);
        assert_eq!(hash[0], 0x2e);
        assert!(params.checkpoint(1).is_none());
        assert_eq!(params.last_checkpoint(), Some(295000));
    }

    #[test]
    fn test_network_serde_lowercase() {
        let json = serde_json::to_string(&Network::Testnet).unwrap();
        assert_eq!(json, "\"testnet\"");
        let network: Network = serde_json::from_str("\"segnet\"").unwrap();
        assert_eq!(network, Network::Segnet);
    }
}
