//! Protocol constants

/// Size of the message envelope header: magic + command + length + checksum
pub const MESSAGE_HEADER_SIZE: usize = 24;

/// Width of the NUL-padded command field
pub const COMMAND_SIZE: usize = 12;

/// Default maximum message payload: 4MB
pub const MAX_MESSAGE_SIZE: usize = 4_000_000;

/// Maximum block size in virtual bytes, also the transaction count ceiling
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Serialized block header size
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Minimum serialized input size: prevout + script length + sequence
pub const MIN_INPUT_SIZE: usize = 41;

/// Minimum serialized output size: value + script length
pub const MIN_OUTPUT_SIZE: usize = 9;

/// Serialized network address without timestamp
pub const NET_ADDRESS_SIZE: usize = 26;

/// Serialized network address with timestamp (`addr` entries)
pub const TIMED_NET_ADDRESS_SIZE: usize = 30;

/// Serialized inventory vector
pub const INV_ITEM_SIZE: usize = 36;

/// Block height placeholder meaning "unknown" in compact forms
pub const UNKNOWN_HEIGHT: u32 = 0x7fff_ffff;

/// Initial block subsidy: 50 coins in base units
pub const INITIAL_SUBSIDY: u64 = 50 * 100_000_000;

/// Base units per coin
pub const SATOSHIS_PER_COIN: u64 = 100_000_000;

/// Largest representable amount: the sign bit of the 8-byte encoding must stay clear
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Sequence number for final inputs
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Header that marks a witness commitment output: OP_RETURN PUSH36 0xaa21a9ed
pub const WITNESS_COMMITMENT_HEADER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Service bits advertised in `version` and address records
pub mod services {
    pub const NETWORK: u64 = 1 << 0;
    pub const GETUTXO: u64 = 1 << 1;
    pub const BLOOM: u64 = 1 << 2;
    pub const WITNESS: u64 = 1 << 3;
}

/// Inventory vector type codes
pub mod inv {
    pub const ERROR: u32 = 0;
    pub const TX: u32 = 1;
    pub const BLOCK: u32 = 2;
    pub const FILTERED_BLOCK: u32 = 3;
    pub const WITNESS_FLAG: u32 = 1 << 30;
}

/// `reject` message codes
pub mod reject {
    pub const MALFORMED: u8 = 0x01;
    pub const INVALID: u8 = 0x10;
    pub const OBSOLETE: u8 = 0x11;
    pub const DUPLICATE: u8 = 0x12;
    pub const NONSTANDARD: u8 = 0x40;
    pub const DUST: u8 = 0x41;
    pub const INSUFFICIENT_FEE: u8 = 0x42;
    pub const CHECKPOINT: u8 = 0x43;
}
