//! Error types for wire decoding and consensus validation
//!
//! Failures are split by disposition:
//! - [`FrameError`]: transport-fatal, the stream must be torn down
//! - [`DecodeError`]: one malformed message, the stream continues
//! - [`ValueError`] / [`VerifyError`]: construction invariants, caller decides
//! - [`SignatureError`]: signing and key handling only; verification returns `bool`

use thiserror::Error;

/// Framing errors. Any of these ends the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid magic value: {0:08x}")]
    BadMagic(u32),

    #[error("command not NUL-terminated")]
    UnterminatedCommand,

    #[error("packet length too large: {length} bytes (max {max})")]
    PayloadTooLarge { length: usize, max: usize },

    #[error("invalid checksum: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("parser closed after fatal error")]
    Closed,
}

/// Payload decoding errors, scoped to a single message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated {field}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid witness tx (marker != 0)")]
    InvalidWitnessMarker,

    #[error("invalid witness tx (flag == 0)")]
    InvalidWitnessFlag,

    #[error("superfluous witness record")]
    SuperfluousWitness,

    #[error("{trailing} trailing bytes after {what}")]
    TrailingData { what: &'static str, trailing: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid value: {0}")]
    InvalidValue(#[from] ValueError),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(err.to_string())
    }
}

/// Monetary value invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("value is negative")]
    Negative,

    #[error("value exceeds 63 bits")]
    Overflow,

    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
}

/// Block structural verification failures. `Display` is the rule name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("bad header: {0}")]
    BadHeader(String),

    #[error("too many transactions")]
    TooManyTransactions,

    #[error("block too large")]
    TooLarge,

    #[error("no coinbase")]
    NoCoinbase,

    #[error("duplicate coinbase")]
    DuplicateCoinbase,

    #[error("duplicate txid")]
    DuplicateTxid,

    #[error("merkle root mismatch")]
    MerkleRootMismatch,

    #[error("witness commitment mismatch")]
    WitnessCommitmentMismatch,
}

impl VerifyError {
    /// Short name of the violated rule
    pub fn reason(&self) -> &'static str {
        match self {
            VerifyError::BadHeader(_) => "bad header",
            VerifyError::TooManyTransactions => "too many transactions",
            VerifyError::TooLarge => "block too large",
            VerifyError::NoCoinbase => "no coinbase",
            VerifyError::DuplicateCoinbase => "duplicate coinbase",
            VerifyError::DuplicateTxid => "duplicate txid",
            VerifyError::MerkleRootMismatch => "merkle root mismatch",
            VerifyError::WitnessCommitmentMismatch => "witness commitment mismatch",
        }
    }
}

/// Signing and key handling errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid message length: {0} (expected 32)")]
    InvalidMessage(usize),

    #[error("curve backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Framing failed: {0}")]
    Frame(#[from] FrameError),

    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Value out of range: {0}")]
    Value(#[from] ValueError),

    #[error("Block validation failed: {0}")]
    BlockValidation(#[from] VerifyError),

    #[error("Signature operation failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
