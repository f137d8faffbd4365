//! Blocks: header codec, assembly, derived values and structural verification
//!
//! Two shapes exist. [`CompactBlockView`] is what the wire parser yields for a
//! `block` message: the header, the transaction count, the coinbase height
//! and the raw bytes, nothing else decoded. [`Block`] is the fully decoded
//! form, obtained only through an explicit [`CompactBlockView::decode_full`]
//! or [`Block::decode`].

use crate::codec::{compact_size_len, write_compact_size, ByteReader};
use crate::constants::{BLOCK_HEADER_SIZE, MAX_BLOCK_SIZE, UNKNOWN_HEIGHT};
use crate::economic::block_reward;
use crate::error::{DecodeError, VerifyError};
use crate::hash::{double_sha256, hash_from_display_hex, to_display_hex};
use crate::merkle::merkle_root;
use crate::params::NetworkParams;
use crate::script::{first_push, script_num};
use crate::segwit::{compute_commitment, declared_commitment, virtual_size};
use crate::transaction::{is_witness_framed, Input, Transaction};
use crate::types::Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Smallest possible serialized transaction
const MIN_TX_SIZE: usize = 10;

/// Coinbase heights are script numbers of at most this many bytes
const MAX_HEIGHT_PUSH: usize = 4;

/// Block header: ℋ = ℤ₃₂ × ℍ × ℍ × ℕ₃₂ × ℕ₃₂ × ℕ₃₂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_block);
        out.extend_from_slice(&self.merkle_root);
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_HEADER_SIZE);
        self.encode(&mut out);
        out
    }

    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        reader.require("block header", BLOCK_HEADER_SIZE)?;
        Ok(Self {
            version: reader.read_i32("header version")?,
            prev_block: reader.read_hash("header prev_block")?,
            merkle_root: reader.read_hash("header merkle_root")?,
            time: reader.read_u32("header time")?,
            bits: reader.read_u32("header bits")?,
            nonce: reader.read_u32("header nonce")?,
        })
    }

    /// Block id: double hash of the 80-byte header
    pub fn hash(&self) -> Hash {
        double_sha256(&self.to_bytes())
    }

    pub fn hash_hex(&self) -> String {
        to_display_hex(&self.hash())
    }
}

/// Header verification collaborator: proof-of-work, timestamps, checkpoints.
///
/// Runs as the first verification step; an `Err` carries the reason.
pub trait HeaderCheck {
    fn check_header(&self, header: &BlockHeader) -> Result<(), String>;
}

/// Accepts every header, for callers that verify headers elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptHeaders;

impl HeaderCheck for AcceptHeaders {
    fn check_header(&self, _header: &BlockHeader) -> Result<(), String> {
        Ok(())
    }
}

/// Fully decoded block
#[derive(Debug, Clone)]
pub struct Block {
    header: BlockHeader,
    txs: Vec<Transaction>,
    /// Chain height, when the owner knows it
    height: Option<u32>,
    sizes: OnceLock<(usize, usize)>,
    coinbase_height: OnceLock<Option<i64>>,
    commitment: OnceLock<Option<Hash>>,
}

impl Block {
    pub fn new(header: BlockHeader, txs: Vec<Transaction>) -> Self {
        Self {
            header,
            txs,
            height: None,
            sizes: OnceLock::new(),
            coinbase_height: OnceLock::new(),
            commitment: OnceLock::new(),
        }
    }

    /// Assemble a block from header fields and transactions, filling in
    /// the merkle root from the transactions
    pub fn assemble(
        version: i32,
        prev_block: Hash,
        time: u32,
        bits: u32,
        nonce: u32,
        txs: Vec<Transaction>,
    ) -> Self {
        let leaves: Vec<Hash> = txs.iter().map(Transaction::txid).collect();
        let header = BlockHeader {
            version,
            prev_block,
            merkle_root: merkle_root(&leaves).unwrap_or_default(),
            time,
            bits,
            nonce,
        };
        Self::new(header, txs)
    }

    /// Decode the network's genesis block from its parameter table
    pub fn genesis(params: &NetworkParams) -> Result<Self, DecodeError> {
        if params.genesis_block.is_empty() {
            return Err(DecodeError::Malformed(format!(
                "no genesis block for {}",
                params.network
            )));
        }
        let mut block = Self::from_raw(&hex::decode(params.genesis_block)?)?;
        block.height = Some(0);
        Ok(block)
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> String {
        self.header.hash_hex()
    }

    pub fn has_witness(&self) -> bool {
        self.txs.iter().any(Transaction::has_witness)
    }

    fn sizes(&self) -> (usize, usize) {
        *self.sizes.get_or_init(|| {
            let size = BLOCK_HEADER_SIZE
                + compact_size_len(self.txs.len() as u64)
                + self.txs.iter().map(Transaction::size).sum::<usize>();
            let witness = self.txs.iter().map(Transaction::witness_size).sum();
            (size, witness)
        })
    }

    /// Serialized size
    pub fn size(&self) -> usize {
        self.sizes().0
    }

    /// Witness part of the serialized size
    pub fn witness_size(&self) -> usize {
        self.sizes().1
    }

    pub fn virtual_size(&self) -> usize {
        virtual_size(self.size(), self.witness_size())
    }

    /// Serialize the block. Transactions with witness data use witness
    /// framing, so the whole block does iff any of them has a witness.
    pub fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        write_compact_size(out, self.txs.len() as u64);
        for tx in &self.txs {
            tx.encode(out);
        }
    }

    pub fn to_raw(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        self.encode(&mut out);
        out
    }

    /// Decode a full block: header, count, then every transaction
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let header = BlockHeader::decode(reader)?;
        let count = reader.read_count("block tx count", MIN_TX_SIZE)?;
        let mut txs = Vec::with_capacity(count);
        for _ in 0..count {
            txs.push(Transaction::decode(reader)?);
        }
        Ok(Self::new(header, txs))
    }

    pub fn from_raw(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(data);
        let block = Self::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingData {
                what: "block",
                trailing: reader.remaining(),
            });
        }
        Ok(block)
    }

    /// Merkle root over txids; `None` for a block with no transactions
    pub fn merkle_root(&self) -> Option<Hash> {
        let leaves: Vec<Hash> = self.txs.iter().map(Transaction::txid).collect();
        merkle_root(&leaves)
    }

    /// Witness commitment declared by the coinbase, if any
    pub fn commitment_hash(&self) -> Option<Hash> {
        *self
            .commitment
            .get_or_init(|| self.txs.first().and_then(declared_commitment))
    }

    /// Witness commitment computed from the transactions and coinbase nonce
    pub fn compute_commitment(&self) -> Option<Hash> {
        compute_commitment(&self.txs)
    }

    /// Height pushed by the coinbase (BIP34). Unknown for version 1 headers.
    pub fn coinbase_height(&self) -> Option<i64> {
        if self.header.version < 2 {
            return None;
        }
        *self.coinbase_height.get_or_init(|| {
            let input = self.txs.first()?.inputs().first()?;
            height_from_input(input)
        })
    }

    /// Reward for this block's height: the known chain height if set,
    /// otherwise the coinbase height. Unknown heights earn nothing.
    pub fn reward(&self, params: &NetworkParams) -> u64 {
        let height = match self.height {
            Some(height) => height as i64,
            None => self.coinbase_height().unwrap_or(-1),
        };
        block_reward(height, params.halving_interval)
    }

    /// Structural verification. The first failing rule is returned.
    pub fn verify(&self, headers: &dyn HeaderCheck) -> Result<(), VerifyError> {
        let result = self.check(headers);
        if let Err(ref err) = result {
            log::debug!("Block failed verification ({}): {}", err.reason(), self.hash_hex());
        }
        result
    }

    fn check(&self, headers: &dyn HeaderCheck) -> Result<(), VerifyError> {
        // 1. Header checks belong to the collaborator
        headers
            .check_header(&self.header)
            .map_err(VerifyError::BadHeader)?;

        // 2. Size can't be bigger than MAX_BLOCK_SIZE
        if self.txs.len() > MAX_BLOCK_SIZE {
            return Err(VerifyError::TooManyTransactions);
        }
        if self.virtual_size() > MAX_BLOCK_SIZE {
            return Err(VerifyError::TooLarge);
        }

        // 3. First transaction must be a coinbase
        match self.txs.first() {
            Some(tx) if tx.is_coinbase() => {}
            _ => return Err(VerifyError::NoCoinbase),
        }

        let mut seen = HashSet::with_capacity(self.txs.len());
        for (i, tx) in self.txs.iter().enumerate() {
            // 4. The rest must not be coinbases
            if i > 0 && tx.is_coinbase() {
                return Err(VerifyError::DuplicateCoinbase);
            }

            // 5. No duplicate txids
            if !seen.insert(tx.txid()) {
                return Err(VerifyError::DuplicateTxid);
            }
        }

        // 6. Merkle root
        if self.merkle_root() != Some(self.header.merkle_root) {
            return Err(VerifyError::MerkleRootMismatch);
        }

        // 7. Witness commitment, when both sides exist
        if let (Some(declared), Some(computed)) =
            (self.commitment_hash(), self.compute_commitment())
        {
            if declared != computed {
                return Err(VerifyError::WitnessCommitmentMismatch);
            }
        }

        Ok(())
    }

    /// Compact form: header, height (0x7fffffff when unknown), txid list
    pub fn to_compact(&self) -> Vec<u8> {
        let count = self.txs.len();
        let mut out = Vec::with_capacity(
            BLOCK_HEADER_SIZE + 4 + compact_size_len(count as u64) + count * 32,
        );
        self.header.encode(&mut out);
        out.extend_from_slice(&self.height.unwrap_or(UNKNOWN_HEIGHT).to_le_bytes());
        write_compact_size(&mut out, count as u64);
        for tx in &self.txs {
            out.extend_from_slice(&tx.txid());
        }
        out
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.txs == other.txs && self.height == other.height
    }
}

impl Eq for Block {}

fn height_from_input(input: &Input) -> Option<i64> {
    first_push(&input.script).and_then(|push| script_num(push, MAX_HEIGHT_PUSH))
}

/// Lightweight relay form of a block: header and txids only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub header: BlockHeader,
    pub height: Option<u32>,
    pub tx_hashes: Vec<Hash>,
}

impl BlockSummary {
    /// Decode the compact form. A count reaching past the buffer is rejected.
    pub fn from_compact(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(data);
        let header = BlockHeader::decode(&mut reader)?;
        let height = match reader.read_u32("summary height")? {
            UNKNOWN_HEIGHT => None,
            height => Some(height),
        };
        let count = reader.read_count("summary tx count", 32)?;
        let mut tx_hashes = Vec::with_capacity(count);
        for _ in 0..count {
            tx_hashes.push(reader.read_hash("summary txid")?);
        }
        Ok(Self {
            header,
            height,
            tx_hashes,
        })
    }

    pub fn total_tx(&self) -> usize {
        self.tx_hashes.len()
    }
}

/// Cheap view of a `block` payload: only the header, transaction count and
/// coinbase height are decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactBlockView {
    pub header: BlockHeader,
    pub total_tx: u64,
    pub coinbase_height: Option<i64>,
    raw: Vec<u8>,
}

impl CompactBlockView {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(payload);
        reader.require("block", BLOCK_HEADER_SIZE + 1)?;
        let header = BlockHeader::decode(&mut reader)?;
        let total_tx = reader.read_compact_size("block tx count")?;

        let mut coinbase_height = None;
        if header.version > 1 && total_tx > 0 {
            let body = reader.unread();
            let mut coinbase = ByteReader::new(body);
            coinbase.require("coinbase", MIN_TX_SIZE)?;
            coinbase.skip("coinbase version", 4)?;
            if is_witness_framed(body) {
                coinbase.skip("coinbase marker", 2)?;
            }
            if coinbase.read_compact_size("coinbase tx_in count")? > 0 {
                let input = Input::decode(&mut coinbase)?;
                coinbase_height = height_from_input(&input);
            }
        }

        Ok(Self {
            header,
            total_tx,
            coinbase_height,
            raw: payload.to_vec(),
        })
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// The undecoded payload, for relay
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }

    /// Second, explicit decoding step
    pub fn decode_full(&self) -> Result<Block, DecodeError> {
        Block::from_raw(&self.raw)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockJson {
    #[serde(rename = "type")]
    kind: String,
    height: Option<u32>,
    #[serde(default, skip_deserializing)]
    hash: String,
    version: i32,
    prev_block: String,
    merkle_root: String,
    ts: u32,
    bits: u32,
    nonce: u32,
    #[serde(rename = "totalTX")]
    total_tx: usize,
    txs: Vec<Transaction>,
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BlockJson {
            kind: "block".to_string(),
            height: self.height,
            hash: self.hash_hex(),
            version: self.header.version,
            prev_block: to_display_hex(&self.header.prev_block),
            merkle_root: to_display_hex(&self.header.merkle_root),
            ts: self.header.time,
            bits: self.header.bits,
            nonce: self.header.nonce,
            total_tx: self.txs.len(),
            txs: self.txs.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let json = BlockJson::deserialize(deserializer)?;
        if json.kind != "block" {
            return Err(D::Error::custom(format!("expected block, got {}", json.kind)));
        }
        let header = BlockHeader {
            version: json.version,
            prev_block: hash_from_display_hex(&json.prev_block).map_err(D::Error::custom)?,
            merkle_root: hash_from_display_hex(&json.merkle_root).map_err(D::Error::custom)?,
            time: json.ts,
            bits: json.bits,
            nonce: json.nonce,
        };
        let mut block = Block::new(header, json.txs);
        block.height = json.height;
        Ok(block)
    }
}
