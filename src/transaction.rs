//! Transactions: inputs, the construction phase and the wire codec
//!
//! A [`TransactionBuilder`] is the only mutable form. [`TransactionBuilder::finalize`]
//! produces an immutable [`Transaction`] whose ids and sizes are computed
//! exactly once, at finalization.

use crate::amount::Amount;
use crate::codec::{compact_size_len, write_compact_size, write_var_bytes, ByteReader};
use crate::constants::{MIN_INPUT_SIZE, MIN_OUTPUT_SIZE, SEQUENCE_FINAL};
use crate::error::DecodeError;
use crate::hash::{double_sha256, hash_from_display_hex, to_display_hex};
use crate::output::Output;
use crate::segwit::virtual_size;
use crate::types::{ByteString, Hash, OutPoint, Witness, ZERO_HASH};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub prevout: OutPoint,
    pub script: ByteString,
    pub sequence: u32,
    /// Empty unless the input carries segregated witness data
    pub witness: Witness,
}

impl Input {
    pub fn new(prevout: OutPoint, script: ByteString, sequence: u32) -> Self {
        Self {
            prevout,
            script,
            sequence,
            witness: Vec::new(),
        }
    }

    /// Coinbase input spending the null outpoint
    pub fn coinbase(script: ByteString) -> Self {
        Self::new(OutPoint::null(), script, SEQUENCE_FINAL)
    }

    pub fn with_witness(mut self, witness: Witness) -> Self {
        self.witness = witness;
        self
    }

    /// Serialized size without witness data
    pub fn size(&self) -> usize {
        32 + 4 + compact_size_len(self.script.len() as u64) + self.script.len() + 4
    }

    fn witness_size(&self) -> usize {
        compact_size_len(self.witness.len() as u64)
            + self
                .witness
                .iter()
                .map(|item| compact_size_len(item.len() as u64) + item.len())
                .sum::<usize>()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prevout.hash);
        out.extend_from_slice(&self.prevout.index.to_le_bytes());
        write_var_bytes(out, &self.script);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }

    fn encode_witness(&self, out: &mut Vec<u8>) {
        write_compact_size(out, self.witness.len() as u64);
        for item in &self.witness {
            write_var_bytes(out, item);
        }
    }

    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        reader.require("tx_in", MIN_INPUT_SIZE)?;
        let hash = reader.read_hash("tx_in prevout hash")?;
        let index = reader.read_u32("tx_in prevout index")?;
        let script = reader.read_var_bytes("tx_in script")?.to_vec();
        let sequence = reader.read_u32("tx_in sequence")?;
        Ok(Self::new(OutPoint::new(hash, index), script, sequence))
    }
}

/// Whether `p` uses witness framing: zero marker then non-zero flag after the version
pub fn is_witness_framed(p: &[u8]) -> bool {
    p.len() >= 12 && p[4] == 0 && p[5] != 0
}

/// Mutable construction phase of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBuilder {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn locktime(mut self, locktime: u32) -> Self {
        self.locktime = locktime;
        self
    }

    /// Freeze the transaction and compute its ids and sizes
    pub fn finalize(self) -> Transaction {
        let mut tx = Transaction {
            version: self.version,
            inputs: self.inputs,
            outputs: self.outputs,
            locktime: self.locktime,
            txid: ZERO_HASH,
            wtxid: ZERO_HASH,
            size: 0,
            witness_size: 0,
        };

        let mut legacy = Vec::new();
        tx.encode_legacy(&mut legacy);
        tx.txid = double_sha256(&legacy);

        if tx.has_witness() {
            let mut full = Vec::with_capacity(legacy.len() + 2);
            tx.encode_witness(&mut full);
            tx.wtxid = double_sha256(&full);
            tx.size = full.len();
            // Marker and flag count as witness bytes
            tx.witness_size = 2 + tx.inputs.iter().map(Input::witness_size).sum::<usize>();
        } else {
            tx.wtxid = tx.txid;
            tx.size = legacy.len();
        }
        tx
    }
}

/// Finalized transaction: 𝒯𝒳 = ℕ × 𝕀* × 𝒯* × ℕ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    version: u32,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    locktime: u32,
    txid: Hash,
    wtxid: Hash,
    size: usize,
    witness_size: usize,
}

impl Transaction {
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::new()
    }

    /// Back to the construction phase; ids are recomputed on the next finalize
    pub fn into_builder(self) -> TransactionBuilder {
        TransactionBuilder {
            version: self.version,
            inputs: self.inputs,
            outputs: self.outputs,
            locktime: self.locktime,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    /// Double hash of the legacy serialization
    pub fn txid(&self) -> Hash {
        self.txid
    }

    /// Double hash of the witness serialization. The coinbase's is all zeroes.
    pub fn wtxid(&self) -> Hash {
        if self.is_coinbase() {
            return ZERO_HASH;
        }
        self.wtxid
    }

    /// Txid in display order
    pub fn txid_hex(&self) -> String {
        to_display_hex(&self.txid)
    }

    /// A coinbase has exactly one input and it spends the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Serialized size in the framing `encode` picks
    pub fn size(&self) -> usize {
        self.size
    }

    /// Witness bytes including marker and flag; zero for legacy framing
    pub fn witness_size(&self) -> usize {
        self.witness_size
    }

    pub fn base_size(&self) -> usize {
        self.size - self.witness_size
    }

    pub fn virtual_size(&self) -> usize {
        virtual_size(self.size, self.witness_size)
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(Amount::ZERO, |acc, o| acc.checked_add(o.value()))
    }

    /// Legacy serialization: no marker, flag or witness stacks
    pub fn encode_legacy(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(out);
        }
        write_compact_size(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(out);
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
    }

    /// Witness serialization: marker 0x00, flag 0x01, stacks after the outputs
    pub fn encode_witness(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(0x00);
        out.push(0x01);
        write_compact_size(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(out);
        }
        write_compact_size(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(out);
        }
        for input in &self.inputs {
            input.encode_witness(out);
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
    }

    /// Witness framing iff some input carries a witness stack
    pub fn encode(&self, out: &mut Vec<u8>) {
        if self.has_witness() {
            self.encode_witness(out);
        } else {
            self.encode_legacy(out);
        }
    }

    pub fn to_raw(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        self.encode(&mut out);
        out
    }

    /// Decode one transaction, legacy or witness framed, leaving the reader
    /// positioned after it
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        reader.require("tx", 10)?;
        let witness = is_witness_framed(reader.unread());

        let version = reader.read_u32("tx version")?;
        if witness {
            let marker = reader.read_u8("witness marker")?;
            let flag = reader.read_u8("witness flag")?;
            if marker != 0 {
                return Err(DecodeError::InvalidWitnessMarker);
            }
            if flag == 0 {
                return Err(DecodeError::InvalidWitnessFlag);
            }
        }

        let in_count = reader.read_count("tx_in count", MIN_INPUT_SIZE)?;
        let mut inputs = Vec::with_capacity(in_count);
        for _ in 0..in_count {
            inputs.push(Input::decode(reader)?);
        }

        let out_count = reader.read_count("tx_out count", MIN_OUTPUT_SIZE)?;
        let mut outputs = Vec::with_capacity(out_count);
        for _ in 0..out_count {
            outputs.push(Output::decode(reader)?);
        }

        if witness {
            for input in inputs.iter_mut() {
                let items = reader.read_count("witness item count", 1)?;
                let mut stack = Vec::with_capacity(items);
                for _ in 0..items {
                    stack.push(reader.read_var_bytes("witness item")?.to_vec());
                }
                input.witness = stack;
            }
            // Witness framing with nothing but empty stacks would re-encode as legacy
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(DecodeError::SuperfluousWitness);
            }
        }

        let locktime = reader.read_u32("tx locktime")?;

        Ok(TransactionBuilder {
            version,
            inputs,
            outputs,
            locktime,
        }
        .finalize())
    }

    /// Decode a standalone transaction; the buffer must be consumed exactly
    pub fn from_raw(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(data);
        let tx = Self::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingData {
                what: "tx",
                trailing: reader.remaining(),
            });
        }
        Ok(tx)
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        Self::from_raw(&hex::decode(s)?)
    }
}

#[derive(Serialize, Deserialize)]
struct PrevoutJson {
    hash: String,
    index: u32,
}

#[derive(Serialize, Deserialize)]
struct InputJson {
    prevout: PrevoutJson,
    script: String,
    #[serde(default)]
    witness: Vec<String>,
    sequence: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionJson {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_deserializing)]
    hash: String,
    #[serde(default, skip_deserializing)]
    witness_hash: String,
    version: u32,
    inputs: Vec<InputJson>,
    outputs: Vec<Output>,
    locktime: u32,
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TransactionJson {
            kind: "tx".to_string(),
            hash: to_display_hex(&self.txid),
            witness_hash: to_display_hex(&self.wtxid()),
            version: self.version,
            inputs: self
                .inputs
                .iter()
                .map(|input| InputJson {
                    prevout: PrevoutJson {
                        hash: to_display_hex(&input.prevout.hash),
                        index: input.prevout.index,
                    },
                    script: hex::encode(&input.script),
                    witness: input.witness.iter().map(hex::encode).collect(),
                    sequence: input.sequence,
                })
                .collect(),
            outputs: self.outputs.clone(),
            locktime: self.locktime,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let json = TransactionJson::deserialize(deserializer)?;
        if json.kind != "tx" {
            return Err(D::Error::custom(format!("expected tx, got {}", json.kind)));
        }
        let mut builder = TransactionBuilder::new().version(json.version).locktime(json.locktime);
        for input in json.inputs {
            let hash = hash_from_display_hex(&input.prevout.hash).map_err(D::Error::custom)?;
            let script = hex::decode(&input.script).map_err(D::Error::custom)?;
            let witness = input
                .witness
                .iter()
                .map(hex::decode)
                .collect::<Result<Vec<_>, _>>()
                .map_err(D::Error::custom)?;
            builder = builder.input(
                Input::new(OutPoint::new(hash, input.prevout.index), script, input.sequence)
                    .with_witness(witness),
            );
        }
        builder.outputs = json.outputs;
        Ok(builder.finalize())
    }
}
