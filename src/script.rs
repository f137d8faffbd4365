//! Script helpers: push decoding, script numbers and output classification
//!
//! This is not an interpreter. It only recognises the standard output
//! templates and reads pushed data, which is all the wire and block code
//! needs (coinbase heights, output addresses, relevance filtering).

use crate::hash::{checksum, hash160};
use crate::params::NetworkParams;
use serde::{Deserialize, Serialize};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Script element: either pushed data or a bare opcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<'a> {
    Push(&'a [u8]),
    Op(u8),
}

/// Iterate over script elements. Stops (yielding `None`) at a truncated push.
pub fn instructions(script: &[u8]) -> Instructions<'_> {
    Instructions { script, pos: 0, failed: false }
}

pub struct Instructions<'a> {
    script: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        if end > self.script.len() {
            return None;
        }
        let out = &self.script[self.pos..end];
        self.pos = end;
        Some(out)
    }

    fn take_len(&mut self, width: usize) -> Option<usize> {
        let bytes = self.take(width)?;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(bytes);
        Some(u32::from_le_bytes(buf) as usize)
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ()>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.script.len() {
            return None;
        }
        let op = self.script[self.pos];
        self.pos += 1;
        let len = match op {
            0x01..=0x4b => Some(op as usize),
            OP_PUSHDATA1 => self.take_len(1),
            OP_PUSHDATA2 => self.take_len(2),
            OP_PUSHDATA4 => self.take_len(4),
            _ => return Some(Ok(Instruction::Op(op))),
        };
        match len.and_then(|len| self.take(len)) {
            Some(data) => Some(Ok(Instruction::Push(data))),
            None => {
                self.failed = true;
                Some(Err(()))
            }
        }
    }
}

/// Data pushed by the first script element, if that element is a data push
pub fn first_push(script: &[u8]) -> Option<&[u8]> {
    match instructions(script).next()? {
        Ok(Instruction::Push(data)) => Some(data),
        _ => None,
    }
}

/// Decode a little-endian sign-magnitude script number of at most `max_len` bytes
pub fn script_num(bytes: &[u8], max_len: usize) -> Option<i64> {
    if bytes.len() > max_len || bytes.len() > 8 {
        return None;
    }
    if bytes.is_empty() {
        return Some(0);
    }
    let mut magnitude: u64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        magnitude |= (*byte as u64) << (8 * i);
    }
    let last = bytes[bytes.len() - 1];
    if last & 0x80 != 0 {
        let sign_bit = 0x80u64 << (8 * (bytes.len() - 1));
        let value = magnitude & !sign_bit;
        return i64::try_from(value).ok().map(|v| -v);
    }
    i64::try_from(magnitude).ok()
}

/// Encode a script number minimally
pub fn encode_script_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut abs = value.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

/// Append a minimal data push to `script`
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Standard output template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    PubKey,
    PubKeyHash,
    ScriptHash,
    Multisig,
    NullData,
    WitnessPubKeyHash,
    WitnessScriptHash,
    Unknown,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::PubKey => "pubkey",
            OutputType::PubKeyHash => "pubkeyhash",
            OutputType::ScriptHash => "scripthash",
            OutputType::Multisig => "multisig",
            OutputType::NullData => "nulldata",
            OutputType::WitnessPubKeyHash => "witnesspubkeyhash",
            OutputType::WitnessScriptHash => "witnessscripthash",
            OutputType::Unknown => "unknown",
        }
    }
}

/// Network-independent spend destination of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    PubKeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    WitnessPubKeyHash([u8; 20]),
    WitnessScriptHash([u8; 32]),
}

impl Destination {
    /// Base58check address for `params`. Witness destinations carry the
    /// witness version and a zero padding byte ahead of the program.
    pub fn to_address(&self, params: &NetworkParams) -> String {
        let prefixes = &params.address;
        let mut payload = Vec::with_capacity(36);
        match self {
            Destination::PubKeyHash(hash) => {
                payload.push(prefixes.pubkeyhash);
                payload.extend_from_slice(hash);
            }
            Destination::ScriptHash(hash) => {
                payload.push(prefixes.scripthash);
                payload.extend_from_slice(hash);
            }
            Destination::WitnessPubKeyHash(hash) => {
                payload.push(prefixes.witnesspubkeyhash);
                payload.push(params.witness_version);
                payload.push(0);
                payload.extend_from_slice(hash);
            }
            Destination::WitnessScriptHash(hash) => {
                payload.push(prefixes.witnessscripthash);
                payload.push(params.witness_version);
                payload.push(0);
                payload.extend_from_slice(hash);
            }
        }
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        bs58::encode(payload).into_string()
    }
}

fn is_pubkey(data: &[u8]) -> bool {
    match data.len() {
        33 => data[0] == 0x02 || data[0] == 0x03,
        65 => data[0] == 0x04,
        _ => false,
    }
}

fn small_int(op: u8) -> Option<usize> {
    match op {
        OP_1..=OP_16 => Some((op - OP_1 + 1) as usize),
        _ => None,
    }
}

fn is_multisig(script: &[u8]) -> bool {
    let elems: Vec<_> = match instructions(script).collect::<Result<Vec<_>, ()>>() {
        Ok(elems) => elems,
        Err(()) => return false,
    };
    if elems.len() < 4 {
        return false;
    }
    let m = match elems[0] {
        Instruction::Op(op) => small_int(op),
        _ => None,
    };
    let n = match elems[elems.len() - 2] {
        Instruction::Op(op) => small_int(op),
        _ => None,
    };
    let (m, n) = match (m, n) {
        (Some(m), Some(n)) => (m, n),
        _ => return false,
    };
    if elems[elems.len() - 1] != Instruction::Op(OP_CHECKMULTISIG)
        || m > n
        || elems.len() != n + 3
    {
        return false;
    }
    elems[1..elems.len() - 2]
        .iter()
        .all(|e| matches!(e, Instruction::Push(key) if is_pubkey(key)))
}

/// Classify an output script
pub fn output_type(script: &[u8]) -> OutputType {
    let len = script.len();
    if len == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        return OutputType::PubKeyHash;
    }
    if len == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL {
        return OutputType::ScriptHash;
    }
    if len == 22 && script[0] == OP_0 && script[1] == 0x14 {
        return OutputType::WitnessPubKeyHash;
    }
    if len == 34 && script[0] == OP_0 && script[1] == 0x20 {
        return OutputType::WitnessScriptHash;
    }
    if (len == 35 || len == 67)
        && script[0] as usize == len - 2
        && script[len - 1] == OP_CHECKSIG
        && is_pubkey(&script[1..len - 1])
    {
        return OutputType::PubKey;
    }
    if len >= 1 && script[0] == OP_RETURN {
        return OutputType::NullData;
    }
    if is_multisig(script) {
        return OutputType::Multisig;
    }
    OutputType::Unknown
}

/// Spend destination of an output script, if it has a single one
pub fn output_destination(script: &[u8]) -> Option<Destination> {
    let mut h20 = [0u8; 20];
    match output_type(script) {
        OutputType::PubKeyHash => {
            h20.copy_from_slice(&script[3..23]);
            Some(Destination::PubKeyHash(h20))
        }
        OutputType::ScriptHash => {
            h20.copy_from_slice(&script[2..22]);
            Some(Destination::ScriptHash(h20))
        }
        OutputType::WitnessPubKeyHash => {
            h20.copy_from_slice(&script[2..22]);
            Some(Destination::WitnessPubKeyHash(h20))
        }
        OutputType::WitnessScriptHash => {
            let mut h32 = [0u8; 32];
            h32.copy_from_slice(&script[2..34]);
            Some(Destination::WitnessScriptHash(h32))
        }
        OutputType::PubKey => Some(Destination::PubKeyHash(hash160(&script[1..script.len() - 1]))),
        _ => None,
    }
}

/// Build a pay-to-pubkey-hash script
pub fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![OP_DUP, OP_HASH160, 0x14];
    script.extend_from_slice(hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}
