//! Transaction outputs
//!
//! An [`Output`] is a value and a locking script. It has no setters: the
//! amount invariant is checked once at construction, and the script
//! classification and destination are derived on first use and cached for
//! the life of the value. Changing an output means building a new one.

use crate::amount::Amount;
use crate::codec::{compact_size_len, write_var_bytes, ByteReader};
use crate::constants::MIN_OUTPUT_SIZE;
use crate::error::{DecodeError, ValueError};
use crate::hash::hash160;
use crate::params::NetworkParams;
use crate::script::{output_destination, output_type, Destination, OutputType};
use crate::types::ByteString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Transaction output: 𝒯 = 𝕀 × 𝕊
#[derive(Clone)]
pub struct Output {
    value: Amount,
    script: ByteString,
    kind: OnceLock<OutputType>,
    destination: OnceLock<Option<Destination>>,
}

impl Output {
    pub fn new(value: Amount, script: ByteString) -> Self {
        Self {
            value,
            script,
            kind: OnceLock::new(),
            destination: OnceLock::new(),
        }
    }

    /// Build from a signed base-unit value, rejecting negatives and
    /// anything that does not fit 63 bits
    pub fn from_signed(value: i64, script: ByteString) -> Result<Self, ValueError> {
        Ok(Self::new(Amount::from_signed(value)?, script))
    }

    /// Build from an unsigned base-unit value; 2^63 and above are rejected
    pub fn from_sat(value: u64, script: ByteString) -> Result<Self, ValueError> {
        Ok(Self::new(Amount::from_sat(value)?, script))
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Script template this output pays to
    pub fn output_type(&self) -> OutputType {
        *self.kind.get_or_init(|| output_type(&self.script))
    }

    /// Network-independent spend destination, if the template has one
    pub fn destination(&self) -> Option<Destination> {
        *self.destination.get_or_init(|| output_destination(&self.script))
    }

    /// Base58check address on `params`
    pub fn address(&self, params: &NetworkParams) -> Option<String> {
        self.destination().map(|dest| dest.to_address(params))
    }

    /// Relevance check: does this output pay to one of `addresses`?
    pub fn test(&self, params: &NetworkParams, addresses: &HashSet<String>) -> bool {
        match self.address(params) {
            Some(address) => addresses.contains(&address),
            None => false,
        }
    }

    /// Serialized size: 8-byte value + compact-size script length + script
    pub fn size(&self) -> usize {
        8 + compact_size_len(self.script.len() as u64) + self.script.len()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(out, &self.script);
    }

    pub fn to_raw(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        self.encode(&mut out);
        out
    }

    /// Decode one output from the reader
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        reader.require("tx_out", MIN_OUTPUT_SIZE)?;
        let value = reader.read_i64("tx_out value")?;
        let script = reader.read_var_bytes("tx_out script")?;
        Ok(Self::from_signed(value, script.to_vec())?)
    }

    /// Decode a standalone output; trailing bytes are rejected
    pub fn from_raw(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(data);
        let output = Self::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingData {
                what: "output",
                trailing: reader.remaining(),
            });
        }
        Ok(output)
    }

    /// Compact hex form for lightweight storage
    pub fn to_compact(&self) -> CompactOutput {
        CompactOutput {
            kind: "output".to_string(),
            output: hex::encode(self.to_raw()),
        }
    }

    pub fn from_compact(compact: &CompactOutput) -> Result<Self, DecodeError> {
        if compact.kind != "output" {
            return Err(DecodeError::Malformed(format!(
                "expected compact output, got {}",
                compact.kind
            )));
        }
        Self::from_raw(&hex::decode(&compact.output)?)
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.script == other.script
    }
}

impl Eq for Output {}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("value", &self.value)
            .field("script", &hex::encode(&self.script))
            .finish()
    }
}

/// Short identifier: `[type:hash160-prefix]`
impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = hex::encode(hash160(&self.script));
        write!(f, "[{}:{}]", self.output_type().as_str(), &id[..7])
    }
}

/// `{"type": "output", "output": "<raw hex>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub output: String,
}

#[derive(Serialize, Deserialize)]
struct OutputJson {
    value: Amount,
    script: String,
}

impl Serialize for Output {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutputJson {
            value: self.value,
            script: hex::encode(&self.script),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Output {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = OutputJson::deserialize(deserializer)?;
        let script = hex::decode(&json.script).map_err(serde::de::Error::custom)?;
        Ok(Output::new(json.value, script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Network;
    use crate::script::p2pkh_script;

    fn p2pkh_output(sat: u64) -> Output {
        Output::from_sat(sat, p2pkh_script(&[0x11; 20])).unwrap()
    }

    #[test]
    fn test_value_bounds() {
        assert!(Output::from_sat((1u64 << 63) - 1, vec![]).is_ok());
        assert_eq!(Output::from_sat(1u64 << 63, vec![]).unwrap_err(), ValueError::Overflow);
        assert_eq!(Output::from_signed(-5, vec![]).unwrap_err(), ValueError::Negative);
    }

    #[test]
    fn test_type_and_destination_cached() {
        let output = p2pkh_output(1000);
        assert_eq!(output.output_type(), OutputType::PubKeyHash);
        assert_eq!(output.destination(), Some(Destination::PubKeyHash([0x11; 20])));
        // Second access hits the cache and agrees
        assert_eq!(output.output_type(), OutputType::PubKeyHash);
        assert!(output.kind.get().is_some());
    }

    #[test]
    fn test_relevance_filter() {
        let params = Network::Main.params();
        let output = p2pkh_output(1000);
        let address = output.address(params).unwrap();

        let mut set = HashSet::new();
        assert!(!output.test(params, &set));
        set.insert(address);
        assert!(output.test(params, &set));

        let nulldata = Output::from_sat(0, vec![0x6a, 0x01, 0x00]).unwrap();
        assert!(!nulldata.test(params, &set));
    }

    #[test]
    fn test_raw_roundtrip_and_trailing() {
        let output = p2pkh_output(12345);
        let raw = output.to_raw();
        assert_eq!(raw.len(), output.size());
        assert_eq!(Output::from_raw(&raw).unwrap(), output);

        let mut padded = raw.clone();
        padded.push(0);
        assert!(matches!(
            Output::from_raw(&padded),
            Err(DecodeError::TrailingData { trailing: 1, .. })
        ));
    }

    #[test]
    fn test_decode_negative_value() {
        let mut raw = (-1i64).to_le_bytes().to_vec();
        raw.push(0);
        assert_eq!(
            Output::from_raw(&raw).unwrap_err(),
            DecodeError::InvalidValue(ValueError::Negative)
        );
    }

    #[test]
    fn test_decode_script_length_past_end() {
        let mut raw = 1u64.to_le_bytes().to_vec();
        raw.push(0x10);
        raw.extend_from_slice(&[0u8; 4]);
        assert!(matches!(Output::from_raw(&raw), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_json_projection() {
        let output = Output::from_sat(50_000_000, vec![0x51]).unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json, serde_json::json!({"value": "0.5", "script": "51"}));
        let back: Output = serde_json::from_value(json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn test_compact_form() {
        let output = p2pkh_output(7);
        let compact = output.to_compact();
        assert_eq!(compact.kind, "output");
        let json = serde_json::to_value(&compact).unwrap();
        assert_eq!(json["type"], "output");
        assert_eq!(Output::from_compact(&compact).unwrap(), output);

        let wrong = CompactOutput { kind: "coin".into(), output: compact.output.clone() };
        assert!(Output::from_compact(&wrong).is_err());
    }

    #[test]
    fn test_display_id() {
        let output = p2pkh_output(1);
        let id = output.to_string();
        assert!(id.starts_with("[pubkeyhash:"));
        assert_eq!(id.len(), "[pubkeyhash:]".len() + 7);
    }
}
