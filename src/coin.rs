//! Unspent output records
//!
//! Plain form: version (4) | height (4) | output.
//! Extended form appends the outpoint and a spent flag: hash (32) | index (4) | spent (1).

use crate::codec::ByteReader;
use crate::constants::UNKNOWN_HEIGHT;
use crate::error::DecodeError;
use crate::output::Output;
use crate::transaction::Transaction;
use crate::types::OutPoint;

/// Smallest plain record: version + height + an output with an empty script
pub const MIN_COIN_SIZE: usize = 17;

/// Bytes the extended form adds
pub const EXTENDED_COIN_SIZE: usize = 37;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub version: u32,
    /// `None` for unconfirmed
    pub height: Option<u32>,
    pub output: Output,
    pub prevout: OutPoint,
    pub spent: bool,
}

impl Coin {
    /// Coin for output `index` of `tx`, or `None` if there is no such output
    pub fn from_transaction(tx: &Transaction, index: u32, height: Option<u32>) -> Option<Self> {
        let output = tx.outputs().get(index as usize)?.clone();
        Some(Self {
            version: tx.version(),
            height,
            output,
            prevout: OutPoint::new(tx.txid(), index),
            spent: false,
        })
    }

    pub fn size(&self, extended: bool) -> usize {
        8 + self.output.size() + if extended { EXTENDED_COIN_SIZE } else { 0 }
    }

    pub fn encode(&self, out: &mut Vec<u8>, extended: bool) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.height.unwrap_or(UNKNOWN_HEIGHT).to_le_bytes());
        self.output.encode(out);
        if extended {
            out.extend_from_slice(&self.prevout.hash);
            out.extend_from_slice(&self.prevout.index.to_le_bytes());
            out.push(self.spent as u8);
        }
    }

    pub fn to_raw(&self, extended: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size(extended));
        self.encode(&mut out, extended);
        out
    }

    /// Decode a record that spans all of `data`.
    ///
    /// The plain form carries no outpoint; it decodes with the null outpoint.
    pub fn from_raw(data: &[u8], extended: bool) -> Result<Self, DecodeError> {
        let tail = if extended { EXTENDED_COIN_SIZE } else { 0 };
        ByteReader::new(data).require("utxo", MIN_COIN_SIZE + tail)?;

        // The script may not run into the extended tail
        let (body, tail) = data.split_at(data.len() - tail);
        let mut reader = ByteReader::new(body);

        let version = reader.read_u32("utxo version")?;
        let height = match reader.read_u32("utxo height")? {
            UNKNOWN_HEIGHT => None,
            height => Some(height),
        };
        let output = Output::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingData {
                what: "utxo",
                trailing: reader.remaining(),
            });
        }

        let (prevout, spent) = if extended {
            let mut reader = ByteReader::new(tail);
            let hash = reader.read_hash("utxo hash")?;
            let index = reader.read_u32("utxo index")?;
            let spent = reader.read_u8("utxo spent")? == 1;
            (OutPoint::new(hash, index), spent)
        } else {
            (OutPoint::null(), false)
        };

        Ok(Self {
            version,
            height,
            output,
            prevout,
            spent,
        })
    }
}
