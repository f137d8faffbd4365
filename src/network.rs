//! P2P message payloads
//!
//! One record type per command and a decoder for each. Every decoder is
//! handed exactly the payload bytes of one message and reports problems as
//! [`DecodeError`], which the parser treats as recoverable.

use crate::block::{BlockHeader, CompactBlockView};
use crate::codec::{write_compact_size, write_var_bytes, ByteReader};
use crate::constants::{
    inv, reject, services, BLOCK_HEADER_SIZE, INV_ITEM_SIZE, NET_ADDRESS_SIZE,
    TIMED_NET_ADDRESS_SIZE,
};
use crate::error::DecodeError;
use crate::transaction::Transaction;
use crate::types::Hash;
use std::net::{IpAddr, Ipv6Addr};

/// Fixed part of a `version` payload plus an empty user agent and start height
const MIN_VERSION_SIZE: usize = 85;

/// Advertised service bits, with the known ones broken out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Services {
    pub bits: u64,
    pub network: bool,
    pub getutxo: bool,
    pub bloom: bool,
    pub witness: bool,
}

impl Services {
    pub fn from_bits(bits: u64) -> Self {
        Self {
            bits,
            network: bits & services::NETWORK != 0,
            getutxo: bits & services::GETUTXO != 0,
            bloom: bits & services::BLOOM != 0,
            witness: bits & services::WITNESS != 0,
        }
    }
}

/// Peer address record. `time` is zero where the wire form carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddress {
    pub time: u32,
    pub services: Services,
    /// IPv6, or IPv4-mapped IPv6
    pub ip: [u8; 16],
    pub port: u16,
}

impl NetAddress {
    pub fn new(ip: IpAddr, port: u16, services: u64) -> Self {
        let v6 = match ip {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        Self {
            time: 0,
            services: Services::from_bits(services),
            ip: v6.octets(),
            port,
        }
    }

    pub fn ip_addr(&self) -> IpAddr {
        let v6 = Ipv6Addr::from(self.ip);
        match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }
    }

    /// Decode a 26-byte address, or a 30-byte one when `timed`
    pub fn decode(reader: &mut ByteReader<'_>, timed: bool) -> Result<Self, DecodeError> {
        let size = if timed {
            TIMED_NET_ADDRESS_SIZE
        } else {
            NET_ADDRESS_SIZE
        };
        reader.require("net address", size)?;
        let time = if timed { reader.read_u32("address time")? } else { 0 };
        let services = Services::from_bits(reader.read_u64("address services")?);
        let mut ip = [0u8; 16];
        ip.copy_from_slice(reader.read_bytes("address ip", 16)?);
        // Port is the one big-endian field on the wire
        let port = reader.read_u16_be("address port")?;
        Ok(Self { time, services, ip, port })
    }

    pub fn encode(&self, out: &mut Vec<u8>, timed: bool) {
        if timed {
            out.extend_from_slice(&self.time.to_le_bytes());
        }
        out.extend_from_slice(&self.services.bits.to_le_bytes());
        out.extend_from_slice(&self.ip);
        out.extend_from_slice(&self.port.to_be_bytes());
    }
}

/// `version` handshake payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPayload {
    pub version: u32,
    pub services: Services,
    pub timestamp: i64,
    /// Address of the receiving node, as seen by the sender
    pub local: NetAddress,
    /// Address of the sending node
    pub remote: NetAddress,
    pub nonce: u64,
    pub agent: String,
    pub height: u32,
    pub relay: bool,
}

impl VersionPayload {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(p);
        reader.require("version", MIN_VERSION_SIZE)?;
        let version = reader.read_u32("version")?;
        let services = Services::from_bits(reader.read_u64("version services")?);
        let timestamp = reader.read_i64("version timestamp")?;
        let local = NetAddress::decode(&mut reader, false)?;
        let remote = NetAddress::decode(&mut reader, false)?;
        let nonce = reader.read_u64("version nonce")?;
        let agent =
            String::from_utf8_lossy(reader.read_var_bytes("version user agent")?).into_owned();
        let height = reader.read_u32("version start height")?;
        // Relay flag is optional and defaults to true
        let relay = match reader.peek(0) {
            Some(flag) => flag == 1,
            None => true,
        };
        Ok(Self {
            version,
            services,
            timestamp,
            local,
            remote,
            nonce,
            agent,
            height,
            relay,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_VERSION_SIZE + self.agent.len() + 1);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.bits.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        self.local.encode(&mut out, false);
        self.remote.encode(&mut out, false);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        write_var_bytes(&mut out, self.agent.as_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.relay as u8);
        out
    }
}

/// Inventory object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvType {
    Error,
    Tx,
    Block,
    FilteredBlock,
    Unknown(u32),
}

impl InvType {
    pub fn from_code(code: u32) -> Self {
        match code {
            inv::ERROR => InvType::Error,
            inv::TX => InvType::Tx,
            inv::BLOCK => InvType::Block,
            inv::FILTERED_BLOCK => InvType::FilteredBlock,
            other => InvType::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            InvType::Error => inv::ERROR,
            InvType::Tx => inv::TX,
            InvType::Block => inv::BLOCK,
            InvType::FilteredBlock => inv::FILTERED_BLOCK,
            InvType::Unknown(code) => code,
        }
    }
}

/// Inventory vector: type and object hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvItem {
    pub inv_type: InvType,
    /// Witness variant requested (type code has bit 30 set)
    pub witness: bool,
    pub hash: Hash,
}

impl InvItem {
    pub fn new(inv_type: InvType, hash: Hash) -> Self {
        Self {
            inv_type,
            witness: false,
            hash,
        }
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let code = reader.read_u32("inv type")?;
        let hash = reader.read_hash("inv hash")?;
        Ok(Self {
            inv_type: InvType::from_code(code & !inv::WITNESS_FLAG),
            witness: code & inv::WITNESS_FLAG != 0,
            hash,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let mut code = self.inv_type.code();
        if self.witness {
            code |= inv::WITNESS_FLAG;
        }
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(&self.hash);
    }
}

/// Decode an `inv`, `getdata` or `notfound` list
pub fn decode_inv_list(p: &[u8]) -> Result<Vec<InvItem>, DecodeError> {
    let mut reader = ByteReader::new(p);
    let count = reader.read_count("inv count", INV_ITEM_SIZE)?;
    (0..count).map(|_| InvItem::decode(&mut reader)).collect()
}

pub fn encode_inv_list(items: &[InvItem]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + items.len() * INV_ITEM_SIZE);
    write_compact_size(&mut out, items.len() as u64);
    for item in items {
        item.encode(&mut out);
    }
    out
}

/// Decode an `addr` list of timestamped addresses
pub fn decode_addr_list(p: &[u8]) -> Result<Vec<NetAddress>, DecodeError> {
    let mut reader = ByteReader::new(p);
    reader.require("addr", TIMED_NET_ADDRESS_SIZE + 1)?;
    let count = reader.read_count("addr count", TIMED_NET_ADDRESS_SIZE)?;
    (0..count).map(|_| NetAddress::decode(&mut reader, true)).collect()
}

pub fn encode_addr_list(addrs: &[NetAddress]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + addrs.len() * TIMED_NET_ADDRESS_SIZE);
    write_compact_size(&mut out, addrs.len() as u64);
    for addr in addrs {
        addr.encode(&mut out, true);
    }
    out
}

/// One `headers` entry: a header and its (normally zero) transaction count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRecord {
    pub header: BlockHeader,
    pub total_tx: u64,
}

pub fn decode_headers(p: &[u8]) -> Result<Vec<HeaderRecord>, DecodeError> {
    let mut reader = ByteReader::new(p);
    reader.require("headers", BLOCK_HEADER_SIZE + 1)?;
    let count = reader.read_count("headers count", BLOCK_HEADER_SIZE + 1)?;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let header = BlockHeader::decode(&mut reader)?;
        let total_tx = reader.read_compact_size("headers tx count")?;
        records.push(HeaderRecord { header, total_tx });
    }
    Ok(records)
}

pub fn encode_headers(headers: &[BlockHeader]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + headers.len() * (BLOCK_HEADER_SIZE + 1));
    write_compact_size(&mut out, headers.len() as u64);
    for header in headers {
        header.encode(&mut out);
        out.push(0);
    }
    out
}

/// `merkleblock`: header plus a partial merkle tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlockPayload {
    pub header: BlockHeader,
    pub total_tx: u32,
    pub hashes: Vec<Hash>,
    pub flags: Vec<u8>,
}

impl MerkleBlockPayload {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(p);
        reader.require("merkleblock", BLOCK_HEADER_SIZE + 6)?;
        let header = BlockHeader::decode(&mut reader)?;
        let total_tx = reader.read_u32("merkleblock total tx")?;
        let count = reader.read_count("merkleblock hash count", 32)?;
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            hashes.push(reader.read_hash("merkleblock hash")?);
        }
        let flags = reader.read_var_bytes("merkleblock flags")?.to_vec();
        Ok(Self {
            header,
            total_tx,
            hashes,
            flags,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes();
        out.extend_from_slice(&self.total_tx.to_le_bytes());
        write_compact_size(&mut out, self.hashes.len() as u64);
        for hash in &self.hashes {
            out.extend_from_slice(hash);
        }
        write_var_bytes(&mut out, &self.flags);
        out
    }
}

/// `reject` notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectPayload {
    pub message: String,
    pub code: u8,
    pub reason: String,
    /// Hash of the rejected object, when the sender included one
    pub data: Option<Hash>,
}

impl RejectPayload {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(p);
        reader.require("reject", 3)?;
        let message =
            String::from_utf8_lossy(reader.read_var_bytes("reject message")?).into_owned();
        let code = reader.read_u8("reject code")?;
        let reason = String::from_utf8_lossy(reader.read_var_bytes("reject reason")?).into_owned();
        let data = if reader.remaining() >= 32 {
            Some(reader.read_hash("reject data")?)
        } else {
            None
        };
        Ok(Self {
            message,
            code,
            reason,
            data,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_var_bytes(&mut out, self.message.as_bytes());
        out.push(self.code);
        write_var_bytes(&mut out, self.reason.as_bytes());
        if let Some(hash) = &self.data {
            out.extend_from_slice(hash);
        }
        out
    }

    /// Symbolic name of a known reject code
    pub fn code_name(&self) -> Option<&'static str> {
        match self.code {
            reject::MALFORMED => Some("malformed"),
            reject::INVALID => Some("invalid"),
            reject::OBSOLETE => Some("obsolete"),
            reject::DUPLICATE => Some("duplicate"),
            reject::NONSTANDARD => Some("nonstandard"),
            reject::DUST => Some("dust"),
            reject::INSUFFICIENT_FEE => Some("insufficientfee"),
            reject::CHECKPOINT => Some("checkpoint"),
            _ => None,
        }
    }
}

/// 8-byte nonce carried by `ping` and `pong`
pub fn decode_nonce(p: &[u8], command: &'static str) -> Result<u64, DecodeError> {
    ByteReader::new(p).read_u64(command)
}

/// Decoded message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Version(VersionPayload),
    Inv(Vec<InvItem>),
    GetData(Vec<InvItem>),
    NotFound(Vec<InvItem>),
    Addr(Vec<NetAddress>),
    Tx(Transaction),
    Block(CompactBlockView),
    Headers(Vec<HeaderRecord>),
    MerkleBlock(MerkleBlockPayload),
    Reject(RejectPayload),
    Ping(u64),
    Pong(u64),
    /// Commands without a decoder pass through untouched
    Raw(Vec<u8>),
}

/// Decode the payload of `command`
pub fn decode_payload(command: &str, p: &[u8]) -> Result<Payload, DecodeError> {
    Ok(match command {
        "version" => Payload::Version(VersionPayload::decode(p)?),
        "inv" => Payload::Inv(decode_inv_list(p)?),
        "getdata" => Payload::GetData(decode_inv_list(p)?),
        "notfound" => Payload::NotFound(decode_inv_list(p)?),
        "addr" => Payload::Addr(decode_addr_list(p)?),
        "tx" => Payload::Tx(Transaction::from_raw(p)?),
        "block" => Payload::Block(CompactBlockView::decode(p)?),
        "headers" => Payload::Headers(decode_headers(p)?),
        "merkleblock" => Payload::MerkleBlock(MerkleBlockPayload::decode(p)?),
        "reject" => Payload::Reject(RejectPayload::decode(p)?),
        "ping" => Payload::Ping(decode_nonce(p, "ping nonce")?),
        "pong" => Payload::Pong(decode_nonce(p, "pong nonce")?),
        _ => Payload::Raw(p.to_vec()),
    })
}
