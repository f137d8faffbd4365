//! ECDSA signature canonicalization and verification
//!
//! Signatures travel as DER. New signatures are always low-S. Verification
//! has two explicit modes: [`VerifyMode::Strict`] checks the bytes as given,
//! [`VerifyMode::Historical`] first repairs DER length fields and lowers S so
//! that old chain data signed before the low-S rule still verifies.
//!
//! The curve itself sits behind [`CurveBackend`]: [`Secp256k1Backend`] wraps
//! libsecp256k1, [`K256Backend`] is the pure-Rust reference.

use crate::error::SignatureError;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

/// Signature verification contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Verify the signature bytes exactly as given
    Strict,
    /// Repair DER lengths and lower S before verifying
    Historical,
}

/// Elliptic-curve primitive used by signing and verification
pub trait CurveBackend {
    /// Sign a 32-byte digest, returning a DER signature
    fn sign(&self, msg: &[u8], private_key: &[u8]) -> Result<Vec<u8>, SignatureError>;

    /// Verify a DER signature. `Err` means the inputs could not be parsed.
    fn verify(&self, msg: &[u8], sig: &[u8], public_key: &[u8]) -> Result<bool, SignatureError>;

    /// Serialized public key for a private key (33 or 65 bytes)
    fn public_key_create(
        &self,
        private_key: &[u8],
        compressed: bool,
    ) -> Result<Vec<u8>, SignatureError>;

    /// Uniformly random valid private key
    fn random_scalar(&self) -> [u8; 32];
}

/// libsecp256k1 backend
pub struct Secp256k1Backend {
    ctx: Secp256k1<All>,
}

impl Secp256k1Backend {
    pub fn new() -> Self {
        Self { ctx: Secp256k1::new() }
    }
}

impl Default for Secp256k1Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveBackend for Secp256k1Backend {
    fn sign(&self, msg: &[u8], private_key: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let message = Message::from_digest_slice(msg)
            .map_err(|_| SignatureError::InvalidMessage(msg.len()))?;
        let key =
            SecretKey::from_slice(private_key).map_err(|_| SignatureError::InvalidPrivateKey)?;
        let mut sig = self.ctx.sign_ecdsa(&message, &key);
        sig.normalize_s();
        Ok(sig.serialize_der().to_vec())
    }

    fn verify(&self, msg: &[u8], sig: &[u8], public_key: &[u8]) -> Result<bool, SignatureError> {
        let message = Message::from_digest_slice(msg)
            .map_err(|_| SignatureError::InvalidMessage(msg.len()))?;
        let key = PublicKey::from_slice(public_key).map_err(|_| SignatureError::InvalidPublicKey)?;
        let sig = secp256k1::ecdsa::Signature::from_der(sig)
            .map_err(|e| SignatureError::Backend(e.to_string()))?;
        Ok(self.ctx.verify_ecdsa(&message, &sig, &key).is_ok())
    }

    fn public_key_create(
        &self,
        private_key: &[u8],
        compressed: bool,
    ) -> Result<Vec<u8>, SignatureError> {
        let key =
            SecretKey::from_slice(private_key).map_err(|_| SignatureError::InvalidPrivateKey)?;
        let public = PublicKey::from_secret_key(&self.ctx, &key);
        if compressed {
            Ok(public.serialize().to_vec())
        } else {
            Ok(public.serialize_uncompressed().to_vec())
        }
    }

    fn random_scalar(&self) -> [u8; 32] {
        loop {
            let candidate: [u8; 32] = rand::random();
            if SecretKey::from_slice(&candidate).is_ok() {
                return candidate;
            }
        }
    }
}

/// Pure-Rust backend on the `k256` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct K256Backend;

impl CurveBackend for K256Backend {
    fn sign(&self, msg: &[u8], private_key: &[u8]) -> Result<Vec<u8>, SignatureError> {
        if msg.len() != 32 {
            return Err(SignatureError::InvalidMessage(msg.len()));
        }
        let key = k256::ecdsa::SigningKey::from_slice(private_key)
            .map_err(|_| SignatureError::InvalidPrivateKey)?;
        let sig: k256::ecdsa::Signature = key
            .sign_prehash(msg)
            .map_err(|e| SignatureError::Backend(e.to_string()))?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_der().as_bytes().to_vec())
    }

    fn verify(&self, msg: &[u8], sig: &[u8], public_key: &[u8]) -> Result<bool, SignatureError> {
        if msg.len() != 32 {
            return Err(SignatureError::InvalidMessage(msg.len()));
        }
        let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|_| SignatureError::InvalidPublicKey)?;
        let sig = k256::ecdsa::Signature::from_der(sig)
            .map_err(|e| SignatureError::Backend(e.to_string()))?;
        Ok(key.verify_prehash(msg, &sig).is_ok())
    }

    fn public_key_create(
        &self,
        private_key: &[u8],
        compressed: bool,
    ) -> Result<Vec<u8>, SignatureError> {
        let key = k256::ecdsa::SigningKey::from_slice(private_key)
            .map_err(|_| SignatureError::InvalidPrivateKey)?;
        Ok(key.verifying_key().to_encoded_point(compressed).as_bytes().to_vec())
    }

    fn random_scalar(&self) -> [u8; 32] {
        loop {
            let candidate: [u8; 32] = rand::random();
            if k256::ecdsa::SigningKey::from_slice(&candidate).is_ok() {
                return candidate;
            }
        }
    }
}

/// Read a DER length at `*pos`. Long-form lengths use the low nibble as the
/// octet count. Returns `None` if the buffer ends first.
fn read_der_length(data: &[u8], pos: &mut usize) -> Option<usize> {
    let initial = *data.get(*pos)?;
    *pos += 1;
    if initial & 0x80 == 0 {
        return Some(initial as usize);
    }
    let octets = (initial & 0x0f) as usize;
    if octets > std::mem::size_of::<u32>() {
        return None;
    }
    let mut value = 0usize;
    for _ in 0..octets {
        value = (value << 8) | *data.get(*pos)? as usize;
        *pos += 1;
    }
    Some(value)
}

/// Re-derive DER lengths and cut off bytes past the declared sequence and
/// S value. Input not tagged as a DER sequence comes back unchanged.
pub fn normalize_length(sig: &[u8]) -> Vec<u8> {
    let mut data = sig;
    let mut pos = 0usize;

    if data.first() != Some(&0x30) {
        return sig.to_vec();
    }
    pos += 1;

    let len = match read_der_length(data, &mut pos) {
        Some(len) => len,
        None => return sig.to_vec(),
    };
    if let Some(end) = len.checked_add(pos) {
        if data.len() > end {
            data = &data[..end];
        }
    }

    if data.get(pos) != Some(&0x02) {
        return sig.to_vec();
    }
    pos += 1;
    let rlen = match read_der_length(data, &mut pos) {
        Some(rlen) => rlen,
        None => return sig.to_vec(),
    };
    pos = match pos.checked_add(rlen) {
        Some(pos) => pos,
        None => return sig.to_vec(),
    };

    if data.get(pos) != Some(&0x02) {
        return sig.to_vec();
    }
    pos += 1;
    let slen = match read_der_length(data, &mut pos) {
        Some(slen) => slen,
        None => return sig.to_vec(),
    };
    if let Some(end) = slen.checked_add(pos) {
        if data.len() > end {
            data = &data[..end];
        }
    }

    data.to_vec()
}

fn read_der_integer<'a>(sig: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    if *sig.get(*pos)? != 0x02 {
        return None;
    }
    *pos += 1;
    let len = read_der_length(sig, pos)?;
    let end = pos.checked_add(len)?;
    let value = sig.get(*pos..end)?;
    *pos = end;
    Some(value)
}

/// Raw R and S integers of a DER signature, leniently parsed
fn der_integers(sig: &[u8]) -> Option<(&[u8], &[u8])> {
    if *sig.first()? != 0x30 {
        return None;
    }
    let mut pos = 1usize;
    read_der_length(sig, &mut pos)?;
    let r = read_der_integer(sig, &mut pos)?;
    let s = read_der_integer(sig, &mut pos)?;
    Some((r, s))
}

/// Left-pad a big-endian integer to 32 bytes, dropping leading zeroes
fn to_scalar_bytes(int: &[u8]) -> Option<[u8; 32]> {
    let start = int.iter().position(|b| *b != 0).unwrap_or(int.len());
    let digits = &int[start..];
    if digits.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - digits.len()..].copy_from_slice(digits);
    Some(out)
}

/// Parse a DER signature into curve scalars. Fails on zero, negative or
/// out-of-range values.
fn parse_signature(sig: &[u8]) -> Option<k256::ecdsa::Signature> {
    let (r, s) = der_integers(sig)?;
    if r.first().map_or(true, |b| b & 0x80 != 0) || s.first().map_or(true, |b| b & 0x80 != 0) {
        return None;
    }
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&to_scalar_bytes(r)?);
    rs[32..].copy_from_slice(&to_scalar_bytes(s)?);
    k256::ecdsa::Signature::from_slice(&rs).ok()
}

/// S must be positive and no greater than half the curve order
pub fn is_low_s(sig: &[u8]) -> bool {
    match parse_signature(sig) {
        Some(parsed) => parsed.normalize_s().is_none(),
        None => false,
    }
}

/// Replace a high S with `n - S` and re-encode as canonical DER.
/// Unparseable input comes back unchanged.
pub fn to_low_s(sig: &[u8]) -> Vec<u8> {
    match parse_signature(sig) {
        Some(parsed) => {
            let low = parsed.normalize_s().unwrap_or(parsed);
            low.to_der().as_bytes().to_vec()
        }
        None => sig.to_vec(),
    }
}

/// Verify `sig` over the 32-byte digest `msg`. Never fails loudly: any
/// backend or encoding problem is a `false`.
pub fn verify(
    backend: &dyn CurveBackend,
    msg: &[u8],
    sig: &[u8],
    key: &[u8],
    mode: VerifyMode,
) -> bool {
    if sig.is_empty() {
        return false;
    }

    let candidate = match mode {
        VerifyMode::Strict => sig.to_vec(),
        VerifyMode::Historical => to_low_s(&normalize_length(sig)),
    };

    match backend.verify(msg, &candidate, key) {
        Ok(valid) => valid,
        Err(err) => {
            log::debug!(
                "Signature verification threw: {} (msg={}, sig={}, key={})",
                err,
                hex::encode(msg),
                hex::encode(sig),
                hex::encode(key)
            );
            false
        }
    }
}

/// Sign a 32-byte digest. The result is always low-S DER.
pub fn sign(
    backend: &dyn CurveBackend,
    msg: &[u8],
    private_key: &[u8],
) -> Result<Vec<u8>, SignatureError> {
    if msg.len() != 32 {
        return Err(SignatureError::InvalidMessage(msg.len()));
    }
    let sig = backend.sign(msg, private_key)?;
    Ok(to_low_s(&sig))
}

/// Fresh random private key
pub fn generate_private_key(backend: &dyn CurveBackend) -> [u8; 32] {
    backend.random_scalar()
}

pub fn public_key_create(
    backend: &dyn CurveBackend,
    private_key: &[u8],
    compressed: bool,
) -> Result<Vec<u8>, SignatureError> {
    backend.public_key_create(private_key, compressed)
}
