//! Segregated witness arithmetic and the coinbase witness commitment

use crate::constants::WITNESS_COMMITMENT_HEADER;
use crate::hash::double_sha256_pair;
use crate::merkle::merkle_root;
use crate::transaction::Transaction;
use crate::types::Hash;

/// Witness scale factor: base bytes weigh four times witness bytes
pub const WITNESS_SCALE_FACTOR: usize = 4;

/// VirtualSize(tx) = ⌈(4 × base + witness) / 4⌉
///
/// `size` is the full serialized size, `witness_size` the witness part of it.
pub fn virtual_size(size: usize, witness_size: usize) -> usize {
    let base = size - witness_size;
    (base * WITNESS_SCALE_FACTOR + witness_size + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
}

/// Does `script` carry a witness commitment (OP_RETURN PUSH36 0xaa21a9ed ...)?
pub fn is_commitment(script: &[u8]) -> bool {
    script.len() >= 38 && script[..6] == WITNESS_COMMITMENT_HEADER
}

/// The 32-byte commitment carried by a commitment script
pub fn commitment_hash(script: &[u8]) -> Option<Hash> {
    if !is_commitment(script) {
        return None;
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&script[6..38]);
    Some(hash)
}

/// Build the coinbase output script committing to `commitment`
pub fn commitment_script(commitment: &Hash) -> Vec<u8> {
    let mut script = WITNESS_COMMITMENT_HEADER.to_vec();
    script.extend_from_slice(commitment);
    script
}

/// Declared commitment: first coinbase output carrying the commitment header
pub fn declared_commitment(coinbase: &Transaction) -> Option<Hash> {
    coinbase
        .outputs()
        .iter()
        .find(|output| is_commitment(output.script()))
        .and_then(|output| commitment_hash(output.script()))
}

/// Witness nonce: first witness item of the coinbase's first input
pub fn witness_nonce(coinbase: &Transaction) -> Option<&[u8]> {
    coinbase
        .inputs()
        .first()
        .and_then(|input| input.witness.first())
        .map(|item| item.as_slice())
}

/// WitnessCommitment = SHA256²(MerkleRoot({wtxid(tx)}) ‖ nonce)
///
/// `None` when there are no transactions or the coinbase has no nonce.
pub fn compute_commitment(txs: &[Transaction]) -> Option<Hash> {
    let nonce = witness_nonce(txs.first()?)?;
    let leaves: Vec<Hash> = txs.iter().map(Transaction::wtxid).collect();
    let root = merkle_root(&leaves)?;
    Some(double_sha256_pair(&root, nonce))
}
