//! Block reward schedule

use crate::constants::INITIAL_SUBSIDY;

/// GetBlockSubsidy: ℤ → ℕ
///
/// Calculate the block reward for a given height.
///
/// Formula: reward = 50 * C >> ⌊h/H⌋
/// Where:
/// - h = block height (negative or unknown heights earn nothing)
/// - H = halving interval of the network
/// - C = base units per coin (10^8)
pub fn block_reward(height: i64, halving_interval: u64) -> u64 {
    if height < 0 || halving_interval == 0 {
        return 0;
    }

    let halvings = height as u64 / halving_interval;

    // After 64 halvings, the shift would be undefined
    if halvings >= 64 {
        return 0;
    }

    INITIAL_SUBSIDY >> halvings
}

/// Sum of all rewards for heights `0..=height`
pub fn total_supply(height: i64, halving_interval: u64) -> u64 {
    if height < 0 || halving_interval == 0 {
        return 0;
    }
    let mut total = 0u64;
    let mut start = 0u64;
    let end = height as u64;
    // Whole halving eras at a time
    while start <= end {
        let reward = block_reward(start as i64, halving_interval);
        if reward == 0 {
            break;
        }
        let era_end = (start / halving_interval + 1).saturating_mul(halving_interval) - 1;
        let last = era_end.min(end);
        total += reward * (last - start + 1);
        start = last + 1;
    }
    total
}
