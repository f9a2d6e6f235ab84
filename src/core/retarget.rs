//! Block difficulty retargeting
//!
//! Computes the difficulty of the next block from its parent, using
//! arbitrary-precision integers throughout. All divisions truncate toward
//! zero, matching the node's big-integer semantics.

use super::level_table::{self, SEOUL_BASELINE_DIFFICULTY};
use super::network::NetworkProfile;
use crate::utils::current_timestamp;
use num_bigint::{BigInt, BigUint, ToBigInt};
use serde::Serialize;

/// Uncle hash of a block without uncles
pub const EMPTY_UNCLE_HASH: &str =
    "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347";

/// Lower bound of the per-block adjustment factor
const MIN_ADJUSTMENT: i64 = -99;

/// Retargeting constants of one network profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetargetRule {
    /// Seconds per adjustment step (block time, or the annapurna divisor)
    pub divisor: u64,
    /// Fraction of the parent difficulty moved per step
    pub sensitivity: u64,
    /// Difficulty floor
    pub minimum: u64,
}

impl RetargetRule {
    /// Constants for `profile`
    pub fn for_profile(profile: NetworkProfile) -> Self {
        match profile {
            NetworkProfile::Default => Self {
                divisor: 36,
                sensitivity: 8,
                minimum: level_table::minimum_difficulty(),
            },
            NetworkProfile::Seoul => Self {
                divisor: 10,
                sensitivity: 8,
                minimum: SEOUL_BASELINE_DIFFICULTY,
            },
            NetworkProfile::Annapurna => Self {
                divisor: 7,
                sensitivity: 1024,
                minimum: SEOUL_BASELINE_DIFFICULTY,
            },
        }
    }
}

/// The parts of a parent block that retargeting depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentBlock {
    /// Parent timestamp in seconds
    pub time: u64,
    /// Parent difficulty
    pub difficulty: BigUint,
    /// Whether the parent includes uncles
    pub has_uncles: bool,
}

impl ParentBlock {
    /// Create a parent description
    pub fn new(time: u64, difficulty: BigUint, has_uncles: bool) -> Self {
        Self {
            time,
            difficulty,
            has_uncles,
        }
    }

    /// Create a parent description from its uncle hash
    pub fn from_uncle_hash(time: u64, difficulty: BigUint, uncle_hash: &str) -> Self {
        let has_uncles = !uncle_hash.eq_ignore_ascii_case(EMPTY_UNCLE_HASH);
        Self::new(time, difficulty, has_uncles)
    }
}

/// Difficulty of a block mined at `now` on top of `parent`
pub fn next_difficulty(now: u64, parent: &ParentBlock, profile: NetworkProfile) -> BigUint {
    let rule = RetargetRule::for_profile(profile);

    let elapsed = BigInt::from(now) - BigInt::from(parent.time);
    let steps = elapsed / BigInt::from(rule.divisor);
    let base = BigInt::from(if parent.has_uncles { 2 } else { 1 });
    let adjustment = (base - steps).max(BigInt::from(MIN_ADJUSTMENT));

    let parent_difficulty = parent.difficulty.to_bigint().unwrap_or_default();
    let step_size = &parent_difficulty / BigInt::from(rule.sensitivity);
    let next = parent_difficulty + step_size * adjustment;

    let minimum = BigInt::from(rule.minimum);
    next.max(minimum)
        .to_biguint()
        .unwrap_or_else(|| BigUint::from(rule.minimum))
}

/// Whether `difficulty` respects the profile floor
pub fn is_valid_difficulty(difficulty: &BigUint, profile: NetworkProfile) -> bool {
    *difficulty >= BigUint::from(RetargetRule::for_profile(profile).minimum)
}

/// Expected difficulty of a block arriving `target_block_time` seconds from now
pub fn predict_next_difficulty(
    parent: &ParentBlock,
    target_block_time: u64,
    profile: NetworkProfile,
) -> BigUint {
    next_difficulty(current_timestamp() + target_block_time, parent, profile)
}
