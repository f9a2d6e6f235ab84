//! Code parameter derivation
//!
//! Maps a header hash, a difficulty and a network profile to the geometry of
//! the LDPC code a nonce is decoded against.

use super::level_table::{self, LevelEntry};
use super::network::NetworkProfile;
use crate::error::{Error, Result};
use num_bigint::BigUint;
use std::fmt;

/// Size of a header hash in bytes
pub const HEADER_HASH_SIZE: usize = 32;

/// Fixed-size header hash the validation engine is keyed on
///
/// This is the only seed input the engine accepts; adapters convert node
/// responses and Stratum parameters into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderHash([u8; HEADER_HASH_SIZE]);

impl HeaderHash {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; HEADER_HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// The all-zero hash, used when a template carries no hash
    pub fn zero() -> Self {
        Self([0u8; HEADER_HASH_SIZE])
    }

    /// Parse a hex string, with or without `0x`
    ///
    /// Input shorter than 32 bytes is zero-padded on the right, longer input
    /// is truncated.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim_start_matches("0x").trim_start_matches("0X");
        let decoded = hex::decode(trimmed)
            .map_err(|e| Error::validation(format!("Invalid header hash hex: {}", e)))?;
        Ok(Self::from_slice(&decoded))
    }

    /// Build from an arbitrary byte slice, padding or truncating to 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; HEADER_HASH_SIZE];
        let len = bytes.len().min(HEADER_HASH_SIZE);
        out[..len].copy_from_slice(&bytes[..len]);
        Self(out)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; HEADER_HASH_SIZE] {
        &self.0
    }

    /// Graph seed: the sum of all hash bytes
    pub fn seed(&self) -> u64 {
        self.0.iter().map(|&b| u64::from(b)).sum()
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for HeaderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Geometry of one LDPC code instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeParameters {
    /// Code length (variable nodes)
    pub n: usize,
    /// Number of parity checks
    pub m: usize,
    /// Column weight
    pub wc: usize,
    /// Row weight
    pub wr: usize,
    /// Difficulty level the geometry was taken from
    pub level: usize,
    /// Permutation seed
    pub seed: u64,
}

impl CodeParameters {
    /// Acceptance window for decoded codewords under `profile`
    pub fn acceptance(&self, profile: NetworkProfile) -> LevelEntry {
        if profile.uses_seoul_code() {
            level_table::seoul_entry(self.level)
        } else {
            *level_table::lookup(self.level)
        }
    }
}

/// Resolve the difficulty level for `difficulty` under `profile`
pub fn level_for(difficulty: &BigUint, profile: NetworkProfile) -> usize {
    if profile.uses_seoul_code() {
        level_table::search_level_seoul(difficulty)
    } else {
        level_table::search_level(difficulty)
    }
}

/// Derive code parameters for a header at a given difficulty
pub fn derive(header: &HeaderHash, difficulty: &BigUint, profile: NetworkProfile) -> CodeParameters {
    let level = level_for(difficulty, profile);
    let entry = if profile.uses_seoul_code() {
        level_table::seoul_entry(level)
    } else {
        *level_table::lookup(level)
    };

    CodeParameters {
        n: entry.n,
        m: entry.m(),
        wc: entry.wc,
        wr: entry.wr,
        level,
        seed: header.seed(),
    }
}
