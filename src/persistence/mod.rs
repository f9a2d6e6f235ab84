//! Share and block recording
//!
//! The share pipeline reports every decision through the narrow
//! [`Persistence`] trait. [`PersistenceService`] is the in-process
//! implementation: records are queued and written in batches by a background
//! task that is started and stopped explicitly.

mod service;

pub use service::{MinerStats, PersistenceService, PersistenceStats};

use crate::core::network::NetworkProfile;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of one submitted share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    /// Miner address
    pub miner: String,
    /// Worker name
    pub worker: String,
    /// Job the share was submitted for
    pub job_id: String,
    /// Height of the job's block
    pub height: u64,
    /// Pool difficulty the share was judged at
    pub difficulty: u64,
    /// Whether the share was accepted
    pub valid: bool,
    /// Codeword weight, -1 on parity failure
    pub weight: i64,
    /// Difficulty level of the code
    pub level: usize,
    /// Profile the share was judged under
    pub network: NetworkProfile,
    /// Submitted nonce
    pub nonce: u64,
    /// Rejection reason for invalid shares
    pub reason: Option<String>,
    /// Seconds since the epoch
    pub timestamp: u64,
}

/// A block candidate the node accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block height
    pub height: u64,
    /// Miner address
    pub miner: String,
    /// Worker name
    pub worker: String,
    /// Winning nonce
    pub nonce: u64,
    /// Header hash the nonce was found for
    pub header_hash: String,
    /// Mix digest sent with the block
    pub mix_digest: String,
    /// Network difficulty, decimal
    pub network_difficulty: String,
    /// Node acknowledgement
    pub submission: String,
    /// Seconds since the epoch
    pub timestamp: u64,
}

/// A miner known to the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerRecord {
    /// Sequential id, starting at 1
    pub id: u64,
    /// Miner address
    pub address: String,
    /// First time the miner was seen
    pub created_at: u64,
}

/// Recording hooks the share pipeline calls after each decision
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Record a share decision
    async fn record_share(&self, share: &ShareRecord) -> Result<()>;

    /// Record an accepted block
    async fn record_block(&self, block: &BlockRecord) -> Result<()>;

    /// Look up a miner by address, creating it on first sight
    async fn get_or_create_miner(&self, address: &str) -> Result<MinerRecord>;
}
