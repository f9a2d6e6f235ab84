//! Job management for the Stratum pool
//!
//! Each block template becomes a [`Job`]. The table is bounded and evicts the
//! oldest job first; superseded jobs stay valid as `Stale` until evicted.

use crate::protocol::BlockTemplate;
use crate::stratum::protocol::NotifyParams;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

/// Block version sent in `mining.notify`
pub const NOTIFY_VERSION: &str = "0x20000000";

/// Default number of jobs kept
pub const DEFAULT_MAX_JOBS: usize = 10;

/// Job identifier with hex encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a job ID from a counter value
    pub fn new(id: u64) -> Self {
        JobId(format!("{:x}", id))
    }

    /// Job ID as sent by a miner
    pub fn from_string(s: impl Into<String>) -> Self {
        JobId(s.into())
    }

    /// Get the job ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    /// Built from the current template
    Active,
    /// Superseded but still accepting shares
    Stale,
    /// Dropped from the table
    Evicted,
}

impl JobState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Stale,
            _ => Self::Evicted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Stale => 1,
            Self::Evicted => 2,
        }
    }
}

/// Identity of a submission within a job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareKey {
    /// Job the share targets
    pub job_id: JobId,
    /// Miner-chosen extranonce, lowercased
    pub extranonce2: String,
    /// Submitted time field, lowercased
    pub ntime: String,
    /// Submitted nonce
    pub nonce: u64,
}

impl ShareKey {
    /// Build a key, normalising hex case
    pub fn new(job_id: JobId, extranonce2: &str, ntime: &str, nonce: u64) -> Self {
        Self {
            job_id,
            extranonce2: extranonce2.to_ascii_lowercase(),
            ntime: ntime.to_ascii_lowercase(),
            nonce,
        }
    }
}

/// Mining job
#[derive(Debug)]
pub struct Job {
    id: JobId,
    template: BlockTemplate,
    created_at: Instant,
    state: AtomicU8,
    share_keys: Mutex<HashSet<ShareKey>>,
}

impl Job {
    /// Create an active job for a template
    pub fn new(id: JobId, template: BlockTemplate) -> Self {
        Self {
            id,
            template,
            created_at: Instant::now(),
            state: AtomicU8::new(JobState::Active.as_u8()),
            share_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Job identifier
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Template the job was built from
    pub fn template(&self) -> &BlockTemplate {
        &self.template
    }

    /// Height of the block being mined
    pub fn height(&self) -> u64 {
        self.template.height
    }

    /// Seconds since the job was created
    pub fn age_seconds(&self) -> u64 {
        self.created_at.elapsed().as_secs()
    }

    /// Lifecycle state
    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: JobState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Reserve a share key; false when it was already used
    pub fn try_reserve(&self, key: ShareKey) -> bool {
        self.share_keys.lock().insert(key)
    }

    /// Number of distinct shares submitted
    pub fn share_count(&self) -> usize {
        self.share_keys.lock().len()
    }

    /// Parameters for `mining.notify`
    ///
    /// `prevhash` doubles as the header hash miners seed ECCPoW with, and
    /// `nbits` carries the network difficulty.
    pub fn notify_params(&self, clean_jobs: bool) -> NotifyParams {
        NotifyParams {
            job_id: self.id.to_string(),
            prevhash: self.template.prev_block_hash.to_hex(),
            coinb1: String::new(),
            coinb2: String::new(),
            merkle_branch: Vec::new(),
            version: NOTIFY_VERSION.to_string(),
            nbits: format!("0x{}", self.template.network_difficulty.to_str_radix(16)),
            ntime: format!("{:x}", self.template.timestamp),
            clean_jobs,
        }
    }
}

/// Job table statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// Jobs in the table
    pub total_jobs: usize,
    /// Jobs created since start
    pub created: u64,
    /// Age of the oldest job in seconds
    pub oldest_age_seconds: u64,
}

/// Bounded job table
#[derive(Debug)]
pub struct JobManager {
    job_counter: AtomicU64,
    jobs: RwLock<VecDeque<Arc<Job>>>,
    max_jobs: usize,
}

impl JobManager {
    /// Create a job manager keeping at most `max_jobs` jobs
    pub fn new(max_jobs: usize) -> Self {
        Self {
            job_counter: AtomicU64::new(0),
            jobs: RwLock::new(VecDeque::new()),
            max_jobs: max_jobs.max(1),
        }
    }

    fn next_job_id(&self) -> JobId {
        let id = self.job_counter.fetch_add(1, Ordering::Relaxed) + 1;
        JobId::new(id)
    }

    /// Create a job for a new template
    ///
    /// Older jobs turn stale; the oldest ones are evicted past the cap.
    pub fn create_job(&self, template: BlockTemplate) -> Arc<Job> {
        let job = Arc::new(Job::new(self.next_job_id(), template));

        let mut jobs = self.jobs.write();
        for old in jobs.iter() {
            if old.state() == JobState::Active {
                old.set_state(JobState::Stale);
            }
        }
        jobs.push_back(Arc::clone(&job));
        while jobs.len() > self.max_jobs {
            if let Some(evicted) = jobs.pop_front() {
                evicted.set_state(JobState::Evicted);
            }
        }

        job
    }

    /// Look up a job that has not been evicted
    pub fn get_job(&self, job_id: &JobId) -> Option<Arc<Job>> {
        self.jobs.read().iter().find(|job| job.id() == job_id).cloned()
    }

    /// Most recent job
    pub fn current_job(&self) -> Option<Arc<Job>> {
        self.jobs.read().back().cloned()
    }

    /// Get job count
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    /// Get job statistics
    pub fn get_stats(&self) -> JobStats {
        let jobs = self.jobs.read();
        JobStats {
            total_jobs: jobs.len(),
            created: self.job_counter.load(Ordering::Relaxed),
            oldest_age_seconds: jobs.front().map(|job| job.age_seconds()).unwrap_or(0),
        }
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HeaderHash;
    use num_bigint::BigUint;

    fn template(height: u64) -> BlockTemplate {
        BlockTemplate {
            height,
            header_hash: HeaderHash::from_bytes([height as u8; 32]),
            prev_block_hash: HeaderHash::from_bytes([height as u8; 32]),
            network_difficulty: BigUint::from(1000u32),
            timestamp: 0x65f0_a1b2,
        }
    }

    #[test]
    fn test_job_id() {
        assert_eq!(JobId::new(255).as_str(), "ff");
        assert_eq!(JobId::from_string("ff"), JobId::new(255));
    }

    #[test]
    fn test_job_manager_eviction() {
        let manager = JobManager::new(2);

        let job1 = manager.create_job(template(1));
        let job2 = manager.create_job(template(2));
        assert_eq!(manager.job_count(), 2);
        assert_eq!(job1.state(), JobState::Stale);
        assert_eq!(job2.state(), JobState::Active);
        assert_eq!(job1.id().as_str(), "1");

        let job3 = manager.create_job(template(3));
        assert_eq!(manager.job_count(), 2);
        assert_eq!(job1.state(), JobState::Evicted);
        assert!(manager.get_job(job1.id()).is_none());
        assert!(manager.get_job(job2.id()).is_some());
        assert_eq!(manager.current_job().map(|j| j.id().clone()), Some(job3.id().clone()));

        let stats = manager.get_stats();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.created, 3);
    }

    #[test]
    fn test_share_key_reservation() {
        let job = Job::new(JobId::new(1), template(1));
        let key = ShareKey::new(job.id().clone(), "0000ABCD", "65f0a1b2", 42);

        assert!(job.try_reserve(key.clone()));
        assert!(!job.try_reserve(key));
        assert!(!job.try_reserve(ShareKey::new(JobId::new(1), "0000abcd", "65F0A1B2", 42)));
        assert!(job.try_reserve(ShareKey::new(JobId::new(1), "0000abcd", "65f0a1b2", 43)));
        assert_eq!(job.share_count(), 2);
    }

    #[test]
    fn test_notify_params() {
        let job = Job::new(JobId::new(26), template(7));
        let params = job.notify_params(true);
        assert_eq!(params.job_id, "1a");
        assert_eq!(params.prevhash, job.template().prev_block_hash.to_hex());
        assert_eq!(params.version, NOTIFY_VERSION);
        assert_eq!(params.nbits, "0x3e8");
        assert_eq!(params.ntime, "65f0a1b2");
        assert!(params.clean_jobs);
        assert_eq!(params.to_params().len(), 9);
    }
}
