//! Share submission state machine
//!
//! Every `mining.submit` goes through [`ShareProcessor::on_submit`]:
//!
//! 1. the connection must be authorized
//! 2. the job must still be in the table
//! 3. the share key is reserved; a repeat is rejected without decoding
//! 4. a supplied codeword and mix digest must be structurally sound
//! 5. the share is validated at the connection's difficulty, and pool-valid
//!    shares are considered for promotion to a block
//! 6. vardiff adjusts the connection's difficulty
//!
//! Promotion re-validates at network difficulty with a locally decoded
//! codeword, then claims the block height. Only the first claimant of a
//! height reaches `submit_work`; a failed submission releases the claim.

use crate::config::{Config, PromotionPolicy};
use crate::core::network::NetworkProfile;
use crate::core::target;
use crate::core::{EccPowValidator, HeaderHash, SuppliedCodeword, ValidationResult};
use crate::error::{Error, Result};
use crate::persistence::{BlockRecord, Persistence, ShareRecord};
use crate::protocol::BlockchainRpc;
use crate::stratum::job::{Job, JobId, JobManager, ShareKey};
use crate::stratum::protocol::StratumErrorCode;
use crate::stratum::session::{Connection, WorkerIdentity};
use crate::stratum::vardiff::VardiffController;
use crate::utils::current_timestamp;
use num_bigint::BigUint;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Decodes a nonce against a header; the seam tests stub out
pub trait ShareValidator: Send + Sync + 'static {
    /// Validate a nonce at `difficulty`
    fn validate(
        &self,
        header: &HeaderHash,
        nonce: u64,
        difficulty: &BigUint,
        height: u64,
        supplied: Option<&SuppliedCodeword>,
    ) -> ValidationResult;

    /// Profile shares at `height` are judged under
    fn network_for(&self, height: u64) -> NetworkProfile;
}

impl ShareValidator for EccPowValidator {
    fn validate(
        &self,
        header: &HeaderHash,
        nonce: u64,
        difficulty: &BigUint,
        height: u64,
        supplied: Option<&SuppliedCodeword>,
    ) -> ValidationResult {
        self.validate_share(header, nonce, difficulty, height, supplied)
    }

    fn network_for(&self, height: u64) -> NetworkProfile {
        self.selector().detect(height)
    }
}

/// Reasons a submission is rejected with an error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Connection has not authorized
    #[error("Unauthorized worker")]
    Unauthorized,

    /// Job id unknown or evicted
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Share key already used for this job
    #[error("Duplicate share")]
    DuplicateShare,

    /// Codeword or mix digest failed structural checks
    #[error("Malformed ECCPoW data: {0}")]
    MalformedEccpowData(String),

    /// Wrong parameter count or types
    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl SubmitError {
    /// Stratum error code for the reply
    pub fn code(&self) -> StratumErrorCode {
        match self {
            Self::Unauthorized => StratumErrorCode::Unauthorized,
            Self::JobNotFound(_) => StratumErrorCode::JobNotFound,
            Self::DuplicateShare => StratumErrorCode::DuplicateShare,
            Self::MalformedEccpowData(_) => StratumErrorCode::MalformedEccpowData,
            Self::InvalidParams(_) => StratumErrorCode::Other,
        }
    }
}

/// Codeword fields of an extended submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCodeword {
    /// Codeword as hex
    pub codeword: String,
    /// Mix digest as hex
    pub mix_digest: String,
    /// Bits of the codeword that are meaningful
    pub code_length: Option<usize>,
}

/// Parsed `mining.submit` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Worker name as sent
    pub worker: String,
    /// Job the share is for
    pub job_id: JobId,
    /// Miner-chosen extranonce
    pub extranonce2: String,
    /// Time field
    pub ntime: String,
    /// Nonce
    pub nonce: u64,
    /// Extended codeword data
    pub codeword: Option<RawCodeword>,
}

impl Submission {
    /// Parse the 5, 7 or 8 submit parameters
    pub fn from_params(params: &[Value]) -> std::result::Result<Self, SubmitError> {
        if !matches!(params.len(), 5 | 7 | 8) {
            return Err(SubmitError::InvalidParams(format!(
                "expected 5, 7 or 8 params, got {}",
                params.len()
            )));
        }

        let nonce_str = string_param(params, 4, "nonce")?;
        let nonce = parse_nonce(nonce_str)?;

        let codeword = if params.len() >= 7 {
            Some(RawCodeword {
                codeword: string_param(params, 5, "codeword")?.to_string(),
                mix_digest: string_param(params, 6, "mixDigest")?.to_string(),
                code_length: params.get(7).map(parse_code_length).transpose()?,
            })
        } else {
            None
        };

        Ok(Self {
            worker: string_param(params, 0, "worker")?.to_string(),
            job_id: JobId::from_string(string_param(params, 1, "jobId")?),
            extranonce2: string_param(params, 2, "extraNonce2")?.to_string(),
            ntime: string_param(params, 3, "nTime")?.to_string(),
            nonce,
            codeword,
        })
    }

    /// Duplicate-detection key
    pub fn share_key(&self) -> ShareKey {
        ShareKey::new(self.job_id.clone(), &self.extranonce2, &self.ntime, self.nonce)
    }
}

fn string_param<'a>(
    params: &'a [Value],
    index: usize,
    name: &str,
) -> std::result::Result<&'a str, SubmitError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| SubmitError::InvalidParams(format!("{} must be a string", name)))
}

fn parse_nonce(s: &str) -> std::result::Result<u64, SubmitError> {
    let digits = s.trim_start_matches("0x");
    if digits.is_empty() || digits.len() > 16 {
        return Err(SubmitError::InvalidParams(format!("bad nonce: {}", s)));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|_| SubmitError::InvalidParams(format!("bad nonce: {}", s)))
}

fn parse_code_length(value: &Value) -> std::result::Result<usize, SubmitError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    };
    parsed
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| SubmitError::InvalidParams(format!("bad codeLength: {}", value)))
}

/// Result of an accepted or rejected submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Reply to the miner
    pub accepted: bool,
    /// Node acknowledgement when the share became a block
    pub block: Option<String>,
    /// Difficulty to push with `mining.set_difficulty`
    pub new_difficulty: Option<f64>,
}

impl SubmitOutcome {
    fn rejected() -> Self {
        Self {
            accepted: false,
            block: None,
            new_difficulty: None,
        }
    }
}

/// Share counters
#[derive(Debug, Default)]
struct ShareCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    stale: AtomicU64,
    malformed: AtomicU64,
    decode_failures: AtomicU64,
    candidates: AtomicU64,
    claims_lost: AtomicU64,
    blocks_submitted: AtomicU64,
    blocks_failed: AtomicU64,
}

/// Snapshot of the share counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShareStats {
    /// Pool-valid shares
    pub accepted: u64,
    /// Shares that failed validation
    pub rejected: u64,
    /// Repeated share keys
    pub duplicates: u64,
    /// Shares for unknown or evicted jobs
    pub stale: u64,
    /// Shares with malformed codeword data
    pub malformed: u64,
    /// Decode tasks that failed
    pub decode_failures: u64,
    /// Shares that also validated at network difficulty
    pub candidates: u64,
    /// Candidates that lost the height claim
    pub claims_lost: u64,
    /// Blocks the node accepted
    pub blocks_submitted: u64,
    /// Blocks the node rejected or did not answer for
    pub blocks_failed: u64,
    /// Sum of difficulty over accepted shares
    pub accepted_difficulty: f64,
}

/// Share submission state machine and block promotion
pub struct ShareProcessor {
    jobs: Arc<JobManager>,
    validator: Arc<dyn ShareValidator>,
    rpc: Arc<dyn BlockchainRpc>,
    persistence: Arc<dyn Persistence>,
    vardiff: VardiffController,
    policy: PromotionPolicy,
    permits: Arc<Semaphore>,
    submit_timeout: Duration,
    claims: Mutex<BTreeSet<u64>>,
    counters: ShareCounters,
    accepted_difficulty: Mutex<f64>,
}

impl std::fmt::Debug for ShareProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareProcessor")
            .field("policy", &self.policy)
            .field("vardiff", &self.vardiff)
            .field("submit_timeout", &self.submit_timeout)
            .finish_non_exhaustive()
    }
}

impl ShareProcessor {
    /// Create a processor over the shared job table
    pub fn new(
        config: &Config,
        jobs: Arc<JobManager>,
        validator: Arc<dyn ShareValidator>,
        rpc: Arc<dyn BlockchainRpc>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            jobs,
            validator,
            rpc,
            persistence,
            vardiff: VardiffController::new(config.vardiff.clone(), config.pool.base_difficulty),
            policy: config.promotion.policy,
            permits: Arc::new(Semaphore::new(config.pool.validation_concurrency.max(1))),
            submit_timeout: config.node.timeout(),
            claims: Mutex::new(BTreeSet::new()),
            counters: ShareCounters::default(),
            accepted_difficulty: Mutex::new(0.0),
        }
    }

    /// Handle `mining.authorize`
    pub async fn on_authorize(
        &self,
        connection: &Connection,
        username: &str,
        password: Option<&str>,
    ) -> Result<WorkerIdentity> {
        let identity = WorkerIdentity::from_login(username, password)?;

        if let Err(e) = self
            .persistence
            .get_or_create_miner(identity.address.as_str())
            .await
        {
            warn!(miner = %identity.address, "Failed to register miner: {}", e);
        }

        if !connection.authorize(identity.clone()) {
            return Err(Error::stratum("Connection already closed"));
        }
        info!(worker = %identity, "Worker authorized");
        Ok(identity)
    }

    /// Handle `mining.submit`
    pub async fn on_submit(
        &self,
        connection: &Connection,
        submission: Submission,
    ) -> std::result::Result<SubmitOutcome, SubmitError> {
        let identity = match connection.identity() {
            Some(identity) if connection.is_authorized() => identity,
            _ => return Err(SubmitError::Unauthorized),
        };

        let job = self.jobs.get_job(&submission.job_id).ok_or_else(|| {
            self.counters.stale.fetch_add(1, Ordering::Relaxed);
            SubmitError::JobNotFound(submission.job_id.to_string())
        })?;

        if !job.try_reserve(submission.share_key()) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %job.id(), nonce = submission.nonce, "Duplicate share");
            return Err(SubmitError::DuplicateShare);
        }

        let supplied = match &submission.codeword {
            Some(raw) => Some(
                SuppliedCodeword::parse(&raw.codeword, &raw.mix_digest, raw.code_length)
                    .map_err(|e| {
                        self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                        SubmitError::MalformedEccpowData(e.to_string())
                    })?,
            ),
            None => None,
        };

        let difficulty = connection.difficulty();
        let template = job.template();
        let result = self
            .run_validation(
                template.header_hash,
                submission.nonce,
                target::difficulty_from_f64(difficulty),
                template.height,
                supplied,
            )
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(job_id = %job.id(), nonce = submission.nonce, "Decode failed: {}", e);
                connection.record_invalid_share();
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                let record = ShareRecord {
                    miner: identity.address.to_string(),
                    worker: identity.worker.clone(),
                    job_id: job.id().to_string(),
                    height: template.height,
                    difficulty: difficulty as u64,
                    valid: false,
                    weight: -1,
                    level: 0,
                    network: self.validator.network_for(template.height),
                    nonce: submission.nonce,
                    reason: Some(format!("decode failure: {}", e)),
                    timestamp: current_timestamp(),
                };
                self.record_share(record).await;
                return Ok(SubmitOutcome::rejected());
            }
        };

        let reason = (!result.valid).then(|| rejection_reason(&result).to_string());
        self.record_share(ShareRecord {
            miner: identity.address.to_string(),
            worker: identity.worker.clone(),
            job_id: job.id().to_string(),
            height: template.height,
            difficulty: difficulty as u64,
            valid: result.valid,
            weight: result.weight,
            level: result.level,
            network: result.network,
            nonce: submission.nonce,
            reason: reason.clone(),
            timestamp: current_timestamp(),
        })
        .await;

        if !result.valid {
            connection.record_invalid_share();
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                worker = %identity,
                nonce = submission.nonce,
                weight = result.weight,
                "Share rejected: {}",
                reason.unwrap_or_default()
            );
            return Ok(SubmitOutcome::rejected());
        }

        let since_last = connection.record_valid_share(Instant::now());
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        *self.accepted_difficulty.lock() += difficulty;
        debug!(
            worker = %identity,
            nonce = submission.nonce,
            weight = result.weight,
            level = result.level,
            "Share accepted"
        );

        let block = self.promote(&identity, &job, &result).await;

        let new_difficulty = self.vardiff.adjust(difficulty, since_last);
        if let Some(next) = new_difficulty {
            connection.set_difficulty(next);
            debug!(worker = %identity, from = difficulty, to = next, "Difficulty adjusted");
        }

        Ok(SubmitOutcome {
            accepted: true,
            block,
            new_difficulty,
        })
    }

    /// Turn a pool-valid share into a block submission when it qualifies
    ///
    /// Returns the node's acknowledgement when the block was submitted.
    pub async fn promote(
        &self,
        identity: &WorkerIdentity,
        job: &Job,
        pool_result: &ValidationResult,
    ) -> Option<String> {
        let template = job.template();

        if self.policy == PromotionPolicy::TargetPrefilter {
            if !target::meets_network_level(
                pool_result.level,
                &template.network_difficulty,
                pool_result.network,
            ) {
                debug!(level = pool_result.level, "Share below network level");
                return None;
            }
        }

        let block_result = match self
            .run_validation(
                template.header_hash,
                pool_result.nonce,
                template.network_difficulty.clone(),
                template.height,
                None,
            )
            .await
        {
            Ok(result) if result.valid => result,
            Ok(_) => {
                debug!(nonce = pool_result.nonce, "Share below network difficulty");
                return None;
            }
            Err(e) => {
                warn!(nonce = pool_result.nonce, "Network re-validation failed: {}", e);
                return None;
            }
        };

        self.counters.candidates.fetch_add(1, Ordering::Relaxed);
        if !self.claim_height(template.height) {
            self.counters.claims_lost.fetch_add(1, Ordering::Relaxed);
            info!(
                height = template.height,
                worker = %identity,
                "Block candidate dropped, height already claimed"
            );
            return None;
        }

        let mix_digest = block_result.mix_digest();
        info!(
            height = template.height,
            nonce = block_result.nonce,
            worker = %identity,
            "Submitting block candidate"
        );

        let submission = tokio::time::timeout(
            self.submit_timeout,
            self.rpc
                .submit_work(block_result.nonce, &template.header_hash, &mix_digest),
        )
        .await
        .unwrap_or_else(|_| Err(Error::timeout("submit_work timed out")));

        match submission {
            Ok(ack) => {
                self.counters.blocks_submitted.fetch_add(1, Ordering::Relaxed);
                info!(height = template.height, ack = %ack, worker = %identity, "Block accepted");
                let record = BlockRecord {
                    height: template.height,
                    miner: identity.address.to_string(),
                    worker: identity.worker.clone(),
                    nonce: block_result.nonce,
                    header_hash: template.header_hash.to_hex(),
                    mix_digest: format!("0x{}", hex::encode(mix_digest)),
                    network_difficulty: template.network_difficulty.to_string(),
                    submission: ack.clone(),
                    timestamp: current_timestamp(),
                };
                if let Err(e) = self.persistence.record_block(&record).await {
                    warn!(height = template.height, "Failed to record block: {}", e);
                }
                Some(ack)
            }
            Err(e) => {
                self.release_height(template.height);
                self.counters.blocks_failed.fetch_add(1, Ordering::Relaxed);
                warn!(height = template.height, "Block submission failed: {}", e);
                None
            }
        }
    }

    /// Claim a height for submission; false when another share holds it
    pub fn claim_height(&self, height: u64) -> bool {
        self.claims.lock().insert(height)
    }

    /// Release a claim after a failed submission
    pub fn release_height(&self, height: u64) {
        self.claims.lock().remove(&height);
    }

    /// Drop claims below the current template height
    pub fn prune_claims(&self, current_height: u64) {
        let mut claims = self.claims.lock();
        *claims = claims.split_off(&current_height);
    }

    /// Heights currently claimed
    pub fn claimed_heights(&self) -> Vec<u64> {
        self.claims.lock().iter().copied().collect()
    }

    /// Counter snapshot
    pub fn stats(&self) -> ShareStats {
        let c = &self.counters;
        ShareStats {
            accepted: c.accepted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            stale: c.stale.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            candidates: c.candidates.load(Ordering::Relaxed),
            claims_lost: c.claims_lost.load(Ordering::Relaxed),
            blocks_submitted: c.blocks_submitted.load(Ordering::Relaxed),
            blocks_failed: c.blocks_failed.load(Ordering::Relaxed),
            accepted_difficulty: *self.accepted_difficulty.lock(),
        }
    }

    async fn run_validation(
        &self,
        header: HeaderHash,
        nonce: u64,
        difficulty: BigUint,
        height: u64,
        supplied: Option<SuppliedCodeword>,
    ) -> Result<ValidationResult> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::other(format!("Validation pool closed: {}", e)))?;

        let validator = Arc::clone(&self.validator);
        tokio::task::spawn_blocking(move || {
            validator.validate(&header, nonce, &difficulty, height, supplied.as_ref())
        })
        .await
        .map_err(|e| Error::validation(format!("Decoder task failed: {}", e)))
    }

    async fn record_share(&self, record: ShareRecord) {
        if let Err(e) = self.persistence.record_share(&record).await {
            warn!(job_id = %record.job_id, "Failed to record share: {}", e);
        }
    }
}

fn rejection_reason(result: &ValidationResult) -> &'static str {
    if result.weight < 0 {
        "parity check failed"
    } else {
        "weight outside acceptance window"
    }
}
