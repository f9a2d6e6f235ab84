//! Share submission state machine with stub validator and node

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use worldland_pool::config::{Config, PromotionPolicy};
use worldland_pool::core::{HeaderHash, NetworkProfile, SuppliedCodeword, ValidationResult};
use worldland_pool::error::{Error, Result};
use worldland_pool::persistence::{Persistence, PersistenceService};
use worldland_pool::protocol::{BlockTemplate, BlockchainRpc, LatestBlock};
use worldland_pool::stratum::{
    Connection, JobId, JobManager, ShareProcessor, ShareValidator, Submission, SubmitError,
};

const ADDR: &str = "0x1234567890abcdef1234567890abcdef12345678";
const NETWORK_DIFFICULTY: u64 = 1_000_000;
const HEIGHT: u64 = 100;

/// Accepts even nonces at pool difficulty and the listed nonces at network difficulty
#[derive(Default)]
struct StubValidator {
    block_nonces: HashSet<u64>,
    share_level: usize,
    pool_calls: AtomicUsize,
    network_calls: AtomicUsize,
    network_with_supplied: AtomicUsize,
}

impl StubValidator {
    fn with_blocks(nonces: &[u64]) -> Self {
        Self {
            block_nonces: nonces.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn at_level(mut self, level: usize) -> Self {
        self.share_level = level;
        self
    }
}

impl ShareValidator for StubValidator {
    fn validate(
        &self,
        _header: &HeaderHash,
        nonce: u64,
        difficulty: &BigUint,
        _height: u64,
        supplied: Option<&SuppliedCodeword>,
    ) -> ValidationResult {
        let at_network = *difficulty >= BigUint::from(NETWORK_DIFFICULTY);
        let valid = if at_network {
            self.network_calls.fetch_add(1, Ordering::SeqCst);
            if supplied.is_some() {
                self.network_with_supplied.fetch_add(1, Ordering::SeqCst);
            }
            self.block_nonces.contains(&nonce)
        } else {
            self.pool_calls.fetch_add(1, Ordering::SeqCst);
            nonce % 2 == 0
        };

        ValidationResult {
            valid,
            weight: if valid { 1 } else { -1 },
            level: self.share_level,
            network: NetworkProfile::Default,
            digest: vec![0xab; 64],
            nonce,
            codeword: vec![0; 32],
            client_supplied: supplied.is_some(),
        }
    }

    fn network_for(&self, _height: u64) -> NetworkProfile {
        NetworkProfile::Default
    }
}

/// Node that records submissions, optionally failing the first few
#[derive(Default)]
struct StubRpc {
    submitted: Mutex<Vec<u64>>,
    failures_left: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl BlockchainRpc for StubRpc {
    async fn get_latest_block(&self) -> Result<LatestBlock> {
        Ok(LatestBlock {
            hash: HeaderHash::from_bytes([7; 32]),
            parent_hash: HeaderHash::zero(),
            height: HEIGHT - 1,
            difficulty: BigUint::from(NETWORK_DIFFICULTY),
            timestamp: 1_700_000_000,
            uncle_hash: None,
        })
    }

    async fn submit_work(
        &self,
        nonce: u64,
        _header: &HeaderHash,
        _mix_digest: &[u8; 32],
    ) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::rpc("rejected"));
        }
        self.submitted.lock().push(nonce);
        Ok(format!("0x{:064x}", nonce))
    }
}

struct Harness {
    processor: Arc<ShareProcessor>,
    jobs: Arc<JobManager>,
    validator: Arc<StubValidator>,
    rpc: Arc<StubRpc>,
    persistence: Arc<PersistenceService>,
    job_id: JobId,
}

fn template(height: u64) -> BlockTemplate {
    BlockTemplate {
        height,
        header_hash: HeaderHash::from_bytes([height as u8; 32]),
        prev_block_hash: HeaderHash::from_bytes([height as u8; 32]),
        network_difficulty: BigUint::from(NETWORK_DIFFICULTY),
        timestamp: 1_700_000_000,
    }
}

fn harness(validator: StubValidator, rpc: StubRpc, policy: PromotionPolicy) -> Harness {
    let mut config = Config::default();
    config.promotion.policy = policy;
    config.pool.validation_concurrency = 2;
    config.node.timeout_secs = 2;

    let jobs = Arc::new(JobManager::new(config.pool.max_jobs));
    let job_id = jobs.create_job(template(HEIGHT)).id().clone();
    let validator = Arc::new(validator);
    let rpc = Arc::new(rpc);
    let persistence = Arc::new(PersistenceService::new(config.persistence.clone()));
    persistence.start().unwrap();

    let processor = Arc::new(ShareProcessor::new(
        &config,
        Arc::clone(&jobs),
        Arc::clone(&validator) as Arc<dyn ShareValidator>,
        Arc::clone(&rpc) as Arc<dyn BlockchainRpc>,
        Arc::clone(&persistence) as Arc<dyn Persistence>,
    ));

    Harness {
        processor,
        jobs,
        validator,
        rpc,
        persistence,
        job_id,
    }
}

async fn authorized(h: &Harness, worker: &str) -> Connection {
    let conn = Connection::new(None, "00000000".to_string(), 1000.0);
    h.processor
        .on_authorize(&conn, &format!("{}.{}", ADDR, worker), None)
        .await
        .unwrap();
    conn
}

fn submission(job_id: &JobId, nonce: u64) -> Submission {
    Submission {
        worker: format!("{}.rig", ADDR),
        job_id: job_id.clone(),
        extranonce2: "00000000".to_string(),
        ntime: "6553f100".to_string(),
        nonce,
        codeword: None,
    }
}

#[tokio::test]
async fn test_unauthorized_submit_is_rejected() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = Connection::new(None, "00000000".to_string(), 1000.0);

    let err = h.processor.on_submit(&conn, submission(&h.job_id, 2)).await.unwrap_err();
    assert_eq!(err, SubmitError::Unauthorized);
    assert_eq!(h.validator.pool_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_login_leaves_connection_unauthorized() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = Connection::new(None, "00000000".to_string(), 1000.0);

    let err = h.processor.on_authorize(&conn, "not-an-address", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));
    assert!(!conn.is_authorized());
}

#[tokio::test]
async fn test_unknown_job_is_rejected() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let err = h
        .processor
        .on_submit(&conn, submission(&JobId::from_string("ffff"), 2))
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::JobNotFound("ffff".to_string()));
    assert_eq!(h.processor.stats().stale, 1);
}

#[tokio::test]
async fn test_duplicate_share_never_reaches_validator() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let first = h.processor.on_submit(&conn, submission(&h.job_id, 2)).await.unwrap();
    assert!(first.accepted);
    let calls = h.validator.pool_calls.load(Ordering::SeqCst);

    let mut repeat = submission(&h.job_id, 2);
    repeat.ntime = "6553F100".to_string();
    let err = h.processor.on_submit(&conn, repeat).await.unwrap_err();
    assert_eq!(err, SubmitError::DuplicateShare);
    assert_eq!(h.validator.pool_calls.load(Ordering::SeqCst), calls);
    assert_eq!(h.processor.stats().duplicates, 1);

    // a rejected share also consumes its key
    let rejected = h.processor.on_submit(&conn, submission(&h.job_id, 3)).await.unwrap();
    assert!(!rejected.accepted);
    let err = h.processor.on_submit(&conn, submission(&h.job_id, 3)).await.unwrap_err();
    assert_eq!(err, SubmitError::DuplicateShare);
}

#[tokio::test]
async fn test_invalid_share_counts_against_connection() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let outcome = h.processor.on_submit(&conn, submission(&h.job_id, 5)).await.unwrap();
    assert!(!outcome.accepted);
    assert_eq!(outcome.block, None);
    assert_eq!(conn.snapshot().invalid_shares, 1);
    assert_eq!(h.processor.stats().rejected, 1);
    assert_eq!(h.validator.network_calls.load(Ordering::SeqCst), 0);

    h.persistence.stop().await.unwrap();
    let shares = h.persistence.recent_shares();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].reason.as_deref(), Some("parity check failed"));
}

#[tokio::test]
async fn test_malformed_codeword_is_rejected() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let mut sub = submission(&h.job_id, 2);
    sub.codeword = Some(worldland_pool::stratum::shares::RawCodeword {
        codeword: "ffff".to_string(),
        mix_digest: "abcd".to_string(),
        code_length: None,
    });
    let err = h.processor.on_submit(&conn, sub).await.unwrap_err();
    assert!(matches!(err, SubmitError::MalformedEccpowData(_)));
    assert_eq!(err.code().code(), -23);
    assert_eq!(h.validator.pool_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pool_valid_network_invalid_is_not_submitted() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let outcome = h.processor.on_submit(&conn, submission(&h.job_id, 2)).await.unwrap();
    assert!(outcome.accepted);
    assert_eq!(outcome.block, None);
    assert_eq!(h.validator.network_calls.load(Ordering::SeqCst), 1);
    assert!(h.rpc.submitted.lock().is_empty());
    assert!(h.processor.claimed_heights().is_empty());
}

#[tokio::test]
async fn test_block_candidate_is_submitted() {
    let h = harness(
        StubValidator::with_blocks(&[42]),
        StubRpc::default(),
        PromotionPolicy::Revalidate,
    );
    let conn = authorized(&h, "rig").await;

    let mut sub = submission(&h.job_id, 42);
    sub.codeword = Some(worldland_pool::stratum::shares::RawCodeword {
        codeword: "ffff".to_string(),
        mix_digest: "00".repeat(32),
        code_length: None,
    });
    let outcome = h.processor.on_submit(&conn, sub).await.unwrap();
    assert!(outcome.accepted);
    assert_eq!(outcome.block, Some(format!("0x{:064x}", 42)));
    assert_eq!(*h.rpc.submitted.lock(), vec![42]);
    // re-validation decodes locally
    assert_eq!(h.validator.network_with_supplied.load(Ordering::SeqCst), 0);
    assert_eq!(h.processor.claimed_heights(), vec![HEIGHT]);

    h.persistence.stop().await.unwrap();
    let blocks = h.persistence.blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].height, HEIGHT);
    assert_eq!(blocks[0].nonce, 42);
    assert_eq!(blocks[0].network_difficulty, NETWORK_DIFFICULTY.to_string());
}

#[tokio::test]
async fn test_two_candidates_same_height_submit_once() {
    let rpc = StubRpc {
        delay: Duration::from_millis(50),
        ..StubRpc::default()
    };
    let h = harness(
        StubValidator::with_blocks(&[10, 20]),
        rpc,
        PromotionPolicy::Revalidate,
    );
    let alice = authorized(&h, "alice").await;
    let bob = authorized(&h, "bob").await;

    let (a, b) = tokio::join!(
        h.processor.on_submit(&alice, submission(&h.job_id, 10)),
        h.processor.on_submit(&bob, submission(&h.job_id, 20)),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert!(a.accepted && b.accepted);
    assert_eq!(h.rpc.submitted.lock().len(), 1);
    assert_eq!(
        [a.block.is_some(), b.block.is_some()].iter().filter(|x| **x).count(),
        1
    );
    let stats = h.processor.stats();
    assert_eq!(stats.candidates, 2);
    assert_eq!(stats.claims_lost, 1);
    assert_eq!(stats.blocks_submitted, 1);
}

#[tokio::test]
async fn test_many_candidates_same_height_submit_once() {
    let nonces = [10u64, 20, 30, 40, 50, 60];
    let rpc = StubRpc {
        delay: Duration::from_millis(20),
        ..StubRpc::default()
    };
    let h = harness(StubValidator::with_blocks(&nonces), rpc, PromotionPolicy::Revalidate);

    let mut connections = Vec::new();
    for i in 0..nonces.len() {
        connections.push(authorized(&h, &format!("rig{}", i)).await);
    }

    let outcomes = futures::future::join_all(
        connections
            .iter()
            .zip(nonces)
            .map(|(conn, nonce)| h.processor.on_submit(conn, submission(&h.job_id, nonce))),
    )
    .await;

    let blocks = outcomes
        .into_iter()
        .map(|o| o.unwrap())
        .filter(|o| o.block.is_some())
        .count();
    assert_eq!(blocks, 1);
    assert_eq!(h.rpc.submitted.lock().len(), 1);
    assert_eq!(h.processor.stats().claims_lost, nonces.len() as u64 - 1);
}

#[tokio::test]
async fn test_failed_submission_releases_claim() {
    let rpc = StubRpc {
        failures_left: AtomicUsize::new(1),
        ..StubRpc::default()
    };
    let h = harness(
        StubValidator::with_blocks(&[10, 20]),
        rpc,
        PromotionPolicy::Revalidate,
    );
    let conn = authorized(&h, "rig").await;

    let first = h.processor.on_submit(&conn, submission(&h.job_id, 10)).await.unwrap();
    assert!(first.accepted);
    assert_eq!(first.block, None);
    assert!(h.processor.claimed_heights().is_empty());

    let second = h.processor.on_submit(&conn, submission(&h.job_id, 20)).await.unwrap();
    assert!(second.block.is_some());
    assert_eq!(*h.rpc.submitted.lock(), vec![20]);

    let stats = h.processor.stats();
    assert_eq!(stats.blocks_failed, 1);
    assert_eq!(stats.blocks_submitted, 1);
}

#[tokio::test]
async fn test_target_prefilter_skips_weak_shares() {
    let h = harness(
        StubValidator::with_blocks(&[42]),
        StubRpc::default(),
        PromotionPolicy::TargetPrefilter,
    );
    let conn = authorized(&h, "rig").await;

    // level 0 sits below the network level for difficulty 1e6
    let outcome = h.processor.on_submit(&conn, submission(&h.job_id, 42)).await.unwrap();
    assert!(outcome.accepted);
    assert_eq!(outcome.block, None);
    assert_eq!(h.validator.network_calls.load(Ordering::SeqCst), 0);
    assert!(h.rpc.submitted.lock().is_empty());
}

#[tokio::test]
async fn test_target_prefilter_promotes_network_level_shares() {
    let h = harness(
        StubValidator::with_blocks(&[42]).at_level(380),
        StubRpc::default(),
        PromotionPolicy::TargetPrefilter,
    );
    let conn = authorized(&h, "rig").await;

    let outcome = h.processor.on_submit(&conn, submission(&h.job_id, 42)).await.unwrap();
    assert!(outcome.accepted);
    assert!(outcome.block.is_some());
    assert_eq!(h.validator.network_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*h.rpc.submitted.lock(), vec![42]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_identical_submissions_validate_once() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let (a, b) = tokio::join!(
        h.processor.on_submit(&conn, submission(&h.job_id, 8)),
        h.processor.on_submit(&conn, submission(&h.job_id, 8)),
    );

    let mut results = [a, b];
    results.sort_by_key(|r| r.is_err());
    assert!(results[0].as_ref().unwrap().accepted);
    assert_eq!(results[1].as_ref().unwrap_err(), &SubmitError::DuplicateShare);
    assert_eq!(h.validator.pool_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_vardiff_raises_difficulty_on_fast_shares() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    let first = h.processor.on_submit(&conn, submission(&h.job_id, 2)).await.unwrap();
    assert_eq!(first.new_difficulty, None);

    let second = h.processor.on_submit(&conn, submission(&h.job_id, 4)).await.unwrap();
    let next = second.new_difficulty.unwrap();
    assert!((next - 1100.0).abs() < 1e-9);
    assert!((conn.difficulty() - 1100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_stale_job_accepted_until_evicted() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    let conn = authorized(&h, "rig").await;

    h.jobs.create_job(template(HEIGHT + 1));
    let outcome = h.processor.on_submit(&conn, submission(&h.job_id, 2)).await.unwrap();
    assert!(outcome.accepted);

    for height in HEIGHT + 2..HEIGHT + 12 {
        h.jobs.create_job(template(height));
    }
    let err = h.processor.on_submit(&conn, submission(&h.job_id, 4)).await.unwrap_err();
    assert_eq!(err, SubmitError::JobNotFound(h.job_id.to_string()));
}

#[tokio::test]
async fn test_prune_claims_below_height() {
    let h = harness(StubValidator::default(), StubRpc::default(), PromotionPolicy::Revalidate);
    assert!(h.processor.claim_height(5));
    assert!(h.processor.claim_height(9));
    assert!(!h.processor.claim_height(9));

    h.processor.prune_claims(9);
    assert_eq!(h.processor.claimed_heights(), vec![9]);
}
