//! In-process persistence service

use super::{BlockRecord, MinerRecord, Persistence, ShareRecord};
use crate::config::PersistenceConfig;
use crate::error::{Error, Result};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shares kept for inspection
const RECENT_SHARES: usize = 1_000;

enum Record {
    Share(ShareRecord),
    Block(BlockRecord),
}

/// Per-miner aggregates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MinerStats {
    /// Accepted shares
    pub valid_shares: u64,
    /// Rejected shares
    pub invalid_shares: u64,
    /// Sum of pool difficulty over accepted shares
    pub accepted_difficulty: u64,
    /// Blocks found
    pub blocks: u64,
    /// Time of the last share
    pub last_share_at: u64,
}

/// Service-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceStats {
    /// Shares written
    pub shares_recorded: u64,
    /// Blocks written
    pub blocks_recorded: u64,
    /// Known miners
    pub miners: usize,
    /// Batches flushed
    pub batches_flushed: u64,
    /// Records dropped because the queue was full
    pub dropped: u64,
}

#[derive(Default)]
struct Ledger {
    miners: DashMap<String, MinerRecord>,
    next_miner_id: AtomicU64,
    miner_stats: DashMap<String, MinerStats>,
    recent_shares: RwLock<VecDeque<ShareRecord>>,
    blocks: RwLock<Vec<BlockRecord>>,
    shares_recorded: AtomicU64,
    blocks_recorded: AtomicU64,
    batches_flushed: AtomicU64,
    dropped: AtomicU64,
}

impl Ledger {
    fn apply(&self, batch: Vec<Record>) {
        let size = batch.len();
        for record in batch {
            match record {
                Record::Share(share) => {
                    {
                        let mut stats = self.miner_stats.entry(share.miner.clone()).or_default();
                        if share.valid {
                            stats.valid_shares += 1;
                            stats.accepted_difficulty += share.difficulty;
                        } else {
                            stats.invalid_shares += 1;
                        }
                        stats.last_share_at = stats.last_share_at.max(share.timestamp);
                    }

                    let mut recent = self.recent_shares.write();
                    if recent.len() == RECENT_SHARES {
                        recent.pop_front();
                    }
                    recent.push_back(share);
                    self.shares_recorded.fetch_add(1, Ordering::Relaxed);
                }
                Record::Block(block) => {
                    self.miner_stats.entry(block.miner.clone()).or_default().blocks += 1;
                    info!(height = block.height, miner = %block.miner, "Block recorded");
                    self.blocks.write().push(block);
                    self.blocks_recorded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        debug!(records = size, "Flushed persistence batch");
    }
}

/// Batched, in-memory implementation of [`Persistence`]
///
/// Records are only accepted between [`start`](Self::start) and
/// [`stop`](Self::stop). Stopping drains the queue before returning.
pub struct PersistenceService {
    config: PersistenceConfig,
    ledger: Arc<Ledger>,
    sender: Mutex<Option<mpsc::Sender<Record>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceService {
    /// Create a stopped service
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            ledger: Arc::new(Ledger::default()),
            sender: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Spawn the background writer
    pub fn start(&self) -> Result<()> {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return Err(Error::persistence("Persistence service already running"));
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let handle = tokio::spawn(run_writer(
            rx,
            Arc::clone(&self.ledger),
            self.config.batch_size,
            Duration::from_millis(self.config.flush_interval_ms.max(1)),
        ));

        *sender = Some(tx);
        *self.writer.lock() = Some(handle);
        info!(
            batch_size = self.config.batch_size,
            queue_capacity = self.config.queue_capacity,
            "Persistence service started"
        );
        Ok(())
    }

    /// Flush outstanding records and stop the writer
    pub async fn stop(&self) -> Result<()> {
        // dropping the last sender ends the writer loop after it drains
        let sender = self.sender.lock().take();
        drop(sender);

        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| Error::persistence(format!("Writer task failed: {}", e)))?;
            info!("Persistence service stopped");
        }
        Ok(())
    }

    /// Whether the writer is running
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    fn enqueue(&self, record: Record) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| Error::persistence("Persistence service is not running"))?;

        sender.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.ledger.dropped.fetch_add(1, Ordering::Relaxed);
                Error::persistence("Persistence queue is full")
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::channel_send("Persistence writer has exited")
            }
        })
    }

    /// Service-wide counters
    pub fn stats(&self) -> PersistenceStats {
        PersistenceStats {
            shares_recorded: self.ledger.shares_recorded.load(Ordering::Relaxed),
            blocks_recorded: self.ledger.blocks_recorded.load(Ordering::Relaxed),
            miners: self.ledger.miners.len(),
            batches_flushed: self.ledger.batches_flushed.load(Ordering::Relaxed),
            dropped: self.ledger.dropped.load(Ordering::Relaxed),
        }
    }

    /// Aggregates for one miner
    pub fn miner_stats(&self, address: &str) -> Option<MinerStats> {
        self.ledger
            .miner_stats
            .get(&address.to_ascii_lowercase())
            .map(|s| s.value().clone())
    }

    /// Recorded blocks, oldest first
    pub fn blocks(&self) -> Vec<BlockRecord> {
        self.ledger.blocks.read().clone()
    }

    /// Most recent shares, oldest first
    pub fn recent_shares(&self) -> Vec<ShareRecord> {
        self.ledger.recent_shares.read().iter().cloned().collect()
    }
}

async fn run_writer(
    mut rx: mpsc::Receiver<Record>,
    ledger: Arc<Ledger>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            record = rx.recv() => match record {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        ledger.apply(std::mem::take(&mut batch));
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    ledger.apply(std::mem::take(&mut batch));
                }
            }
        }
    }

    if !batch.is_empty() {
        ledger.apply(batch);
    }
}

#[async_trait]
impl Persistence for PersistenceService {
    async fn record_share(&self, share: &ShareRecord) -> Result<()> {
        let mut share = share.clone();
        share.miner = share.miner.to_ascii_lowercase();
        self.enqueue(Record::Share(share))
    }

    async fn record_block(&self, block: &BlockRecord) -> Result<()> {
        let mut block = block.clone();
        block.miner = block.miner.to_ascii_lowercase();
        self.enqueue(Record::Block(block))
    }

    async fn get_or_create_miner(&self, address: &str) -> Result<MinerRecord> {
        let key = address.to_ascii_lowercase();
        let record = self
            .ledger
            .miners
            .entry(key.clone())
            .or_insert_with(|| {
                let id = self.ledger.next_miner_id.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(id, address = %key, "New miner");
                MinerRecord {
                    id,
                    address: key.clone(),
                    created_at: current_timestamp(),
                }
            })
            .clone();
        Ok(record)
    }
}

impl Drop for PersistenceService {
    fn drop(&mut self) {
        if self.sender.get_mut().is_some() {
            warn!("Persistence service dropped while running; pending records may be lost");
        }
    }
}
