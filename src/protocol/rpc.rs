//! WorldLand node JSON-RPC client
//!
//! The pool only needs three things from a node: the latest block, a block
//! template derived from it, and a way to hand in a solved nonce. They sit
//! behind [`BlockchainRpc`] so the share pipeline can be driven by a stub in
//! tests.

use crate::config::NodeConfig;
use crate::core::params::HeaderHash;
use crate::core::target;
use crate::error::{Error, Result};
use crate::protocol::retry::RetryPolicy;
use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Latest block as reported by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestBlock {
    /// Block hash
    pub hash: HeaderHash,
    /// Parent block hash
    pub parent_hash: HeaderHash,
    /// Block number
    pub height: u64,
    /// Block difficulty
    pub difficulty: BigUint,
    /// Block timestamp in seconds
    pub timestamp: u64,
    /// Uncle hash, when the node reports one
    pub uncle_hash: Option<String>,
}

/// Work the pool hands out to miners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Height of the block being mined
    pub height: u64,
    /// Header hash the ECCPoW seed is built from
    pub header_hash: HeaderHash,
    /// Hash of the block being built on
    pub prev_block_hash: HeaderHash,
    /// Difficulty a share must clear to become a block
    pub network_difficulty: BigUint,
    /// Template creation time in seconds
    pub timestamp: u64,
}

impl BlockTemplate {
    /// Build the next template on top of `latest`
    pub fn from_latest(latest: &LatestBlock, now: u64) -> Self {
        Self {
            height: latest.height + 1,
            header_hash: latest.hash,
            prev_block_hash: latest.hash,
            network_difficulty: latest.difficulty.clone(),
            timestamp: now,
        }
    }

    /// Whether `other` describes different work
    pub fn differs_from(&self, other: &BlockTemplate) -> bool {
        self.height != other.height || self.prev_block_hash != other.prev_block_hash
    }

    /// Network target as 64 hex digits
    pub fn target_hex(&self) -> String {
        target::target_to_hex(&target::network_target(&self.network_difficulty))
    }
}

/// Chain access the pool depends on
#[async_trait]
pub trait BlockchainRpc: Send + Sync {
    /// Fetch the latest block
    async fn get_latest_block(&self) -> Result<LatestBlock>;

    /// Fetch the work to hand out next
    async fn get_block_template(&self) -> Result<BlockTemplate> {
        let latest = self.get_latest_block().await?;
        Ok(BlockTemplate::from_latest(
            &latest,
            crate::utils::current_timestamp(),
        ))
    }

    /// Submit a solved nonce, returning the node's acknowledgement
    async fn submit_work(
        &self,
        nonce: u64,
        header: &HeaderHash,
        mix_digest: &[u8; 32],
    ) -> Result<String>;
}

/// Node health as seen from the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeHealth {
    /// Chain id reported by the node
    pub chain_id: u64,
    /// Current block number
    pub block_number: u64,
    /// Endpoint that answered
    pub endpoint: String,
    /// Round trip of the health probe in milliseconds
    pub response_time_ms: u64,
}

/// Request counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcStats {
    /// Calls issued
    pub total_requests: u64,
    /// Calls that returned a result
    pub successful_requests: u64,
    /// Calls that failed after all retries
    pub failed_requests: u64,
    /// Endpoint the next call goes to
    pub current_endpoint: String,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    hash: String,
    parent_hash: String,
    number: String,
    difficulty: String,
    timestamp: String,
    #[serde(default)]
    sha3_uncles: Option<String>,
}

/// JSON-RPC client for a WorldLand node with endpoint failover
#[derive(Debug)]
pub struct WorldlandClient {
    http: Client,
    endpoints: Vec<String>,
    current: AtomicUsize,
    request_id: AtomicU64,
    retry: RetryPolicy,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl WorldlandClient {
    /// Create a client for `endpoints`, tried in order
    pub fn new(endpoints: Vec<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::config("At least one RPC endpoint is required"));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("worldland-pool/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            primary = %endpoints[0],
            backups = endpoints.len() - 1,
            "Created WorldLand RPC client"
        );

        Ok(Self {
            http,
            endpoints,
            current: AtomicUsize::new(0),
            request_id: AtomicU64::new(0),
            retry,
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        })
    }

    /// Create a client from the `[node]` config section
    pub fn from_config(node: &NodeConfig) -> Result<Self> {
        Self::new(node.endpoints(), node.timeout(), RetryPolicy::from_config(node))
    }

    /// Endpoint the next call goes to
    pub fn current_endpoint(&self) -> &str {
        let index = self.current.load(Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[index]
    }

    /// Move back to the primary endpoint
    pub fn reset_to_primary(&self) {
        self.current.store(0, Ordering::Relaxed);
    }

    fn switch_endpoint(&self) {
        if self.endpoints.len() > 1 {
            let next = (self.current.fetch_add(1, Ordering::Relaxed) + 1) % self.endpoints.len();
            warn!(endpoint = %self.endpoints[next], "Switching RPC endpoint");
        }
    }

    /// Issue a JSON-RPC call with retries and failover
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let result = self.retry.execute(|| self.call_once(method, &params)).await;
        match &result {
            Ok(_) => self.successful_requests.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed_requests.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value> {
        let endpoint = self.current_endpoint().to_string();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed) + 1,
            method,
            params,
        };

        debug!(%endpoint, method, "RPC request");

        let response = match self.http.post(&endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                self.switch_endpoint();
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            self.switch_endpoint();
            return Err(Error::protocol(format!(
                "{} returned server error {}",
                endpoint, status
            )));
        }
        if !status.is_success() {
            return Err(Error::rpc(format!("{} returned HTTP {}", endpoint, status)));
        }

        let body: JsonRpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(Error::rpc(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }
        body.result
            .ok_or_else(|| Error::rpc(format!("{} returned no result", method)))
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        quantity_to_u64(as_str(&value, "eth_blockNumber")?)
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<u64> {
        let value = self.call("eth_chainId", json!([])).await?;
        quantity_to_u64(as_str(&value, "eth_chainId")?)
    }

    /// `eth_getWork`: header hash, seed hash and boundary
    pub async fn get_work(&self) -> Result<Vec<String>> {
        let value = self.call("eth_getWork", json!([])).await?;
        let work: Vec<String> = serde_json::from_value(value)?;
        if work.len() < 3 {
            return Err(Error::rpc(format!(
                "eth_getWork returned {} fields, expected at least 3",
                work.len()
            )));
        }
        Ok(work)
    }

    /// Probe the node with `eth_chainId` and `eth_blockNumber`
    pub async fn health_check(&self) -> Result<NodeHealth> {
        let started = Instant::now();
        let chain_id = self.chain_id().await?;
        let block_number = self.block_number().await?;
        Ok(NodeHealth {
            chain_id,
            block_number,
            endpoint: self.current_endpoint().to_string(),
            response_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Snapshot of the request counters
    pub fn stats(&self) -> RpcStats {
        RpcStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            current_endpoint: self.current_endpoint().to_string(),
        }
    }
}

#[async_trait]
impl BlockchainRpc for WorldlandClient {
    async fn get_latest_block(&self) -> Result<LatestBlock> {
        let value = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        if value.is_null() {
            return Err(Error::rpc("Node returned no latest block"));
        }
        let raw: RawBlock = serde_json::from_value(value)?;

        Ok(LatestBlock {
            hash: HeaderHash::from_hex(&raw.hash)?,
            parent_hash: HeaderHash::from_hex(&raw.parent_hash)?,
            height: quantity_to_u64(&raw.number)?,
            difficulty: parse_quantity(&raw.difficulty)?,
            timestamp: quantity_to_u64(&raw.timestamp)?,
            uncle_hash: raw.sha3_uncles,
        })
    }

    async fn submit_work(
        &self,
        nonce: u64,
        header: &HeaderHash,
        mix_digest: &[u8; 32],
    ) -> Result<String> {
        let params = json!([
            format!("0x{:016x}", nonce),
            header.to_hex(),
            format!("0x{}", hex::encode(mix_digest)),
        ]);

        info!(nonce, header = %header, "Submitting work");
        match self.call("eth_submitWork", params).await? {
            Value::Bool(true) => Ok(header.to_hex()),
            Value::String(ack) => Ok(ack),
            _ => Err(Error::rpc("rejected")),
        }
    }
}

fn as_str<'a>(value: &'a Value, method: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::rpc(format!("{} returned a non-string quantity", method)))
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(quantity: &str) -> Result<BigUint> {
    let digits = quantity.trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Ok(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::rpc(format!("Invalid hex quantity: {}", quantity)))
}

/// Parse a hex quantity that must fit in 64 bits
pub fn quantity_to_u64(quantity: &str) -> Result<u64> {
    parse_quantity(quantity)?
        .to_u64()
        .ok_or_else(|| Error::rpc(format!("Quantity out of range: {}", quantity)))
}
