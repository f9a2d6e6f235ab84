//! Stratum session management
//!
//! A [`Connection`] is shared between its socket task, the share processor
//! and the stats logger, so its mutable state sits behind a lock.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Worker name used when the login carries none
pub const DEFAULT_WORKER: &str = "default";

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Compact hex form, used as the subscription id
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payout address, `0x` followed by 40 hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinerAddress(String);

impl MinerAddress {
    /// Validate an address, keeping its original spelling
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| Error::invalid_address(format!("Missing 0x prefix: {}", s)))?;
        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_address(format!(
                "Expected 40 hex digits: {}",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Address as given
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MinerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MinerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address plus worker name, parsed from `mining.authorize`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerIdentity {
    /// Payout address
    pub address: MinerAddress,
    /// Worker name
    pub worker: String,
}

impl WorkerIdentity {
    /// Parse `address.worker`
    ///
    /// Without a dot the password names the worker when non-empty.
    pub fn from_login(username: &str, password: Option<&str>) -> Result<Self> {
        let username = username.trim();
        let (address, worker) = match username.split_once('.') {
            Some((address, worker)) if !worker.is_empty() => (address, worker.to_string()),
            Some((address, _)) => (address, DEFAULT_WORKER.to_string()),
            None => {
                let worker = password
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .unwrap_or(DEFAULT_WORKER);
                (username, worker.to_string())
            }
        };

        Ok(Self {
            address: MinerAddress::parse(address)?,
            worker,
        })
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.worker)
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Connected, no valid login yet
    Unauthorized,
    /// Logged in with a valid address
    Authorized,
    /// Socket closed; terminal
    Disconnected,
}

/// Mutable connection fields
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Lifecycle state
    pub state: ConnectionState,
    /// Whether `mining.subscribe` was received
    pub subscribed: bool,
    /// Login, once authorized
    pub identity: Option<WorkerIdentity>,
    /// Assigned share difficulty
    pub difficulty: f64,
    /// Accepted shares
    pub valid_shares: u64,
    /// Rejected shares
    pub invalid_shares: u64,
    /// Time of the last accepted share
    pub last_share_at: Option<Instant>,
}

/// One miner connection
#[derive(Debug)]
pub struct Connection {
    id: SessionId,
    peer: Option<SocketAddr>,
    extranonce1: String,
    connected_at: Instant,
    info: RwLock<ConnectionInfo>,
}

impl Connection {
    /// Create an unauthorized connection at the base difficulty
    pub fn new(peer: Option<SocketAddr>, extranonce1: String, difficulty: f64) -> Self {
        Self {
            id: SessionId::new(),
            peer,
            extranonce1,
            connected_at: Instant::now(),
            info: RwLock::new(ConnectionInfo {
                state: ConnectionState::Unauthorized,
                subscribed: false,
                identity: None,
                difficulty,
                valid_shares: 0,
                invalid_shares: 0,
                last_share_at: None,
            }),
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Pool-assigned extranonce, hex
    pub fn extranonce1(&self) -> &str {
        &self.extranonce1
    }

    /// Time since the socket was accepted
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.info.read().state
    }

    /// Whether shares may be submitted
    pub fn is_authorized(&self) -> bool {
        self.state() == ConnectionState::Authorized
    }

    /// Record `mining.subscribe`
    pub fn subscribe(&self) {
        self.info.write().subscribed = true;
    }

    /// Whether `mining.subscribe` was received
    pub fn is_subscribed(&self) -> bool {
        self.info.read().subscribed
    }

    /// Move to `Authorized`; a disconnected connection stays disconnected
    pub fn authorize(&self, identity: WorkerIdentity) -> bool {
        let mut info = self.info.write();
        if info.state == ConnectionState::Disconnected {
            return false;
        }
        info.state = ConnectionState::Authorized;
        info.identity = Some(identity);
        true
    }

    /// Mark the connection closed
    pub fn disconnect(&self) {
        self.info.write().state = ConnectionState::Disconnected;
    }

    /// Login, once authorized
    pub fn identity(&self) -> Option<WorkerIdentity> {
        self.info.read().identity.clone()
    }

    /// Assigned share difficulty
    pub fn difficulty(&self) -> f64 {
        self.info.read().difficulty
    }

    /// Replace the assigned difficulty
    pub fn set_difficulty(&self, difficulty: f64) {
        self.info.write().difficulty = difficulty;
    }

    /// Count an accepted share, returning the gap since the previous one
    pub fn record_valid_share(&self, now: Instant) -> Option<Duration> {
        let mut info = self.info.write();
        info.valid_shares += 1;
        let since_last = info.last_share_at.map(|last| now.saturating_duration_since(last));
        info.last_share_at = Some(now);
        since_last
    }

    /// Count a rejected share
    pub fn record_invalid_share(&self) {
        self.info.write().invalid_shares += 1;
    }

    /// Copy of the mutable fields
    pub fn snapshot(&self) -> ConnectionInfo {
        self.info.read().clone()
    }
}
