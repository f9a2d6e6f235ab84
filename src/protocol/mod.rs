//! Node communication
//!
//! JSON-RPC access to a WorldLand node plus the retry policy every call goes
//! through.

pub mod retry;
pub mod rpc;

pub use retry::{RetryPolicy, should_retry};
pub use rpc::{BlockTemplate, BlockchainRpc, LatestBlock, WorldlandClient};
