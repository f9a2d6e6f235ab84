//! # WorldLand Pool
//!
//! A Stratum mining pool server for the WorldLand network, which secures
//! blocks with ECCPoW (error-correction-code proof of work).
//!
//! ## Architecture
//!
//! - [`core`] holds the proof-of-work itself: the difficulty level table,
//!   LDPC parameter derivation, Tanner graph construction, belief-propagation
//!   decoding, share validation and difficulty retargeting.
//! - [`stratum`] speaks Stratum to miners, tracks jobs and runs the share
//!   submission state machine.
//! - [`protocol`] talks JSON-RPC to a WorldLand node.
//! - [`persistence`] records shares, blocks and miners.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications,
    clippy::all
)]
#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod stratum;
pub mod utils;

pub use crate::error::{Error, Result};
pub use config::Config;
pub use core::{EccPowValidator, HeaderHash, NetworkProfile, ValidationResult};
pub use protocol::rpc::WorldlandClient;
pub use stratum::PoolServer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{EccPowValidator, HeaderHash, NetworkProfile, ValidationResult},
        error::{Error, Result},
        persistence::{Persistence, PersistenceService},
        protocol::{BlockTemplate, BlockchainRpc, WorldlandClient},
        stratum::{PoolServer, ShareProcessor, ShareValidator},
    };
}
