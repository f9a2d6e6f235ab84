//! ECCPoW validation engine
//!
//! Everything needed to judge a nonce: the difficulty level table, code
//! parameter derivation, Tanner graph construction, belief-propagation
//! decoding, the accept/reject decision and block difficulty retargeting.

pub mod bits;
pub mod decoder;
pub mod level_table;
pub mod network;
pub mod params;
pub mod retarget;
pub mod tanner;
pub mod target;
pub mod validator;

pub use network::{NetworkProfile, NetworkSelector};
pub use params::{CodeParameters, HeaderHash};
pub use retarget::{ParentBlock, RetargetRule};
pub use tanner::TannerAdjacency;
pub use validator::{
    EccPowValidator, NetworkInfo, ProofSearchOutcome, SuppliedCodeword, ValidationResult,
};

/// Constants shared by the engine and its adapters
pub mod constants {
    /// Size of a header hash in bytes
    pub const HEADER_HASH_SIZE: usize = super::params::HEADER_HASH_SIZE;

    /// Size of the nonce in bytes
    pub const NONCE_SIZE: usize = 8;

    /// Size of the SHA-512 seed digest
    pub const DIGEST_SIZE: usize = 64;
}


#[cfg(test)]
mod tests_property;
