//! ECCPoW share validation
//!
//! Ties parameter derivation, graph construction and decoding together and
//! turns the decoded codeword into an accept/reject decision.
//!
//! Seed layout: the 32 header-hash bytes followed by the nonce as a
//! little-endian `u64`, hashed with SHA-512.

use super::bits;
use super::decoder;
use super::level_table::{self, LevelEntry};
use super::network::{NetworkProfile, NetworkSelector};
use super::params::{self, CodeParameters, HeaderHash};
use super::retarget::RetargetRule;
use super::tanner::{self, TannerAdjacency};
use crate::error::{Error, Result};
use num_bigint::BigUint;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha512};
use tracing::debug;

/// Size of the hashed seed: header hash plus nonce
pub const SEED_SIZE: usize = 40;

/// Size of a mix digest
pub const MIX_DIGEST_SIZE: usize = 32;

/// Weight reported when a parity check fails
pub const PARITY_FAILURE_WEIGHT: i64 = -1;

/// Outcome of validating one nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the codeword passed parity and weight checks
    pub valid: bool,
    /// Hamming weight of the codeword, or -1 on parity failure
    pub weight: i64,
    /// Difficulty level the code was built for
    pub level: usize,
    /// Profile the share was judged under
    pub network: NetworkProfile,
    /// SHA-512 seed digest, or the miner's mix digest for supplied codewords
    pub digest: Vec<u8>,
    /// Nonce that was validated
    pub nonce: u64,
    /// Codeword the decision was made on
    pub codeword: Vec<u8>,
    /// Whether the codeword came from the miner rather than local decoding
    pub client_supplied: bool,
}

impl ValidationResult {
    /// 32-byte mix digest for block submission, the trailing bytes of the digest
    pub fn mix_digest(&self) -> [u8; MIX_DIGEST_SIZE] {
        let mut out = [0u8; MIX_DIGEST_SIZE];
        let len = self.digest.len().min(MIX_DIGEST_SIZE);
        out[MIX_DIGEST_SIZE - len..].copy_from_slice(&self.digest[self.digest.len() - len..]);
        out
    }
}

/// Codeword data a miner attached to an extended submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppliedCodeword {
    /// Codeword bits, MSB-first per byte
    pub bits: Vec<u8>,
    /// Mix digest reported by the miner
    pub mix_digest: [u8; MIX_DIGEST_SIZE],
}

impl SuppliedCodeword {
    /// Structural checks on the raw submit fields
    ///
    /// The codeword must be non-empty hex, the mix digest exactly 32 bytes,
    /// and `code_length` (when given) must fit inside the decoded bits.
    pub fn parse(codeword_hex: &str, mix_digest_hex: &str, code_length: Option<usize>) -> Result<Self> {
        let mut bits = bits::hex_to_bits(codeword_hex)?;
        if bits.is_empty() {
            return Err(Error::validation("Empty codeword"));
        }

        let digest_str = mix_digest_hex.trim_start_matches("0x");
        let digest = hex::decode(digest_str)
            .map_err(|e| Error::validation(format!("Invalid mix digest hex: {}", e)))?;
        let mix_digest: [u8; MIX_DIGEST_SIZE] = digest.as_slice().try_into().map_err(|_| {
            Error::validation(format!(
                "Mix digest must be {} bytes, got {}",
                MIX_DIGEST_SIZE,
                digest.len()
            ))
        })?;

        if let Some(length) = code_length {
            if length == 0 || length > bits.len() {
                return Err(Error::validation(format!(
                    "Code length {} outside codeword of {} bits",
                    length,
                    bits.len()
                )));
            }
            bits.truncate(length);
        }

        Ok(Self { bits, mix_digest })
    }
}

/// Parity/weight verdict on a codeword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Accepted or not
    pub valid: bool,
    /// Weight, or -1 when a parity equation fails
    pub weight: i64,
}

/// Judge a codeword against the graph and an acceptance window
pub fn make_decision(graph: &TannerAdjacency, word: &[u8], acceptance: &LevelEntry) -> Decision {
    if word.len() != graph.n() || !graph.parity_holds(word) {
        return Decision {
            valid: false,
            weight: PARITY_FAILURE_WEIGHT,
        };
    }
    let weight = bits::hamming_weight(word);
    Decision {
        valid: acceptance.accepts_weight(weight),
        weight: weight as i64,
    }
}

/// SHA-512 of the 40-byte seed
pub fn seed_digest(header: &HeaderHash, nonce: u64) -> [u8; 64] {
    let mut seed = [0u8; SEED_SIZE];
    seed[..32].copy_from_slice(header.as_bytes());
    seed[32..].copy_from_slice(&nonce.to_le_bytes());
    let mut digest = [0u8; 64];
    digest.copy_from_slice(&Sha512::digest(seed));
    digest
}

/// Result of a brute-force nonce search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofSearchOutcome {
    /// A nonce that validates
    Found(ValidationResult),
    /// No nonce validated within the attempt budget
    Exhausted {
        /// Attempts made
        attempts: usize,
    },
}

/// Static facts about a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    /// Selected profile
    pub profile: NetworkProfile,
    /// Proof-of-work algorithm name
    pub algorithm: &'static str,
    /// Difficulty floor
    pub min_difficulty: u64,
    /// Seconds per retarget step
    pub block_time: u64,
    /// Number of table levels
    pub difficulty_levels: usize,
}

/// Engine self-test report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Whether every profile produced a well-formed result
    pub healthy: bool,
    /// Per-profile outcome
    pub profiles: Vec<(NetworkProfile, bool)>,
}

/// ECCPoW validator
#[derive(Debug, Clone, Default)]
pub struct EccPowValidator {
    selector: NetworkSelector,
}

impl EccPowValidator {
    /// Create a validator with the given profile selection rule
    pub fn new(selector: NetworkSelector) -> Self {
        Self { selector }
    }

    /// Profile selection rule in use
    pub fn selector(&self) -> &NetworkSelector {
        &self.selector
    }

    /// Validate a share
    ///
    /// When `supplied` is present the miner's codeword is re-checked against
    /// the locally built graph; otherwise the nonce is decoded from scratch.
    pub fn validate_share(
        &self,
        header: &HeaderHash,
        nonce: u64,
        difficulty: &BigUint,
        height: u64,
        supplied: Option<&SuppliedCodeword>,
    ) -> ValidationResult {
        let profile = self.selector.detect(height);
        let params = params::derive(header, difficulty, profile);
        let graph = tanner::build(&params);

        match supplied {
            Some(codeword) => check_supplied(&graph, &params, profile, nonce, codeword),
            None => evaluate_nonce(header, nonce, &params, &graph, profile),
        }
    }

    /// Search random nonces until one validates or `max_attempts` is spent
    pub fn proof_search(
        &self,
        header: &HeaderHash,
        difficulty: &BigUint,
        height: u64,
        max_attempts: usize,
    ) -> ProofSearchOutcome {
        let profile = self.selector.detect(height);
        let params = params::derive(header, difficulty, profile);
        let graph = tanner::build(&params);

        let nonces: Vec<u64> = (0..max_attempts).map(|_| rand::random::<u64>()).collect();
        let found = nonces.par_iter().find_map_any(|&nonce| {
            let result = evaluate_nonce(header, nonce, &params, &graph, profile);
            result.valid.then_some(result)
        });

        match found {
            Some(result) => {
                debug!(nonce = result.nonce, weight = result.weight, "Proof search succeeded");
                ProofSearchOutcome::Found(result)
            }
            None => ProofSearchOutcome::Exhausted {
                attempts: max_attempts,
            },
        }
    }

    /// Static information about the profile active at `height`
    pub fn network_info(&self, height: u64) -> NetworkInfo {
        let profile = self.selector.detect(height);
        let rule = RetargetRule::for_profile(profile);
        NetworkInfo {
            profile,
            algorithm: "ECCPoW",
            min_difficulty: rule.minimum,
            block_time: rule.divisor,
            difficulty_levels: level_table::LEVEL_TABLE.len(),
        }
    }

    /// Run one validation per profile on a fixed header
    pub fn self_test(&self) -> HealthReport {
        let header = HeaderHash::from_bytes([0x5a; 32]);
        let difficulty = BigUint::from(1000u32);

        let profiles: Vec<(NetworkProfile, bool)> = [
            NetworkProfile::Default,
            NetworkProfile::Seoul,
            NetworkProfile::Annapurna,
        ]
        .into_iter()
        .map(|profile| {
            let validator = Self::new(self.selector.with_override(Some(profile)));
            let result = validator.validate_share(&header, 12345, &difficulty, 0, None);
            let expected_n = params::derive(&header, &difficulty, profile).n;
            (profile, result.codeword.len() == expected_n && result.network == profile)
        })
        .collect();

        HealthReport {
            healthy: profiles.iter().all(|(_, ok)| *ok),
            profiles,
        }
    }
}

fn evaluate_nonce(
    header: &HeaderHash,
    nonce: u64,
    params: &CodeParameters,
    graph: &TannerAdjacency,
    profile: NetworkProfile,
) -> ValidationResult {
    let digest = seed_digest(header, nonce);
    let hash_vector = bits::hash_vector(params.n, &digest);
    let decoded = decoder::decode(graph, &hash_vector);
    let decision = make_decision(graph, &decoded.output_word, &params.acceptance(profile));

    ValidationResult {
        valid: decision.valid,
        weight: decision.weight,
        level: params.level,
        network: profile,
        digest: digest.to_vec(),
        nonce,
        codeword: decoded.output_word,
        client_supplied: false,
    }
}

/// Judge a miner-supplied codeword against the local graph
///
/// Only parity and the weight window are checked. The word is not decoded
/// from the nonce, so one valid codeword replayed under fresh nonces still
/// earns pool credit. Block promotion always decodes locally.
fn check_supplied(
    graph: &TannerAdjacency,
    params: &CodeParameters,
    profile: NetworkProfile,
    nonce: u64,
    supplied: &SuppliedCodeword,
) -> ValidationResult {
    let decision = make_decision(graph, &supplied.bits, &params.acceptance(profile));
    if supplied.bits.len() != params.n {
        debug!(
            supplied = supplied.bits.len(),
            expected = params.n,
            "Supplied codeword length does not match code"
        );
    }

    ValidationResult {
        valid: decision.valid,
        weight: decision.weight,
        level: params.level,
        network: profile,
        digest: supplied.mix_digest.to_vec(),
        nonce,
        codeword: supplied.bits.clone(),
        client_supplied: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seoul_validator() -> EccPowValidator {
        EccPowValidator::new(NetworkSelector::default().with_override(Some(NetworkProfile::Seoul)))
    }

    #[test]
    fn test_seed_digest_depends_on_nonce() {
        let header = HeaderHash::from_bytes([1u8; 32]);
        assert_ne!(seed_digest(&header, 1), seed_digest(&header, 2));
        assert_eq!(seed_digest(&header, 1), seed_digest(&header, 1));
    }

    #[test]
    fn test_validate_share_is_pure() {
        let validator = EccPowValidator::default();
        let header = HeaderHash::from_bytes([9u8; 32]);
        let difficulty = BigUint::from(50_000u32);
        let a = validator.validate_share(&header, 77, &difficulty, 10, None);
        let b = validator.validate_share(&header, 77, &difficulty, 10, None);
        assert_eq!(a, b);
        assert_eq!(a.network, NetworkProfile::Default);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_decision_rejects_parity_failure() {
        let params = CodeParameters { n: 32, m: 24, wc: 3, wr: 4, level: 0, seed: 4 };
        let graph = tanner::build(&params);
        let mut word = vec![0u8; 32];
        word[3] = 1;
        let decision = make_decision(&graph, &word, &level_table::LEVEL_TABLE[0]);
        assert_eq!(decision, Decision { valid: false, weight: PARITY_FAILURE_WEIGHT });
    }

    #[test]
    fn test_decision_rejects_zero_weight_outside_window() {
        let params = CodeParameters { n: 32, m: 24, wc: 3, wr: 4, level: 0, seed: 4 };
        let graph = tanner::build(&params);
        let decision = make_decision(&graph, &[0u8; 32], &level_table::LEVEL_TABLE[0]);
        assert!(!decision.valid);
        assert_eq!(decision.weight, 0);
    }

    #[test]
    fn test_decision_all_ones_exceeds_seoul_window() {
        // every check has even degree 4, so the all-ones word satisfies parity
        let params = CodeParameters { n: 64, m: 48, wc: 3, wr: 4, level: 0, seed: 8 };
        let graph = tanner::build(&params);
        let decision = make_decision(&graph, &[1u8; 64], &level_table::seoul_entry(0));
        assert_eq!(decision, Decision { valid: false, weight: 64 });
    }

    #[test]
    fn test_supplied_codeword_parsing() {
        let digest = "ab".repeat(32);
        let parsed = SuppliedCodeword::parse("ff00", &digest, Some(12)).unwrap();
        assert_eq!(parsed.bits.len(), 12);
        assert_eq!(parsed.mix_digest, [0xab; 32]);

        assert!(SuppliedCodeword::parse("zz", &digest, None).is_err());
        assert!(SuppliedCodeword::parse("", &digest, None).is_err());
        assert!(SuppliedCodeword::parse("ff", "abcd", None).is_err());
        assert!(SuppliedCodeword::parse("ff", &digest, Some(9)).is_err());
    }

    #[test]
    fn test_supplied_codeword_is_rechecked() {
        let validator = seoul_validator();
        let header = HeaderHash::from_bytes([3u8; 32]);
        let difficulty = BigUint::from(1000u32);
        let params = params::derive(&header, &difficulty, NetworkProfile::Seoul);
        let digest = "00".repeat(32);

        // a codeword of the wrong length never passes
        let short = SuppliedCodeword::parse("ffff", &digest, None).unwrap();
        let result = validator.validate_share(&header, 1, &difficulty, 0, Some(&short));
        assert!(!result.valid);
        assert!(result.client_supplied);

        // all zeros satisfies parity but weight 0 is below n/4
        let zeros = SuppliedCodeword::parse(&"00".repeat(params.n / 8), &digest, None).unwrap();
        let result = validator.validate_share(&header, 1, &difficulty, 0, Some(&zeros));
        assert!(!result.valid);
        assert_eq!(result.weight, 0);
    }

    #[test]
    fn test_decoded_codeword_roundtrips_as_supplied() {
        let validator = seoul_validator();
        let header = HeaderHash::from_bytes([0x42; 32]);
        let difficulty = BigUint::from(1000u32);

        match validator.proof_search(&header, &difficulty, 0, 2000) {
            ProofSearchOutcome::Found(found) => {
                let n = found.codeword.len();
                assert!(found.weight as usize >= n / 4 && found.weight as usize <= n * 3 / 4);

                let supplied = SuppliedCodeword::parse(
                    &bits::bits_to_hex(&found.codeword),
                    &hex::encode(found.mix_digest()),
                    Some(n),
                )
                .unwrap();
                let rechecked =
                    validator.validate_share(&header, found.nonce, &difficulty, 0, Some(&supplied));
                assert!(rechecked.valid);
                assert_eq!(rechecked.weight, found.weight);
            }
            ProofSearchOutcome::Exhausted { attempts } => {
                assert_eq!(attempts, 2000);
            }
        }
    }

    #[test]
    fn test_proof_search_results_are_reproducible() {
        let validator = seoul_validator();
        let header = HeaderHash::from_bytes([0x11; 32]);
        let difficulty = BigUint::from(1000u32);
        if let ProofSearchOutcome::Found(found) = validator.proof_search(&header, &difficulty, 0, 500) {
            let again = validator.validate_share(&header, found.nonce, &difficulty, 0, None);
            assert_eq!(again, found);
        }
    }

    #[test]
    fn test_proof_search_zero_attempts() {
        let validator = EccPowValidator::default();
        let outcome = validator.proof_search(&HeaderHash::zero(), &BigUint::from(1u32), 0, 0);
        assert_eq!(outcome, ProofSearchOutcome::Exhausted { attempts: 0 });
    }

    #[test]
    fn test_mix_digest_uses_trailing_bytes() {
        let mut digest = vec![0u8; 64];
        digest[63] = 7;
        let result = ValidationResult {
            valid: true,
            weight: 1,
            level: 0,
            network: NetworkProfile::Default,
            digest,
            nonce: 0,
            codeword: vec![],
            client_supplied: false,
        };
        assert_eq!(result.mix_digest()[31], 7);
    }

    #[test]
    fn test_network_info() {
        let validator = EccPowValidator::default();
        let info = validator.network_info(0);
        assert_eq!(info.profile, NetworkProfile::Default);
        assert_eq!(info.min_difficulty, 32_488);
        assert_eq!(info.block_time, 36);
        assert_eq!(info.difficulty_levels, 381);

        let info = validator.network_info(6_000_000);
        assert_eq!(info.profile, NetworkProfile::Seoul);
        assert_eq!(info.block_time, 10);
    }

    #[test]
    fn test_self_test_is_healthy() {
        let report = EccPowValidator::default().self_test();
        assert!(report.healthy);
        assert_eq!(report.profiles.len(), 3);
    }
}
