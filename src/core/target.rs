//! Network targets and share promotion checks
//!
//! Targets are 256-bit integers. Shares are compared with the network by
//! code level, the scale both the pool and the node resolve difficulty to.

use super::network::NetworkProfile;
use super::params;
use num_bigint::BigUint;
use num_traits::{FromPrimitive, One, Zero};

/// Target at network difficulty 1: `0x00000000FFFF` followed by 26 zero bytes
pub fn max_network_target() -> BigUint {
    BigUint::from(0xFFFFu32) << 208
}

/// Network target for a block difficulty, zero treated as one
pub fn network_target(difficulty: &BigUint) -> BigUint {
    let divisor = if difficulty.is_zero() {
        BigUint::one()
    } else {
        difficulty.clone()
    };
    max_network_target() / divisor
}

/// Whether a share decoded at `share_level` was held to at least the
/// network's code level for `network_difficulty`
pub fn meets_network_level(
    share_level: usize,
    network_difficulty: &BigUint,
    profile: NetworkProfile,
) -> bool {
    share_level >= params::level_for(network_difficulty, profile)
}

/// Render a target as 64 lowercase hex digits
pub fn target_to_hex(target: &BigUint) -> String {
    format!("{:0>64}", target.to_str_radix(16))
}

/// Convert a floating-point pool difficulty to an integer, at least one
pub fn difficulty_from_f64(difficulty: f64) -> BigUint {
    if !difficulty.is_finite() || difficulty < 1.0 {
        return BigUint::one();
    }
    BigUint::from_f64(difficulty.floor()).unwrap_or_else(BigUint::one)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_max_network_target() {
        assert_eq!(
            target_to_hex(&max_network_target()),
            format!("00000000ffff{}", "0".repeat(52))
        );
    }

    #[test]
    fn test_network_target_scales_inversely() {
        let easy = network_target(&BigUint::from(1u32));
        let hard = network_target(&BigUint::from(1000u32));
        assert_eq!(easy, max_network_target());
        assert!(hard < easy);
        assert_eq!(network_target(&BigUint::zero()), max_network_target());
    }

    #[test_case(NetworkProfile::Default ; "default")]
    #[test_case(NetworkProfile::Seoul ; "seoul")]
    fn test_meets_network_level(profile: NetworkProfile) {
        let network = BigUint::from(1_000_000u32);
        let level = params::level_for(&network, profile);
        assert!(level > 0);
        assert!(meets_network_level(level, &network, profile));
        assert!(meets_network_level(level + 1, &network, profile));
        assert!(!meets_network_level(level - 1, &network, profile));
    }

    #[test]
    fn test_pool_level_share_does_not_meet_harder_network() {
        let pool = BigUint::from(50_000u32);
        let network = BigUint::from(1_000_000u32);
        let pool_level = params::level_for(&pool, NetworkProfile::Default);
        assert!(!meets_network_level(pool_level, &network, NetworkProfile::Default));
        assert!(meets_network_level(380, &network, NetworkProfile::Default));
    }

    #[test]
    fn test_difficulty_from_f64() {
        assert_eq!(difficulty_from_f64(1500.7), BigUint::from(1500u32));
        assert_eq!(difficulty_from_f64(0.2), BigUint::one());
        assert_eq!(difficulty_from_f64(f64::NAN), BigUint::one());
    }
}
