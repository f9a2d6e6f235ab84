//! Property-based tests for the validation engine
//!
//! These tests verify invariants of level search, graph construction,
//! decoding and bit packing using proptest

use super::*;
use super::level_table::{LEVEL_TABLE, search_level, search_level_seoul};
use num_bigint::BigUint;
use proptest::prelude::*;

fn small_params() -> impl Strategy<Value = CodeParameters> {
    (8usize..=24, any::<u16>()).prop_map(|(blocks, seed)| {
        let n = blocks * 4;
        CodeParameters {
            n,
            m: n * 3 / 4,
            wc: 3,
            wr: 4,
            level: 0,
            seed: u64::from(seed),
        }
    })
}

proptest! {
    #[test]
    fn bits_hex_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let bits = bits::bytes_to_bits(&bytes);
        prop_assert_eq!(bits::hex_to_bits(&bits::bits_to_hex(&bits)).unwrap(), bits);
    }

    #[test]
    fn seoul_level_is_monotonic(a in any::<u64>(), b in any::<u64>()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            search_level_seoul(&BigUint::from(low)) <= search_level_seoul(&BigUint::from(high))
        );
    }

    #[test]
    fn search_level_stays_in_table(difficulty in any::<u64>()) {
        let level = search_level(&BigUint::from(difficulty));
        prop_assert!(level < LEVEL_TABLE.len());
    }

    #[test]
    fn graph_is_regular_for_any_seed(params in small_params()) {
        let graph = tanner::build(&params);
        prop_assert_eq!(graph.edge_count(), params.n * params.wc);
        for row in 0..params.m {
            prop_assert_eq!(graph.check_edges(row).len(), params.wr);
        }
        for col in 0..params.n {
            prop_assert_eq!(graph.variable_edges(col).len(), params.wc);
        }
    }

    #[test]
    fn decoding_is_deterministic(params in small_params(), seed in any::<u64>()) {
        let graph = tanner::build(&params);
        let digest = validator::seed_digest(&HeaderHash::zero(), seed);
        let hv = bits::hash_vector(params.n, &digest);
        prop_assert_eq!(decoder::decode(&graph, &hv), decoder::decode(&graph, &hv));
    }

    #[test]
    fn accepted_default_decodes_respect_window(nonce in any::<u64>(), fill in any::<u8>()) {
        let validator = EccPowValidator::default();
        let header = HeaderHash::from_bytes([fill; 32]);
        let difficulty = BigUint::from(40_000u32);
        let result = validator.validate_share(&header, nonce, &difficulty, 0, None);
        if result.valid {
            let entry = level_table::lookup(result.level);
            let weight = result.weight as usize;
            prop_assert!(weight >= entry.decision_from && weight <= entry.decision_to);
            prop_assert_eq!((weight - entry.decision_from) % entry.decision_step, 0);
            let params = params::derive(&header, &difficulty, NetworkProfile::Default);
            prop_assert!(tanner::build(&params).parity_holds(&result.codeword));
        } else if result.weight >= 0 {
            let params = params::derive(&header, &difficulty, NetworkProfile::Default);
            prop_assert!(tanner::build(&params).parity_holds(&result.codeword));
        }
    }

    #[test]
    fn accepted_seoul_decodes_respect_window(nonce in any::<u64>(), fill in any::<u8>()) {
        let validator = EccPowValidator::new(
            NetworkSelector::default().with_override(Some(NetworkProfile::Seoul)),
        );
        let header = HeaderHash::from_bytes([fill; 32]);
        let result = validator.validate_share(&header, nonce, &BigUint::from(1500u32), 0, None);
        if result.valid {
            let n = result.codeword.len();
            let weight = result.weight as usize;
            prop_assert!(weight >= n / 4 && weight <= n * 3 / 4);
        }
    }

    #[test]
    fn validation_is_pure(nonce in any::<u64>(), height in 0u64..10_000_000) {
        let validator = EccPowValidator::default();
        let header = HeaderHash::from_bytes([0x33; 32]);
        let difficulty = BigUint::from(100_000u32);
        prop_assert_eq!(
            validator.validate_share(&header, nonce, &difficulty, height, None),
            validator.validate_share(&header, nonce, &difficulty, height, None)
        );
    }
}
