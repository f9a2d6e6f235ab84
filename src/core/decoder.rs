//! Sum-product belief propagation over a Tanner graph
//!
//! Fixed-iteration LLR decoding. All constants take part in consensus, so
//! they are reproduced with plain IEEE-754 `f64` arithmetic and must not be
//! "improved".

use super::tanner::TannerAdjacency;

/// Channel crossover probability
pub const CROSS_ERROR: f64 = 0.01;

/// Magnitude every LLR message is clamped to
pub const LLR_CLAMP: f64 = 64.0;

/// Saturation point of the check-node transfer function
pub const BIG_INFINITY: f64 = 1_000_000.0;

/// Number of message-passing iterations
pub const MAX_ITERATIONS: usize = 20;

/// Output of one decoding run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodingResult {
    /// Hash-derived input bits
    pub hash_vector: Vec<u8>,
    /// Hard-decision codeword after the last iteration
    pub output_word: Vec<u8>,
}

impl DecodingResult {
    /// Hamming weight of the output word
    pub fn weight(&self) -> usize {
        self.output_word.iter().filter(|&&b| b == 1).count()
    }
}

/// Clamp an LLR to `[-64, 64]`
pub fn infinity_test(x: f64) -> f64 {
    if x >= LLR_CLAMP {
        LLR_CLAMP
    } else if x <= -LLR_CLAMP {
        -LLR_CLAMP
    } else {
        x
    }
}

/// Check-node transfer function `ln((e^x + 1) / (e^x - 1))` with saturation
pub fn func_f(x: f64) -> f64 {
    if x >= BIG_INFINITY {
        1.0 / BIG_INFINITY
    } else if x <= 1.0 / BIG_INFINITY {
        BIG_INFINITY
    } else {
        ((x.exp() + 1.0) / (x.exp() - 1.0)).ln()
    }
}

/// Decode `hash_vector` over `graph`
pub fn decode(graph: &TannerAdjacency, hash_vector: &[u8]) -> DecodingResult {
    let n = graph.n();
    let m = graph.m();
    let edges = graph.edge_count();

    let channel = ((1.0 - CROSS_ERROR) / CROSS_ERROR).ln();
    let prior: Vec<f64> = (0..n)
        .map(|i| {
            let bit = f64::from(hash_vector.get(i).copied().unwrap_or(0) & 1);
            channel * (bit * 2.0 - 1.0)
        })
        .collect();

    // variable-to-check and check-to-variable messages, indexed by edge id
    let mut to_check = vec![0.0f64; edges];
    let mut to_variable = vec![0.0f64; edges];
    let mut posterior = vec![0.0f64; n];

    for _ in 0..MAX_ITERATIONS {
        for (t, &prior_t) in prior.iter().enumerate() {
            let attached = graph.variable_edges(t);
            let total = attached
                .iter()
                .fold(0.0, |acc, &e| infinity_test(acc + to_variable[e]));
            for &e in attached {
                let extrinsic = infinity_test(total - to_variable[e]);
                to_check[e] = infinity_test(prior_t + extrinsic);
            }
        }

        for row in 0..m {
            let range = graph.check_edges(row);
            for e in range.clone() {
                let mut magnitude = 0.0;
                let mut sign = 1.0;
                for other in range.clone().filter(|&o| o != e) {
                    let value = to_check[other];
                    magnitude += func_f(value.abs());
                    sign *= if value > 0.0 { 1.0 } else { -1.0 };
                }
                to_variable[e] = infinity_test(sign * func_f(magnitude));
            }
        }

        for (t, slot) in posterior.iter_mut().enumerate() {
            *slot = graph
                .variable_edges(t)
                .iter()
                .fold(infinity_test(prior[t]), |acc, &e| {
                    infinity_test(acc + to_variable[e])
                });
        }
    }

    let output_word = posterior.iter().map(|&p| u8::from(p >= 0.0)).collect();

    DecodingResult {
        hash_vector: hash_vector.to_vec(),
        output_word,
    }
}
