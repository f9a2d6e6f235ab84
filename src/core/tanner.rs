//! Tanner graph construction
//!
//! The parity-check matrix is never materialised. Edges are generated layer by
//! layer, sorted row-major and deduplicated, then indexed both per check node
//! and per variable node for the decoder.

use super::params::CodeParameters;

/// Park–Miller minimal standard modulus, `2^31 - 1`
const LCG_MODULUS: i64 = 2_147_483_647;

/// Park–Miller multiplier
const LCG_MULTIPLIER: i64 = 16_807;

/// Seeded linear congruential generator used for column permutations
///
/// The generator is part of the graph definition: changing it changes every
/// code instance, so it must never be swapped for a host RNG.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: i64,
}

impl Lcg {
    /// Seed the generator; non-positive residues are lifted into range
    pub fn new(seed: i64) -> Self {
        let mut state = seed % LCG_MODULUS;
        if state <= 0 {
            state += LCG_MODULUS - 1;
        }
        Self { state }
    }

    /// Next uniform value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state * LCG_MULTIPLIER % LCG_MODULUS;
        (self.state - 1) as f64 / (LCG_MODULUS - 1) as f64
    }

    /// Fisher–Yates shuffle, walking from the last index down
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next_f64() * (i + 1) as f64).floor() as usize;
            items.swap(i, j.min(i));
        }
    }
}

/// Check/variable adjacency of one LDPC code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TannerAdjacency {
    n: usize,
    m: usize,
    /// Distinct `(check, variable)` edges in row-major order
    edges: Vec<(usize, usize)>,
    /// `row_start[r]..row_start[r + 1]` are the edge ids of check `r`
    row_start: Vec<usize>,
    /// Edge ids of each variable node, ordered by check index
    col_edges: Vec<Vec<usize>>,
}

impl TannerAdjacency {
    /// Number of variable nodes
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of check nodes
    pub fn m(&self) -> usize {
        self.m
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// `(check, variable)` endpoints of an edge
    pub fn edge(&self, id: usize) -> (usize, usize) {
        self.edges[id]
    }

    /// Edge ids attached to check node `row`
    pub fn check_edges(&self, row: usize) -> std::ops::Range<usize> {
        self.row_start[row]..self.row_start[row + 1]
    }

    /// Edge ids attached to variable node `col`
    pub fn variable_edges(&self, col: usize) -> &[usize] {
        &self.col_edges[col]
    }

    /// Variable nodes attached to check `row`
    pub fn check_neighbors(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.check_edges(row).map(move |e| self.edges[e].1)
    }

    /// Variable attached to `row` at edge position `position` (`colInRow[position][row]`)
    pub fn col_in_row(&self, position: usize, row: usize) -> Option<usize> {
        self.check_edges(row).nth(position).map(|e| self.edges[e].1)
    }

    /// Check attached to `col` at edge position `position` (`rowInCol[position][col]`)
    pub fn row_in_col(&self, position: usize, col: usize) -> Option<usize> {
        self.col_edges[col].get(position).map(|&e| self.edges[e].0)
    }

    /// Whether every check node's parity is even over `word`
    pub fn parity_holds(&self, word: &[u8]) -> bool {
        (0..self.m).all(|row| {
            self.check_neighbors(row)
                .fold(0u8, |acc, col| acc ^ (word.get(col).copied().unwrap_or(0) & 1))
                == 0
        })
    }
}

/// Build the adjacency for a parameter set
///
/// Layer 0 assigns contiguous blocks of `wr` columns to each of its `k = m/wc`
/// rows. Every further layer permutes the columns with an [`Lcg`] seeded at
/// `seed - (layer - 1)` and places column `j` on row `perm[j]/wr + k*layer`,
/// clipped to the last row. Layers count from zero, so the first permuted
/// layer uses the unmodified seed.
pub fn build(params: &CodeParameters) -> TannerAdjacency {
    let CodeParameters { n, m, wc, wr, seed, .. } = *params;
    let k = if wc == 0 { 0 } else { m / wc };
    let mut edges = Vec::with_capacity(n * wc.max(1));

    if m > 0 && wr > 0 {
        for row in 0..k {
            let start = row * wr;
            let end = ((row + 1) * wr).min(n);
            for col in start..end {
                edges.push((row, col));
            }
        }

        let mut layer_seed = seed as i64;
        for layer in 1..wc {
            let mut order: Vec<usize> = (0..n).collect();
            Lcg::new(layer_seed).shuffle(&mut order);
            layer_seed -= 1;

            for (col, &permuted) in order.iter().enumerate() {
                let row = (permuted / wr + k * layer).min(m - 1);
                edges.push((row, col));
            }
        }
    }

    edges.sort_unstable();
    edges.dedup();

    let mut row_start = vec![0usize; m + 1];
    for &(row, _) in &edges {
        row_start[row + 1] += 1;
    }
    for row in 0..m {
        row_start[row + 1] += row_start[row];
    }

    let mut col_edges = vec![Vec::with_capacity(wc); n];
    for (id, &(_, col)) in edges.iter().enumerate() {
        col_edges[col].push(id);
    }

    TannerAdjacency {
        n,
        m,
        edges,
        row_start,
        col_edges,
    }
}
