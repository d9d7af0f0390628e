// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Storage sizing.
//!
//! All ranges are public functions of the OKVS type and the capacity `n`,
//! so both parties agree on the storage length without communicating.

use crate::OkvsType;

/// Statistical security parameter `$\lambda$`
pub const STATS_BIT_LENGTH: usize = 40;
/// `sparseRange / n` of the 2-hash garbled cuckoo tables
pub const H2_EXPANSION: f64 = 2.4;
/// `sparseRange / n` of the 3-hash garbled cuckoo table for large `n`.
/// Above the peeling threshold `1.222` of random 3-hypergraphs.
pub const H3_EXPANSION: f64 = 1.3;
/// `sparseRange / n` of the 3-hash garbled cuckoo table for `n < 2^10`.
/// Small hypergraphs fluctuate far above the asymptotic threshold,
/// leaving cores larger than the dense range near `1.3`.
pub const H3_EXPANSION_SMALL: f64 = 2.0;
/// `sparseRange / n` of the 3-hash garbled cuckoo table for `2^10 <= n < 2^16`
pub const H3_EXPANSION_MEDIUM: f64 = 1.5;
/// Expected number of keys per bin of the bin-partitioned OKVS
pub const MEGA_BIN_LOAD: usize = 256;

/// `$\lceil \log_2 n \rceil$` with `ceil_log2(1) = 0`
pub fn ceil_log2(n: usize) -> usize {
    assert!(n > 0);
    (usize::BITS - (n - 1).leading_zeros()) as usize
}

/// Range of sparse positions, `lm` in the literature
pub fn sparse_range(okvs_type: OkvsType, n: usize) -> usize {
    match okvs_type {
        OkvsType::H2Singleton | OkvsType::H2TwoCore => {
            ((H2_EXPANSION * n as f64).ceil() as usize).max(2)
        }
        OkvsType::H3Singleton => ((h3_expansion(n) * n as f64).ceil() as usize).max(3),
        OkvsType::Gbf => {
            ((n * STATS_BIT_LENGTH) as f64 * std::f64::consts::LOG2_E).ceil() as usize
        }
        OkvsType::MegaBin => 0,
    }
}

/// `sparseRange / n` of the 3-hash garbled cuckoo table, shrinking as `n` grows
pub fn h3_expansion(n: usize) -> f64 {
    if n < 1 << 10 {
        H3_EXPANSION_SMALL
    } else if n < 1 << 16 {
        H3_EXPANSION_MEDIUM
    } else {
        H3_EXPANSION
    }
}

/// Range of dense positions, `rm` in the literature
pub fn dense_range(okvs_type: OkvsType, n: usize) -> usize {
    match okvs_type {
        OkvsType::H2Singleton | OkvsType::H2TwoCore | OkvsType::H3Singleton => {
            ceil_log2(n) + STATS_BIT_LENGTH
        }
        OkvsType::Gbf => 0,
        OkvsType::MegaBin => {
            let bin_num = mega_bin_num(n);
            bin_num * mega_bin_capacity(n, bin_num)
        }
    }
}

/// `m`
pub fn total_range(okvs_type: OkvsType, n: usize) -> usize {
    sparse_range(okvs_type, n) + dense_range(okvs_type, n)
}

/// Number of bins of the bin-partitioned OKVS
pub fn mega_bin_num(n: usize) -> usize {
    n.div_ceil(MEGA_BIN_LOAD).max(1)
}

/// Coefficients per bin: an upper bound of the max load, which is exceeded with probability at most `$2^{-\lambda}$`,
/// plus one random point so that a full bin still decodes non-members to random values.
pub fn mega_bin_capacity(n: usize, bin_num: usize) -> usize {
    max_bin_load(n, bin_num) + 1
}

/// Chernoff bound of the max load when throwing `n` balls into `bin_num` bins:
/// `$\Pr[X \ge (1 + \delta) \mu] \le (e^\delta / (1 + \delta)^{1 + \delta})^\mu$`, union bounded over bins.
fn max_bin_load(n: usize, bin_num: usize) -> usize {
    if bin_num <= 1 {
        return n;
    }
    let mu = n as f64 / bin_num as f64;
    let log_target = -(STATS_BIT_LENGTH as f64) * std::f64::consts::LN_2 - (bin_num as f64).ln();
    let mut load = mu.ceil() as usize;
    while load < n {
        // Probability that some bin receives more than `load` balls
        let ratio = (load + 1) as f64 / mu;
        let log_p = mu * (ratio - 1.0 - ratio * ratio.ln());
        if log_p <= log_target {
            return load;
        }
        load += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(1 << 14), 14);
        assert_eq!(ceil_log2((1 << 14) + 1), 15);
    }

    #[test]
    fn test_ranges_hold_all_positions() {
        for n in [1, 2, 3, 40, 1 << 8, 1 << 14] {
            assert!(sparse_range(OkvsType::H2Singleton, n) >= 2);
            assert!(sparse_range(OkvsType::H3Singleton, n) >= 3);
            assert!(sparse_range(OkvsType::Gbf, n) >= STATS_BIT_LENGTH);
            assert!(dense_range(OkvsType::H2TwoCore, n) >= STATS_BIT_LENGTH);
            for t in OkvsType::ALL {
                assert_eq!(
                    total_range(t, n),
                    sparse_range(t, n) + dense_range(t, n)
                );
            }
        }
    }

    #[test]
    fn test_h3_expansion_shrinks_with_n() {
        assert_eq!(sparse_range(OkvsType::H3Singleton, 100), 200);
        assert_eq!(sparse_range(OkvsType::H3Singleton, 300), 600);
        assert_eq!(sparse_range(OkvsType::H3Singleton, 1 << 10), 1536);
        assert_eq!(sparse_range(OkvsType::H3Singleton, 1 << 16), 85197);
        let mut prev = f64::INFINITY;
        for n in [1, 1 << 9, 1 << 10, 1 << 15, 1 << 16, 1 << 20] {
            assert!(h3_expansion(n) <= prev);
            assert!(h3_expansion(n) >= H3_EXPANSION);
            prev = h3_expansion(n);
        }
    }

    #[test]
    fn test_bin_capacity_bounds() {
        assert_eq!(mega_bin_num(1), 1);
        assert_eq!(mega_bin_capacity(1, 1), 2);
        assert_eq!(mega_bin_capacity(200, 1), 201);
        let bin_num = mega_bin_num(1 << 14);
        assert_eq!(bin_num, 64);
        let cap = mega_bin_capacity(1 << 14, bin_num);
        assert!(cap > MEGA_BIN_LOAD && cap < 2 * MEGA_BIN_LOAD, "cap = {}", cap);
    }
}
