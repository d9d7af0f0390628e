// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Linear solver for the core equations.
//!
//! Solves `$A x = b$` where `$A$` has entries in the scalar field and `$b$`, `$x$` are ring elements.
//! Gauss-Jordan elimination with a pivot search per column; free variables are sampled at random
//! so that the dense slots carry no information beyond the constraints.

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;
use rand_core::CryptoRngCore;
use tracing::debug;

use crate::error::EncodeFailure;
use crate::ring::{inner_product, Field, Ring};

/// Solve `rows * x = rhs` for `x` of length `cols`.
///
/// Fails with [`EncodeFailure::SingularSystem`] if `rows` are not full row-rank.
/// Free variables are uniformly random, and non-zero if `non_zero`.
pub fn solve<R, G>(
    mut rows: Vec<Vec<R::Scalar>>,
    mut rhs: Vec<R>,
    cols: usize,
    non_zero: bool,
    rng: &mut G,
) -> Result<Vec<R>, EncodeFailure>
where
    R: Ring,
    G: CryptoRngCore + ?Sized,
{
    assert_eq!(rows.len(), rhs.len());
    assert!(rows.iter().all(|row| row.len() == cols));
    let row_num = rows.len();
    let singular = EncodeFailure::SingularSystem {
        rows: row_num,
        cols,
    };
    if row_num > cols {
        return Err(singular);
    }

    let mut pivots = Vec::with_capacity(row_num);
    for col in 0..cols {
        let row_i = pivots.len();
        if row_i == row_num {
            break;
        }
        let Some(p) = (row_i..row_num).find(|&i| !rows[i][col].is_zero()) else {
            continue;
        };
        rows.swap(row_i, p);
        rhs.swap(row_i, p);

        let Some(inv) = rows[row_i][col].inv() else {
            return Err(singular);
        };
        rows[row_i][col..].iter_mut().for_each(|a| *a = *a * inv);
        rhs[row_i] = rhs[row_i].scale(&inv);

        eliminate(&mut rows, &mut rhs, row_i, col);
        pivots.push(col);
    }
    if pivots.len() < row_num {
        return Err(singular);
    }
    debug!(rows = row_num, cols, "solved linear system");

    let mut x: Vec<R> = vec![R::zero(); cols];
    let mut is_pivot = vec![false; cols];
    pivots.iter().for_each(|&c| is_pivot[c] = true);
    x.iter_mut()
        .zip(is_pivot.iter())
        .filter(|(_, &p)| !p)
        .for_each(|(xi, _)| *xi = R::random_if_non_zero(rng, non_zero));
    // In reduced row echelon form a row only touches its own pivot among the pivot columns,
    // and pivot entries of `x` are still zero here
    for (i, &c) in pivots.iter().enumerate() {
        x[c] = rhs[i].clone() - inner_product(&rows[i], &x);
    }
    Ok(x)
}

/// Clear column `col` from all rows except the pivot row `row_i`.
/// Runs with multi-threading if the feature `multi-thread` is enabled.
fn eliminate<R>(rows: &mut [Vec<R::Scalar>], rhs: &mut [R], row_i: usize, col: usize)
where
    R: Ring,
{
    let pivot_row = rows[row_i].clone();
    let pivot_rhs = rhs[row_i].clone();
    let eliminate_row = |i: usize, row: &mut Vec<R::Scalar>, b: &mut R| {
        let f = row[col];
        if i == row_i || f.is_zero() {
            return;
        }
        row[col..]
            .iter_mut()
            .zip(&pivot_row[col..])
            .for_each(|(a, &p)| *a = *a - f * p);
        *b -= pivot_rhs.scale(&f);
    };
    #[cfg(feature = "multi-thread")]
    rows.par_iter_mut()
        .zip(rhs.par_iter_mut())
        .enumerate()
        .for_each(|(i, (row, b))| eliminate_row(i, row, b));
    #[cfg(not(feature = "multi-thread"))]
    rows.iter_mut()
        .zip(rhs.iter_mut())
        .enumerate()
        .for_each(|(i, (row, b))| eliminate_row(i, row, b));
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    use super::*;
    use crate::ring::byte::ByteRing;
    use crate::ring::gf2::Gf2;
    use crate::ring::int_prime::{U32Ring, PRIME_MAX_LE_U32_MAX};

    type Zp = U32Ring<PRIME_MAX_LE_U32_MAX>;

    fn check<R: Ring>(rows: &[Vec<R::Scalar>], rhs: &[R], x: &[R]) {
        rows.iter()
            .zip(rhs)
            .for_each(|(row, b)| assert_eq!(&inner_product(row, x), b));
    }

    #[test]
    fn test_solve_random_gf2_system() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let cols = 48;
        for row_num in [0, 1, 5, 20] {
            let rows: Vec<Vec<Gf2>> = (0..row_num)
                .map(|_| (0..cols).map(|_| Field::random(&mut rng)).collect())
                .collect();
            let rhs: Vec<ByteRing<16>> = (0..row_num).map(|_| Ring::random(&mut rng)).collect();
            let x = solve(rows.clone(), rhs.clone(), cols, false, &mut rng).unwrap();
            assert_eq!(x.len(), cols);
            check(&rows, &rhs, &x);
        }
    }

    #[test]
    fn test_solve_random_zp_system_non_zero() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let cols = 41;
        let rows: Vec<Vec<Zp>> = (0..30)
            .map(|_| (0..cols).map(|_| Field::random(&mut rng)).collect())
            .collect();
        let rhs: Vec<Zp> = (0..30).map(|_| Ring::random(&mut rng)).collect();
        let x = solve(rows.clone(), rhs.clone(), cols, true, &mut rng).unwrap();
        check(&rows, &rhs, &x);
    }

    #[test]
    fn test_dependent_rows_are_singular() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let row: Vec<Gf2> = (0..8).map(|i| Gf2(i % 3 == 0)).collect();
        let rhs = vec![ByteRing([1; 4]), ByteRing([1; 4])];
        let err = solve(vec![row.clone(), row], rhs, 8, false, &mut rng).unwrap_err();
        assert_eq!(err, EncodeFailure::SingularSystem { rows: 2, cols: 8 });
    }

    #[test]
    fn test_more_rows_than_cols_is_singular() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let rows = vec![vec![Gf2(true)]; 2];
        let rhs = vec![ByteRing([0; 4]); 2];
        assert!(solve(rows, rhs, 1, false, &mut rng).is_err());
    }

    #[test]
    fn test_zero_row_is_singular() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let rows = vec![vec![Zp::new(0); 4], vec![Zp::new(1); 4]];
        let rhs = vec![Zp::new(0), Zp::new(3)];
        assert!(solve(rows, rhs, 4, false, &mut rng).is_err());
    }
}
