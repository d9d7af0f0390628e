// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Polynomials with coefficients in a [`Ring`] over its scalar [`Field`].

use crate::ring::{Field, Ring};

/// `$1, x, x^2, \dots, x^{len - 1}$`
pub fn powers<F>(x: F, len: usize) -> Vec<F>
where
    F: Field,
{
    let mut ps = Vec::with_capacity(len);
    let mut p = F::one();
    for _ in 0..len {
        ps.push(p);
        p = p * x;
    }
    ps
}

/// `$\sum_i c_i x^i$` with Horner's method
#[cfg(test)]
pub(crate) fn evaluate<R>(coeffs: &[R], x: R::Scalar) -> R
where
    R: Ring,
{
    coeffs
        .iter()
        .rev()
        .fold(R::zero(), |acc, c| acc.scale(&x) + c.clone())
}

/// Coefficients of the unique polynomial of degree `< xs.len()` through `$(x_i, y_i)$`.
///
/// Lagrange interpolation in `$O(k^2)$`: the master polynomial `$M(X) = \prod_i (X - x_i)$` is built once,
/// and every basis polynomial is `$M(X) / (X - x_i)$` by synthetic division.
/// `None` if the `xs` are not pairwise distinct.
pub fn interpolate<R>(xs: &[R::Scalar], ys: &[R]) -> Option<Vec<R>>
where
    R: Ring,
{
    assert_eq!(xs.len(), ys.len());
    let k = xs.len();
    let mut coeffs = vec![R::zero(); k];
    if k == 0 {
        return Some(coeffs);
    }

    // Coefficients of M from the lowest degree, of length k + 1
    let mut master = vec![R::Scalar::zero(); k + 1];
    master[0] = R::Scalar::one();
    for (deg, &x) in xs.iter().enumerate() {
        for j in (1..=deg + 1).rev() {
            master[j] = master[j - 1] - x * master[j];
        }
        master[0] = -(x * master[0]);
    }

    let mut basis = vec![R::Scalar::zero(); k];
    for (&x, y) in xs.iter().zip(ys) {
        basis[k - 1] = master[k];
        for j in (1..k).rev() {
            basis[j - 1] = master[j] + x * basis[j];
        }
        // `$\prod_{j \ne i} (x_i - x_j)$`, zero iff `$x_i$` is repeated
        let denom = basis.iter().rev().fold(R::Scalar::zero(), |acc, &b| acc * x + b);
        let scale = denom.inv()?;
        coeffs
            .iter_mut()
            .zip(&basis)
            .for_each(|(c, &b)| *c += y.scale(&(b * scale)));
    }
    Some(coeffs)
}
