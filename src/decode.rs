// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Stateless decoding from storage positions.
//!
//! The sparse and dense halves are exposed separately,
//! so that 2 parties holding different parts of the storage can each compute a partial sum.

use crate::position::Positions;
use crate::ring::{inner_product, Ring};

/// `$\sum_{p \in sparse} S_p + \sum_j dense_j \cdot S_{dense\_offset + j}$`
pub fn decode<R>(storage: &[R], positions: &Positions<R::Scalar>) -> R
where
    R: Ring,
{
    decode_sparse(storage, positions) + decode_dense(storage, positions)
}

/// `$\sum_{p \in sparse} S_p$`
pub fn decode_sparse<R>(storage: &[R], positions: &Positions<R::Scalar>) -> R
where
    R: Ring,
{
    positions
        .sparse
        .iter()
        .fold(R::zero(), |acc, &p| acc + storage[p].clone())
}

/// `$\sum_j dense_j \cdot S_{dense\_offset + j}$`
pub fn decode_dense<R>(storage: &[R], positions: &Positions<R::Scalar>) -> R
where
    R: Ring,
{
    let start = positions.dense_offset;
    inner_product(
        &positions.dense,
        &storage[start..start + positions.dense.len()],
    )
}
