// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Errors of constructing and encoding an OKVS.
//!
//! Precondition violations, e.g., decoding a storage of the wrong length, are assertions instead.

/// Errors that can occur when constructing or encoding an OKVS.
#[derive(Debug, thiserror::Error)]
pub enum OkvsError {
    /// Malformed constructor arguments. Never retried internally.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// More pairs than the capacity `n` the OKVS was created for
    #[error("input too large: {len} pairs exceed the capacity {n}")]
    InputTooLarge { len: usize, n: usize },
    /// No valid assignment under the current hash keys.
    /// The caller should regenerate hash keys and retry.
    #[error("encode failed: {0}")]
    EncodeFailure(#[from] EncodeFailure),
}

/// Bounded-probability failures of an encoding.
///
/// Retrying with the same hash keys reproduces all of them except [`EncodeFailure::NonZeroRetriesExhausted`],
/// so the encoders surface them instead of looping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeFailure {
    #[error("singular linear system: {rows} rows over {cols} columns are not full row-rank")]
    SingularSystem { rows: usize, cols: usize },
    #[error("could not sample {num} distinct positions in range {range} within {cap} retries")]
    ResampleExhausted { num: usize, range: usize, cap: usize },
    #[error("all positions of the key at index {0} are occupied")]
    GbfSlotsExhausted(usize),
    #[error("bin {bin} receives {load} keys, exceeding its capacity {cap}")]
    BinOverflow { bin: usize, load: usize, cap: usize },
    #[error("two keys in bin {0} map to the same evaluation point")]
    DuplicateEvaluationPoint(usize),
    #[error("could not produce storage without zero slots within {0} attempts")]
    NonZeroRetriesExhausted(usize),
}

pub type Result<T> = std::result::Result<T, OkvsError>;
