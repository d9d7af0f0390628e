// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! See [`PositionGen`].

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;

use crate::error::{EncodeFailure, OkvsError};
use crate::prf::{domain, Aes128Prf, HashKey, BLK_SIZE};
use crate::ring::Field;
use crate::utils::reduce_range;

/// Max retries to find one sparse position distinct from the previous ones
pub const RESAMPLE_CAP: usize = 128;

/// Storage positions a key decodes from.
///
/// The decoded value is `$\sum_{p \in sparse} S_p + \sum_j dense_j \cdot S_{dense\_offset + j}$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Positions<F> {
    /// Pairwise distinct indices with coefficient one
    pub sparse: Vec<usize>,
    /// Index the dense row starts at
    pub dense_offset: usize,
    /// Coefficients of the dense row
    pub dense: Vec<F>,
}

impl<F> Positions<F>
where
    F: Field,
{
    /// Indices `$p$` with a non-zero dense coefficient, i.e., the support of the dense row
    pub fn dense_support(&self) -> impl Iterator<Item = usize> + '_ {
        self.dense
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_zero())
            .map(|(i, _)| self.dense_offset + i)
    }
}

/// Position generator.
///
/// - Sparse position `j` is drawn with hash key `j`,
///   or with hash key 0 when there are fewer hash keys than sparse positions.
/// - The dense row is drawn with hash key 0 under a separate PRF domain.
pub struct PositionGen {
    prfs: Vec<Aes128Prf>,
    sparse_num: usize,
    sparse_range: usize,
    dense_range: usize,
}

impl PositionGen {
    pub fn new(
        hash_keys: &[HashKey],
        sparse_num: usize,
        sparse_range: usize,
        dense_range: usize,
    ) -> Result<Self, OkvsError> {
        if hash_keys.is_empty() {
            return Err(OkvsError::InvalidConfiguration(
                "at least one hash key is required".to_owned(),
            ));
        }
        if sparse_range < sparse_num {
            return Err(OkvsError::InvalidConfiguration(format!(
                "sparse range {} cannot hold {} distinct positions",
                sparse_range, sparse_num
            )));
        }
        Ok(Self {
            prfs: hash_keys.iter().map(Aes128Prf::new).collect(),
            sparse_num,
            sparse_range,
            dense_range,
        })
    }

    pub fn sparse_num(&self) -> usize {
        self.sparse_num
    }

    pub fn sparse_range(&self) -> usize {
        self.sparse_range
    }

    pub fn dense_range(&self) -> usize {
        self.dense_range
    }

    fn prf_idx(&self, j: usize) -> usize {
        if j < self.prfs.len() {
            j
        } else {
            0
        }
    }

    /// Sparse positions of `key`, pairwise distinct, in draw order
    pub fn sparse_positions(&self, key: &[u8]) -> Result<Vec<usize>, EncodeFailure> {
        let prf_num = self.sparse_num.min(self.prfs.len());
        let digests: Vec<_> = self.prfs[..prf_num]
            .iter()
            .map(|prf| prf.digest(key))
            .collect();
        let mut positions = Vec::with_capacity(self.sparse_num);
        for j in 0..self.sparse_num {
            let prf_idx = self.prf_idx(j);
            let prf = &self.prfs[prf_idx];
            // The high half of the counter keeps the streams of positions sharing a hash key apart
            let pos = (0..RESAMPLE_CAP)
                .map(|attempt| {
                    let counter = ((j as u64) << 32) | attempt as u64;
                    let blk = prf.block(&digests[prf_idx], domain::SPARSE, counter);
                    reduce_range(&blk, self.sparse_range)
                })
                .find(|pos| !positions.contains(pos))
                .ok_or(EncodeFailure::ResampleExhausted {
                    num: self.sparse_num,
                    range: self.sparse_range,
                    cap: RESAMPLE_CAP,
                })?;
            positions.push(pos);
        }
        Ok(positions)
    }

    /// Dense row of `key` of length `dense_range`
    pub fn dense_row<F>(&self, key: &[u8]) -> Vec<F>
    where
        F: Field,
    {
        if self.dense_range == 0 {
            return vec![];
        }
        let prf = &self.prfs[0];
        let digest = prf.digest(key);
        let mut buf = vec![0; F::row_byte_len(self.dense_range)];
        prf.fill(&digest, domain::DENSE, &mut buf);
        F::row_from_bytes(&buf, self.dense_range)
    }

    pub fn positions<F>(&self, key: &[u8]) -> Result<Positions<F>, EncodeFailure>
    where
        F: Field,
    {
        Ok(Positions {
            sparse: self.sparse_positions(key)?,
            dense_offset: self.sparse_range,
            dense: self.dense_row(key),
        })
    }

    /// Positions of many keys.
    /// Runs with multi-threading if the feature `multi-thread` is enabled.
    pub fn batch_positions<F>(&self, keys: &[&[u8]]) -> Result<Vec<Positions<F>>, EncodeFailure>
    where
        F: Field,
    {
        #[cfg(feature = "multi-thread")]
        return self.batch_positions_mt(keys);
        #[cfg(not(feature = "multi-thread"))]
        return self.batch_positions_st(keys);
    }

    pub fn batch_positions_st<F>(
        &self,
        keys: &[&[u8]],
    ) -> Result<Vec<Positions<F>>, EncodeFailure>
    where
        F: Field,
    {
        keys.iter().map(|key| self.positions(key)).collect()
    }

    #[cfg(feature = "multi-thread")]
    pub fn batch_positions_mt<F>(
        &self,
        keys: &[&[u8]],
    ) -> Result<Vec<Positions<F>>, EncodeFailure>
    where
        F: Field,
    {
        keys.par_iter().map(|key| self.positions(key)).collect()
    }

    /// Uniform index in `[0, range)` of `key` under hash key 0 and the domain `domain`
    pub fn hash_to_range(&self, key: &[u8], domain: u32, range: usize) -> usize {
        let prf = &self.prfs[0];
        let blk = prf.block(&prf.digest(key), domain, 0);
        reduce_range(&blk, range)
    }

    /// Uniform field element of `key` under hash key 0 and the domain `domain`
    pub fn hash_to_field<F>(&self, key: &[u8], domain: u32) -> F
    where
        F: Field,
    {
        let prf = &self.prfs[0];
        let digest = prf.digest(key);
        let mut buf = vec![0; F::UNIFORM_BYTE_LEN.max(BLK_SIZE)];
        prf.fill(&digest, domain, &mut buf);
        F::from_uniform_bytes(&buf[..F::UNIFORM_BYTE_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::gf2::Gf2;
    use crate::ring::int_prime::{U64Ring, PRIME_MAX_LE_U64_MAX};

    const HASH_KEYS: [HashKey; 3] = [[1; 16], [2; 16], [3; 16]];

    #[test]
    fn test_sparse_positions_distinct_and_in_range() {
        let gen = PositionGen::new(&HASH_KEYS, 3, 3, 40).unwrap();
        for i in 0u32..200 {
            let mut ps = gen.sparse_positions(&i.to_le_bytes()).unwrap();
            assert!(ps.iter().all(|&p| p < 3));
            ps.sort_unstable();
            ps.dedup();
            assert_eq!(ps.len(), 3);
        }
    }

    #[test]
    fn test_many_positions_from_one_hash_key() {
        let gen = PositionGen::new(&HASH_KEYS[..1], 40, 58, 0).unwrap();
        let mut ps = gen.sparse_positions(b"gbf key").unwrap();
        ps.sort_unstable();
        ps.dedup();
        assert_eq!(ps.len(), 40);
    }

    #[test]
    fn test_positions_are_deterministic() {
        let gen0 = PositionGen::new(&HASH_KEYS, 3, 1000, 48).unwrap();
        let gen1 = PositionGen::new(&HASH_KEYS, 3, 1000, 48).unwrap();
        let p0: Positions<Gf2> = gen0.positions(b"key").unwrap();
        let p1: Positions<Gf2> = gen1.positions(b"key").unwrap();
        assert_eq!(p0, p1);
        assert_eq!(p0.dense.len(), 48);
        assert_eq!(p0.dense_offset, 1000);
        assert!(p0.dense_support().all(|p| (1000..1048).contains(&p)));
    }

    #[test]
    fn test_hash_keys_change_positions() {
        let gen0 = PositionGen::new(&HASH_KEYS, 2, 1 << 20, 0).unwrap();
        let gen1 = PositionGen::new(&HASH_KEYS[1..], 2, 1 << 20, 0).unwrap();
        assert_ne!(
            gen0.sparse_positions(b"key").unwrap(),
            gen1.sparse_positions(b"key").unwrap()
        );
    }

    #[test]
    fn test_dense_row_over_prime_field() {
        let gen = PositionGen::new(&HASH_KEYS, 2, 10, 44).unwrap();
        let row: Vec<U64Ring<PRIME_MAX_LE_U64_MAX>> = gen.dense_row(b"key");
        assert_eq!(row.len(), 44);
        assert!(row.iter().any(|c| c.value() != 0));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            PositionGen::new(&HASH_KEYS, 3, 2, 40),
            Err(OkvsError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PositionGen::new(&[], 3, 10, 40),
            Err(OkvsError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_batch_positions_st_matches_single() {
        let gen = PositionGen::new(&HASH_KEYS, 3, 100, 41).unwrap();
        let keys: Vec<Vec<u8>> = (0u8..50).map(|i| vec![i; i as usize]).collect();
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let batch: Vec<Positions<Gf2>> = gen.batch_positions(&key_refs).unwrap();
        let batch_st: Vec<Positions<Gf2>> = gen.batch_positions_st(&key_refs).unwrap();
        assert_eq!(batch, batch_st);
        assert_eq!(batch[7], gen.positions(&keys[7]).unwrap());
    }
}
