// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Garbled Bloom filter.
//!
//! Every key touches `$\lambda$` distinct slots, all derived from one hash key, and no dense slot.
//! Keys are inserted in input order.
//! An inserted key reserves its first unoccupied slot, fills its other unoccupied slots at random,
//! and sets the reserved slot so that its slots sum up to its value.

use std::marker::PhantomData;

use rand_core::CryptoRngCore;

use crate::error::{EncodeFailure, Result};
use crate::position::{PositionGen, Positions};
use crate::prf::HashKey;
use crate::ring::Ring;
use crate::{check_config, check_input, encode_until_non_zero, params, surface, Okvs, OkvsType};

/// See [`self`].
pub struct GbfOkvs<R>
where
    R: Ring,
{
    n: usize,
    gen: PositionGen,
    _r: PhantomData<fn() -> R>,
}

impl<R> GbfOkvs<R>
where
    R: Ring,
{
    pub fn new(n: usize, hash_keys: &[HashKey]) -> Result<Self> {
        check_config(OkvsType::Gbf, n, hash_keys)?;
        let gen = PositionGen::new(
            hash_keys,
            OkvsType::Gbf.sparse_num(),
            params::sparse_range(OkvsType::Gbf, n),
            0,
        )?;
        Ok(Self {
            n,
            gen,
            _r: PhantomData,
        })
    }

    fn encode_once<G>(
        &self,
        positions: &[Positions<R::Scalar>],
        values: &[R],
        doubly: bool,
        rng: &mut G,
    ) -> std::result::Result<Vec<R>, EncodeFailure>
    where
        G: CryptoRngCore + ?Sized,
    {
        let mut storage: Vec<Option<R>> = vec![None; self.gen.sparse_range()];
        for (i, (pos, value)) in positions.iter().zip(values).enumerate() {
            let mut empty = pos.sparse.iter().copied().filter(|&p| storage[p].is_none());
            let Some(reserved) = empty.next() else {
                return Err(EncodeFailure::GbfSlotsExhausted(i));
            };
            let others: Vec<usize> = empty.collect();
            for p in others {
                storage[p] = Some(R::random_if_non_zero(rng, doubly));
            }
            // The reserved slot is the only empty one left
            let sum = pos
                .sparse
                .iter()
                .filter_map(|&p| storage[p].clone())
                .fold(R::zero(), |acc, x| acc + x);
            storage[reserved] = Some(value.clone() - sum);
        }
        Ok(storage
            .into_iter()
            .map(|x| x.unwrap_or_else(|| R::random_if_non_zero(rng, doubly)))
            .collect())
    }
}

impl<R> Okvs<R> for GbfOkvs<R>
where
    R: Ring,
{
    fn okvs_type(&self) -> OkvsType {
        OkvsType::Gbf
    }

    fn n(&self) -> usize {
        self.n
    }

    fn sparse_position_range(&self) -> usize {
        self.gen.sparse_range()
    }

    fn dense_position_range(&self) -> usize {
        0
    }

    #[tracing::instrument(skip_all, fields(n = self.n, len = keys.len(), doubly))]
    fn encode(
        &self,
        keys: &[&[u8]],
        values: &[R],
        doubly: bool,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<Vec<R>> {
        check_input(self.n, keys, values)?;
        let positions = surface(self.gen.batch_positions::<R::Scalar>(keys))?;
        surface(encode_until_non_zero(doubly, || {
            self.encode_once(&positions, values, doubly, rng)
        }))
    }

    fn positions(&self, key: &[u8]) -> Result<Positions<R::Scalar>> {
        Ok(self.gen.positions(key)?)
    }
}
