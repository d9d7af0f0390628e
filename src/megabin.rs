// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Bin-partitioned OKVS.
//!
//! Keys are routed into `B` bins by a PRF.
//! Every bin stores the `cap` coefficients of a polynomial over the scalar field,
//! interpolated through the `(x, y)` pairs of its keys plus random dummy points,
//! where `x` is the PRF evaluation point of a key.
//! Decoding evaluates the polynomial of the key's bin at its evaluation point,
//! i.e., a dense row of powers of `x` over the bin's window of the storage.

use std::marker::PhantomData;

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;
use rand_core::CryptoRngCore;
use tracing::debug;

use crate::error::{EncodeFailure, OkvsError, Result};
use crate::interpolate::{interpolate, powers};
use crate::position::{PositionGen, Positions, RESAMPLE_CAP};
use crate::prf::{domain, HashKey};
use crate::ring::{Field, Ring};
use crate::{check_config, check_input, encode_until_non_zero, params, surface, Okvs, OkvsType};

/// See [`self`].
pub struct MegaBinOkvs<R>
where
    R: Ring,
{
    n: usize,
    bin_num: usize,
    bin_cap: usize,
    gen: PositionGen,
    _r: PhantomData<fn() -> R>,
}

/// Points of one bin
struct Bin<F> {
    xs: Vec<F>,
    /// Indices into the input
    keys: Vec<usize>,
}

impl<R> MegaBinOkvs<R>
where
    R: Ring,
{
    /// Fails if the scalar field of `R` is too small for evaluation points to be distinct
    /// with overwhelming probability
    pub fn new(n: usize, hash_keys: &[HashKey]) -> Result<Self> {
        check_config(OkvsType::MegaBin, n, hash_keys)?;
        if (<R::Scalar as Field>::BIT_LEN as usize) < params::STATS_BIT_LENGTH {
            return Err(OkvsError::InvalidConfiguration(format!(
                "interpolation needs a scalar field of at least {} bits, got {}",
                params::STATS_BIT_LENGTH,
                <R::Scalar as Field>::BIT_LEN
            )));
        }
        let bin_num = params::mega_bin_num(n);
        Ok(Self {
            n,
            bin_num,
            bin_cap: params::mega_bin_capacity(n, bin_num),
            gen: PositionGen::new(hash_keys, 0, 0, 0)?,
            _r: PhantomData,
        })
    }

    pub fn bin_num(&self) -> usize {
        self.bin_num
    }

    pub fn bin_capacity(&self) -> usize {
        self.bin_cap
    }

    fn bin_of(&self, key: &[u8]) -> usize {
        self.gen.hash_to_range(key, domain::BIN, self.bin_num)
    }

    fn eval_point(&self, key: &[u8]) -> R::Scalar {
        self.gen.hash_to_field(key, domain::EVAL)
    }

    /// Route keys into bins, failing on a bin over the max load
    fn route(&self, keys: &[&[u8]]) -> std::result::Result<Vec<Bin<R::Scalar>>, EncodeFailure> {
        let route_one = |key: &&[u8]| (self.bin_of(key), self.eval_point(key));
        #[cfg(feature = "multi-thread")]
        let routes: Vec<_> = keys.par_iter().map(route_one).collect();
        #[cfg(not(feature = "multi-thread"))]
        let routes: Vec<_> = keys.iter().map(route_one).collect();

        let mut bins: Vec<_> = (0..self.bin_num)
            .map(|_| Bin {
                xs: vec![],
                keys: vec![],
            })
            .collect();
        for (i, (bin, x)) in routes.into_iter().enumerate() {
            bins[bin].xs.push(x);
            bins[bin].keys.push(i);
        }
        // At least one dummy point per bin
        let max_load = self.bin_cap - 1;
        if let Some((bin, b)) = bins.iter().enumerate().find(|(_, b)| b.keys.len() > max_load) {
            return Err(EncodeFailure::BinOverflow {
                bin,
                load: b.keys.len(),
                cap: max_load,
            });
        }
        Ok(bins)
    }

    /// One encoding attempt with fresh dummy points
    fn encode_once<G>(
        &self,
        bins: &[Bin<R::Scalar>],
        values: &[R],
        doubly: bool,
        rng: &mut G,
    ) -> std::result::Result<Vec<R>, EncodeFailure>
    where
        G: CryptoRngCore + ?Sized,
    {
        // Sampled up front since the RNG can not be shared among threads
        let mut points = Vec::with_capacity(bins.len());
        for b in bins {
            let mut xs = b.xs.clone();
            let mut ys: Vec<R> = b.keys.iter().map(|&k| values[k].clone()).collect();
            while xs.len() < self.bin_cap {
                let x = (0..RESAMPLE_CAP)
                    .map(|_| <R::Scalar as Field>::random(rng))
                    .find(|x| !xs.contains(x))
                    .ok_or(EncodeFailure::ResampleExhausted {
                        num: self.bin_cap,
                        range: 1 << (<R::Scalar as Field>::BIT_LEN.min(usize::BITS - 1)),
                        cap: RESAMPLE_CAP,
                    })?;
                xs.push(x);
                ys.push(R::random_if_non_zero(rng, doubly));
            }
            points.push((xs, ys));
        }

        let interpolate_bin = |(bin, (xs, ys)): (usize, &(Vec<R::Scalar>, Vec<R>))| {
            interpolate(xs, ys).ok_or(EncodeFailure::DuplicateEvaluationPoint(bin))
        };
        #[cfg(feature = "multi-thread")]
        let coeffs: Vec<Vec<R>> = points
            .par_iter()
            .enumerate()
            .map(interpolate_bin)
            .collect::<std::result::Result<_, _>>()?;
        #[cfg(not(feature = "multi-thread"))]
        let coeffs: Vec<Vec<R>> = points
            .iter()
            .enumerate()
            .map(interpolate_bin)
            .collect::<std::result::Result<_, _>>()?;
        Ok(coeffs.into_iter().flatten().collect())
    }
}

impl<R> Okvs<R> for MegaBinOkvs<R>
where
    R: Ring,
{
    fn okvs_type(&self) -> OkvsType {
        OkvsType::MegaBin
    }

    fn n(&self) -> usize {
        self.n
    }

    fn sparse_position_range(&self) -> usize {
        0
    }

    fn dense_position_range(&self) -> usize {
        self.bin_num * self.bin_cap
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
        let bins = surface(self.route(keys))?;
        debug!(
            bins = self.bin_num,
            cap = self.bin_cap,
            max_load = bins.iter().map(|b| b.keys.len()).max().unwrap_or(0),
            "routed keys into bins"
        );
        surface(encode_until_non_zero(doubly, || {
            self.encode_once(&bins, values, doubly, rng)
        }))
    }

    fn positions(&self, key: &[u8]) -> Result<Positions<R::Scalar>> {
        Ok(Positions {
            sparse: vec![],
            dense_offset: self.bin_of(key) * self.bin_cap,
            dense: powers(self.eval_point(key), self.bin_cap),
        })
    }
}
