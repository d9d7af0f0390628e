// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Garbled cuckoo tables.
//!
//! Every key touches `h` (2 or 3) sparse slots in `[0, lm)` with coefficient one,
//! plus all `rm` dense slots in `[lm, lm + rm)` weighted by a pseudorandom row.
//! Peeling assigns most keys a slot of their own.
//! The keys left in the core are solved with the dense slots as unknowns.

use std::collections::HashMap;
use std::marker::PhantomData;

use rand_core::CryptoRngCore;
use tracing::debug;

use crate::error::{EncodeFailure, OkvsError, Result};
use crate::peel::{Assignment, AssignmentGraph, Core, CoreForest, PeelPolicy};
use crate::position::{PositionGen, Positions};
use crate::prf::HashKey;
use crate::ring::{inner_product, Field, Ring};
use crate::solver::solve;
use crate::{check_config, check_input, encode_until_non_zero, params, surface, Okvs, OkvsType};

/// Garbled cuckoo table of the types [`OkvsType::H2Singleton`], [`OkvsType::H2TwoCore`], and [`OkvsType::H3Singleton`]
pub struct GctOkvs<R>
where
    R: Ring,
{
    okvs_type: OkvsType,
    n: usize,
    policy: PeelPolicy,
    gen: PositionGen,
    _r: PhantomData<fn() -> R>,
}

impl<R> GctOkvs<R>
where
    R: Ring,
{
    pub fn new(okvs_type: OkvsType, n: usize, hash_keys: &[HashKey]) -> Result<Self> {
        let policy = match okvs_type {
            OkvsType::H2Singleton | OkvsType::H3Singleton => PeelPolicy::Singleton,
            OkvsType::H2TwoCore => PeelPolicy::TwoCore,
            _ => {
                return Err(OkvsError::InvalidConfiguration(format!(
                    "{:?} is not a garbled cuckoo table",
                    okvs_type
                )))
            }
        };
        check_config(okvs_type, n, hash_keys)?;
        let gen = PositionGen::new(
            hash_keys,
            okvs_type.sparse_num(),
            params::sparse_range(okvs_type, n),
            params::dense_range(okvs_type, n),
        )?;
        Ok(Self {
            okvs_type,
            n,
            policy,
            gen,
            _r: PhantomData,
        })
    }

    /// One encoding attempt with fresh randomness
    fn encode_once<G>(
        &self,
        positions: &[Positions<R::Scalar>],
        assignment: &Assignment,
        values: &[R],
        doubly: bool,
        rng: &mut G,
    ) -> std::result::Result<Vec<R>, EncodeFailure>
    where
        G: CryptoRngCore + ?Sized,
    {
        let lm = self.gen.sparse_range();
        let rm = self.gen.dense_range();
        let mut storage: Vec<R> = (0..lm + rm)
            .map(|_| R::random_if_non_zero(rng, doubly))
            .collect();

        match &assignment.core {
            Core::Flat(keys) => {
                let rows = keys.iter().map(|&k| positions[k].dense.clone()).collect();
                let rhs = keys
                    .iter()
                    .map(|&k| {
                        positions[k]
                            .sparse
                            .iter()
                            .fold(values[k].clone(), |acc, &p| acc - storage[p].clone())
                    })
                    .collect();
                let d = solve(rows, rhs, rm, doubly, rng)?;
                storage[lm..].clone_from_slice(&d);
            }
            Core::Contracted(forest) => {
                let d = self.solve_contracted(forest, positions, values, &storage, doubly, rng)?;
                storage[lm..].clone_from_slice(&d);
                // Roots keep their random values, and a parent is always assigned before its children
                for e in &forest.tree {
                    let dense = inner_product(&positions[e.key].dense, &storage[lm..]);
                    storage[e.child] = values[e.key].clone() - storage[e.parent].clone() - dense;
                }
            }
        }

        // Every peeled key owns a slot touched by no key peeled before it
        for p in assignment.peeled.iter().rev() {
            let pos = &positions[p.key];
            let dense = inner_product(&pos.dense, &storage[lm..]);
            storage[p.vertex] = pos
                .sparse
                .iter()
                .filter(|&&s| s != p.vertex)
                .fold(values[p.key].clone() - dense, |acc, &s| {
                    acc - storage[s].clone()
                });
        }
        Ok(storage)
    }

    /// Express every core vertex as `$c_v + \langle a_v, d \rangle$` along the spanning forest,
    /// then solve for the dense slots `$d$` from the keys closing cycles.
    ///
    /// For a key `$e = (u, v)$` with value `$y_e$` and dense row `$w_e$`,
    /// `$S_u + S_v + \langle w_e, d \rangle = y_e$`.
    fn solve_contracted<G>(
        &self,
        forest: &CoreForest,
        positions: &[Positions<R::Scalar>],
        values: &[R],
        storage: &[R],
        doubly: bool,
        rng: &mut G,
    ) -> std::result::Result<Vec<R>, EncodeFailure>
    where
        G: CryptoRngCore + ?Sized,
    {
        let rm = self.gen.dense_range();
        let mut forms: HashMap<usize, (R, Vec<R::Scalar>)> =
            HashMap::with_capacity(forest.roots.len() + forest.tree.len());
        for &root in &forest.roots {
            forms.insert(root, (storage[root].clone(), vec![R::Scalar::zero(); rm]));
        }
        for e in &forest.tree {
            let (c_u, a_u) = &forms[&e.parent];
            let c_v = values[e.key].clone() - c_u.clone();
            let a_v = a_u
                .iter()
                .zip(&positions[e.key].dense)
                .map(|(&a, &w)| -a - w)
                .collect();
            forms.insert(e.child, (c_v, a_v));
        }

        let mut rows = Vec::with_capacity(forest.cycles.len());
        let mut rhs = Vec::with_capacity(forest.cycles.len());
        for &k in &forest.cycles {
            let [u, v] = [positions[k].sparse[0], positions[k].sparse[1]];
            let (c_u, a_u) = &forms[&u];
            let (c_v, a_v) = &forms[&v];
            rows.push(
                a_u.iter()
                    .zip(a_v)
                    .zip(&positions[k].dense)
                    .map(|((&a, &b), &w)| a + b + w)
                    .collect(),
            );
            rhs.push(values[k].clone() - c_u.clone() - c_v.clone());
        }
        debug!(
            vertices = forms.len(),
            equations = rows.len(),
            "expressed 2-core along spanning forest"
        );
        solve(rows, rhs, rm, doubly, rng)
    }
}

impl<R> Okvs<R> for GctOkvs<R>
where
    R: Ring,
{
    fn okvs_type(&self) -> OkvsType {
        self.okvs_type
    }

    fn n(&self) -> usize {
        self.n
    }

    fn sparse_position_range(&self) -> usize {
        self.gen.sparse_range()
    }

    fn dense_position_range(&self) -> usize {
        self.gen.dense_range()
    }

    #[tracing::instrument(skip_all, fields(okvs_type = ?self.okvs_type, n = self.n, len = keys.len(), doubly))]
    fn encode(
        &self,
        keys: &[&[u8]],
        values: &[R],
        doubly: bool,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<Vec<R>> {
        check_input(self.n, keys, values)?;
        let positions = surface(self.gen.batch_positions::<R::Scalar>(keys))?;
        let edges = positions
            .iter()
            .flat_map(|p| p.sparse.iter().copied())
            .collect();
        let assignment = AssignmentGraph::build(self.gen.sparse_range(), self.gen.sparse_num(), edges)
            .solve(self.policy);
        debug!(
            equations = assignment.core.equation_num(),
            cols = self.gen.dense_range(),
            "peeled"
        );
        surface(encode_until_non_zero(doubly, || {
            self.encode_once(&positions, &assignment, values, doubly, rng)
        }))
    }

    fn positions(&self, key: &[u8]) -> Result<Positions<R::Scalar>> {
        Ok(self.gen.positions(key)?)
    }
}
