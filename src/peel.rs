// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Hypergraph peeling.
//!
//! Vertices are sparse positions and every key is a hyperedge over its `arity` sparse positions.
//! A vertex with exactly one active incident key is a singleton.
//! Peeling repeatedly removes the key of a singleton and records the pair,
//! so that in reverse removal order every key owns a slot no later key touches.
//! Keys left when no singleton remains form the core, which is solved linearly.
//!
//! The graph is stored in flat arrays: key to vertices with a fixed stride,
//! and vertex to incident keys as ranges into one incidence array.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use bitvec::prelude::*;
use tracing::debug;

/// How the core left by singleton peeling is handed to the linear solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeelPolicy {
    /// Every core key becomes one equation over the dense positions
    Singleton,
    /// The 2-core of an arity-2 graph is contracted along a spanning forest first.
    /// Only the keys closing cycles become equations.
    TwoCore,
}

/// Terminal state of peeling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeelOutcome {
    AllPeeled,
    CoreRemaining,
}

/// A key removed by peeling and the slot it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peeled {
    pub key: usize,
    pub vertex: usize,
}

/// Edge of the spanning forest of a contracted 2-core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEdge {
    pub key: usize,
    pub parent: usize,
    pub child: usize,
}

/// Spanning forest of a 2-core.
///
/// `tree` lists edges in BFS order, so a parent always appears (as a root or a child) before its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreForest {
    pub roots: Vec<usize>,
    pub tree: Vec<TreeEdge>,
    /// Keys not in the forest, each closing one cycle
    pub cycles: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Core {
    Flat(Vec<usize>),
    Contracted(CoreForest),
}

impl Core {
    /// Number of equations handed to the linear solver
    pub fn equation_num(&self) -> usize {
        match self {
            Core::Flat(keys) => keys.len(),
            Core::Contracted(forest) => forest.cycles.len(),
        }
    }
}

/// Final partition of the keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// In removal order. Back-substitution walks it reversed.
    pub peeled: Vec<Peeled>,
    pub core: Core,
}

/// See [`self`].
pub struct AssignmentGraph {
    vertex_num: usize,
    arity: usize,
    /// Key `i` touches `edges[i * arity..(i + 1) * arity]`
    edges: Vec<usize>,
    /// Vertex `v` is touched by `incidence[offsets[v]..offsets[v + 1]]`
    offsets: Vec<usize>,
    incidence: Vec<usize>,
    degree: Vec<usize>,
    active: BitVec,
}

impl AssignmentGraph {
    /// `edges` holds the `arity` distinct vertices of every key back to back
    pub fn build(vertex_num: usize, arity: usize, edges: Vec<usize>) -> Self {
        assert!(arity > 0);
        assert_eq!(edges.len() % arity, 0);
        let key_num = edges.len() / arity;

        let mut degree = vec![0; vertex_num];
        edges.iter().for_each(|&v| degree[v] += 1);
        let mut offsets = Vec::with_capacity(vertex_num + 1);
        offsets.push(0);
        degree.iter().fold(0, |acc, d| {
            offsets.push(acc + d);
            acc + d
        });
        let mut fill = offsets[..vertex_num].to_vec();
        let mut incidence = vec![0; edges.len()];
        edges.iter().enumerate().for_each(|(i, &v)| {
            incidence[fill[v]] = i / arity;
            fill[v] += 1;
        });

        Self {
            vertex_num,
            arity,
            edges,
            offsets,
            incidence,
            degree,
            active: bitvec![1; key_num],
        }
    }

    pub fn key_num(&self) -> usize {
        self.edges.len() / self.arity
    }

    pub fn vertices(&self, key: usize) -> &[usize] {
        &self.edges[key * self.arity..(key + 1) * self.arity]
    }

    /// Active keys touching `v`
    fn active_keys(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.incidence[self.offsets[v]..self.offsets[v + 1]]
            .iter()
            .copied()
            .filter(|&k| self.active[k])
    }

    /// Peel singletons until none remains.
    /// Singletons are processed in increasing vertex index order, so the result is deterministic.
    pub fn peel(&mut self) -> Vec<Peeled> {
        let mut singletons: BinaryHeap<_> = (0..self.vertex_num)
            .filter(|&v| self.degree[v] == 1)
            .map(Reverse)
            .collect();
        let mut peeled = Vec::with_capacity(self.key_num());
        while let Some(Reverse(v)) = singletons.pop() {
            // Stale entry whose key was peeled through another vertex
            if self.degree[v] != 1 {
                continue;
            }
            let Some(key) = self.active_keys(v).next() else {
                continue;
            };
            self.active.set(key, false);
            peeled.push(Peeled { key, vertex: v });
            for i in 0..self.arity {
                let u = self.edges[key * self.arity + i];
                self.degree[u] -= 1;
                if self.degree[u] == 1 {
                    singletons.push(Reverse(u));
                }
            }
        }
        peeled
    }

    pub fn outcome(&self) -> PeelOutcome {
        if self.active.not_any() {
            PeelOutcome::AllPeeled
        } else {
            PeelOutcome::CoreRemaining
        }
    }

    /// Keys still active, in increasing order
    pub fn core_keys(&self) -> Vec<usize> {
        self.active.iter_ones().collect()
    }

    /// Peel and partition the keys with `policy`
    pub fn solve(mut self, policy: PeelPolicy) -> Assignment {
        let peeled = self.peel();
        let core_keys = self.core_keys();
        debug!(
            keys = self.key_num(),
            peeled = peeled.len(),
            core = core_keys.len(),
            outcome = ?self.outcome(),
            "peeled assignment graph"
        );
        let core = match policy {
            PeelPolicy::Singleton => Core::Flat(core_keys),
            PeelPolicy::TwoCore => {
                assert_eq!(self.arity, 2, "2-core contraction needs arity 2");
                let forest = self.contract_two_core(&core_keys);
                debug!(
                    roots = forest.roots.len(),
                    tree = forest.tree.len(),
                    cycles = forest.cycles.len(),
                    "contracted 2-core"
                );
                Core::Contracted(forest)
            }
        };
        Assignment { peeled, core }
    }

    /// BFS spanning forest over the core edges, rooted at the smallest unvisited vertex
    fn contract_two_core(&self, core_keys: &[usize]) -> CoreForest {
        let mut forest = CoreForest::default();
        if core_keys.is_empty() {
            return forest;
        }

        let mut visited = bitvec![0; self.vertex_num];
        let mut used = bitvec![0; self.key_num()];
        let mut vertices: Vec<usize> = core_keys
            .iter()
            .flat_map(|&k| self.vertices(k).iter().copied())
            .collect();
        vertices.sort_unstable();
        vertices.dedup();

        let mut queue = VecDeque::new();
        for root in vertices {
            if visited[root] {
                continue;
            }
            visited.set(root, true);
            forest.roots.push(root);
            queue.push_back(root);
            while let Some(v) = queue.pop_front() {
                let keys: Vec<usize> = self.active_keys(v).collect();
                for key in keys {
                    if used[key] {
                        continue;
                    }
                    used.set(key, true);
                    let [a, b] = [self.edges[key * 2], self.edges[key * 2 + 1]];
                    let other = if a == v { b } else { a };
                    if visited[other] {
                        forest.cycles.push(key);
                    } else {
                        visited.set(other, true);
                        forest.tree.push(TreeEdge {
                            key,
                            parent: v,
                            child: other,
                        });
                        queue.push_back(other);
                    }
                }
            }
        }
        forest
    }
}
