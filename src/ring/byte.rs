// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Byte vectors as a ring `$GF(2)^l$` with `l = 8 * BLEN`.
//!
//! - Associative operation: XOR.
//! - Identity element: All bits zero.
//! - Inverse element: `x` itself.
//! - Scalars: [`Gf2`].

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rand_core::CryptoRngCore;

use super::gf2::Gf2;
use super::Ring;
use crate::utils::xor_inplace;

/// See [`self`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteRing<const BLEN: usize>(pub [u8; BLEN]);

impl<const BLEN: usize> Add for ByteRing<BLEN> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        xor_inplace(&mut self.0, &[&rhs.0]);
        self
    }
}

impl<const BLEN: usize> AddAssign for ByteRing<BLEN> {
    fn add_assign(&mut self, rhs: Self) {
        xor_inplace(&mut self.0, &[&rhs.0])
    }
}

impl<const BLEN: usize> Sub for ByteRing<BLEN> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + rhs
    }
}

impl<const BLEN: usize> SubAssign for ByteRing<BLEN> {
    fn sub_assign(&mut self, rhs: Self) {
        *self += rhs
    }
}

impl<const BLEN: usize> Neg for ByteRing<BLEN> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self
    }
}

impl<const BLEN: usize> Ring for ByteRing<BLEN> {
    type Scalar = Gf2;

    fn zero() -> Self {
        ByteRing([0; BLEN])
    }

    fn scale(&self, s: &Gf2) -> Self {
        if s.0 {
            self.clone()
        } else {
            Self::zero()
        }
    }

    fn random<G>(rng: &mut G) -> Self
    where
        G: CryptoRngCore + ?Sized,
    {
        let mut buf = [0; BLEN];
        rng.fill_bytes(&mut buf);
        ByteRing(buf)
    }
}

impl<const BLEN: usize> From<[u8; BLEN]> for ByteRing<BLEN> {
    fn from(value: [u8; BLEN]) -> Self {
        Self(value)
    }
}

impl<const BLEN: usize> From<ByteRing<BLEN>> for [u8; BLEN] {
    fn from(value: ByteRing<BLEN>) -> Self {
        value.0
    }
}

impl From<u64> for ByteRing<8> {
    fn from(value: u64) -> Self {
        Self(value.to_le_bytes())
    }
}

impl From<ByteRing<8>> for u64 {
    fn from(value: ByteRing<8>) -> Self {
        u64::from_le_bytes(value.0)
    }
}
