// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! The binary field `$GF(2)$`.
//!
//! - Addition: XOR.
//! - Multiplication: AND.
//!
//! Rows over it are bit vectors, so PRF output is consumed one bit per element.

use std::ops::{Add, Mul, Neg, Sub};

use bitvec::prelude::*;

use super::Field;

/// See [`self`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gf2(pub bool);

impl Add for Gf2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Gf2(self.0 ^ rhs.0)
    }
}

impl Sub for Gf2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Gf2(self.0 ^ rhs.0)
    }
}

impl Mul for Gf2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Gf2(self.0 & rhs.0)
    }
}

impl Neg for Gf2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self
    }
}

impl Field for Gf2 {
    const BIT_LEN: u32 = 1;
    const UNIFORM_BYTE_LEN: usize = 1;

    fn zero() -> Self {
        Gf2(false)
    }

    fn one() -> Self {
        Gf2(true)
    }

    fn inv(&self) -> Option<Self> {
        self.0.then_some(*self)
    }

    fn from_uniform_bytes(bytes: &[u8]) -> Self {
        Gf2(bytes[0].view_bits::<Lsb0>()[0])
    }

    fn row_byte_len(len: usize) -> usize {
        len.div_ceil(8)
    }

    fn row_from_bytes(bytes: &[u8], len: usize) -> Vec<Self> {
        assert_eq!(bytes.len(), Self::row_byte_len(len));
        bytes.view_bits::<Lsb0>()[..len]
            .iter()
            .by_vals()
            .map(Gf2)
            .collect()
    }
}

impl From<bool> for Gf2 {
    fn from(value: bool) -> Self {
        Gf2(value)
    }
}

impl From<Gf2> for bool {
    fn from(value: Gf2) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_field_axioms;

    test_field_axioms!(test_gf2_field_axioms, Gf2);

    #[test]
    fn test_row_from_bytes_is_lsb_first() {
        let row = Gf2::row_from_bytes(&[0b0000_0101, 0b1], 9);
        let bits: Vec<bool> = row.into_iter().map(Into::into).collect();
        assert_eq!(
            bits,
            [true, false, true, false, false, false, false, false, true]
        );
    }
}
