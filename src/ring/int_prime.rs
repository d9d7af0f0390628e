// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Integers modulo a prime `MOD`, which are a ring of values and at the same time the field of scalars.
//! Some prime numbers that are the max ones less than or equal to `u*::MAX` are provided as `PRIME_MAX_LE_U*_MAX`.
//!
//! - Associative operation: Integer addition modulo `MOD`, `$(a + b) \mod MOD$`.
//! - Identity element: 0.
//! - Inverse element: `-x`.
//! - Multiplication: `$(a \cdot b) \mod MOD$`, with inverses by Fermat's little theorem.
//!
//! `MOD` MUST be a prime number. Nothing checks it.

use std::mem::size_of;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use rand::Rng;
use rand_core::CryptoRngCore;

use super::{Field, Ring};

macro_rules! decl_int_prime_ring {
    ($t:ty, $t_impl:ident) => {
        /// See [`self`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $t_impl<const MOD: $t>(
            /// Always less than `MOD`.
            $t,
        );

        impl<const MOD: $t> $t_impl<MOD> {
            pub fn new(x: $t) -> Self {
                $t_impl(x % MOD)
            }

            /// Reject out-of-range representatives instead of reducing them
            pub fn try_new(x: $t) -> Option<Self> {
                (x < MOD).then_some($t_impl(x))
            }

            pub fn value(&self) -> $t {
                self.0
            }

            fn pow(self, mut exp: $t) -> Self {
                let mut base = self;
                let mut acc = $t_impl(1 % MOD);
                while exp > 0 {
                    if exp & 1 == 1 {
                        acc = acc * base;
                    }
                    base = base * base;
                    exp >>= 1;
                }
                acc
            }
        }

        impl<const MOD: $t> Add for $t_impl<MOD> {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                $t_impl(((self.0 as u128 + rhs.0 as u128) % MOD as u128) as $t)
            }
        }

        impl<const MOD: $t> AddAssign for $t_impl<MOD> {
            fn add_assign(&mut self, rhs: Self) {
                *self = *self + rhs;
            }
        }

        impl<const MOD: $t> Neg for $t_impl<MOD> {
            type Output = Self;

            fn neg(mut self) -> Self::Output {
                self.0 = (MOD - self.0) % MOD;
                self
            }
        }

        impl<const MOD: $t> Sub for $t_impl<MOD> {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                self + -rhs
            }
        }

        impl<const MOD: $t> SubAssign for $t_impl<MOD> {
            fn sub_assign(&mut self, rhs: Self) {
                *self = *self - rhs;
            }
        }

        impl<const MOD: $t> Mul for $t_impl<MOD> {
            type Output = Self;

            fn mul(self, rhs: Self) -> Self::Output {
                $t_impl(((self.0 as u128 * rhs.0 as u128) % MOD as u128) as $t)
            }
        }

        impl<const MOD: $t> Ring for $t_impl<MOD> {
            type Scalar = Self;

            fn zero() -> Self {
                $t_impl(0)
            }

            fn scale(&self, s: &Self) -> Self {
                *self * *s
            }

            fn random<G>(rng: &mut G) -> Self
            where
                G: CryptoRngCore + ?Sized,
            {
                $t_impl(rng.gen_range(0..MOD))
            }
        }

        impl<const MOD: $t> Field for $t_impl<MOD> {
            const BIT_LEN: u32 = <$t>::BITS - 1 - MOD.leading_zeros();
            // 64 extra bits make the reduction bias negligible
            const UNIFORM_BYTE_LEN: usize = 16;

            fn zero() -> Self {
                $t_impl(0)
            }

            fn one() -> Self {
                $t_impl(1 % MOD)
            }

            fn inv(&self) -> Option<Self> {
                (self.0 != 0).then(|| self.pow(MOD - 2))
            }

            fn from_uniform_bytes(bytes: &[u8]) -> Self {
                let buf: [u8; 16] = bytes[..16].try_into().unwrap();
                let x = if cfg!(not(feature = "int-be")) {
                    u128::from_le_bytes(buf)
                } else {
                    u128::from_be_bytes(buf)
                };
                $t_impl((x % MOD as u128) as $t)
            }

            fn random<G>(rng: &mut G) -> Self
            where
                G: CryptoRngCore + ?Sized,
            {
                $t_impl(rng.gen_range(0..MOD))
            }
        }

        impl<const BLEN: usize, const MOD: $t> From<[u8; BLEN]> for $t_impl<MOD> {
            fn from(value: [u8; BLEN]) -> Self {
                if cfg!(not(feature = "int-be")) {
                    $t_impl(
                        <$t>::from_le_bytes(value[..size_of::<$t>()].try_into().unwrap()) % MOD,
                    )
                } else {
                    $t_impl(
                        <$t>::from_be_bytes(value[..size_of::<$t>()].try_into().unwrap()) % MOD,
                    )
                }
            }
        }

        impl<const MOD: $t> From<$t> for $t_impl<MOD> {
            fn from(value: $t) -> Self {
                <$t_impl<MOD>>::new(value)
            }
        }

        impl<const BLEN: usize, const MOD: $t> From<$t_impl<MOD>> for [u8; BLEN] {
            fn from(value: $t_impl<MOD>) -> Self {
                let mut bs = [0; BLEN];
                if cfg!(not(feature = "int-be")) {
                    bs[..size_of::<$t>()].copy_from_slice(&value.0.to_le_bytes());
                } else {
                    bs[..size_of::<$t>()].copy_from_slice(&value.0.to_be_bytes());
                }
                bs
            }
        }

        impl<const MOD: $t> From<$t_impl<MOD>> for $t {
            fn from(value: $t_impl<MOD>) -> Self {
                value.0
            }
        }
    };
}

decl_int_prime_ring!(u8, U8Ring);
decl_int_prime_ring!(u16, U16Ring);
decl_int_prime_ring!(u32, U32Ring);
decl_int_prime_ring!(u64, U64Ring);

/// `$2^8 - 5$`
pub const PRIME_MAX_LE_U8_MAX: u8 = u8::MAX - 5 + 1;
/// `$2^16 - 15$`
pub const PRIME_MAX_LE_U16_MAX: u16 = u16::MAX - 15 + 1;
/// `$2^32 - 5$`
pub const PRIME_MAX_LE_U32_MAX: u32 = u32::MAX - 5 + 1;
/// `$2^64 - 59$`
pub const PRIME_MAX_LE_U64_MAX: u64 = u64::MAX - 59 + 1;
