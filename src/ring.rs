// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Value rings and their scalar fields.
//!
//! Values stored in an OKVS live in a [`Ring`].
//! The engine only adds, subtracts, samples, and scales them by elements of the ring's [`Field`] of scalars.
//! Dense rows of the linear system are vectors over that field.
//!
//! - [`byte::ByteRing`]: `$GF(2)^l$` with XOR, scalars are [`gf2::Gf2`].
//! - [`int_prime`]: integers modulo a prime `$p$`, scalars are the ring itself.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use rand_core::CryptoRngCore;

pub mod byte;
pub mod gf2;
pub mod int_prime;

/// Ring (mathematics) of values.
///
/// Only the additive structure is used by the encoders.
/// Multiplication only appears as scaling by a [`Field`] element.
pub trait Ring
where
    Self: Add<Output = Self>
        + AddAssign
        + Sub<Output = Self>
        + SubAssign
        + Neg<Output = Self>
        + PartialEq
        + Eq
        + Debug
        + Sized
        + Clone
        + Sync
        + Send,
{
    /// Field the dense coefficients are drawn from
    type Scalar: Field;

    /// Zero in the ring
    fn zero() -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// `$s \cdot x$`
    fn scale(&self, s: &Self::Scalar) -> Self;

    /// Uniformly random element
    fn random<G>(rng: &mut G) -> Self
    where
        G: CryptoRngCore + ?Sized;

    /// Uniformly random non-zero element
    fn random_non_zero<G>(rng: &mut G) -> Self
    where
        G: CryptoRngCore + ?Sized,
    {
        loop {
            let x = Self::random(rng);
            if !x.is_zero() {
                return x;
            }
        }
    }

    /// Helper to sample a non-zero element only if `non_zero`
    fn random_if_non_zero<G>(rng: &mut G, non_zero: bool) -> Self
    where
        G: CryptoRngCore + ?Sized,
    {
        if non_zero {
            Self::random_non_zero(rng)
        } else {
            Self::random(rng)
        }
    }
}

/// Finite field of scalars.
///
/// Used as the coefficient domain of dense rows and of interpolated polynomials.
pub trait Field
where
    Self: Add<Output = Self>
        + Sub<Output = Self>
        + Mul<Output = Self>
        + Neg<Output = Self>
        + Copy
        + PartialEq
        + Eq
        + Debug
        + Sized
        + Sync
        + Send,
{
    /// `$\lfloor \log_2 |F| \rfloor$`
    const BIT_LEN: u32;
    /// Byte length consumed by [`Field::from_uniform_bytes`]
    const UNIFORM_BYTE_LEN: usize;

    fn zero() -> Self;
    fn one() -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Multiplicative inverse, `None` for zero
    fn inv(&self) -> Option<Self>;

    /// Map PRF output of [`Field::UNIFORM_BYTE_LEN`] bytes to a (statistically) uniform element
    fn from_uniform_bytes(bytes: &[u8]) -> Self;

    /// Byte length of PRF output needed by [`Field::row_from_bytes`] for `len` elements
    fn row_byte_len(len: usize) -> usize {
        len * Self::UNIFORM_BYTE_LEN
    }

    /// Decode `len` uniform elements from PRF output
    fn row_from_bytes(bytes: &[u8], len: usize) -> Vec<Self> {
        assert_eq!(bytes.len(), Self::row_byte_len(len));
        bytes
            .chunks_exact(Self::UNIFORM_BYTE_LEN)
            .map(Self::from_uniform_bytes)
            .collect()
    }

    /// Uniformly random element
    fn random<G>(rng: &mut G) -> Self
    where
        G: CryptoRngCore + ?Sized,
    {
        let mut buf = vec![0; Self::UNIFORM_BYTE_LEN];
        rng.fill_bytes(&mut buf);
        Self::from_uniform_bytes(&buf)
    }
}

/// `$\sum_j a_j \cdot x_j$` with ring elements `xs` and scalars `coeffs`
pub fn inner_product<R>(coeffs: &[R::Scalar], xs: &[R]) -> R
where
    R: Ring,
{
    assert_eq!(coeffs.len(), xs.len());
    coeffs
        .iter()
        .zip(xs)
        .filter(|(c, _)| !c.is_zero())
        .fold(R::zero(), |acc, (c, x)| acc + x.scale(c))
}

#[cfg(test)]
#[macro_export]
macro_rules! test_ring_axioms {
    ($test_name:ident, $ring:ty) => {
        #[test]
        fn $test_name() {
            use rand::SeedableRng;
            use $crate::ring::{Field, Ring};

            let mut rng = rand_chacha::ChaCha12Rng::seed_from_u64(0x6f6b7673);
            for _ in 0..64 {
                let a = <$ring as Ring>::random(&mut rng);
                let b = <$ring as Ring>::random(&mut rng);
                let c = <$ring as Ring>::random(&mut rng);
                // Associative
                assert_eq!(
                    (a.clone() + b.clone()) + c.clone(),
                    a.clone() + (b.clone() + c.clone())
                );
                // Commutative
                assert_eq!(a.clone() + b.clone(), b.clone() + a.clone());
                // Identity
                assert_eq!(a.clone() + <$ring as Ring>::zero(), a.clone());
                // Inverse
                assert_eq!(a.clone() + -a.clone(), <$ring as Ring>::zero());
                assert_eq!((a.clone() - b.clone()) + b.clone(), a.clone());
                let mut d = a.clone();
                d += b.clone();
                d -= b.clone();
                assert_eq!(d, a.clone());

                let s = <<$ring as Ring>::Scalar as Field>::random(&mut rng);
                let t = <<$ring as Ring>::Scalar as Field>::random(&mut rng);
                // Scaling distributes over both additions
                assert_eq!(
                    (a.clone() + b.clone()).scale(&s),
                    a.scale(&s) + b.scale(&s)
                );
                assert_eq!(a.scale(&(s + t)), a.scale(&s) + a.scale(&t));
                assert_eq!(
                    a.scale(&<<$ring as Ring>::Scalar as Field>::one()),
                    a.clone()
                );
                assert!(Ring::is_zero(
                    &a.scale(&<<$ring as Ring>::Scalar as Field>::zero())
                ));
                assert!(!Ring::is_zero(&<$ring as Ring>::random_non_zero(
                    &mut rng
                )));
            }
        }
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! test_field_axioms {
    ($test_name:ident, $field:ty) => {
        #[test]
        fn $test_name() {
            use rand::SeedableRng;
            use $crate::ring::Field;

            let mut rng = rand_chacha::ChaCha12Rng::seed_from_u64(0x6669656c64);
            for _ in 0..64 {
                let a = <$field as Field>::random(&mut rng);
                let b = <$field as Field>::random(&mut rng);
                let c = <$field as Field>::random(&mut rng);
                assert_eq!((a * b) * c, a * (b * c));
                assert_eq!(a * (b + c), a * b + a * c);
                assert_eq!(a * <$field as Field>::one(), a);
                assert_eq!(a - a, <$field as Field>::zero());
                match a.inv() {
                    Some(a_inv) => assert_eq!(a * a_inv, <$field as Field>::one()),
                    None => assert!(Field::is_zero(&a)),
                }
            }
        }
    };
}
