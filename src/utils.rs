// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

pub fn xor<const BLEN: usize>(xs: &[&[u8; BLEN]]) -> [u8; BLEN] {
    let mut res = [0; BLEN];
    xor_inplace(&mut res, xs);
    res
}

pub fn xor_inplace<const BLEN: usize>(lhs: &mut [u8; BLEN], rhss: &[&[u8; BLEN]]) {
    rhss.iter().for_each(|rhs| {
        // Word-sized chunks first, the tail one byte at a time.
        let mut lhs_chunks = lhs.chunks_exact_mut(8);
        let mut rhs_chunks = rhs.chunks_exact(8);
        (&mut lhs_chunks)
            .zip(&mut rhs_chunks)
            .for_each(|(l, r)| {
                let x = u64::from_ne_bytes((&*l).try_into().unwrap())
                    ^ u64::from_ne_bytes(r.try_into().unwrap());
                l.copy_from_slice(&x.to_ne_bytes());
            });
        lhs_chunks
            .into_remainder()
            .iter_mut()
            .zip(rhs_chunks.remainder())
            .for_each(|(l, r)| *l ^= r);
    });
}

/// Uniform-ish reduction of a little-endian 128-bit integer into `[0, range)`.
///
/// The bias is at most `range / 2^128`.
pub fn reduce_range(bytes: &[u8; 16], range: usize) -> usize {
    debug_assert!(range > 0);
    (u128::from_le_bytes(*bytes) % range as u128) as usize
}
