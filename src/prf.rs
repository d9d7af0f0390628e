// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Keyed PRF over arbitrary-length keys built from AES-128.
//!
//! A key is first compressed into one block by CBC-MAC with its byte length as the first block,
//! which makes the message space prefix-free.
//! The block is then expanded in counter mode with a Matyas-Meyer-Oseas one-way compression function,
//! under a domain tag so that sparse positions, dense rows, bins, and evaluation points never share PRF inputs.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::utils::{xor, xor_inplace};

/// AES-128 key of one hash function
pub type HashKey = [u8; 16];

pub const BLK_SIZE: usize = 16;

/// Domain tags of [`Aes128Prf::block`]
pub mod domain {
    pub const SPARSE: u32 = 1;
    pub const DENSE: u32 = 2;
    pub const BIN: u32 = 3;
    pub const EVAL: u32 = 4;
}

/// One-way compression function wrapper to make PRFs.
/// https://wikipedia.org/wiki/One-way_compression_function .
///
/// Only the 1st round with the precreated key is done.
///
/// Requires `Sync` since positions are generated from multiple threads.
pub trait MatyasMeyerOseas<const BLK_SIZE: usize>: Sync {
    fn enc_blk(&self, buf: &mut [u8; BLK_SIZE], input: &[u8; BLK_SIZE]);
    fn gen_blk(&self, buf: &mut [u8; BLK_SIZE], input: &[u8; BLK_SIZE]) {
        self.enc_blk(buf, input);
        xor_inplace(buf, &[input]);
    }
}

/// AES-128 keyed PRF. See [`self`].
#[derive(Clone)]
pub struct Aes128Prf {
    cipher: Aes128,
}

impl Aes128Prf {
    pub fn new(key: &HashKey) -> Self {
        let key_block = GenericArray::from_slice(key);
        Self {
            cipher: Aes128::new(key_block),
        }
    }

    /// Compress `msg` into one block with length-prefixed CBC-MAC
    pub fn digest(&self, msg: &[u8]) -> [u8; BLK_SIZE] {
        let mut state = [0; BLK_SIZE];
        self.enc_blk(&mut state, &(msg.len() as u128).to_le_bytes());
        msg.chunks(BLK_SIZE).for_each(|chunk| {
            let mut blk = [0; BLK_SIZE];
            blk[..chunk.len()].copy_from_slice(chunk);
            let input = xor(&[&state, &blk]);
            self.enc_blk(&mut state, &input);
        });
        state
    }

    /// The `counter`-th output block of the domain `domain` for a digest
    pub fn block(&self, digest: &[u8; BLK_SIZE], domain: u32, counter: u64) -> [u8; BLK_SIZE] {
        let mut tweak = [0; BLK_SIZE];
        tweak[..4].copy_from_slice(&domain.to_le_bytes());
        tweak[8..].copy_from_slice(&counter.to_le_bytes());
        let input = xor(&[digest, &tweak]);
        let mut buf = [0; BLK_SIZE];
        self.gen_blk(&mut buf, &input);
        buf
    }

    /// Fill `out` with the output stream of the domain `domain`
    pub fn fill(&self, digest: &[u8; BLK_SIZE], domain: u32, out: &mut [u8]) {
        out.chunks_mut(BLK_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| {
                let blk = self.block(digest, domain, i as u64);
                chunk.copy_from_slice(&blk[..chunk.len()]);
            });
    }
}

impl MatyasMeyerOseas<BLK_SIZE> for Aes128Prf {
    fn enc_blk(&self, buf: &mut [u8; BLK_SIZE], input: &[u8; BLK_SIZE]) {
        let in_block = GenericArray::from_slice(input);
        let out_block = GenericArray::from_mut_slice(buf);
        self.cipher.encrypt_block_b2b(in_block, out_block);
    }
}
