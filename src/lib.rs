// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2023 Yulong Ming (myl7)

//! Oblivious key-value stores (OKVS).
//!
//! An OKVS encodes at most `n` key-value pairs into a fixed-length storage,
//! such that decoding an encoded key gives back its value,
//! while decoding any other key gives a value statistically close to random.
//! The storage does not reveal which keys were encoded.
//!
//! Many variable names, e.g., `lm`/`rm` for the sparse/dense ranges,
//! are from the paper _Near-Optimal Oblivious Key-Value Stores for Efficient PSI, PSU and Volume-Hiding Multi-Maps_.
//!
//! - [`gct::GctOkvs`]: garbled cuckoo tables with 2 or 3 sparse positions plus a dense row.
//! - [`gbf::GbfOkvs`]: garbled Bloom filter.
//! - [`megabin::MegaBinOkvs`]: keys routed into bins, each bin a polynomial.

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;
use rand_core::CryptoRngCore;
use tracing::debug;

pub mod decode;
pub mod error;
pub mod gbf;
pub mod gct;
pub mod interpolate;
pub mod megabin;
pub mod params;
pub mod peel;
pub mod position;
pub mod prf;
pub mod ring;
pub mod solver;
pub mod utils;

use error::{EncodeFailure, OkvsError, Result};
use gbf::GbfOkvs;
use gct::GctOkvs;
use megabin::MegaBinOkvs;
use position::Positions;
use prf::HashKey;
use ring::Ring;

/// Max attempts to encode a storage without zero slots when `doubly` is set
pub const DOUBLY_RETRY_CAP: usize = 128;

/// OKVS variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OkvsType {
    /// 2 sparse positions, core solved as is
    H2Singleton,
    /// 2 sparse positions, 2-core contracted along a spanning forest before solving
    H2TwoCore,
    /// 3 sparse positions, core solved as is
    H3Singleton,
    /// Garbled Bloom filter
    Gbf,
    /// Bin-partitioned polynomial interpolation
    MegaBin,
}

impl OkvsType {
    pub const ALL: [OkvsType; 5] = [
        OkvsType::H2Singleton,
        OkvsType::H2TwoCore,
        OkvsType::H3Singleton,
        OkvsType::Gbf,
        OkvsType::MegaBin,
    ];

    /// Number of hash keys the variant is constructed with
    pub fn hash_key_num(&self) -> usize {
        match self {
            OkvsType::H2Singleton | OkvsType::H2TwoCore => 2,
            OkvsType::H3Singleton => 3,
            OkvsType::Gbf | OkvsType::MegaBin => 1,
        }
    }

    /// Number of sparse positions per key
    pub fn sparse_num(&self) -> usize {
        match self {
            OkvsType::H2Singleton | OkvsType::H2TwoCore => 2,
            OkvsType::H3Singleton => 3,
            OkvsType::Gbf => params::STATS_BIT_LENGTH,
            OkvsType::MegaBin => 0,
        }
    }
}

/// Oblivious key-value store over the value ring `R`.
///
/// Requires `Send + Sync` so that one instance can encode and decode from many threads.
/// Storage is plain `Vec<R>` owned by the caller.
pub trait Okvs<R>: Send + Sync
where
    R: Ring,
{
    fn okvs_type(&self) -> OkvsType;

    /// Max number of pairs one storage can hold
    fn n(&self) -> usize;

    /// `lm`
    fn sparse_position_range(&self) -> usize;

    /// `rm`
    fn dense_position_range(&self) -> usize;

    /// Storage length
    fn total_range(&self) -> usize {
        self.sparse_position_range() + self.dense_position_range()
    }

    /// Encode `keys[i] -> values[i]` into a storage of length [`Okvs::total_range`].
    ///
    /// Keys must be distinct.
    /// If `doubly`, no slot of the storage is zero.
    /// Solved slots are zero with probability about `1 / |R|` each, so `doubly` retries with fresh
    /// randomness up to [`DOUBLY_RETRY_CAP`] times and assumes `R` is large relative to `n`,
    /// e.g., `l` well above `log2 n` for GF(2)^l.
    /// Small rings fail with [`EncodeFailure::NonZeroRetriesExhausted`].
    /// Panics if `keys` and `values` have different lengths.
    fn encode(
        &self,
        keys: &[&[u8]],
        values: &[R],
        doubly: bool,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<Vec<R>>;

    /// Storage positions `key` decodes from
    fn positions(&self, key: &[u8]) -> Result<Positions<R::Scalar>>;

    fn sparse_positions(&self, key: &[u8]) -> Result<Vec<usize>> {
        Ok(self.positions(key)?.sparse)
    }

    fn dense_positions(&self, key: &[u8]) -> Result<Vec<R::Scalar>> {
        Ok(self.positions(key)?.dense)
    }

    /// Value of `key` in `storage`.
    ///
    /// Pure. Panics if `storage` does not come from this OKVS (wrong length),
    /// or if positions can not be generated for `key`, which happens with negligible probability.
    fn decode(&self, storage: &[R], key: &[u8]) -> R {
        decode::decode(storage, &self.checked_positions(storage, key))
    }

    /// Sum over the sparse positions only
    fn decode_sparse(&self, storage: &[R], key: &[u8]) -> R {
        decode::decode_sparse(storage, &self.checked_positions(storage, key))
    }

    /// Dense inner product only
    fn decode_dense(&self, storage: &[R], key: &[u8]) -> R {
        decode::decode_dense(storage, &self.checked_positions(storage, key))
    }

    /// Decode many keys into `ys`.
    /// Runs with multi-threading if the feature `multi-thread` is enabled.
    fn decode_batch(&self, storage: &[R], keys: &[&[u8]], ys: &mut [&mut R]) {
        #[cfg(feature = "multi-thread")]
        self.decode_batch_mt(storage, keys, ys);
        #[cfg(not(feature = "multi-thread"))]
        self.decode_batch_st(storage, keys, ys);
    }

    fn decode_batch_st(&self, storage: &[R], keys: &[&[u8]], ys: &mut [&mut R]) {
        assert_eq!(keys.len(), ys.len());
        keys.iter()
            .zip(ys.iter_mut())
            .for_each(|(key, y)| **y = self.decode(storage, key));
    }

    #[cfg(feature = "multi-thread")]
    fn decode_batch_mt(&self, storage: &[R], keys: &[&[u8]], ys: &mut [&mut R]) {
        assert_eq!(keys.len(), ys.len());
        keys.par_iter()
            .zip(ys.par_iter_mut())
            .for_each(|(key, y)| **y = self.decode(storage, key));
    }

    #[doc(hidden)]
    fn checked_positions(&self, storage: &[R], key: &[u8]) -> Positions<R::Scalar> {
        assert_eq!(
            storage.len(),
            self.total_range(),
            "storage length does not match the OKVS"
        );
        match self.positions(key) {
            Ok(positions) => positions,
            Err(e) => panic!("no positions for the key: {}", e),
        }
    }
}

/// Construct the OKVS of `okvs_type` for at most `n` pairs
pub fn create<R>(okvs_type: OkvsType, n: usize, hash_keys: &[HashKey]) -> Result<Box<dyn Okvs<R>>>
where
    R: Ring + 'static,
{
    Ok(match okvs_type {
        OkvsType::H2Singleton | OkvsType::H2TwoCore | OkvsType::H3Singleton => {
            Box::new(GctOkvs::<R>::new(okvs_type, n, hash_keys)?)
        }
        OkvsType::Gbf => Box::new(GbfOkvs::<R>::new(n, hash_keys)?),
        OkvsType::MegaBin => Box::new(MegaBinOkvs::<R>::new(n, hash_keys)?),
    })
}

/// Common constructor checks
pub(crate) fn check_config(okvs_type: OkvsType, n: usize, hash_keys: &[HashKey]) -> Result<()> {
    if n == 0 {
        return Err(OkvsError::InvalidConfiguration(
            "capacity n must be positive".to_owned(),
        ));
    }
    if hash_keys.len() != okvs_type.hash_key_num() {
        return Err(OkvsError::InvalidConfiguration(format!(
            "{:?} takes {} hash keys, got {}",
            okvs_type,
            okvs_type.hash_key_num(),
            hash_keys.len()
        )));
    }
    Ok(())
}

/// Common encode input checks
pub(crate) fn check_input<R>(n: usize, keys: &[&[u8]], values: &[R]) -> Result<()> {
    assert_eq!(keys.len(), values.len(), "keys and values differ in length");
    if keys.len() > n {
        return Err(OkvsError::InputTooLarge { len: keys.len(), n });
    }
    Ok(())
}

/// Run `encode_once` with fresh randomness until the storage has no zero slot.
/// Runs once if not `doubly`.
/// Failures of `encode_once` are structural and surfaced at once.
pub(crate) fn encode_until_non_zero<R, F>(
    doubly: bool,
    mut encode_once: F,
) -> std::result::Result<Vec<R>, EncodeFailure>
where
    R: Ring,
    F: FnMut() -> std::result::Result<Vec<R>, EncodeFailure>,
{
    for attempt in 0..DOUBLY_RETRY_CAP {
        let storage = encode_once()?;
        if !doubly || storage.iter().all(|x| !x.is_zero()) {
            return Ok(storage);
        }
        debug!(attempt, "zero slot in storage, retrying");
    }
    Err(EncodeFailure::NonZeroRetriesExhausted(DOUBLY_RETRY_CAP))
}

/// Log an encode failure before surfacing it
pub(crate) fn surface<T>(result: std::result::Result<T, EncodeFailure>) -> Result<T> {
    result.map_err(|e| {
        tracing::warn!(error = %e, "encode failed");
        e.into()
    })
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use arbtest::arbtest;

    use super::*;
    use crate::ring::byte::ByteRing;
    use crate::ring::int_prime::{U64Ring, PRIME_MAX_LE_U64_MAX};
    use crate::test_utils::*;

    type Zp = U64Ring<PRIME_MAX_LE_U64_MAX>;

    fn round_trip<R: Ring + 'static>(okvs_type: OkvsType, n: usize, len: usize, seed: u64) {
        let mut rng = rng(seed);
        let hash_keys = hash_keys(okvs_type.hash_key_num(), seed as u8);
        let okvs = create::<R>(okvs_type, n, &hash_keys).unwrap();
        let keys = keys(len, 0);
        let key_refs = key_refs(&keys);
        let values: Vec<R> = (0..len).map(|_| R::random(&mut rng)).collect();
        let storage = okvs.encode(&key_refs, &values, false, &mut rng).unwrap();
        assert_eq!(storage.len(), okvs.total_range());
        assert_eq!(storage.len(), params::total_range(okvs_type, n));
        for (key, value) in key_refs.iter().zip(&values) {
            assert_eq!(&okvs.decode(&storage, key), value);
        }
    }

    #[test]
    fn test_round_trip_all_types() {
        init_test_logging();
        for okvs_type in OkvsType::ALL {
            for n in [1, 2, 3, 40, 1 << 8] {
                round_trip::<Zp>(okvs_type, n, n, n as u64);
            }
        }
    }

    #[test]
    fn test_round_trip_byte_ring() {
        // Scalars of `ByteRing` are GF(2), too small to interpolate over
        for okvs_type in [
            OkvsType::H2Singleton,
            OkvsType::H2TwoCore,
            OkvsType::H3Singleton,
            OkvsType::Gbf,
        ] {
            for n in [1, 2, 3, 40, 1 << 8] {
                round_trip::<ByteRing<16>>(okvs_type, n, n, n as u64 + 7);
            }
        }
    }

    #[test]
    fn test_round_trip_large() {
        for okvs_type in [
            OkvsType::H2Singleton,
            OkvsType::H2TwoCore,
            OkvsType::H3Singleton,
            OkvsType::Gbf,
        ] {
            for (i, n) in [1 << 10, 1 << 12, 1 << 14].into_iter().enumerate() {
                round_trip::<ByteRing<8>>(okvs_type, n, n, 100 + i as u64);
            }
        }
        for (i, n) in [1 << 10, 1 << 12, 1 << 14].into_iter().enumerate() {
            round_trip::<Zp>(OkvsType::MegaBin, n, n, 110 + i as u64);
        }
    }

    #[test]
    fn test_round_trip_many_hash_keys() {
        for okvs_type in OkvsType::ALL {
            for seed in 0..32 {
                round_trip::<Zp>(okvs_type, 200, 200, 1000 + seed);
            }
        }
    }

    #[test]
    fn test_partially_filled() {
        for okvs_type in OkvsType::ALL {
            round_trip::<Zp>(okvs_type, 100, 37, 11);
            round_trip::<Zp>(okvs_type, 100, 0, 12);
        }
    }

    #[test]
    fn test_end_to_end_ten_pairs() {
        init_test_logging();
        let mut rng = rng(10);
        let okvs = create::<ByteRing<8>>(OkvsType::H3Singleton, 10, &hash_keys(3, 10)).unwrap();
        let members = keys(5, 0);
        let non_members = keys(5, 1);
        let values: Vec<ByteRing<8>> = (1u64..=5).map(|v| (v * 0x0101_0101).into()).collect();
        let storage = okvs
            .encode(&key_refs(&members), &values, false, &mut rng)
            .unwrap();
        assert_eq!(storage.len(), okvs.total_range());
        for (key, value) in members.iter().zip(&values) {
            assert_eq!(&okvs.decode(&storage, key), value);
        }
        let value_set: HashSet<u64> = values.iter().map(|v| u64::from(v.clone())).collect();
        for key in &non_members {
            let y: u64 = okvs.decode(&storage, key).into();
            assert!(!value_set.contains(&y));
        }
    }

    #[test]
    fn test_doubly_has_no_zero_slot() {
        let mut rng = rng(20);
        for okvs_type in OkvsType::ALL {
            let okvs = create::<Zp>(okvs_type, 64, &hash_keys(okvs_type.hash_key_num(), 20)).unwrap();
            let keys = keys(64, 0);
            let key_refs = key_refs(&keys);
            let values: Vec<Zp> = (0..64).map(|_| Ring::random(&mut rng)).collect();
            let storage = okvs.encode(&key_refs, &values, true, &mut rng).unwrap();
            assert!(storage.iter().all(|x| !Ring::is_zero(x)));
            for (key, value) in key_refs.iter().zip(&values) {
                assert_eq!(&okvs.decode(&storage, key), value);
            }
        }
    }

    #[test]
    fn test_doubly_small_ring_exhausts_retries() {
        let mut rng = rng(21);
        let n = 1 << 12;
        let hash_keys = hash_keys(OkvsType::H2Singleton.hash_key_num(), 21);
        let okvs = create::<ByteRing<1>>(OkvsType::H2Singleton, n, &hash_keys).unwrap();
        let keys = keys(n, 0);
        let values: Vec<ByteRing<1>> = (0..n).map(|_| Ring::random(&mut rng)).collect();
        assert!(matches!(
            okvs.encode(&key_refs(&keys), &values, true, &mut rng),
            Err(OkvsError::EncodeFailure(
                EncodeFailure::NonZeroRetriesExhausted(DOUBLY_RETRY_CAP)
            ))
        ));
    }

    #[test]
    fn test_non_members_decode_off_the_value_set() {
        let mut rng = rng(30);
        for okvs_type in OkvsType::ALL {
            let okvs = create::<Zp>(okvs_type, 200, &hash_keys(okvs_type.hash_key_num(), 30)).unwrap();
            let members = keys(200, 0);
            let values: Vec<Zp> = (0..200).map(|_| Ring::random(&mut rng)).collect();
            let storage = okvs
                .encode(&key_refs(&members), &values, false, &mut rng)
                .unwrap();
            let value_set: HashSet<Zp> = values.iter().copied().collect();
            for key in &keys(200, 1) {
                assert!(!value_set.contains(&okvs.decode(&storage, key)));
            }
        }
    }

    #[test]
    fn test_invalid_configuration() {
        for okvs_type in OkvsType::ALL {
            let num = okvs_type.hash_key_num();
            assert!(matches!(
                create::<Zp>(okvs_type, 10, &hash_keys(num + 1, 0)),
                Err(OkvsError::InvalidConfiguration(_))
            ));
            assert!(matches!(
                create::<Zp>(okvs_type, 0, &hash_keys(num, 0)),
                Err(OkvsError::InvalidConfiguration(_))
            ));
        }
        assert!(matches!(
            create::<ByteRing<16>>(OkvsType::MegaBin, 10, &hash_keys(1, 0)),
            Err(OkvsError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_input_too_large() {
        let mut rng = rng(40);
        for okvs_type in OkvsType::ALL {
            let okvs = create::<Zp>(okvs_type, 4, &hash_keys(okvs_type.hash_key_num(), 40)).unwrap();
            let keys = keys(5, 0);
            let values = vec![Zp::new(1); 5];
            assert!(matches!(
                okvs.encode(&key_refs(&keys), &values, false, &mut rng),
                Err(OkvsError::InputTooLarge { len: 5, n: 4 })
            ));
        }
    }

    #[test]
    #[should_panic]
    fn test_decode_wrong_storage_length_panics() {
        let okvs = create::<Zp>(OkvsType::H2Singleton, 10, &hash_keys(2, 0)).unwrap();
        let storage = vec![Zp::new(0); okvs.total_range() - 1];
        okvs.decode(&storage, b"key");
    }

    #[test]
    fn test_decode_batch_matches_decode() {
        let mut rng = rng(50);
        for okvs_type in OkvsType::ALL {
            let okvs = create::<Zp>(okvs_type, 300, &hash_keys(okvs_type.hash_key_num(), 50)).unwrap();
            let keys = keys(300, 0);
            let key_refs = key_refs(&keys);
            let values: Vec<Zp> = (0..300).map(|_| Ring::random(&mut rng)).collect();
            let storage = okvs.encode(&key_refs, &values, false, &mut rng).unwrap();

            let mut ys = vec![Zp::new(0); 300];
            okvs.decode_batch(&storage, &key_refs, &mut ys.iter_mut().collect::<Vec<_>>());
            assert_eq!(ys, values);
            let mut ys_st = vec![Zp::new(0); 300];
            okvs.decode_batch_st(&storage, &key_refs, &mut ys_st.iter_mut().collect::<Vec<_>>());
            assert_eq!(ys_st, values);
        }
    }

    #[test]
    fn test_split_decode_sums_to_decode() {
        let mut rng = rng(60);
        for okvs_type in OkvsType::ALL {
            let okvs = create::<Zp>(okvs_type, 50, &hash_keys(okvs_type.hash_key_num(), 60)).unwrap();
            let members = keys(50, 0);
            let non_members = keys(10, 1);
            let values: Vec<Zp> = (0..50).map(|_| Ring::random(&mut rng)).collect();
            let storage = okvs
                .encode(&key_refs(&members), &values, false, &mut rng)
                .unwrap();
            for key in members.iter().chain(&non_members) {
                assert_eq!(
                    okvs.decode_sparse(&storage, key) + okvs.decode_dense(&storage, key),
                    okvs.decode(&storage, key)
                );
                let positions = okvs.positions(key).unwrap();
                assert_eq!(okvs.sparse_positions(key).unwrap(), positions.sparse);
                assert_eq!(okvs.dense_positions(key).unwrap(), positions.dense);
                assert_eq!(positions.sparse.len(), okvs_type.sparse_num());
            }
        }
    }

    #[test]
    fn test_decode_is_concurrent() {
        let mut rng = rng(70);
        let okvs: Arc<dyn Okvs<ByteRing<16>>> =
            create::<ByteRing<16>>(OkvsType::H2TwoCore, 500, &hash_keys(2, 70))
                .unwrap()
                .into();
        let keys = keys(500, 0);
        let values: Vec<ByteRing<16>> = (0..500).map(|_| Ring::random(&mut rng)).collect();
        let storage = Arc::new(
            okvs.encode(&key_refs(&keys), &values, false, &mut rng)
                .unwrap(),
        );
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let okvs = Arc::clone(&okvs);
                let storage = Arc::clone(&storage);
                let keys = keys.clone();
                let values = values.clone();
                thread::spawn(move || {
                    for (key, value) in keys.iter().zip(&values).skip(t).step_by(4) {
                        assert_eq!(&okvs.decode(&storage, key), value);
                    }
                })
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());
    }

    #[test]
    fn test_arbitrary_pairs_round_trip() {
        arbtest(|u| {
            let okvs_type = OkvsType::ALL[u.choose_index(OkvsType::ALL.len())?];
            let n = u.int_in_range(1..=300usize)?;
            let len = u.int_in_range(0..=n)?;
            let hash_keys: Vec<HashKey> = (0..okvs_type.hash_key_num())
                .map(|_| u.arbitrary())
                .collect::<arbtest::arbitrary::Result<_>>()?;
            let seed: u64 = u.arbitrary()?;
            let mut rng = rng(seed);

            let okvs = create::<Zp>(okvs_type, n, &hash_keys).unwrap();
            let keys: Vec<Vec<u8>> = keys(len, u.arbitrary()?);
            let values: Vec<Zp> = (0..len).map(|_| Ring::random(&mut rng)).collect();
            let storage = okvs
                .encode(&key_refs(&keys), &values, false, &mut rng)
                .unwrap();
            for (key, value) in keys.iter().zip(&values) {
                assert_eq!(&okvs.decode(&storage, key), value);
            }
            Ok(())
        });
    }

    #[test]
    fn test_single_byte_values() {
        round_trip::<ByteRing<1>>(OkvsType::H2Singleton, 64, 64, 80);
        round_trip::<ByteRing<1>>(OkvsType::H3Singleton, 64, 64, 81);
    }

    #[test]
    fn test_hash_key_num() {
        assert_eq!(OkvsType::H2Singleton.hash_key_num(), 2);
        assert_eq!(OkvsType::H2TwoCore.hash_key_num(), 2);
        assert_eq!(OkvsType::H3Singleton.hash_key_num(), 3);
        assert_eq!(OkvsType::Gbf.hash_key_num(), 1);
        assert_eq!(OkvsType::MegaBin.hash_key_num(), 1);
    }
}
