//! Key derivation functions.

/// PBKDF2 (RFC 2898, section 5.2) over an arbitrary [`Prf`].
pub mod pbkdf2 {
    use std::{num::NonZeroUsize, thread};

    use zeroize::Zeroizing;

    use crate::{error::Error, prf::Prf};

    /// Largest derived key length for a PRF with `hash_length`-byte output: `(2^32 - 1) * hLen`.
    pub fn max_key_length(hash_length: usize) -> u64 {
        u64::from(u32::MAX).saturating_mul(hash_length as u64)
    }

    /// Number of blocks needed for a `key_length`-byte key: `ceil(dkLen / hLen)`.
    ///
    /// Fails with [`Error::InvalidKeyLength`] if the length is outside of
    /// `1..=(2^32 - 1) * hLen`.
    pub fn block_count(key_length: usize, hash_length: usize) -> Result<u32, Error> {
        let max = max_key_length(hash_length);
        let invalid = Error::InvalidKeyLength {
            requested: key_length,
            max,
        };

        if key_length < 1 || key_length as u64 > max {
            return Err(invalid);
        }

        u32::try_from(key_length.div_ceil(hash_length)).map_err(|_| invalid)
    }

    /// Function F: the XOR of `iterations` chained PRF outputs for block `index`.
    ///
    /// ```text
    /// U_1 = PRF(P, S || INT(i))
    /// U_j = PRF(P, U_{j-1})
    /// F(P, S, c, i) = U_1 ^ U_2 ^ ... ^ U_c
    /// ```
    pub fn block(
        prf: &dyn Prf,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        index: u32,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        if index < 1 {
            return Err(Error::InvalidArgument("block index must be in 1..=2^32-1"));
        }
        if iterations < 1 {
            return Err(Error::InvalidArgument("iteration count must be at least 1"));
        }

        let message = Zeroizing::new([salt, &index.to_be_bytes()[..]].concat());
        let mut u = Zeroizing::new(prf.compute(password, &message)?);
        let mut result = u.clone();

        for _ in 2..=iterations {
            u = Zeroizing::new(prf.compute(password, &u)?);

            if u.len() != result.len() {
                return Err(Error::PrfFailure(format!(
                    "digest length changed from {} to {} bytes",
                    result.len(),
                    u.len()
                )));
            }

            result.iter_mut().zip(u.iter()).for_each(|(r, u)| *r ^= u);
        }

        tracing::trace!(index, "generated block");

        Ok(result)
    }

    /// Derives a `key_length`-byte key: blocks `1..=l` concatenated and truncated.
    ///
    /// * `hash_length` - output size of `prf`, every block must be exactly that long
    /// * `parallel` - compute independent blocks on worker threads
    pub fn derive(
        prf: &dyn Prf,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        hash_length: usize,
        key_length: usize,
        parallel: bool,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let block_count = block_count(key_length, hash_length)?;

        let mut key = Zeroizing::new(Vec::with_capacity(
            key_length.saturating_add(hash_length - 1),
        ));

        let blocks = if parallel && block_count > 1 {
            let workers = thread::available_parallelism()
                .map_or(1, NonZeroUsize::get)
                .min(block_count as usize);
            blocks_parallel(prf, password, salt, iterations, block_count, workers)?
        } else {
            (1..=block_count)
                .map(|index| block(prf, password, salt, iterations, index))
                .collect::<Result<Vec<_>, _>>()?
        };

        for block in blocks {
            if block.len() != hash_length {
                return Err(Error::PrfFailure(format!(
                    "block of {} bytes, expected {}",
                    block.len(),
                    hash_length
                )));
            }
            key.extend_from_slice(&block);
        }

        key.truncate(key_length);

        Ok(key)
    }

    /// Splits `1..=block_count` into contiguous ranges, one per worker, and joins
    /// the results back in block order.
    ///
    /// Every worker is joined before any result is looked at, so a panic in one worker
    /// can't escape the scope while another one is still running.
    pub(super) fn blocks_parallel(
        prf: &dyn Prf,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        block_count: u32,
        workers: usize,
    ) -> Result<Vec<Zeroizing<Vec<u8>>>, Error> {
        let indices: Vec<u32> = (1..=block_count).collect();
        let chunk_size = indices.len().div_ceil(workers.max(1));

        let ranges: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = indices
                .chunks(chunk_size)
                .map(|range| {
                    s.spawn(move || {
                        range
                            .iter()
                            .map(|&index| block(prf, password, salt, iterations, index))
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect();

            handles.into_iter().map(|handle| handle.join()).collect()
        });

        let mut blocks = Vec::with_capacity(block_count as usize);
        for range in ranges {
            let range =
                range.map_err(|_| Error::PrfFailure("block worker panicked".to_owned()))??;
            blocks.extend(range);
        }

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        error::Error,
        prf::{HashAlgorithm, Prf},
    };

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(pbkdf2::block_count(1, 64), Ok(1));
        assert_eq!(pbkdf2::block_count(64, 64), Ok(1));
        assert_eq!(pbkdf2::block_count(65, 64), Ok(2));
        assert_eq!(pbkdf2::block_count(100, 20), Ok(5));
    }

    #[test]
    fn block_count_out_of_range() {
        assert_eq!(
            pbkdf2::block_count(0, 64),
            Err(Error::InvalidKeyLength {
                requested: 0,
                max: 274877906880
            })
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn block_count_upper_bound() {
        let max = u32::MAX as usize * 20;

        assert_eq!(pbkdf2::block_count(max, 20), Ok(u32::MAX));
        assert!(matches!(
            pbkdf2::block_count(max + 1, 20),
            Err(Error::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn block_single_iteration_is_u1() {
        let u1 = HashAlgorithm::Sha256
            .compute(b"password", b"salt\x00\x00\x00\x01")
            .unwrap();
        let block = pbkdf2::block(&HashAlgorithm::Sha256, b"password", b"salt", 1, 1).unwrap();

        assert_eq!(&block[..], &u1[..]);
    }

    #[test]
    fn block_zero_index() {
        match pbkdf2::block(&HashAlgorithm::Sha256, b"password", b"salt", 1, 0) {
            Err(Error::InvalidArgument(_)) => (),
            _ => panic!("InvalidArgument is expected"),
        }
    }

    #[test]
    fn block_zero_iterations() {
        match pbkdf2::block(&HashAlgorithm::Sha256, b"password", b"salt", 0, 1) {
            Err(Error::InvalidArgument(_)) => (),
            _ => panic!("InvalidArgument is expected"),
        }
    }

    #[test]
    fn derive_pbkdf2_hmac_sha256() {
        let key = pbkdf2::derive(&HashAlgorithm::Sha256, b"password", b"salt", 2, 32, 32, false)
            .unwrap();

        assert_eq!(
            hex::encode(&key[..]),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
    }

    #[test]
    fn derive_parallel_matches_sequential() {
        let sequential =
            pbkdf2::derive(&HashAlgorithm::Sha1, b"password", b"salt", 50, 20, 150, false)
                .unwrap();
        let parallel =
            pbkdf2::derive(&HashAlgorithm::Sha1, b"password", b"salt", 50, 20, 150, true)
                .unwrap();

        assert_eq!(sequential.len(), 150);
        assert_eq!(&sequential[..], &parallel[..]);
    }

    /// Panics on every call.
    struct Panicking;

    impl Prf for Panicking {
        fn compute(&self, _key: &[u8], _message: &[u8]) -> Result<Vec<u8>, Error> {
            panic!("hash provider crashed");
        }
    }

    /// Fails on every call.
    struct Failing;

    impl Prf for Failing {
        fn compute(&self, _key: &[u8], _message: &[u8]) -> Result<Vec<u8>, Error> {
            Err(Error::PrfFailure("provider error".to_owned()))
        }
    }

    #[test]
    fn blocks_parallel_every_worker_panics() {
        match pbkdf2::blocks_parallel(&Panicking, b"password", b"salt", 2, 4, 4) {
            Err(Error::PrfFailure(message)) => assert_eq!(message, "block worker panicked"),
            _ => panic!("PrfFailure is expected"),
        }
    }

    #[test]
    fn derive_parallel_worker_panics() {
        match pbkdf2::derive(&Panicking, b"password", b"salt", 2, 32, 96, true) {
            Err(Error::PrfFailure(_)) => (),
            _ => panic!("PrfFailure is expected"),
        }
    }

    #[test]
    fn derive_parallel_prf_failure() {
        match pbkdf2::blocks_parallel(&Failing, b"password", b"salt", 2, 4, 4) {
            Err(Error::PrfFailure(message)) => assert_eq!(message, "provider error"),
            _ => panic!("PrfFailure is expected"),
        }
        match pbkdf2::derive(&Failing, b"password", b"salt", 2, 32, 96, true) {
            Err(Error::PrfFailure(_)) => (),
            _ => panic!("PrfFailure is expected"),
        }
    }

    #[test]
    fn blocks_parallel_keeps_block_order() {
        let blocks =
            pbkdf2::blocks_parallel(&HashAlgorithm::Sha1, b"password", b"salt", 3, 7, 3).unwrap();

        assert_eq!(blocks.len(), 7);
        for (i, block) in blocks.iter().enumerate() {
            let expected =
                pbkdf2::block(&HashAlgorithm::Sha1, b"password", b"salt", 3, i as u32 + 1).unwrap();
            assert_eq!(&block[..], &expected[..]);
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn derive_rejects_oversized_key_before_allocating() {
        match pbkdf2::derive(&HashAlgorithm::Sha1, b"password", b"salt", 1, 20, usize::MAX, false) {
            Err(Error::InvalidKeyLength { requested, .. }) => assert_eq!(requested, usize::MAX),
            _ => panic!("InvalidKeyLength is expected"),
        }
    }

    #[test]
    fn derive_truncates_last_block() {
        let long = pbkdf2::derive(&HashAlgorithm::Sha512, b"password", b"salt", 3, 64, 128, false)
            .unwrap();
        let short = pbkdf2::derive(&HashAlgorithm::Sha512, b"password", b"salt", 3, 64, 70, false)
            .unwrap();

        assert_eq!(short.len(), 70);
        assert_eq!(&long[..70], &short[..]);
    }
}
