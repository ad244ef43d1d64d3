use rand::{rngs::StdRng, RngCore, SeedableRng};

use super::error::Error;

/// A source of random salt bytes.
///
/// Implementations must fail with [`Error::RandomSourceUnavailable`] rather than fall back
/// to weaker randomness.
pub trait SaltSource {
    /// Fills `salt` with random bytes.
    fn fill(&mut self, salt: &mut [u8]) -> Result<(), Error>;
}

/// Salt source backed by the operating system random generator ([`rand::rngs::OsRng`]).
///
/// Requires the `getrandom` feature, otherwise every request fails with
/// [`Error::RandomSourceUnavailable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSaltSource;

impl SaltSource for OsSaltSource {
    #[cfg(feature = "getrandom")]
    fn fill(&mut self, salt: &mut [u8]) -> Result<(), Error> {
        rand::rngs::OsRng.try_fill_bytes(salt)?;
        Ok(())
    }

    #[cfg(not(feature = "getrandom"))]
    fn fill(&mut self, _salt: &mut [u8]) -> Result<(), Error> {
        Err(Error::RandomSourceUnavailable(
            "built without the \"getrandom\" feature".to_owned(),
        ))
    }
}

/// Salt source seeded by the caller, for builds and platforms without OS entropy.
///
/// The seed must itself come from a cryptographically secure generator.
pub struct SeededSaltSource {
    rng: StdRng,
}

impl SeededSaltSource {
    /// Creates a new salt source from 32 random bytes.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        SeededSaltSource {
            rng: StdRng::from_seed(seed),
        }
    }
}

impl SaltSource for SeededSaltSource {
    fn fill(&mut self, salt: &mut [u8]) -> Result<(), Error> {
        self.rng.try_fill_bytes(salt)?;
        Ok(())
    }
}

/// Converts a salt strength in bits to a byte count.
pub(crate) fn salt_size(bits: usize) -> Result<usize, Error> {
    if bits == 0 || bits % 8 != 0 {
        return Err(Error::InvalidArgument(
            "salt size must be a positive multiple of 8 bits",
        ));
    }
    Ok(bits / 8)
}

/// Draws a `bits`-long salt from `source`.
pub(crate) fn generate_with(source: &mut dyn SaltSource, bits: usize) -> Result<Vec<u8>, Error> {
    let mut salt = vec![0u8; salt_size(bits)?];
    source.fill(&mut salt)?;

    tracing::debug!(bits, "generated random salt");

    Ok(salt)
}

/// Generates a `bits`-long salt with [`OsSaltSource`].
///
/// # Examples
/// ```
/// # use passkdf::{generate_salt, Error};
/// #
/// # fn main() -> Result<(), Error> {
/// let salt = generate_salt(128)?;
/// assert_eq!(salt.len(), 16);
/// # Ok(())
/// # }
/// ```
pub fn generate_salt(bits: usize) -> Result<Vec<u8>, Error> {
    generate_with(&mut OsSaltSource, bits)
}
