//! Password-based key derivation with PBKDF2 ([RFC 2898](https://www.rfc-editor.org/rfc/rfc2898)).
//!
//! [`Pbkdf2`] validates a password and a set of parameters once, then derives a key of the
//! requested length on demand and keeps it for repeated use, e.g. repeated comparisons.
//!
//! # Basic Usage
//! ```
//! # use passkdf::{Error, Pbkdf2};
//! #
//! # fn main() -> Result<(), Error> {
//! // A random 128-bit salt is generated when none is given.
//! let kdf = Pbkdf2::new(b"password", None)?;
//! let key = kdf.generate()?.clone();
//!
//! // Store `kdf.parameters()` and the key, later check a password attempt.
//! let attempt = Pbkdf2::from_parameters(b"password", &kdf.parameters())?;
//! assert!(attempt.compare(key.as_bytes())?);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//! | Option                        | Default                 |
//! |-------------------------------|-------------------------|
//! | Iterations                    | 10 000                  |
//! | [Algorithm](HashAlgorithm)    | HMAC-SHA512             |
//! | Key length                    | one PRF output (64 bytes)|
//! | [Salt](SaltSource)            | 128 bits from [`OsSaltSource`] |
//!
//! Options are changed with [`Pbkdf2Config`], custom pseudorandom functions are plugged in
//! through [`PrfRegistry`].
//!
//! # Crate Features
//! * `getrandom` (default) - enables [`OsSaltSource`]. Without it a salt has to be supplied
//!   explicitly or drawn from [`SeededSaltSource`].

#![forbid(unsafe_code)]
#![warn(missing_docs, unused_qualifications)]

mod config;
mod error;
mod prf;
mod salt;

pub mod kdf;

use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub use config::{Pbkdf2Config, DEFAULT_ALGORITHM, DEFAULT_ITERATIONS, DEFAULT_SALT_BITS};
pub use error::Error;
pub use prf::{HashAlgorithm, Prf, PrfRegistry};
pub use salt::{generate_salt, OsSaltSource, SaltSource, SeededSaltSource};

/// A key derived from a password. Wiped from memory on drop.
#[derive(Clone)]
pub struct DerivedKey(Zeroizing<Vec<u8>>);

impl DerivedKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a key produced by [`Pbkdf2::generate`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Compares the key with `other`.
    ///
    /// Lengths are compared first and a mismatch returns early, contents of equally long
    /// sequences are compared in constant time.
    pub fn matches(&self, other: &[u8]) -> bool {
        self.len() == other.len() && bool::from(self.as_bytes().ct_eq(other))
    }
}

impl AsRef<[u8]> for DerivedKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.as_bytes())
    }
}

impl Eq for DerivedKey {}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED; {}])", self.len())
    }
}

/// Everything except the password that is needed to derive the same key again.
///
/// Salt is not a secret value and is meant to be stored next to the derived key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameters {
    /// Salt mixed into every block.
    pub salt: Vec<u8>,
    /// Number of PRF applications per block.
    pub iterations: u32,
    /// Name of the PRF.
    pub algorithm: String,
    /// Derived key length in bytes.
    pub key_length: usize,
}

/// PBKDF2 key derivation bound to one password and one parameter set.
///
/// All parameters are validated on construction and never change afterwards. The key is
/// computed by the first [`Pbkdf2::generate`] (or [`Pbkdf2::compare`]) and cached: later calls,
/// including concurrent ones from several threads, get the same key without recomputing it.
///
/// # Examples
/// ```
/// # use passkdf::{Error, Pbkdf2, Pbkdf2Config};
/// #
/// # fn main() -> Result<(), Error> {
/// let config = Pbkdf2Config::default()
///     .with_algorithm("sha256")
///     .with_iterations(4096)
///     .with_key_length(32);
///
/// let kdf = Pbkdf2::from_config(b"password", Some(&b"salt"[..]), &config)?;
///
/// assert_eq!(
///     kdf.generate()?.to_hex(),
///     "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
/// );
/// # Ok(())
/// # }
/// ```
pub struct Pbkdf2 {
    password: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
    iterations: u32,
    algorithm: String,
    prf: Arc<dyn Prf>,
    hash_length: usize,
    key_length: usize,
    block_count: u32,
    parallel: bool,
    key: OnceCell<DerivedKey>,
}

impl fmt::Debug for Pbkdf2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pbkdf2")
            .field("salt", &hex::encode(&self.salt))
            .field("iterations", &self.iterations)
            .field("algorithm", &self.algorithm)
            .field("hash_length", &self.hash_length)
            .field("key_length", &self.key_length)
            .field("block_count", &self.block_count)
            .field("generated", &self.key.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Pbkdf2 {
    /// Creates a new [`Pbkdf2`] with the default configuration.
    ///
    /// * `password` - a password of any non-zero length
    /// * `salt` - a salt unique to the password; if `None`, 128 random bits are generated
    ///
    /// # Examples
    /// ```
    /// # use passkdf::{Error, Pbkdf2};
    /// #
    /// # fn main() -> Result<(), Error> {
    /// let kdf = Pbkdf2::new(b"password", None)?;
    ///
    /// assert_eq!(kdf.salt().len(), 16);
    /// assert_eq!(kdf.algorithm(), "sha512");
    /// assert_eq!(kdf.key_length(), 64);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(password: &[u8], salt: Option<&[u8]>) -> Result<Self, Error> {
        Pbkdf2::from_config(password, salt, &Pbkdf2Config::default())
    }

    /// Creates a new [`Pbkdf2`] with a custom configuration, the built-in algorithms and
    /// [`OsSaltSource`].
    pub fn from_config(
        password: &[u8],
        salt: Option<&[u8]>,
        config: &Pbkdf2Config,
    ) -> Result<Self, Error> {
        Pbkdf2::from_parts(
            password,
            salt,
            config,
            &PrfRegistry::default(),
            &mut OsSaltSource,
        )
    }

    /// Recreates a derivation from stored [`Parameters`] to check a password against a
    /// stored key.
    pub fn from_parameters(password: &[u8], parameters: &Parameters) -> Result<Self, Error> {
        Pbkdf2::from_parameters_with(password, parameters, &PrfRegistry::default())
    }

    /// Same as [`Pbkdf2::from_parameters`], resolving the algorithm in `registry`.
    ///
    /// Needed for keys derived with a custom PRF registered through [`PrfRegistry::register`].
    pub fn from_parameters_with(
        password: &[u8],
        parameters: &Parameters,
        registry: &PrfRegistry,
    ) -> Result<Self, Error> {
        let config = Pbkdf2Config::default()
            .with_iterations(parameters.iterations)
            .with_key_length(parameters.key_length)
            .with_algorithm(parameters.algorithm.as_str());

        // Salt is always present, the source is never asked.
        Pbkdf2::from_parts(
            password,
            Some(parameters.salt.as_slice()),
            &config,
            registry,
            &mut OsSaltSource,
        )
    }

    /// Creates a new [`Pbkdf2`] resolving the algorithm in `registry` and drawing a missing
    /// salt from `salt_source`.
    ///
    /// Parameters are checked in order: password, iteration count, algorithm, salt, key length.
    /// The PRF is called exactly once here, with an empty message, to measure its output size.
    pub fn from_parts(
        password: &[u8],
        salt: Option<&[u8]>,
        config: &Pbkdf2Config,
        registry: &PrfRegistry,
        salt_source: &mut dyn SaltSource,
    ) -> Result<Self, Error> {
        if password.is_empty() {
            return Err(Error::InvalidArgument("password must not be empty"));
        }
        if config.iterations() < 1 {
            return Err(Error::InvalidArgument("iteration count must be at least 1"));
        }

        let prf = registry.resolve(config.algorithm())?;

        let salt = match salt {
            Some(salt) => salt.to_vec(),
            None => salt::generate_with(salt_source, config.salt_bits())?,
        };

        let password = Zeroizing::new(password.to_vec());

        let hash_length = Zeroizing::new(prf.compute(&password, &[])?).len();
        if hash_length == 0 {
            return Err(Error::PrfFailure("PRF produced an empty digest".to_owned()));
        }

        let key_length = config.key_length().unwrap_or(hash_length);
        let block_count = kdf::pbkdf2::block_count(key_length, hash_length)?;

        if config.iterations() < DEFAULT_ITERATIONS {
            tracing::warn!(
                iterations = config.iterations(),
                recommended = DEFAULT_ITERATIONS,
                "iteration count is below the recommended minimum"
            );
        }

        tracing::debug!(
            algorithm = config.algorithm(),
            iterations = config.iterations(),
            hash_length,
            key_length,
            block_count,
            "pbkdf2 parameters validated"
        );

        Ok(Pbkdf2 {
            password,
            salt,
            iterations: config.iterations(),
            algorithm: config.algorithm().to_owned(),
            prf,
            hash_length,
            key_length,
            block_count,
            parallel: config.parallel(),
            key: OnceCell::new(),
        })
    }

    /// Derives the key, or returns the cached one.
    ///
    /// The key is exactly [`Pbkdf2::key_length`] bytes. If several threads call this at
    /// once, one computes the key while the others wait for it. On error nothing is cached
    /// and a later call starts over.
    pub fn generate(&self) -> Result<&DerivedKey, Error> {
        self.key.get_or_try_init(|| {
            let key = kdf::pbkdf2::derive(
                self.prf.as_ref(),
                &self.password,
                &self.salt,
                self.iterations,
                self.hash_length,
                self.key_length,
                self.parallel,
            )?;

            tracing::debug!(
                key_length = self.key_length,
                block_count = self.block_count,
                "derived key cached"
            );

            Ok(DerivedKey(key))
        })
    }

    /// Checks whether `candidate` is the key derived from this password and parameters.
    ///
    /// Derives the key first if it isn't cached yet. See [`DerivedKey::matches`] for how the
    /// bytes are compared.
    ///
    /// # Examples
    /// ```
    /// # use passkdf::{Error, Pbkdf2, Pbkdf2Config};
    /// #
    /// # fn main() -> Result<(), Error> {
    /// let config = Pbkdf2Config::default().with_iterations(1000);
    /// let stored = Pbkdf2::from_config(b"password", Some(&b"salt"[..]), &config)?
    ///     .generate()?
    ///     .clone();
    ///
    /// let attempt = Pbkdf2::from_config(b"passw0rd", Some(&b"salt"[..]), &config)?;
    /// assert!(!attempt.compare(stored.as_bytes())?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn compare(&self, candidate: &[u8]) -> Result<bool, Error> {
        Ok(self.generate()?.matches(candidate))
    }

    /// Salt, which has to be stored along with the key to perform comparisons.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Number of PRF applications per block.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Name of the PRF as configured.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Derived key length in bytes.
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    /// Length of one PRF output (one block) in bytes.
    pub fn hash_length(&self) -> usize {
        self.hash_length
    }

    /// Number of blocks the key is assembled from.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// The cached key, `None` until [`Pbkdf2::generate`] succeeds.
    pub fn derived_key(&self) -> Option<&DerivedKey> {
        self.key.get()
    }

    /// Parameters needed to recreate this derivation with [`Pbkdf2::from_parameters`].
    pub fn parameters(&self) -> Parameters {
        Parameters {
            salt: self.salt.clone(),
            iterations: self.iterations,
            algorithm: self.algorithm.clone(),
            key_length: self.key_length,
        }
    }
}

/// Checks `password` against a stored key and the parameters it was derived with.
///
/// # Examples
/// ```
/// # use passkdf::{verify, Error, Parameters};
/// #
/// # fn main() -> Result<(), Error> {
/// let parameters = Parameters {
///     salt: b"salt".to_vec(),
///     iterations: 1,
///     algorithm: "sha1".to_owned(),
///     key_length: 20,
/// };
/// let stored = [
///     0x0c, 0x60, 0xc8, 0x0f, 0x96, 0x1f, 0x0e, 0x71, 0xf3, 0xa9,
///     0xb5, 0x24, 0xaf, 0x60, 0x12, 0x06, 0x2f, 0xe0, 0x37, 0xa6,
/// ];
///
/// assert!(verify(b"password", &parameters, &stored)?);
/// assert!(!verify(b"wrong", &parameters, &stored)?);
/// # Ok(())
/// # }
/// ```
pub fn verify(password: &[u8], parameters: &Parameters, expected: &[u8]) -> Result<bool, Error> {
    verify_with(password, parameters, expected, &PrfRegistry::default())
}

/// Same as [`verify`], resolving the algorithm in `registry`.
pub fn verify_with(
    password: &[u8],
    parameters: &Parameters,
    expected: &[u8],
    registry: &PrfRegistry,
) -> Result<bool, Error> {
    Pbkdf2::from_parameters_with(password, parameters, registry)?.compare(expected)
}
