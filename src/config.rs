/// Iteration count used when none is configured.
///
/// NIST SP 800-132 (PBKDF2) recommends to choose an iteration count somewhere between
/// 1000 and 10_000_000, so the password can not be brute forced easily.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Strength of a generated salt, in bits.
///
/// 128-bit is a minimum for PBKDF2 according to NIST recommendations.
pub const DEFAULT_SALT_BITS: usize = 128;

/// Hash algorithm used by HMAC when none is configured.
pub const DEFAULT_ALGORITHM: &str = "sha512";

/// A set of derivation options.
///
/// Every option has a sane default, so `Pbkdf2Config::default()` together with a password
/// is enough to derive a key. Options are changed with the consuming `with_*` methods.
///
/// # Default Configuration
/// | Option         | Value                                   |
/// |----------------|-----------------------------------------|
/// | Iterations     | 10 000                                  |
/// | Key length     | length of one PRF output (64 for SHA512) |
/// | Algorithm      | `sha512` (HMAC-SHA512)                  |
/// | Salt           | 128 bits from the OS random generator   |
/// | Parallel       | off                                     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pbkdf2Config {
    iterations: u32,
    key_length: Option<usize>,
    algorithm: String,
    salt_bits: usize,
    parallel: bool,
}

impl Default for Pbkdf2Config {
    fn default() -> Pbkdf2Config {
        Pbkdf2Config {
            iterations: DEFAULT_ITERATIONS,
            key_length: None,
            algorithm: DEFAULT_ALGORITHM.to_owned(),
            salt_bits: DEFAULT_SALT_BITS,
            parallel: false,
        }
    }
}

impl Pbkdf2Config {
    /// Number of PRF applications per block.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Requested derived key length, `None` means "one PRF output".
    pub fn key_length(&self) -> Option<usize> {
        self.key_length
    }

    /// Name of the hash algorithm behind HMAC.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Size of a salt generated when the caller doesn't supply one.
    pub fn salt_bits(&self) -> usize {
        self.salt_bits
    }

    /// Whether independent blocks are computed on worker threads.
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Sets the iteration count.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the derived key length in bytes.
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = Some(key_length);
        self
    }

    /// Sets the hash algorithm by name, e.g. `"sha256"`.
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Sets the size of a generated salt in bits.
    pub fn with_salt_bits(mut self, salt_bits: usize) -> Self {
        self.salt_bits = salt_bits;
        self
    }

    /// Computes blocks of a multi-block key on worker threads.
    ///
    /// Output is byte-identical to the sequential computation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
