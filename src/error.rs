use thiserror::Error;

/// Error variants produced by the key derivation API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A parameter is outside of its domain: an empty password, zero iterations,
    /// a zero block index, or a salt size that is not a whole number of bytes.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The requested hash algorithm is not known to the PRF registry.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Requested derived key length is outside of `1..=(2^32 - 1) * hLen`.
    #[error("derived key length {requested} is out of range, min: 1, max: {max}")]
    InvalidKeyLength {
        /// Length asked by the caller.
        requested: usize,
        /// Largest length the chosen PRF can produce.
        max: u64,
    },
    /// The underlying keyed hash could not produce a digest, or produced digests
    /// of inconsistent length.
    #[error("unable to hash block: {0}")]
    PrfFailure(String),
    /// The random byte source used to generate a salt failed.
    #[error("random source unavailable: {0}")]
    RandomSourceUnavailable(String),
}

impl From<rand::Error> for Error {
    fn from(err: rand::Error) -> Self {
        Error::RandomSourceUnavailable(err.to_string())
    }
}
