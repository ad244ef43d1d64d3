use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};

use super::error::Error;

/// Keyed pseudorandom function used by PBKDF2.
///
/// Implementations must return a digest of the same length for every input: the length
/// of one PBKDF2 block is measured once with an empty message and relied upon afterwards.
pub trait Prf: Send + Sync {
    /// Computes `PRF(key, message)`.
    fn compute(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, Error>;
}

/// HMAC over a concrete digest type, returns the digest as a vector.
macro_rules! hmac {
    ($digest:ty, $key:expr, $message:expr) => {{
        let mut mac = <Hmac<$digest> as Mac>::new_from_slice($key)
            .map_err(|err| Error::PrfFailure(err.to_string()))?;
        mac.update($message);
        mac.finalize().into_bytes().to_vec()
    }};
}

/// Built-in hash algorithms, each used as HMAC-<hash>.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// HMAC-SHA1, 20 bytes. Kept for RFC 6070 compatibility.
    Sha1,
    /// HMAC-SHA224, 28 bytes.
    Sha224,
    /// HMAC-SHA256, 32 bytes.
    Sha256,
    /// HMAC-SHA384, 48 bytes.
    Sha384,
    /// HMAC-SHA512, 64 bytes.
    Sha512,
    /// HMAC-SHA512/224, 28 bytes.
    Sha512_224,
    /// HMAC-SHA512/256, 32 bytes.
    Sha512_256,
}

impl HashAlgorithm {
    /// Every built-in algorithm.
    pub const ALL: [HashAlgorithm; 7] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha512_224,
        HashAlgorithm::Sha512_256,
    ];

    /// Registry name of the algorithm.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha512_224 => "sha512/224",
            HashAlgorithm::Sha512_256 => "sha512/256",
        }
    }

    /// Length of one HMAC output in bytes.
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 | HashAlgorithm::Sha512_224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha512_256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .iter()
            .copied()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnsupportedAlgorithm(name.to_owned()))
    }
}

impl Prf for HashAlgorithm {
    fn compute(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, Error> {
        let digest = match self {
            HashAlgorithm::Sha1 => hmac!(Sha1, key, message),
            HashAlgorithm::Sha224 => hmac!(Sha224, key, message),
            HashAlgorithm::Sha256 => hmac!(Sha256, key, message),
            HashAlgorithm::Sha384 => hmac!(Sha384, key, message),
            HashAlgorithm::Sha512 => hmac!(Sha512, key, message),
            HashAlgorithm::Sha512_224 => hmac!(Sha512_224, key, message),
            HashAlgorithm::Sha512_256 => hmac!(Sha512_256, key, message),
        };
        Ok(digest)
    }
}

/// A lookup table of known PRFs by name.
///
/// The default registry knows every [`HashAlgorithm`]. Custom PRFs (hardware-backed
/// MACs, mocks in tests) are added with [`PrfRegistry::register`]. Names are matched
/// ASCII case-insensitively.
///
/// # Examples
/// ```
/// use passkdf::PrfRegistry;
///
/// let registry = PrfRegistry::default();
///
/// assert!(registry.resolve("SHA256").is_ok());
/// assert!(registry.resolve("md4").is_err());
/// ```
#[derive(Clone)]
pub struct PrfRegistry {
    entries: BTreeMap<String, Arc<dyn Prf>>,
}

impl Default for PrfRegistry {
    fn default() -> Self {
        let mut registry = PrfRegistry::empty();
        for algorithm in HashAlgorithm::ALL {
            registry.register(algorithm.name(), Arc::new(algorithm));
        }
        registry
    }
}

impl fmt::Debug for PrfRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl PrfRegistry {
    /// Creates a registry without any algorithm.
    pub fn empty() -> Self {
        PrfRegistry {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or replaces a PRF under `name`.
    pub fn register(&mut self, name: &str, prf: Arc<dyn Prf>) -> &mut Self {
        self.entries.insert(name.to_ascii_lowercase(), prf);
        self
    }

    /// Looks a PRF up by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Prf>, Error> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnsupportedAlgorithm(name.to_owned()))
    }

    /// Names of every registered PRF in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Constant;

    impl Prf for Constant {
        fn compute(&self, _key: &[u8], _message: &[u8]) -> Result<Vec<u8>, Error> {
            Ok(vec![7; 4])
        }
    }

    #[test]
    fn hmac_sha256_rfc4231_case1() {
        let key = [0x0b; 20];
        let digest = HashAlgorithm::Sha256.compute(&key, b"Hi There").unwrap();

        assert_eq!(
            hex::encode(digest),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    #[test]
    fn hmac_output_sizes() {
        for algorithm in HashAlgorithm::ALL {
            let digest = algorithm.compute(b"key", &[]).unwrap();
            assert_eq!(digest.len(), algorithm.output_size(), "{}", algorithm);
        }
    }

    #[test]
    fn hash_algorithm_from_str() {
        assert_eq!("sha512".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha512));
        assert_eq!("SHA512/256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha512_256));
        assert_eq!(
            "whirlpool".parse::<HashAlgorithm>(),
            Err(Error::UnsupportedAlgorithm("whirlpool".to_owned()))
        );
    }

    #[test]
    fn registry_default_names() {
        let registry = PrfRegistry::default();
        let names: Vec<&str> = registry.names().collect();

        assert_eq!(
            names,
            ["sha1", "sha224", "sha256", "sha384", "sha512", "sha512/224", "sha512/256"]
        );
    }

    #[test]
    fn registry_unknown_algorithm() {
        match PrfRegistry::default().resolve("md5") {
            Err(Error::UnsupportedAlgorithm(name)) => assert_eq!(name, "md5"),
            _ => panic!("UnsupportedAlgorithm is expected"),
        }
        assert!(PrfRegistry::empty().resolve("sha512").is_err());
    }

    #[test]
    fn registry_custom_prf() {
        let mut registry = PrfRegistry::empty();
        registry.register("Constant", Arc::new(Constant));

        let prf = registry.resolve("constant").unwrap();
        assert_eq!(prf.compute(b"k", b"m").unwrap(), [7; 4]);
    }
}
