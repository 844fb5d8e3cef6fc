//! Hash algorithms usable for block addressing.
//!
//! Names follow the multicodec table (`sha2-256`, `sha2-512`, `blake3`).

use multihash::Multihash;
use sha2::Digest;
use std::fmt;
use std::str::FromStr;

/// Multihash code for SHA2-256.
pub const SHA2_256: u64 = 0x12;
/// Multihash code for SHA2-512.
pub const SHA2_512: u64 = 0x13;
/// Multihash code for BLAKE3 (32-byte output).
pub const BLAKE3: u64 = 0x1e;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HashAlgError {
    #[error("unsupported hash algorithm: {0}")]
    Unsupported(String),
}

/// Hash algorithm used to derive multihashes for blocks.
///
/// [`HashAlg::Sha2_256`] is the default, and the only algorithm that may be
/// used with CIDv0.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum HashAlg {
    #[default]
    Sha2_256,
    Sha2_512,
    Blake3,
}

impl HashAlg {
    /// The multihash code of this algorithm.
    pub const fn code(&self) -> u64 {
        match self {
            HashAlg::Sha2_256 => SHA2_256,
            HashAlg::Sha2_512 => SHA2_512,
            HashAlg::Blake3 => BLAKE3,
        }
    }

    /// The multicodec name of this algorithm.
    pub const fn name(&self) -> &'static str {
        match self {
            HashAlg::Sha2_256 => "sha2-256",
            HashAlg::Sha2_512 => "sha2-512",
            HashAlg::Blake3 => "blake3",
        }
    }

    /// Returns true for the algorithm CIDv0 is defined over.
    pub fn is_default(&self) -> bool {
        *self == HashAlg::default()
    }

    /// Hash `data` and wrap the digest into a multihash.
    pub fn digest(&self, data: &[u8]) -> Multihash<64> {
        let wrapped = match self {
            HashAlg::Sha2_256 => Multihash::wrap(SHA2_256, &sha2::Sha256::digest(data)),
            HashAlg::Sha2_512 => Multihash::wrap(SHA2_512, &sha2::Sha512::digest(data)),
            HashAlg::Blake3 => Multihash::wrap(BLAKE3, blake3::hash(data).as_bytes()),
        };
        // Every digest above is at most 64 bytes, which is the multihash capacity.
        wrapped.expect("digest fits into a 64 byte multihash")
    }
}

impl FromStr for HashAlg {
    type Err = HashAlgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha2-256" => Ok(HashAlg::Sha2_256),
            "sha2-512" => Ok(HashAlg::Sha2_512),
            "blake3" => Ok(HashAlg::Blake3),
            other => Err(HashAlgError::Unsupported(other.to_owned())),
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
