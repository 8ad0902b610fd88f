//! Content digests used as the secondary identity key for indexed files.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

/// Number of bytes in a SHA-512 digest.
pub const DIGEST_LEN: usize = 64;

/// Hex-encoded SHA-512 digest of a file's full byte content.
///
/// Two files with equal digests are treated as the same document for
/// move/rename detection. The digest is stored lowercase-hex so it can be
/// compared and indexed as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("content hash has length {0}, expected {expected}", expected = DIGEST_LEN * 2)]
    BadLength(usize),
    #[error("content hash contains non-hex characters")]
    NotHex,
}

impl ContentHash {
    /// Digest a full byte buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap a digest produced by an incremental [`Sha512`] hasher.
    pub fn from_digest(hasher: Sha512) -> Self {
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a stored hex digest, validating shape.
    pub fn parse(raw: &str) -> Result<Self, HashParseError> {
        if raw.len() != DIGEST_LEN * 2 {
            return Err(HashParseError::BadLength(raw.len()));
        }
        if !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashParseError::NotHex);
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used for artifact file names.
    pub fn short(&self) -> &str {
        &self.0[..32]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
