//! Algorithm-prefixed digests (`sha256:<hex>`, `sha512:<hex>`).

use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io;
use std::path::Path;

use crate::{Error, Result};

/// Digest algorithm named by the prefix of a digest string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-256, prefix `sha256`.
    Sha256,
    /// SHA-512, prefix `sha512`.
    Sha512,
}

impl DigestAlgorithm {
    /// The prefix used in digest strings.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

/// Split a digest string into its algorithm and lowercase hex part.
///
/// # Errors
///
/// Returns [`Error::UnsupportedDigest`] for unknown prefixes or malformed hex.
pub fn parse_digest(digest: &str) -> Result<(DigestAlgorithm, &str)> {
    let unsupported = || Error::UnsupportedDigest {
        digest: digest.to_string(),
    };

    let (algo, hex) = digest.split_once(':').ok_or_else(unsupported)?;
    let algorithm = match algo {
        "sha256" => DigestAlgorithm::Sha256,
        "sha512" => DigestAlgorithm::Sha512,
        _ => return Err(unsupported()),
    };

    if hex.len() != algorithm.hex_len()
        || !hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(unsupported());
    }

    Ok((algorithm, hex))
}

/// Incremental digest computation producing algorithm-prefixed strings.
pub enum Hasher {
    /// SHA-256 state.
    Sha256(Sha256),
    /// SHA-512 state.
    Sha512(Sha512),
}

impl Hasher {
    /// Create a hasher for `algorithm`.
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    /// Feed bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Finish and render as `<algorithm>:<hex>`.
    #[must_use]
    pub fn finalize(self) -> String {
        match self {
            Self::Sha256(h) => format!("sha256:{}", hex::encode(h.finalize())),
            Self::Sha512(h) => format!("sha512:{}", hex::encode(h.finalize())),
        }
    }
}

impl io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compute the digest of a file with the given algorithm.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn file_digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(e, path, "open"))?;
    let mut hasher = Hasher::new(algorithm);
    io::copy(&mut file, &mut hasher).map_err(|e| Error::io(e, path, "read"))?;
    Ok(hasher.finalize())
}

/// Compute the `sha256:` digest of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn file_sha256(path: &Path) -> Result<String> {
    file_digest(path, DigestAlgorithm::Sha256)
}

/// Compute the digest of in-memory bytes.
#[must_use]
pub fn bytes_digest(data: &[u8], algorithm: DigestAlgorithm) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Check a file against an expected digest.
///
/// # Errors
///
/// Returns [`Error::DigestMismatch`] when the digests differ, or an error if
/// the digest is malformed or the file unreadable.
pub fn verify_file(path: &Path, expected: &str) -> Result<()> {
    let (algorithm, _) = parse_digest(expected)?;
    let actual = file_digest(path, algorithm)?;
    if actual != expected {
        return Err(Error::digest_mismatch(
            path.display().to_string(),
            expected,
            actual,
        ));
    }
    Ok(())
}
