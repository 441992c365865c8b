//! Message digests used to verify archive entry content.
//!
//! Digest values are always compared and persisted as lower-case hex strings.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};

use crate::error::DigestError;

/// The digest algorithms which can be named in a delta model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha512_224,
    Sha512_256,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 6] = [
        DigestAlgorithm::Sha224,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
        DigestAlgorithm::Sha512_224,
        DigestAlgorithm::Sha512_256,
    ];

    /// Canonical name, as stored in a delta model.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha224 => "SHA-224",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
            DigestAlgorithm::Sha512_224 => "SHA-512/224",
            DigestAlgorithm::Sha512_256 => "SHA-512/256",
        }
    }

    /// Native output size in bytes.
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha224 | DigestAlgorithm::Sha512_224 => 28,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha512_256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "sha256" and "SHA-256" name the same algorithm.
        let wanted = s.replace('-', "");
        DigestAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.name().replace('-', "").eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| DigestError::UnknownAlgorithm(s.to_string()))
    }
}

/// A digest configuration: the algorithm plus the number of output bytes kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageDigest {
    algorithm: DigestAlgorithm,
    length: usize,
}

impl MessageDigest {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            length: algorithm.output_len(),
        }
    }

    /// Resolves a digest by algorithm name, e.g. `"SHA-256"`.
    pub fn from_name(name: &str) -> Result<Self, DigestError> {
        Ok(Self::new(name.parse()?))
    }

    /// Truncates the output to `length` bytes.
    pub fn with_length(self, length: usize) -> Result<Self, DigestError> {
        let max = self.algorithm.output_len();
        if length == 0 || length > max {
            return Err(DigestError::InvalidLength {
                algorithm: self.algorithm.name(),
                length,
                max,
            });
        }
        Ok(Self { length, ..self })
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// True if the output length is the algorithm's native size.
    pub fn is_native_length(&self) -> bool {
        self.length == self.algorithm.output_len()
    }

    /// A fresh hashing context. Each archive entry gets its own.
    pub fn hasher(&self) -> Hasher {
        let state = match self.algorithm {
            DigestAlgorithm::Sha224 => HashState::Sha224(Sha224::new()),
            DigestAlgorithm::Sha256 => HashState::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => HashState::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => HashState::Sha512(Sha512::new()),
            DigestAlgorithm::Sha512_224 => HashState::Sha512_224(Sha512_224::new()),
            DigestAlgorithm::Sha512_256 => HashState::Sha512_256(Sha512_256::new()),
        };
        Hasher {
            state,
            length: self.length,
        }
    }

    /// Digest value of an in-memory buffer.
    pub fn digest_value(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_hex()
    }
}

impl Default for MessageDigest {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }
}

enum HashState {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Sha512_224(Sha512_224),
    Sha512_256(Sha512_256),
}

/// Incremental hashing context for a single entry.
pub struct Hasher {
    state: HashState,
    length: usize,
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HashState::Sha224(h) => h.update(data),
            HashState::Sha256(h) => h.update(data),
            HashState::Sha384(h) => h.update(data),
            HashState::Sha512(h) => h.update(data),
            HashState::Sha512_224(h) => h.update(data),
            HashState::Sha512_256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        let mut out = match self.state {
            HashState::Sha224(h) => h.finalize().to_vec(),
            HashState::Sha256(h) => h.finalize().to_vec(),
            HashState::Sha384(h) => h.finalize().to_vec(),
            HashState::Sha512(h) => h.finalize().to_vec(),
            HashState::Sha512_224(h) => h.finalize().to_vec(),
            HashState::Sha512_256(h) => h.finalize().to_vec(),
        };
        out.truncate(self.length);
        out
    }

    /// Canonical textual form of the digest.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Output filter which digests every byte passing through it.
pub struct DigestWriter<W: Write> {
    inner: W,
    hasher: Hasher,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W, hasher: Hasher) -> Self {
        Self { inner, hasher }
    }

    /// Flushes the inner writer and returns the digest value of everything written.
    pub fn finish(mut self) -> io::Result<String> {
        self.inner.flush()?;
        Ok(self.hasher.finalize_hex())
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
