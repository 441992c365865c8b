use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures resolving or configuring a message digest.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("unknown message digest algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid digest length {length} for {algorithm}: must be between 1 and {max} bytes")]
    InvalidLength {
        algorithm: &'static str,
        length: usize,
        max: usize,
    },
}

/// Failures building, encoding or decoding a delta model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("a message digest is required to build a delta model")]
    MissingDigest,

    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error("malformed delta model: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures loading a [`crate::DeltaConfig`] file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What is wrong with one of the input archives.
///
/// Never surfaced on its own: the engine always attributes a defect to the
/// archive it was read from, see [`PatchError`].
#[derive(Debug, Error)]
pub enum ArchiveDefect {
    #[error("missing archive entry: {0}")]
    MissingEntry(String),

    #[error("wrong message digest for archive entry {name}: expected {expected}, got {actual}")]
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors surfaced by [`crate::patch`] and [`crate::diff`].
#[derive(Debug, Error)]
pub enum PatchError {
    /// The base archive does not match the one the delta was computed against.
    #[error("wrong first archive: {0}")]
    WrongFirstArchive(#[source] ArchiveDefect),

    /// The delta archive is structurally broken or its content is corrupt.
    #[error("invalid delta archive: {0}")]
    InvalidDeltaArchive(#[source] ArchiveDefect),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PatchError {
    /// The underlying defect, if this error blames one of the input archives.
    pub fn defect(&self) -> Option<&ArchiveDefect> {
        match self {
            PatchError::WrongFirstArchive(d) | PatchError::InvalidDeltaArchive(d) => Some(d),
            _ => None,
        }
    }
}

pub type PatchResult<T> = Result<T, PatchError>;
pub type ModelResult<T> = Result<T, ModelError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
