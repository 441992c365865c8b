//! Delta patches for ZIP and JAR archives.
//!
//! A delta archive holds a [`DeltaModel`] under [`MODEL_ENTRY_NAME`] plus the
//! full content of every changed and added entry. [`patch`] rebuilds the
//! second archive from the first one and the delta, checking every copied
//! entry against the digest recorded in the model. [`diff`] computes a delta
//! archive from two archives.
//!
//! Failures name the archive at fault: [`PatchError::WrongFirstArchive`] when
//! the base archive is not the one the delta was made from,
//! [`PatchError::InvalidDeltaArchive`] when the delta itself is broken.

pub mod archive;
pub mod config;
pub mod diff;
pub mod digest;
pub mod engine;
pub mod error;
pub mod filters;
pub mod models;

pub use archive::{
    ArchiveEntry, ArchiveInput, ArchiveOutput, ArchiveSink, ArchiveSource, Compression,
    MemoryArchive, ZipStore,
};
pub use config::DeltaConfig;
pub use diff::diff;
pub use digest::{DigestAlgorithm, MessageDigest};
pub use engine::{patch, PatchEngine, PatchStats};
pub use error::{ArchiveDefect, ConfigError, DigestError, ModelError, PatchError, PatchResult};
pub use filters::EntryNameFilter;
pub use models::{
    Category, DeltaModel, EntryNameAndDigestValue, EntryNameAndTwoDigestValues, MODEL_ENTRY_NAME,
};
