//! Capabilities the patch engine needs from archive containers.
//!
//! The engine never touches a container format directly. It reads entries
//! through [`ArchiveInput`] and writes them through [`ArchiveOutput`], both
//! acquired from a source or sink and released when dropped.

use std::io::{self, Read, Write};

pub mod memory;
pub mod zip_store;

pub use memory::MemoryArchive;
pub use zip_store::{Compression, ZipStore};

/// An entry descriptor: the name plus whatever the container knows upfront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    name: String,
    size: Option<u64>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

/// Read access to an opened archive.
///
/// A handle serves one reader at a time.
pub trait ArchiveInput {
    /// All entries in container order.
    fn entries(&self) -> Vec<ArchiveEntry>;

    /// Looks up an entry by its exact name.
    fn entry(&self, name: &str) -> Option<ArchiveEntry>;

    fn reader(&mut self, entry: &ArchiveEntry) -> io::Result<Box<dyn Read + '_>>;
}

/// Write access to an archive being created.
///
/// Entries are appended in the order their writers are opened. Dropping a
/// writer (or opening the next one) completes the entry.
pub trait ArchiveOutput {
    /// True for JAR-like containers whose readers expect the manifest to be
    /// among the first entries.
    fn is_manifest_order_sensitive(&self) -> bool;

    /// Resolves the descriptor for a new entry.
    fn entry(&self, name: &str) -> ArchiveEntry {
        ArchiveEntry::new(name)
    }

    fn writer(&mut self, entry: &ArchiveEntry) -> io::Result<Box<dyn Write + '_>>;

    /// Completes the container. Without this call the output is unusable.
    fn finish(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Something an [`ArchiveInput`] can be opened from.
pub trait ArchiveSource {
    type Input: ArchiveInput;

    fn open(&self) -> io::Result<Self::Input>;
}

/// Something an [`ArchiveOutput`] can be created on.
pub trait ArchiveSink {
    type Output: ArchiveOutput;

    fn create(&self) -> io::Result<Self::Output>;
}
