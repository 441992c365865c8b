use std::io::{self, Read, Write};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::{ArchiveEntry, ArchiveInput, ArchiveOutput, ArchiveSink, ArchiveSource};

type Entries = IndexMap<String, Vec<u8>>;

/// In-memory archive usable as both source and sink.
///
/// Intended for tests and embedding. Clones share the same entries, so a
/// clone handed to [`crate::patch`] as a sink can be inspected afterwards.
/// Creating an output replaces the entries once the output is finished.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Arc<RwLock<Entries>>,
    manifest_order_sensitive: bool,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// An archive which behaves like a JAR when written to.
    pub fn jar() -> Self {
        Self {
            manifest_order_sensitive: true,
            ..Self::default()
        }
    }

    pub fn with_entry(self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    /// Adds or replaces an entry, keeping its existing position.
    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), data.into());
    }

    pub fn remove(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.write().expect("lock poisoned").shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.read().expect("lock poisoned").get(name).cloned()
    }

    /// Entry names in archive order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().expect("lock poisoned").keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

/// A snapshot of a [`MemoryArchive`] taken when it was opened.
#[derive(Debug)]
pub struct MemoryInput {
    entries: Entries,
}

impl ArchiveInput for MemoryInput {
    fn entries(&self) -> Vec<ArchiveEntry> {
        self.entries
            .iter()
            .map(|(name, data)| ArchiveEntry::new(name.as_str()).with_size(Some(data.len() as u64)))
            .collect()
    }

    fn entry(&self, name: &str) -> Option<ArchiveEntry> {
        self.entries
            .get(name)
            .map(|data| ArchiveEntry::new(name).with_size(Some(data.len() as u64)))
    }

    fn reader(&mut self, entry: &ArchiveEntry) -> io::Result<Box<dyn Read + '_>> {
        match self.entries.get(entry.name()) {
            Some(data) => Ok(Box::new(data.as_slice())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such entry: {}", entry.name()),
            )),
        }
    }
}

#[derive(Debug)]
pub struct MemoryOutput {
    target: MemoryArchive,
    entries: Entries,
}

impl ArchiveOutput for MemoryOutput {
    fn is_manifest_order_sensitive(&self) -> bool {
        self.target.manifest_order_sensitive
    }

    fn writer(&mut self, entry: &ArchiveEntry) -> io::Result<Box<dyn Write + '_>> {
        if self.entries.contains_key(entry.name()) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("duplicate entry: {}", entry.name()),
            ));
        }
        let buf = self.entries.entry(entry.name().to_string()).or_default();
        Ok(Box::new(buf))
    }

    fn finish(self) -> io::Result<()> {
        *self.target.entries.write().expect("lock poisoned") = self.entries;
        Ok(())
    }
}

impl ArchiveSource for MemoryArchive {
    type Input = MemoryInput;

    fn open(&self) -> io::Result<MemoryInput> {
        Ok(MemoryInput {
            entries: self.entries.read().expect("lock poisoned").clone(),
        })
    }
}

impl ArchiveSink for MemoryArchive {
    type Output = MemoryOutput;

    fn create(&self) -> io::Result<MemoryOutput> {
        Ok(MemoryOutput {
            target: self.clone(),
            entries: Entries::new(),
        })
    }
}
