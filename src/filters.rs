//! Entry name predicates which decide what a patch pass may write.

/// Name of the JAR manifest, which streaming JAR readers expect up front.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryNameFilter {
    AcceptAll,
    /// Accepts only [`MANIFEST_NAME`].
    Manifest,
    Inverse(Box<EntryNameFilter>),
    /// Rejects directory entries, otherwise defers to the inner filter.
    NoDirectory(Box<EntryNameFilter>),
}

impl EntryNameFilter {
    pub fn accept(&self, name: &str) -> bool {
        match self {
            EntryNameFilter::AcceptAll => true,
            EntryNameFilter::Manifest => name == MANIFEST_NAME,
            EntryNameFilter::Inverse(f) => !f.accept(name),
            EntryNameFilter::NoDirectory(f) => !is_directory(name) && f.accept(name),
        }
    }

    pub fn inverse(self) -> Self {
        EntryNameFilter::Inverse(Box::new(self))
    }

    pub fn no_directory(self) -> Self {
        EntryNameFilter::NoDirectory(Box::new(self))
    }
}

/// Directory entries are named with a trailing separator.
pub fn is_directory(name: &str) -> bool {
    name.ends_with('/')
}
