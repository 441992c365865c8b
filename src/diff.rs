use std::io::{self, Write};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::archive::{ArchiveInput, ArchiveOutput, ArchiveSink, ArchiveSource};
use crate::digest::MessageDigest;
use crate::engine::copy_entry;
use crate::error::{ModelResult, PatchResult};
use crate::filters::is_directory;
use crate::models::{
    Category, DeltaModel, EntryNameAndDigestValue, EntryNameAndTwoDigestValues, MODEL_ENTRY_NAME,
};

// -----------------------------------------------------------------------------
// Hashing
// -----------------------------------------------------------------------------

/// Digest values of all entries, keyed by name in archive order.
pub fn digest_entries(
    input: &mut dyn ArchiveInput,
    digest: &MessageDigest,
) -> io::Result<IndexMap<String, String>> {
    let mut digests = IndexMap::new();
    for entry in input.entries() {
        let mut hasher = digest.hasher();
        io::copy(&mut input.reader(&entry)?, &mut hasher)?;
        digests.insert(entry.name().to_string(), hasher.finalize_hex());
    }
    Ok(digests)
}

/// Classifies every entry name of two archives by comparing their digests.
///
/// Unchanged, changed and added entries follow the second archive's order,
/// removed entries the first archive's.
pub fn classify(
    digest: MessageDigest,
    first: &IndexMap<String, String>,
    second: &IndexMap<String, String>,
) -> ModelResult<DeltaModel> {
    let mut changed = Vec::new();
    let mut unchanged = Vec::new();
    let mut added = Vec::new();

    for (name, digest2) in second {
        match first.get(name) {
            Some(digest1) if digest1 == digest2 => {
                unchanged.push(EntryNameAndDigestValue::new(name, digest2));
            }
            Some(digest1) => {
                changed.push(EntryNameAndTwoDigestValues::new(name, digest1, digest2));
            }
            None => added.push(EntryNameAndDigestValue::new(name, digest2)),
        }
    }

    let removed = first
        .iter()
        .filter(|(name, _)| !second.contains_key(*name))
        .map(|(name, digest1)| EntryNameAndDigestValue::new(name, digest1));

    DeltaModel::builder()
        .message_digest(digest)
        .changed_entries(changed)
        .unchanged_entries(unchanged)
        .added_entries(added)
        .removed_entries(removed)
        .build()
}

// -----------------------------------------------------------------------------
// Delta archive
// -----------------------------------------------------------------------------

/// Computes the delta from the first to the second archive and writes the
/// delta archive: the model entry first, then the content of every changed
/// and added file entry taken from the second archive.
pub fn diff<F, S, D>(first: &F, second: &S, delta: &D, digest: MessageDigest) -> PatchResult<DeltaModel>
where
    F: ArchiveSource,
    S: ArchiveSource,
    D: ArchiveSink,
{
    let mut first_input = first.open()?;
    let mut second_input = second.open()?;

    let first_digests = digest_entries(&mut first_input, &digest)?;
    drop(first_input);
    let second_digests = digest_entries(&mut second_input, &digest)?;
    let model = classify(digest, &first_digests, &second_digests)?;

    let mut output = delta.create()?;
    {
        let entry = output.entry(MODEL_ENTRY_NAME);
        let mut writer = output.writer(&entry)?;
        model.encode(&mut writer)?;
        writer.flush()?;
    }

    for category in [Category::Changed, Category::Added] {
        for entry in model.entries(category) {
            let name = entry.entry_name();
            if is_directory(name) {
                continue;
            }
            // The second archive changed while we were reading it.
            copy_entry(&mut second_input, &mut output, &digest, name, entry.expected_digest())?
                .map_err(|defect| io::Error::new(io::ErrorKind::InvalidData, defect))?;
            debug!(entry = name, ?category, "stored entry in delta");
        }
    }
    output.finish()?;

    info!(
        changed = model.count(Category::Changed),
        unchanged = model.count(Category::Unchanged),
        added = model.count(Category::Added),
        removed = model.count(Category::Removed),
        "computed delta archive"
    );
    Ok(model)
}
