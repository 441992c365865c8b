use std::io;

use tracing::{debug, info, warn};

use crate::archive::{ArchiveInput, ArchiveOutput, ArchiveSink, ArchiveSource};
use crate::digest::{DigestWriter, MessageDigest};
use crate::error::{ArchiveDefect, PatchError, PatchResult};
use crate::filters::EntryNameFilter;
use crate::models::{Category, DeltaModel, MODEL_ENTRY_NAME};

// -----------------------------------------------------------------------------
// Sources & steps
// -----------------------------------------------------------------------------

/// The input archive an entry is copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceArchive {
    First,
    Delta,
}

impl SourceArchive {
    /// Blames this archive for a defect found while reading from it.
    pub fn blame(self, defect: ArchiveDefect) -> PatchError {
        match self {
            SourceArchive::First => PatchError::WrongFirstArchive(defect),
            SourceArchive::Delta => PatchError::InvalidDeltaArchive(defect),
        }
    }
}

/// What every pass does, in order. Removed entries are never written.
pub const PASS_STEPS: [(Category, SourceArchive); 3] = [
    (Category::Unchanged, SourceArchive::First),
    (Category::Changed, SourceArchive::Delta),
    (Category::Added, SourceArchive::Delta),
];

/// The filters for the passes needed to write `output`.
///
/// The filters partition the entry names: each non-directory name is
/// accepted by exactly one of them.
pub fn pass_filters(output: &dyn ArchiveOutput) -> Vec<EntryNameFilter> {
    let passes = if output.is_manifest_order_sensitive() {
        // Streaming JAR readers only find the manifest near the front.
        vec![EntryNameFilter::Manifest, EntryNameFilter::Manifest.inverse()]
    } else {
        vec![EntryNameFilter::AcceptAll]
    };
    passes.into_iter().map(EntryNameFilter::no_directory).collect()
}

// -----------------------------------------------------------------------------
// Entry copy
// -----------------------------------------------------------------------------

/// Copies one entry from `input` to `output`, digesting the bytes on the way.
///
/// Returns the defect, if any, so the caller can attribute it; I/O errors
/// pass through unchanged.
pub fn copy_entry(
    input: &mut dyn ArchiveInput,
    output: &mut dyn ArchiveOutput,
    digest: &MessageDigest,
    name: &str,
    expected: &str,
) -> io::Result<Result<u64, ArchiveDefect>> {
    let Some(source) = input.entry(name) else {
        return Ok(Err(ArchiveDefect::MissingEntry(name.to_string())));
    };
    let target = output.entry(name).with_size(source.size());

    let mut reader = input.reader(&source)?;
    let mut writer = DigestWriter::new(output.writer(&target)?, digest.hasher());
    let copied = io::copy(&mut reader, &mut writer)?;
    let actual = writer.finish()?;

    if actual != expected {
        return Ok(Err(ArchiveDefect::DigestMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        }));
    }
    Ok(Ok(copied))
}

// -----------------------------------------------------------------------------
// Engine
// -----------------------------------------------------------------------------

#[derive(Debug)]
enum ModelState {
    Pending,
    Loaded {
        model: DeltaModel,
        digest: MessageDigest,
    },
}

/// One patch invocation over opened inputs.
///
/// The delta model is read from the delta archive on first use and kept
/// for all passes.
pub struct PatchEngine<'a> {
    first: &'a mut dyn ArchiveInput,
    delta: &'a mut dyn ArchiveInput,
    state: ModelState,
}

impl<'a> PatchEngine<'a> {
    pub fn new(first: &'a mut dyn ArchiveInput, delta: &'a mut dyn ArchiveInput) -> Self {
        Self {
            first,
            delta,
            state: ModelState::Pending,
        }
    }

    /// The delta model, loading it if needed.
    pub fn model(&mut self) -> PatchResult<&DeltaModel> {
        let (model, _) = load(&mut self.state, &mut *self.delta)?;
        Ok(model)
    }

    /// Writes the second archive's entries to `output`.
    pub fn patch_to(&mut self, output: &mut dyn ArchiveOutput) -> PatchResult<PatchStats> {
        let (model, digest) = load(&mut self.state, &mut *self.delta)?;
        let mut stats = PatchStats::default();

        for filter in pass_filters(output) {
            for (category, source) in PASS_STEPS {
                for entry in model.entries(category) {
                    let name = entry.entry_name();
                    if !filter.accept(name) {
                        continue;
                    }
                    let input: &mut dyn ArchiveInput = match source {
                        SourceArchive::First => &mut *self.first,
                        SourceArchive::Delta => &mut *self.delta,
                    };
                    match copy_entry(input, output, digest, name, entry.expected_digest())? {
                        Ok(bytes) => {
                            debug!(entry = name, ?category, bytes, "copied entry");
                            stats.record(category, bytes);
                        }
                        Err(defect) => {
                            warn!(entry = name, ?source, "{defect}");
                            return Err(source.blame(defect));
                        }
                    }
                }
            }
        }
        Ok(stats)
    }
}

fn load<'s>(
    state: &'s mut ModelState,
    delta: &mut dyn ArchiveInput,
) -> PatchResult<(&'s DeltaModel, &'s MessageDigest)> {
    if let ModelState::Pending = state {
        let model = load_model(delta)?;
        let digest = model
            .message_digest()
            .map_err(|e| SourceArchive::Delta.blame(e.into()))?;
        debug!(algorithm = %digest.algorithm(), length = digest.length(), "loaded delta model");
        *state = ModelState::Loaded { model, digest };
    }
    match state {
        ModelState::Loaded { model, digest } => Ok((model, digest)),
        ModelState::Pending => unreachable!("model state was just loaded"),
    }
}

/// Reads the delta model from its well-known entry in the delta archive.
pub fn load_model(delta: &mut dyn ArchiveInput) -> PatchResult<DeltaModel> {
    let entry = delta.entry(MODEL_ENTRY_NAME).ok_or_else(|| {
        SourceArchive::Delta.blame(ArchiveDefect::MissingEntry(MODEL_ENTRY_NAME.to_string()))
    })?;
    let reader = delta.reader(&entry)?;
    DeltaModel::decode(reader).map_err(|e| SourceArchive::Delta.blame(e.into()))
}

/// Entry and byte counts per category written by a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub unchanged: usize,
    pub changed: usize,
    pub added: usize,
    pub bytes: u64,
}

impl PatchStats {
    fn record(&mut self, category: Category, bytes: u64) {
        match category {
            Category::Unchanged => self.unchanged += 1,
            Category::Changed => self.changed += 1,
            Category::Added => self.added += 1,
            Category::Removed => {}
        }
        self.bytes += bytes;
    }

    pub fn entries(&self) -> usize {
        self.unchanged + self.changed + self.added
    }
}

// -----------------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------------

/// Reconstructs the second archive from the first archive and a delta archive.
///
/// All three archives are released before this returns, whatever the
/// outcome. On error the second archive is incomplete and should be discarded.
pub fn patch<F, D, S>(first: &F, delta: &D, second: &S) -> PatchResult<PatchStats>
where
    F: ArchiveSource,
    D: ArchiveSource,
    S: ArchiveSink,
{
    let mut first_input = first.open()?;
    let mut delta_input = delta.open()?;
    let mut output = second.create()?;

    let stats = PatchEngine::new(&mut first_input, &mut delta_input).patch_to(&mut output)?;
    output.finish()?;

    info!(
        unchanged = stats.unchanged,
        changed = stats.changed,
        added = stats.added,
        bytes = stats.bytes,
        "patched archive"
    );
    Ok(stats)
}
