use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::digest::MessageDigest;
use crate::error::{ModelError, ModelResult};

/// Name of the delta archive entry holding the serialized [`DeltaModel`].
/// It should be the first entry of a delta archive.
pub const MODEL_ENTRY_NAME: &str = "META-INF/delta.json";

/// An entry name paired with the digest of its content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryNameAndDigestValue {
    #[serde(rename = "name")]
    entry_name: String,
    #[serde(rename = "digest")]
    digest_value: String,
}

impl EntryNameAndDigestValue {
    pub fn new(entry_name: impl Into<String>, digest_value: impl Into<String>) -> Self {
        Self {
            entry_name: entry_name.into(),
            digest_value: digest_value.into(),
        }
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn digest_value(&self) -> &str {
        &self.digest_value
    }
}

/// An entry name paired with the digests of its content in the first and
/// in the second archive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryNameAndTwoDigestValues {
    #[serde(rename = "name")]
    entry_name: String,
    #[serde(rename = "first")]
    digest_value1: String,
    #[serde(rename = "second")]
    digest_value2: String,
}

impl EntryNameAndTwoDigestValues {
    pub fn new(
        entry_name: impl Into<String>,
        digest_value1: impl Into<String>,
        digest_value2: impl Into<String>,
    ) -> Self {
        Self {
            entry_name: entry_name.into(),
            digest_value1: digest_value1.into(),
            digest_value2: digest_value2.into(),
        }
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Digest of the entry in the first archive.
    pub fn digest_value1(&self) -> &str {
        &self.digest_value1
    }

    /// Digest of the entry in the second archive.
    pub fn digest_value2(&self) -> &str {
        &self.digest_value2
    }
}

trait Named {
    fn name(&self) -> &str;
}

impl Named for EntryNameAndDigestValue {
    fn name(&self) -> &str {
        &self.entry_name
    }
}

impl Named for EntryNameAndTwoDigestValues {
    fn name(&self) -> &str {
        &self.entry_name
    }
}

/// The four ways an entry name relates the first archive to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Changed,
    Unchanged,
    Added,
    Removed,
}

/// A borrowed view of one model entry, whatever its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEntry<'a> {
    Single(&'a EntryNameAndDigestValue),
    Pair(&'a EntryNameAndTwoDigestValues),
}

impl<'a> ModelEntry<'a> {
    pub fn entry_name(&self) -> &'a str {
        match self {
            ModelEntry::Single(e) => e.entry_name(),
            ModelEntry::Pair(e) => e.entry_name(),
        }
    }

    /// The digest the entry content must have when copied: the second digest
    /// for changed entries, the only digest otherwise.
    pub fn expected_digest(&self) -> &'a str {
        match self {
            ModelEntry::Single(e) => e.digest_value(),
            ModelEntry::Pair(e) => e.digest_value2(),
        }
    }
}

/// Metadata of a delta archive: which entries changed, stayed, appeared or
/// vanished between the first and the second archive, with their digests.
///
/// Immutable once built. Category maps keep insertion order, which drives the
/// output order when patching; equality ignores that order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeltaModel {
    algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digest_byte_length: Option<usize>,
    #[serde(default, with = "entry_list")]
    changed: IndexMap<String, EntryNameAndTwoDigestValues>,
    #[serde(default, with = "entry_list")]
    unchanged: IndexMap<String, EntryNameAndDigestValue>,
    #[serde(default, with = "entry_list")]
    added: IndexMap<String, EntryNameAndDigestValue>,
    #[serde(default, with = "entry_list")]
    removed: IndexMap<String, EntryNameAndDigestValue>,
}

impl DeltaModel {
    pub fn builder() -> DeltaModelBuilder {
        DeltaModelBuilder::default()
    }

    pub fn digest_algorithm_name(&self) -> &str {
        &self.algorithm
    }

    /// Present only if the digest used to build the model was truncated.
    pub fn digest_byte_length(&self) -> Option<usize> {
        self.digest_byte_length
    }

    /// Resolves the digest recorded in this model.
    pub fn message_digest(&self) -> ModelResult<MessageDigest> {
        let digest = MessageDigest::from_name(&self.algorithm)?;
        Ok(match self.digest_byte_length {
            Some(len) => digest.with_length(len)?,
            None => digest,
        })
    }

    pub fn changed_entries(&self) -> impl Iterator<Item = &EntryNameAndTwoDigestValues> {
        self.changed.values()
    }

    pub fn unchanged_entries(&self) -> impl Iterator<Item = &EntryNameAndDigestValue> {
        self.unchanged.values()
    }

    pub fn added_entries(&self) -> impl Iterator<Item = &EntryNameAndDigestValue> {
        self.added.values()
    }

    pub fn removed_entries(&self) -> impl Iterator<Item = &EntryNameAndDigestValue> {
        self.removed.values()
    }

    pub fn changed(&self, name: &str) -> Option<&EntryNameAndTwoDigestValues> {
        self.changed.get(name)
    }

    pub fn unchanged(&self, name: &str) -> Option<&EntryNameAndDigestValue> {
        self.unchanged.get(name)
    }

    pub fn added(&self, name: &str) -> Option<&EntryNameAndDigestValue> {
        self.added.get(name)
    }

    pub fn removed(&self, name: &str) -> Option<&EntryNameAndDigestValue> {
        self.removed.get(name)
    }

    pub fn lookup(&self, category: Category, name: &str) -> Option<ModelEntry<'_>> {
        match category {
            Category::Changed => self.changed.get(name).map(ModelEntry::Pair),
            Category::Unchanged => self.unchanged.get(name).map(ModelEntry::Single),
            Category::Added => self.added.get(name).map(ModelEntry::Single),
            Category::Removed => self.removed.get(name).map(ModelEntry::Single),
        }
    }

    /// All entries of a category in insertion order.
    pub fn entries(&self, category: Category) -> Box<dyn Iterator<Item = ModelEntry<'_>> + '_> {
        match category {
            Category::Changed => Box::new(self.changed.values().map(ModelEntry::Pair)),
            Category::Unchanged => Box::new(self.unchanged.values().map(ModelEntry::Single)),
            Category::Added => Box::new(self.added.values().map(ModelEntry::Single)),
            Category::Removed => Box::new(self.removed.values().map(ModelEntry::Single)),
        }
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Changed => self.changed.len(),
            Category::Unchanged => self.unchanged.len(),
            Category::Added => self.added.len(),
            Category::Removed => self.removed.len(),
        }
    }

    pub fn encode<W: Write>(&self, writer: W) -> ModelResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn decode<R: Read>(reader: R) -> ModelResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Hash for DeltaModel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.algorithm.hash(state);
        self.digest_byte_length.hash(state);
        unordered_hash(&self.changed).hash(state);
        unordered_hash(&self.unchanged).hash(state);
        unordered_hash(&self.added).hash(state);
        unordered_hash(&self.removed).hash(state);
    }
}

// Sum of per-entry hashes, so it agrees with the order-insensitive equality.
fn unordered_hash<V: Hash>(map: &IndexMap<String, V>) -> u64 {
    map.iter()
        .map(|entry| {
            let mut h = DefaultHasher::new();
            entry.hash(&mut h);
            h.finish()
        })
        .fold(0u64, u64::wrapping_add)
}

/// Builds a [`DeltaModel`]. All collections default to empty; the message
/// digest is required.
#[derive(Debug, Clone, Default)]
pub struct DeltaModelBuilder {
    message_digest: Option<MessageDigest>,
    changed: Vec<EntryNameAndTwoDigestValues>,
    unchanged: Vec<EntryNameAndDigestValue>,
    added: Vec<EntryNameAndDigestValue>,
    removed: Vec<EntryNameAndDigestValue>,
}

impl DeltaModelBuilder {
    pub fn message_digest(mut self, digest: MessageDigest) -> Self {
        self.message_digest = Some(digest);
        self
    }

    pub fn changed_entries(
        mut self,
        entries: impl IntoIterator<Item = EntryNameAndTwoDigestValues>,
    ) -> Self {
        self.changed = entries.into_iter().collect();
        self
    }

    pub fn unchanged_entries(
        mut self,
        entries: impl IntoIterator<Item = EntryNameAndDigestValue>,
    ) -> Self {
        self.unchanged = entries.into_iter().collect();
        self
    }

    pub fn added_entries(mut self, entries: impl IntoIterator<Item = EntryNameAndDigestValue>) -> Self {
        self.added = entries.into_iter().collect();
        self
    }

    pub fn removed_entries(
        mut self,
        entries: impl IntoIterator<Item = EntryNameAndDigestValue>,
    ) -> Self {
        self.removed = entries.into_iter().collect();
        self
    }

    /// The caller must keep the four name sets disjoint; this is not checked.
    pub fn build(self) -> ModelResult<DeltaModel> {
        let digest = self.message_digest.ok_or(ModelError::MissingDigest)?;
        Ok(DeltaModel {
            algorithm: digest.algorithm().name().to_string(),
            digest_byte_length: (!digest.is_native_length()).then_some(digest.length()),
            changed: keyed(self.changed),
            unchanged: keyed(self.unchanged),
            added: keyed(self.added),
            removed: keyed(self.removed),
        })
    }
}

fn keyed<E: Named>(entries: Vec<E>) -> IndexMap<String, E> {
    entries
        .into_iter()
        .map(|e| (e.name().to_string(), e))
        .collect()
}

/// Serializes a name-keyed map as the plain list of its values.
mod entry_list {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{keyed, Named};

    pub(super) fn serialize<S, E>(map: &IndexMap<String, E>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        E: Serialize,
    {
        s.collect_seq(map.values())
    }

    pub(super) fn deserialize<'de, D, E>(d: D) -> Result<IndexMap<String, E>, D::Error>
    where
        D: Deserializer<'de>,
        E: Deserialize<'de> + Named,
    {
        Ok(keyed(Vec::<E>::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;

    fn sample() -> DeltaModel {
        DeltaModel::builder()
            .message_digest(MessageDigest::default())
            .changed_entries([EntryNameAndTwoDigestValues::new("b.txt", "01", "02")])
            .unchanged_entries([
                EntryNameAndDigestValue::new("META-INF/", "e3"),
                EntryNameAndDigestValue::new("a.txt", "aa"),
            ])
            .added_entries([EntryNameAndDigestValue::new("c.txt", "cc")])
            .removed_entries([EntryNameAndDigestValue::new("d.txt", "dd")])
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_digest() {
        let err = DeltaModel::builder().build().unwrap_err();
        assert!(matches!(err, ModelError::MissingDigest));
    }

    #[test]
    fn native_length_is_not_recorded() {
        let model = sample();
        assert_eq!(model.digest_algorithm_name(), "SHA-256");
        assert_eq!(model.digest_byte_length(), None);
    }

    #[test]
    fn truncated_length_is_recorded() {
        let digest = MessageDigest::new(DigestAlgorithm::Sha512).with_length(20).unwrap();
        let model = DeltaModel::builder().message_digest(digest).build().unwrap();
        assert_eq!(model.digest_algorithm_name(), "SHA-512");
        assert_eq!(model.digest_byte_length(), Some(20));
        assert_eq!(model.message_digest().unwrap(), digest);
    }

    #[test]
    fn lookups_by_category() {
        let model = sample();
        assert_eq!(model.changed("b.txt").unwrap().digest_value2(), "02");
        assert_eq!(model.unchanged("a.txt").unwrap().digest_value(), "aa");
        assert!(model.added("a.txt").is_none());
        assert_eq!(model.removed("d.txt").unwrap().digest_value(), "dd");

        let changed = model.lookup(Category::Changed, "b.txt").unwrap();
        assert_eq!(changed.entry_name(), "b.txt");
        assert_eq!(changed.expected_digest(), "02");
        assert!(model.lookup(Category::Removed, "b.txt").is_none());
    }

    #[test]
    fn entries_keep_insertion_order() {
        let model = sample();
        let names: Vec<_> = model.unchanged_entries().map(|e| e.entry_name()).collect();
        assert_eq!(names, ["META-INF/", "a.txt"]);
        let names: Vec<_> = model
            .entries(Category::Unchanged)
            .map(|e| e.entry_name())
            .collect();
        assert_eq!(names, ["META-INF/", "a.txt"]);
    }

    #[test]
    fn json_round_trip() {
        let model = sample();
        let mut buf = Vec::new();
        model.encode(&mut buf).unwrap();
        let decoded = DeltaModel::decode(buf.as_slice()).unwrap();
        assert_eq!(decoded, model);
        let names: Vec<_> = decoded.unchanged_entries().map(|e| e.entry_name()).collect();
        assert_eq!(names, ["META-INF/", "a.txt"]);
    }

    #[test]
    fn json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["algorithm"], "SHA-256");
        assert!(json.get("digestByteLength").is_none());
        assert_eq!(json["changed"][0]["name"], "b.txt");
        assert_eq!(json["changed"][0]["second"], "02");
        assert_eq!(json["added"][0]["digest"], "cc");
    }

    #[test]
    fn missing_lists_decode_as_empty() {
        let model = DeltaModel::decode(&br#"{"algorithm":"SHA-256"}"#[..]).unwrap();
        assert_eq!(model.count(Category::Changed), 0);
        assert_eq!(model.count(Category::Removed), 0);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = DeltaModel::decode(&b"<delta/>"[..]).unwrap_err();
        assert!(matches!(err, ModelError::Codec(_)));
    }

    #[test]
    fn equality_ignores_order_but_hash_agrees() {
        let digest = MessageDigest::default();
        let a = DeltaModel::builder()
            .message_digest(digest)
            .unchanged_entries([
                EntryNameAndDigestValue::new("x", "1"),
                EntryNameAndDigestValue::new("y", "2"),
            ])
            .build()
            .unwrap();
        let b = DeltaModel::builder()
            .message_digest(digest)
            .unchanged_entries([
                EntryNameAndDigestValue::new("y", "2"),
                EntryNameAndDigestValue::new("x", "1"),
            ])
            .build()
            .unwrap();
        assert_eq!(a, b);

        let hash = |m: &DeltaModel| {
            let mut h = DefaultHasher::new();
            m.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(a, sample());
    }

    #[test]
    fn unknown_algorithm_does_not_resolve() {
        let model = DeltaModel::decode(&br#"{"algorithm":"MD5"}"#[..]).unwrap();
        assert!(matches!(model.message_digest(), Err(ModelError::Digest(_))));
    }
}
