//! End-to-end patching of ZIP and JAR files on disk.

use std::io::{Read, Write};
use std::path::Path;

use jardelta::{
    diff, patch, ArchiveDefect, ArchiveInput, ArchiveOutput, ArchiveSink, ArchiveSource,
    DeltaModel, EntryNameAndDigestValue, EntryNameAndTwoDigestValues, MessageDigest, PatchError,
    ZipStore, MODEL_ENTRY_NAME,
};

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> ZipStore {
    let store = ZipStore::zip(path);
    let mut output = store.create().unwrap();
    for (name, data) in entries {
        let entry = output.entry(name);
        output.writer(&entry).unwrap().write_all(data).unwrap();
    }
    output.finish().unwrap();
    store
}

fn read_zip(store: &ZipStore) -> Vec<(String, Vec<u8>)> {
    let mut input = store.open().unwrap();
    input
        .entries()
        .into_iter()
        .map(|entry| {
            let mut data = Vec::new();
            input.reader(&entry).unwrap().read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

fn sha(data: &[u8]) -> String {
    MessageDigest::default().digest_value(data)
}

fn example_model() -> DeltaModel {
    DeltaModel::builder()
        .message_digest(MessageDigest::default())
        .unchanged_entries([EntryNameAndDigestValue::new("a.txt", sha(b"hi"))])
        .changed_entries([EntryNameAndTwoDigestValues::new("b.txt", sha(b"bye"), sha(b"later"))])
        .added_entries([EntryNameAndDigestValue::new("c.txt", sha(b"new"))])
        .build()
        .unwrap()
}

#[test]
fn patches_zip_files() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_zip(&dir.path().join("first.zip"), &[("a.txt", b"hi"), ("b.txt", b"bye")]);
    let json = example_model().to_json().unwrap();
    let delta = write_zip(
        &dir.path().join("delta.zip"),
        &[
            (MODEL_ENTRY_NAME, json.as_bytes()),
            ("b.txt", b"later"),
            ("c.txt", b"new"),
        ],
    );
    let second = ZipStore::zip(dir.path().join("second.zip"));

    let stats = patch(&first, &delta, &second).unwrap();
    assert_eq!(stats.entries(), 3);
    assert_eq!(
        read_zip(&second),
        [
            ("a.txt".to_string(), b"hi".to_vec()),
            ("b.txt".to_string(), b"later".to_vec()),
            ("c.txt".to_string(), b"new".to_vec()),
        ]
    );
}

#[test]
fn wrong_base_archive_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_zip(&dir.path().join("first.zip"), &[("a.txt", b"HI"), ("b.txt", b"bye")]);
    let json = example_model().to_json().unwrap();
    let delta = write_zip(
        &dir.path().join("delta.zip"),
        &[
            (MODEL_ENTRY_NAME, json.as_bytes()),
            ("b.txt", b"later"),
            ("c.txt", b"new"),
        ],
    );
    let err = patch(&first, &delta, &ZipStore::zip(dir.path().join("second.zip"))).unwrap_err();
    assert!(matches!(
        err,
        PatchError::WrongFirstArchive(ArchiveDefect::DigestMismatch { .. })
    ));
}

#[test]
fn delta_without_added_content_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_zip(&dir.path().join("first.zip"), &[("a.txt", b"hi"), ("b.txt", b"bye")]);
    let json = example_model().to_json().unwrap();
    let delta = write_zip(
        &dir.path().join("delta.zip"),
        &[(MODEL_ENTRY_NAME, json.as_bytes()), ("b.txt", b"later")],
    );
    let err = patch(&first, &delta, &ZipStore::zip(dir.path().join("second.zip"))).unwrap_err();
    assert!(matches!(
        err,
        PatchError::InvalidDeltaArchive(ArchiveDefect::MissingEntry(ref name)) if name == "c.txt"
    ));
}

#[test]
fn diff_then_patch_reproduces_second_jar() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_v1: &[u8] = b"Manifest-Version: 1.0\r\nImplementation-Version: 1\r\n";
    let manifest_v2: &[u8] = b"Manifest-Version: 1.0\r\nImplementation-Version: 2\r\n";
    let first = write_zip(
        &dir.path().join("app-1.jar"),
        &[
            ("META-INF/", b""),
            ("META-INF/MANIFEST.MF", manifest_v1),
            ("com/example/Main.class", b"main v1"),
            ("com/example/Util.class", b"util"),
            ("lib/old.jar", b"old library"),
        ],
    );
    let second = write_zip(
        &dir.path().join("app-2.jar"),
        &[
            ("com/example/Util.class", b"util"),
            ("com/example/Main.class", b"main v2"),
            ("META-INF/", b""),
            ("META-INF/MANIFEST.MF", manifest_v2),
            ("lib/new.jar", b"new library"),
        ],
    );
    let delta = ZipStore::zip(dir.path().join("app.delta.zip"));

    let model = diff(&first, &second, &delta, MessageDigest::default()).unwrap();
    assert!(model.changed("META-INF/MANIFEST.MF").is_some());
    assert!(model.removed("lib/old.jar").is_some());
    assert!(model.unchanged("com/example/Util.class").is_some());

    let delta_names: Vec<_> = read_zip(&delta).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        delta_names,
        [MODEL_ENTRY_NAME, "com/example/Main.class", "META-INF/MANIFEST.MF", "lib/new.jar"]
    );

    let rebuilt = ZipStore::for_path(dir.path().join("rebuilt.jar"));
    assert!(rebuilt.is_jar());
    patch(&first, &delta, &rebuilt).unwrap();

    let entries = read_zip(&rebuilt);
    assert_eq!(entries[0], ("META-INF/MANIFEST.MF".to_string(), manifest_v2.to_vec()));
    let mut rebuilt_files: Vec<_> = entries;
    rebuilt_files.sort();
    let mut expected: Vec<_> = read_zip(&second)
        .into_iter()
        .filter(|(name, _)| !name.ends_with('/'))
        .collect();
    expected.sort();
    assert_eq!(rebuilt_files, expected);
}

#[test]
fn patching_in_place_replaces_the_base_archive() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_zip(&dir.path().join("app.zip"), &[("a.txt", b"hi"), ("b.txt", b"bye")]);
    let json = example_model().to_json().unwrap();
    let delta = write_zip(
        &dir.path().join("delta.zip"),
        &[
            (MODEL_ENTRY_NAME, json.as_bytes()),
            ("b.txt", b"later"),
            ("c.txt", b"new"),
        ],
    );

    patch(&first, &delta, &first).unwrap();
    let names: Vec<_> = read_zip(&first).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn failed_in_place_patch_keeps_the_base_archive() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_zip(&dir.path().join("app.zip"), &[("a.txt", b"hi"), ("b.txt", b"bye")]);
    let json = example_model().to_json().unwrap();
    let delta = write_zip(
        &dir.path().join("delta.zip"),
        &[(MODEL_ENTRY_NAME, json.as_bytes()), ("b.txt", b"later")],
    );

    assert!(patch(&first, &delta, &first).is_err());
    assert_eq!(
        read_zip(&first),
        [
            ("a.txt".to_string(), b"hi".to_vec()),
            ("b.txt".to_string(), b"bye".to_vec()),
        ]
    );
    // Only app.zip and delta.zip, no stray temporary file.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

    // The same base archive still patches once the delta is complete.
    let complete = write_zip(
        &dir.path().join("delta.zip"),
        &[
            (MODEL_ENTRY_NAME, json.as_bytes()),
            ("b.txt", b"later"),
            ("c.txt", b"new"),
        ],
    );
    assert_eq!(patch(&first, &complete, &first).unwrap().entries(), 3);
}

#[test]
fn unchanged_manifest_leads_the_jar() {
    let dir = tempfile::tempdir().unwrap();
    let manifest: &[u8] = b"Manifest-Version: 1.0\r\n";
    let first = write_zip(
        &dir.path().join("app-1.jar"),
        &[("a.class", b"A"), ("META-INF/MANIFEST.MF", manifest)],
    );
    let model = DeltaModel::builder()
        .message_digest(MessageDigest::default())
        .unchanged_entries([
            EntryNameAndDigestValue::new("a.class", sha(b"A")),
            EntryNameAndDigestValue::new("META-INF/MANIFEST.MF", sha(manifest)),
        ])
        .build()
        .unwrap();
    let json = model.to_json().unwrap();
    let delta = write_zip(&dir.path().join("delta.zip"), &[(MODEL_ENTRY_NAME, json.as_bytes())]);

    let jar = ZipStore::for_path(dir.path().join("app-2.jar"));
    patch(&first, &delta, &jar).unwrap();
    let names: Vec<_> = read_zip(&jar).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["META-INF/MANIFEST.MF", "a.class"]);
}
