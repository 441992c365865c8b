use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ArchiveEntry, ArchiveInput, ArchiveOutput, ArchiveSink, ArchiveSource};

// Recompressing these gains nothing.
const COMPRESSED_EXTENSIONS: [&str; 6] = ["ear", "jar", "war", "zip", "gz", "xz"];

const JAR_EXTENSIONS: [&str; 3] = ["jar", "war", "ear"];

/// Compression applied to entries written by a [`ZipStore`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Stored,
    Zstd,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
            Compression::Zstd => CompressionMethod::Zstd,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::Deflate => "deflate",
            Compression::Stored => "stored",
            Compression::Zstd => "zstd",
        })
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deflate" | "deflated" => Ok(Compression::Deflate),
            "stored" | "store" | "none" => Ok(Compression::Stored),
            "zstd" => Ok(Compression::Zstd),
            other => Err(format!("unknown compression: {other}")),
        }
    }
}

/// A ZIP or JAR file on disk, usable as archive source and sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipStore {
    path: PathBuf,
    jar: bool,
    compression: Compression,
}

impl ZipStore {
    pub fn zip(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            jar: false,
            compression: Compression::default(),
        }
    }

    /// A store whose output keeps the JAR manifest in front.
    pub fn jar(path: impl Into<PathBuf>) -> Self {
        Self {
            jar: true,
            ..Self::zip(path)
        }
    }

    /// Picks [`ZipStore::jar`] for `.jar`, `.war` and `.ear` files.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if has_extension(&path, &JAR_EXTENSIONS) {
            Self::jar(path)
        } else {
            Self::zip(path)
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_jar(&self) -> bool {
        self.jar
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

fn zip_error(e: ZipError) -> io::Error {
    match e {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// An opened ZIP file. Entry sizes come from the central directory.
pub struct ZipInput {
    archive: ZipArchive<BufReader<File>>,
    sizes: IndexMap<String, u64>,
}

impl ArchiveInput for ZipInput {
    fn entries(&self) -> Vec<ArchiveEntry> {
        self.sizes
            .iter()
            .map(|(name, size)| ArchiveEntry::new(name.as_str()).with_size(Some(*size)))
            .collect()
    }

    fn entry(&self, name: &str) -> Option<ArchiveEntry> {
        self.sizes
            .get(name)
            .map(|size| ArchiveEntry::new(name).with_size(Some(*size)))
    }

    fn reader(&mut self, entry: &ArchiveEntry) -> io::Result<Box<dyn Read + '_>> {
        let file = self.archive.by_name(entry.name()).map_err(zip_error)?;
        Ok(Box::new(file))
    }
}

/// A ZIP file being written. Entries go to a temporary file next to the
/// target, which replaces the target only on [`ArchiveOutput::finish`].
pub struct ZipOutput {
    zip: ZipWriter<BufWriter<NamedTempFile>>,
    path: PathBuf,
    jar: bool,
    compression: Compression,
}

impl ArchiveOutput for ZipOutput {
    fn is_manifest_order_sensitive(&self) -> bool {
        self.jar
    }

    fn writer(&mut self, entry: &ArchiveEntry) -> io::Result<Box<dyn Write + '_>> {
        let method = if has_extension(Path::new(entry.name()), &COMPRESSED_EXTENSIONS) {
            CompressionMethod::Stored
        } else {
            self.compression.method()
        };
        let len = entry.size().unwrap_or(0);
        let options = FileOptions::<()>::default()
            .compression_method(method)
            .unix_permissions(0o644)
            .large_file(len > 0xffffffff);

        self.zip
            .start_file(entry.name(), options)
            .map_err(zip_error)?;
        Ok(Box::new(&mut self.zip))
    }

    fn finish(self) -> io::Result<()> {
        let file = self.zip.finish().map_err(zip_error)?;
        let file = file.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ArchiveSource for ZipStore {
    type Input = ZipInput;

    fn open(&self) -> io::Result<ZipInput> {
        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(zip_error)?;

        let mut sizes = IndexMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(zip_error)?;
            sizes.insert(file.name().to_string(), file.size());
        }
        Ok(ZipInput { archive, sizes })
    }
}

impl ArchiveSink for ZipStore {
    type Output = ZipOutput;

    /// Leaves `path` alone until the output is finished, so the target may
    /// also be one of the inputs.
    fn create(&self) -> io::Result<ZipOutput> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(".jardelta-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        Ok(ZipOutput {
            zip: ZipWriter::new(BufWriter::new(file)),
            path: self.path.clone(),
            jar: self.jar,
            compression: self.compression,
        })
    }
}
