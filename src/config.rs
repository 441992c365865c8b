use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::Compression;
use crate::digest::MessageDigest;
use crate::error::{ConfigError, ConfigResult, DigestError};

/// Settings for computing and applying deltas, usually read from a JSON file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DeltaConfig {
    pub algorithm: String,
    pub digest_byte_length: Option<usize>,
    pub compression: Compression,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            algorithm: "SHA-256".into(),
            digest_byte_length: None,
            compression: Compression::default(),
        }
    }
}

impl DeltaConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let txt = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&txt).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` if given, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn message_digest(&self) -> Result<MessageDigest, DigestError> {
        let digest = MessageDigest::from_name(&self.algorithm)?;
        match self.digest_byte_length {
            Some(len) => digest.with_length(len),
            None => Ok(digest),
        }
    }
}
