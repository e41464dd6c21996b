//! Archive-level settings, threaded explicitly from the caller into
//! `Archive` - there is no process-wide mutable chunk-size constant.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 4 MiB - the default chunk size, overridable per archive.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub directory: PathBuf,
    pub name: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

impl ArchiveConfig {
    pub fn new(directory: &Path, name: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            name: name.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Load settings from a small YAML file, e.g. to pin a non-default
    /// chunk size for an existing archive.
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::Error::Config(format!("invalid config file {}: {}", path.display(), e)))
    }
}
