//! Content-fingerprint cache for generated asset sets.
//!
//! Favicon rendering and icon-font synthesis are skipped when nothing that
//! feeds them has changed since the last successful run. Each cached task
//! keeps one record:
//!
//! ```text
//! .sitepack-cache/
//! ├── favicon.json     # { version, fingerprint, outputs }
//! ├── favicon/         # the favicon set itself (survives `dist/` cleaning)
//! └── iconfont.json
//! ```
//!
//! ## Fingerprints
//!
//! A fingerprint is a SHA-256 over a task tag, the serialized options, and
//! the *contents* of every input file (plus its path). Content-based rather
//! than mtime-based so it survives `git checkout`, which resets modification
//! times.
//!
//! A cache hit requires:
//! 1. A record for the task key with a matching fingerprint
//! 2. Every output listed in the record still exists on disk
//!
//! Records live outside the output directory, so the production clean stage
//! does not invalidate them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Version of the record format. Bump this to invalidate all existing
/// caches when the format or fingerprint computation changes.
const RECORD_VERSION: u32 = 1;

/// Persisted fingerprint of one task's last successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRecord {
    pub version: u32,
    pub fingerprint: String,
    /// Output paths, relative to the base directory given to [`CacheRecord::is_fresh`].
    pub outputs: Vec<String>,
}

impl CacheRecord {
    pub fn new(fingerprint: String, outputs: Vec<String>) -> Self {
        Self {
            version: RECORD_VERSION,
            fingerprint,
            outputs,
        }
    }

    /// Load the record for `key`. Returns `None` if it doesn't exist or
    /// can't be parsed (version mismatch, corruption).
    pub fn load(cache_dir: &Path, key: &str) -> Option<Self> {
        let content = std::fs::read_to_string(record_path(cache_dir, key)).ok()?;
        let record: Self = serde_json::from_str(&content).ok()?;
        (record.version == RECORD_VERSION).then_some(record)
    }

    pub fn save(&self, cache_dir: &Path, key: &str) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(record_path(cache_dir, key), json)
    }

    /// True when the fingerprint matches and every recorded output exists
    /// under `base`.
    pub fn is_fresh(&self, fingerprint: &str, base: &Path) -> bool {
        self.fingerprint == fingerprint && self.outputs.iter().all(|o| base.join(o).exists())
    }
}

/// Check the record for `key` against a freshly computed fingerprint.
pub fn lookup(cache_dir: &Path, key: &str, fingerprint: &str, base: &Path) -> CacheStatus {
    match CacheRecord::load(cache_dir, key) {
        Some(record) if record.is_fresh(fingerprint, base) => CacheStatus::Cached,
        _ => CacheStatus::Generated,
    }
}

/// Path of the record file for a task key.
pub fn record_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(format!("{key}.json"))
}

/// Incremental SHA-256 over everything a generated set depends on.
///
/// Every field is length-prefixed so `("ab", "c")` and `("a", "bc")` hash
/// differently.
pub struct Fingerprinter {
    hasher: Sha256,
}

impl Fingerprinter {
    /// Start a fingerprint; `tag` separates tasks that share inputs.
    pub fn new(tag: &str) -> Self {
        let mut fp = Self {
            hasher: Sha256::new(),
        };
        fp.hasher.update(RECORD_VERSION.to_le_bytes());
        fp.field(tag.as_bytes());
        fp
    }

    fn field(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn str(mut self, value: &str) -> Self {
        self.field(value.as_bytes());
        self
    }

    /// Mix in serialized options.
    pub fn options<T: Serialize>(self, options: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(options)?;
        Ok(self.str(&json))
    }

    /// Mix in a file: its label (usually a relative path) and its contents.
    pub fn file(mut self, label: &str, path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        self.field(label.as_bytes());
        self.field(&bytes);
        Ok(self)
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// Whether a cached task reused its previous outputs or produced new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    Cached,
    Generated,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Cached => f.write_str("cached"),
            CacheStatus::Generated => f.write_str("generated"),
        }
    }
}
