use std::fmt;

use async_trait::async_trait;
use cascade_paths::AbsoluteSystemPathBuf;
use thiserror::Error;

/// A stable hex digest derived from a task's command string, its sorted file-hash map, the
/// scheduler's tool-version tag, and any project-configuration tag. Equal fingerprints imply
/// interchangeable outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CacheFingerprint(String);

impl CacheFingerprint {
    pub fn new(hex_digest: String) -> Self {
        Self(hex_digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Restored,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    Skipped,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(String),
    #[error("cache archive is corrupt: {0}")]
    Corrupt(String),
}

/// The content-addressed artifact store the runner restores outputs from and stores them to.
///
/// Implementations must be race-safe: concurrent `try_restore` calls for the same fingerprint
/// must each either restore or miss, never observe a partially-written archive.
#[async_trait]
pub trait BuildCache: Send + Sync {
    async fn try_restore(
        &self,
        fingerprint: &CacheFingerprint,
        restore_root: &AbsoluteSystemPathBuf,
    ) -> Result<CacheOutcome, CacheError>;

    async fn try_store(
        &self,
        fingerprint: &CacheFingerprint,
        project_root: &AbsoluteSystemPathBuf,
        output_globs: &[String],
        duration_ms: u64,
    ) -> Result<StoreOutcome, CacheError>;
}
