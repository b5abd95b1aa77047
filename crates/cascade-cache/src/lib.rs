//! Content-addressed local build cache.
//!
//! [`LocalFsCache`] stores each task's output tree as a `<fingerprint>.tar.zst` archive next to
//! a `<fingerprint>-meta.json` sidecar, and is the default [`BuildCache`] implementation the
//! runner is wired to.

mod archive;

use std::time::Instant;

use async_trait::async_trait;
use cascade_globwalk::{globwalk, WalkType};
use cascade_paths::AbsoluteSystemPathBuf;
pub use cascade_types::cache::{BuildCache, CacheError, CacheFingerprint, CacheOutcome, StoreOutcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    duration_ms: u64,
}

/// A directory of tar+zstd archives keyed by [`CacheFingerprint`], with a JSON sidecar holding
/// the task's recorded duration.
pub struct LocalFsCache {
    cache_dir: AbsoluteSystemPathBuf,
}

impl LocalFsCache {
    pub fn new(cache_dir: AbsoluteSystemPathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(cache_dir.as_path()).map_err(|e| CacheError::Io(e.to_string()))?;
        Ok(Self { cache_dir })
    }

    fn archive_path(&self, fingerprint: &CacheFingerprint) -> std::path::PathBuf {
        self.cache_dir.join(format!("{fingerprint}.tar.zst")).as_path().to_path_buf()
    }

    fn meta_path(&self, fingerprint: &CacheFingerprint) -> AbsoluteSystemPathBuf {
        self.cache_dir.join(format!("{fingerprint}-meta.json"))
    }

    /// Writes the archive to a temp file in the cache directory, then renames it into place, so
    /// a concurrent `try_restore` for the same fingerprint never observes a half-written file.
    fn write_atomically(
        &self,
        fingerprint: &CacheFingerprint,
        project_root: &AbsoluteSystemPathBuf,
        output_globs: &[String],
    ) -> Result<(), CacheError> {
        let files: Vec<AbsoluteSystemPathBuf> = globwalk(project_root, output_globs, &[], WalkType::All)
            .map_err(|e| CacheError::Io(e.to_string()))?
            .into_iter()
            .collect();

        let tmp_path = self.cache_dir.join(format!("{fingerprint}.tar.zst.tmp-{}", std::process::id()));
        archive::create(tmp_path.as_path(), project_root, &files)?;
        std::fs::rename(tmp_path.as_path(), self.archive_path(fingerprint))
            .map_err(|e| CacheError::Io(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BuildCache for LocalFsCache {
    async fn try_restore(
        &self,
        fingerprint: &CacheFingerprint,
        restore_root: &AbsoluteSystemPathBuf,
    ) -> Result<CacheOutcome, CacheError> {
        let archive_path = self.archive_path(fingerprint);
        if !archive_path.exists() {
            debug!(%fingerprint, "cache miss");
            return Ok(CacheOutcome::Miss);
        }
        archive::restore(&archive_path, restore_root)?;
        debug!(%fingerprint, "cache restored");
        Ok(CacheOutcome::Restored)
    }

    async fn try_store(
        &self,
        fingerprint: &CacheFingerprint,
        project_root: &AbsoluteSystemPathBuf,
        output_globs: &[String],
        duration_ms: u64,
    ) -> Result<StoreOutcome, CacheError> {
        if output_globs.is_empty() {
            return Ok(StoreOutcome::Skipped);
        }

        let started = Instant::now();
        self.write_atomically(fingerprint, project_root, output_globs)?;

        let meta = CacheMetadata { duration_ms };
        let meta_json = serde_json::to_string(&meta).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        std::fs::write(self.meta_path(fingerprint).as_path(), meta_json).map_err(|e| CacheError::Io(e.to_string()))?;

        debug!(%fingerprint, elapsed_ms = started.elapsed().as_millis() as u64, "cache stored");
        Ok(StoreOutcome::Stored)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn path(p: &std::path::Path) -> AbsoluteSystemPathBuf {
        AbsoluteSystemPathBuf::new(p.to_path_buf()).unwrap()
    }

    #[tokio::test]
    async fn store_then_restore_round_trips_output_tree() {
        let cache_root = tempdir().unwrap();
        let project = tempdir().unwrap();
        let restore = tempdir().unwrap();

        std::fs::create_dir_all(project.path().join("dist")).unwrap();
        std::fs::write(project.path().join("dist/bundle.js"), b"console.log(1)").unwrap();

        let cache = LocalFsCache::new(path(cache_root.path())).unwrap();
        let fingerprint = CacheFingerprint::new("abc123".to_string());

        let outcome = cache
            .try_store(&fingerprint, &path(project.path()), &["dist/**".to_string()], 42)
            .await
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Stored);

        let outcome = cache.try_restore(&fingerprint, &path(restore.path())).await.unwrap();
        assert_eq!(outcome, CacheOutcome::Restored);

        let restored = std::fs::read(restore.path().join("dist/bundle.js")).unwrap();
        assert_eq!(restored, b"console.log(1)");
    }

    #[tokio::test]
    async fn restore_without_prior_store_is_a_miss() {
        let cache_root = tempdir().unwrap();
        let restore = tempdir().unwrap();
        let cache = LocalFsCache::new(path(cache_root.path())).unwrap();
        let fingerprint = CacheFingerprint::new("missing".to_string());

        let outcome = cache.try_restore(&fingerprint, &path(restore.path())).await.unwrap();
        assert_eq!(outcome, CacheOutcome::Miss);
    }

    #[tokio::test]
    async fn store_with_no_output_globs_is_skipped() {
        let cache_root = tempdir().unwrap();
        let project = tempdir().unwrap();
        let cache = LocalFsCache::new(path(cache_root.path())).unwrap();
        let fingerprint = CacheFingerprint::new("no-outputs".to_string());

        let outcome = cache.try_store(&fingerprint, &path(project.path()), &[], 0).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Skipped);
    }
}
