//! Binds each task to its declared output-file globs and mediates restore/store against a
//! [`BuildCache`] around task execution.

use std::{collections::HashMap, sync::Arc};

use cascade_paths::AbsoluteSystemPathBuf;
use cascade_task_id::TaskId;
pub use cascade_types::cache::{BuildCache, CacheError, CacheFingerprint, CacheOutcome, StoreOutcome};

/// A `BuildCache` handle plus the per-task output globs needed to call it. One instance is
/// shared by every task the runner executes in a build.
pub struct RunCache {
    cache: Arc<dyn BuildCache>,
    output_globs: HashMap<TaskId, Vec<String>>,
}

impl RunCache {
    pub fn new(cache: Arc<dyn BuildCache>) -> Self {
        Self { cache, output_globs: HashMap::new() }
    }

    /// Declares the output globs a task's command is expected to produce. Must be called
    /// before `store` is invoked for that task; a task with no declared outputs always stores
    /// as `Skipped`.
    pub fn bind(&mut self, task: TaskId, output_globs: Vec<String>) {
        self.output_globs.insert(task, output_globs);
    }

    pub async fn restore(
        &self,
        fingerprint: &CacheFingerprint,
        restore_root: &AbsoluteSystemPathBuf,
    ) -> Result<CacheOutcome, CacheError> {
        self.cache.try_restore(fingerprint, restore_root).await
    }

    pub async fn store(
        &self,
        task: &TaskId,
        fingerprint: &CacheFingerprint,
        project_root: &AbsoluteSystemPathBuf,
        duration_ms: u64,
    ) -> Result<StoreOutcome, CacheError> {
        let globs = self.output_globs.get(task).cloned().unwrap_or_default();
        self.cache.try_store(fingerprint, project_root, &globs, duration_ms).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingCache {
        stored: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl BuildCache for RecordingCache {
        async fn try_restore(&self, _fingerprint: &CacheFingerprint, _restore_root: &AbsoluteSystemPathBuf) -> Result<CacheOutcome, CacheError> {
            Ok(CacheOutcome::Miss)
        }

        async fn try_store(
            &self,
            fingerprint: &CacheFingerprint,
            _project_root: &AbsoluteSystemPathBuf,
            output_globs: &[String],
            _duration_ms: u64,
        ) -> Result<StoreOutcome, CacheError> {
            self.stored.lock().unwrap().push((fingerprint.as_str().to_string(), output_globs.to_vec()));
            Ok(StoreOutcome::Stored)
        }
    }

    #[tokio::test]
    async fn store_uses_the_bound_globs_for_that_task() {
        let cache = Arc::new(RecordingCache::default());
        let mut run_cache = RunCache::new(cache.clone());
        let task = TaskId::new("web#build").unwrap();
        run_cache.bind(task.clone(), vec!["dist/**".to_string()]);

        let root = AbsoluteSystemPathBuf::new("/repo/web").unwrap();
        let fingerprint = CacheFingerprint::new("fp".to_string());
        run_cache.store(&task, &fingerprint, &root, 10).await.unwrap();

        let stored = cache.stored.lock().unwrap();
        assert_eq!(stored.as_slice(), &[("fp".to_string(), vec!["dist/**".to_string()])]);
    }

    #[tokio::test]
    async fn store_for_unbound_task_uses_no_globs() {
        let cache = Arc::new(RecordingCache::default());
        let run_cache = RunCache::new(cache.clone());
        let task = TaskId::new("web#build").unwrap();

        let root = AbsoluteSystemPathBuf::new("/repo/web").unwrap();
        let fingerprint = CacheFingerprint::new("fp".to_string());
        run_cache.store(&task, &fingerprint, &root, 10).await.unwrap();

        let stored = cache.stored.lock().unwrap();
        assert_eq!(stored.as_slice(), &[("fp".to_string(), Vec::<String>::new())]);
    }
}
