use std::collections::BTreeMap;

use async_trait::async_trait;
use cascade_paths::AbsoluteSystemPathBuf;
use thiserror::Error;

/// A project's tracked-plus-untracked file contents, reduced to content hashes.
///
/// Keys are repo-relative, `/`-separated paths; the `BTreeMap` ordering is exactly the
/// deterministic, lexicographic ordering the fingerprint and the persisted state file require.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileHashMap(BTreeMap<String, String>);

impl FileHashMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, hash: impl Into<String>) {
        self.0.insert(path.into(), hash.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, h)| (p.as_str(), h.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for FileHashMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("version control is not usable in {0}: {1}")]
    Unavailable(AbsoluteSystemPathBuf, String),
    #[error("failed to hash files: {0}")]
    Hashing(String),
}

/// Produces the current [`FileHashMap`] for a project.
///
/// A concrete implementation may legitimately fail with
/// [`AnalyzerError::Unavailable`] (no VCS present, VCS binary missing, repository in an
/// unusable state). That failure is non-fatal to the scheduler: the caller degrades the
/// project to "always rebuild, never cache".
#[async_trait]
pub trait ChangeAnalyzer: Send + Sync {
    async fn file_hashes(
        &self,
        project_root: &AbsoluteSystemPathBuf,
    ) -> Result<FileHashMap, AnalyzerError>;
}
