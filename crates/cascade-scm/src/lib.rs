//! The change analyzer: produces a project's file-hash map from repository VCS state plus
//! untracked files, for incremental-skip and cache-fingerprint decisions.

#[cfg(test)]
pub mod test_utils;

use async_trait::async_trait;
use cascade_paths::AbsoluteSystemPathBuf;
pub use cascade_types::scm::{AnalyzerError, ChangeAnalyzer, FileHashMap};
use git2::{Repository, StatusOptions};
use tracing::debug;

/// Backed by `git2`: tracked files are hashed by their git object id, untracked (but not
/// ignored) files are hashed with the same `sha1` family git itself uses, so both kinds of
/// entries read identically once computed.
pub struct GitChangeAnalyzer {
    ignore_patterns: Vec<String>,
}

impl GitChangeAnalyzer {
    pub fn new(ignore_patterns: Vec<String>) -> Self {
        Self { ignore_patterns }
    }

    fn compute(&self, project_root: &AbsoluteSystemPathBuf) -> Result<FileHashMap, AnalyzerError> {
        let repo = Repository::discover(project_root.as_path())
            .map_err(|e| AnalyzerError::Unavailable(project_root.clone(), e.to_string()))?;

        let workdir = repo.workdir().ok_or_else(|| {
            AnalyzerError::Unavailable(project_root.clone(), "bare repository has no working directory".to_string())
        })?;
        let repo_root = AbsoluteSystemPathBuf::new(workdir.to_path_buf())
            .map_err(|e| AnalyzerError::Unavailable(project_root.clone(), e.to_string()))?;

        let prefix = project_root
            .relative_to(&repo_root)
            .map(|rel| rel.as_str().to_string())
            .ok_or_else(|| AnalyzerError::Unavailable(project_root.clone(), "project is outside repository".to_string()))?;

        let mut hashes = FileHashMap::new();

        let index = repo.index().map_err(|e| AnalyzerError::Hashing(e.to_string()))?;
        for entry in index.iter() {
            let path = String::from_utf8_lossy(&entry.path).into_owned();
            if let Some(relative) = strip_prefix(&path, &prefix) {
                hashes.insert(relative, entry.id.to_string());
            }
        }

        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts)).map_err(|e| AnalyzerError::Hashing(e.to_string()))?;
        for status in statuses.iter() {
            if !status.status().is_wt_new() {
                continue;
            }
            let Some(path) = status.path() else { continue };
            let Some(relative) = strip_prefix(path, &prefix) else { continue };
            let absolute = repo_root.join(path);
            let hash = cascade_hash::hash_file(absolute.as_path()).map_err(|e| AnalyzerError::Hashing(e.to_string()))?;
            hashes.insert(relative, hash);
        }

        if !self.ignore_patterns.is_empty() {
            let ignored = cascade_globwalk::globwalk(project_root, &self.ignore_patterns, &[], cascade_globwalk::WalkType::Files)
                .map_err(|e| AnalyzerError::Hashing(e.to_string()))?;
            let ignored_relative: std::collections::HashSet<String> = ignored
                .iter()
                .filter_map(|p| p.relative_to(project_root))
                .map(|rel| rel.as_str().to_string())
                .collect();
            hashes = hashes
                .iter()
                .filter(|(path, _)| !ignored_relative.contains(*path))
                .map(|(path, hash)| (path.to_string(), hash.to_string()))
                .collect();
        }

        debug!(project = %project_root, count = hashes.len(), "computed file-hash map");
        Ok(hashes)
    }
}

#[async_trait]
impl ChangeAnalyzer for GitChangeAnalyzer {
    async fn file_hashes(&self, project_root: &AbsoluteSystemPathBuf) -> Result<FileHashMap, AnalyzerError> {
        self.compute(project_root)
    }
}

/// Always reports `Unavailable`, for exercising the "uncacheable / always run" degradation path
/// in tests without a real git repository.
#[derive(Debug, Default)]
pub struct NullChangeAnalyzer;

#[async_trait]
impl ChangeAnalyzer for NullChangeAnalyzer {
    async fn file_hashes(&self, project_root: &AbsoluteSystemPathBuf) -> Result<FileHashMap, AnalyzerError> {
        Err(AnalyzerError::Unavailable(project_root.clone(), "no VCS configured".to_string()))
    }
}

fn strip_prefix(path: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        Some(path.to_string())
    } else {
        path.strip_prefix(prefix)?.strip_prefix('/').map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{commit_all, init_repo, tmp_dir};

    #[tokio::test]
    async fn tracked_and_untracked_files_are_hashed() {
        let (_guard, repo_root) = tmp_dir();
        init_repo(&repo_root);
        std::fs::write(repo_root.as_path().join("tracked.txt"), b"tracked").unwrap();
        commit_all(&repo_root);
        std::fs::write(repo_root.as_path().join("untracked.txt"), b"untracked").unwrap();

        let analyzer = GitChangeAnalyzer::new(vec![]);
        let hashes = analyzer.file_hashes(&repo_root).await.unwrap();

        assert_eq!(hashes.len(), 2);
        assert!(hashes.iter().any(|(p, _)| p == "tracked.txt"));
        assert!(hashes.iter().any(|(p, _)| p == "untracked.txt"));
    }

    #[tokio::test]
    async fn ignore_patterns_exclude_matching_files() {
        let (_guard, repo_root) = tmp_dir();
        init_repo(&repo_root);
        std::fs::write(repo_root.as_path().join("keep.txt"), b"keep").unwrap();
        std::fs::write(repo_root.as_path().join("drop.log"), b"drop").unwrap();
        commit_all(&repo_root);

        let analyzer = GitChangeAnalyzer::new(vec!["*.log".to_string()]);
        let hashes = analyzer.file_hashes(&repo_root).await.unwrap();

        assert_eq!(hashes.len(), 1);
        assert!(hashes.iter().any(|(p, _)| p == "keep.txt"));
    }

    #[tokio::test]
    async fn non_repository_reports_unavailable() {
        let (_guard, dir) = tmp_dir();
        let analyzer = GitChangeAnalyzer::new(vec![]);
        let err = analyzer.file_hashes(&dir).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Unavailable(_, _)));
    }

    #[tokio::test]
    async fn null_analyzer_always_reports_unavailable() {
        let (_guard, dir) = tmp_dir();
        let analyzer = NullChangeAnalyzer;
        let err = analyzer.file_hashes(&dir).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Unavailable(_, _)));
    }
}
