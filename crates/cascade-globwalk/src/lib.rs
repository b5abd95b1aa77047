//! Glob-based file walking shared by the change analyzer's ignore-pattern filtering and the
//! build cache's output-glob expansion. Both consumers get the same glob dialect (`wax`), so a
//! project's declared ignores and declared cache outputs read the same way.

use std::{
    borrow::Cow,
    collections::HashSet,
    io::ErrorKind,
    path::PathBuf,
};

use cascade_paths::AbsoluteSystemPathBuf;
use itertools::Itertools;
use path_slash::PathExt;
use wax::{BuildError, Glob, Pattern};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum WalkType {
    Files,
    Folders,
    All,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("bad pattern {0}: {1}")]
    BadPattern(String, BuildError),
    #[error("invalid path")]
    InvalidPath,
    #[error(transparent)]
    WaxWalk(#[from] wax::WalkError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Performs a glob walk, yielding paths that match an include pattern (an empty include list
/// means "everything") and don't match any exclude pattern.
///
/// Roughly: prepend the slashified base path to each include/exclude, collapse `.`/`..`
/// segments, and compute a new base path as the longest common prefix across all includes —
/// traversing above it is never necessary. Matching `wax::Glob::walk` then does the actual
/// filesystem traversal per include pattern, each with the same exclude set applied.
pub fn globwalk(
    base_path: &AbsoluteSystemPathBuf,
    include: &[String],
    exclude: &[String],
    walk_type: WalkType,
) -> Result<HashSet<AbsoluteSystemPathBuf>, WalkError> {
    let owned_include;
    let include = if include.is_empty() {
        owned_include = vec!["**".to_string()];
        &owned_include
    } else {
        include
    };

    let (base_path_new, include_paths, exclude_paths) =
        preprocess_paths_and_globs(base_path, include, exclude)?;
    let inc_patterns = include_paths
        .iter()
        .map(glob_with_contextual_error)
        .collect::<Result<Vec<_>, WalkError>>()?;
    let ex_patterns = exclude_paths
        .iter()
        .map(glob_with_contextual_error)
        .collect::<Result<Vec<_>, _>>()?;

    let result = inc_patterns
        .into_iter()
        .flat_map(|glob| {
            // An include glob with no meta characters names an exact path; check it directly
            // rather than walking the filesystem for it.
            if let Some(prefix) = glob.variance().path() {
                assert!(prefix.is_absolute(), "found relative glob path {glob}");
                match std::fs::symlink_metadata(prefix) {
                    Err(e) if e.kind() == ErrorKind::NotFound => vec![],
                    Err(e) => vec![Err(e.into())],
                    Ok(md) if walk_type == WalkType::Files && md.is_dir() => vec![],
                    Ok(_) => vec![AbsoluteSystemPathBuf::new(prefix.to_path_buf())
                        .map_err(|_| WalkError::InvalidPath)],
                }
            } else {
                glob.walk(&base_path_new)
                    .not(ex_patterns.iter().cloned())
                    .unwrap_or_else(|e| {
                        panic!("failed to compile exclusion globs {ex_patterns:?}: {e}")
                    })
                    .filter_map(|entry| match entry {
                        Ok(entry) if walk_type == WalkType::Files && entry.file_type().is_dir() => {
                            None
                        }
                        Ok(entry) => Some(
                            AbsoluteSystemPathBuf::new(entry.path().to_path_buf())
                                .map_err(|_| WalkError::InvalidPath),
                        ),
                        Err(e) => Some(Err(e.into())),
                    })
                    .collect::<Vec<_>>()
            }
        })
        .collect::<Result<HashSet<_>, WalkError>>()?;
    Ok(result)
}

fn join_unix_like_paths(a: &str, b: &str) -> String {
    [a.trim_end_matches('/'), "/", b.trim_start_matches('/')].concat()
}

fn preprocess_paths_and_globs(
    base_path: &AbsoluteSystemPathBuf,
    include: &[String],
    exclude: &[String],
) -> Result<(PathBuf, Vec<String>, Vec<String>), WalkError> {
    let base_path_slash = base_path
        .as_path()
        .to_slash()
        .map(|s| s.replace(':', "\\:"))
        .ok_or(WalkError::InvalidPath)?;

    let (include_paths, lowest_segment) = include
        .iter()
        .map(|s| join_unix_like_paths(&base_path_slash, s))
        .filter_map(|s| collapse_path(&s).map(|(s, v)| (s.to_string(), v)))
        .fold((vec![], usize::MAX), |(mut vec, lowest), (path, next)| {
            vec.push(path);
            (vec, std::cmp::min(lowest, next))
        });

    let base_path_new = base_path
        .as_path()
        .components()
        .take(lowest_segment.saturating_add(1))
        .collect::<PathBuf>();

    let mut exclude_paths = vec![];
    for split in exclude
        .iter()
        .map(|s| join_unix_like_paths(&base_path_slash, s))
        .filter_map(|g| collapse_path(&g).map(|(s, _)| s.to_string()))
    {
        if split.ends_with('/') {
            if split.ends_with("**/") {
                exclude_paths.push(split[..split.len() - 1].to_string());
            } else {
                exclude_paths.push(format!("{split}**"));
            }
        } else if split.ends_with("/**") {
            exclude_paths.push(split);
        } else {
            exclude_paths.push(format!("{split}/**"));
            exclude_paths.push(split);
        }
    }

    Ok((base_path_new, include_paths, exclude_paths))
}

/// Collapses `.`/`..` segments out of a path, returning the rewritten path plus the index of
/// the shallowest segment a collapse touched (used to compute the walk's new base path).
fn collapse_path(path: &str) -> Option<(Cow<str>, usize)> {
    let mut stack: Vec<&str> = vec![];
    let mut changed = false;
    let is_root = path.starts_with('/');
    let mut lowest_index = None;

    for segment in path.trim_start_matches('/').split('/') {
        match segment {
            ".." => {
                stack.pop()?;
                lowest_index.get_or_insert(stack.len());
                changed = true;
            }
            "." => {
                lowest_index.get_or_insert(stack.len());
                changed = true;
            }
            _ => stack.push(segment),
        }
        if let Some(lowest_index) = lowest_index.as_mut() {
            *lowest_index = (*lowest_index).min(stack.len());
        }
    }

    let lowest_index = lowest_index.unwrap_or(stack.len());
    if !changed {
        Some((Cow::Borrowed(path), lowest_index))
    } else {
        let string = if is_root {
            std::iter::once("").chain(stack).join("/")
        } else {
            stack.join("/")
        };
        Some((Cow::Owned(string), lowest_index))
    }
}

fn glob_with_contextual_error<S: AsRef<str>>(raw: S) -> Result<Glob<'static>, WalkError> {
    let raw = raw.as_ref();
    Glob::new(raw)
        .map(|g| g.into_owned())
        .map_err(|e| WalkError::BadPattern(raw.to_string(), e))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("a/./././b", "a/b", 1 ; "dot segments")]
    #[test_case("a/../b", "b", 0 ; "dotdot segments")]
    #[test_case("a/./../b", "b", 0 ; "mixed dot and dotdot segments")]
    #[test_case("./a/b", "a/b", 0 ; "leading dot segment")]
    #[test_case("a/b/..", "a", 1 ; "trailing dotdot segment")]
    #[test_case("a/b/.", "a/b", 2 ; "trailing dot segment")]
    #[test_case("/a/./././b", "/a/b", 1 ; "leading slash with dot segments")]
    #[test_case("/a/../b", "/b", 0 ; "leading slash with dotdot segments")]
    fn test_collapse_path(input: &str, expected: &str, lowest_segment: usize) {
        let (collapsed, lowest) = collapse_path(input).unwrap();
        assert_eq!(collapsed, expected);
        assert_eq!(lowest, lowest_segment);
    }

    #[test]
    fn test_collapse_path_rejects_escaping_root() {
        assert!(collapse_path("../a").is_none());
    }

    #[test]
    fn empty_include_means_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "").unwrap();

        let base = AbsoluteSystemPathBuf::new(dir.path().to_path_buf()).unwrap();
        let found = globwalk(&base, &[], &[], WalkType::Files).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn exclude_overrides_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("b.log"), "").unwrap();

        let base = AbsoluteSystemPathBuf::new(dir.path().to_path_buf()).unwrap();
        let found = globwalk(
            &base,
            &["**/*".to_string()],
            &["*.log".to_string()],
            WalkType::Files,
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.iter().any(|p| p.as_path().ends_with("a.txt")));
    }
}
