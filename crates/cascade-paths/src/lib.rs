//! Typed path newtypes shared across cascade crates.
//!
//! Three flavors, each a thin wrapper over `PathBuf`/`String` so that mixing up "absolute
//! filesystem path", "path relative to a project, in the repo's on-disk separator style", and
//! "path relative to the repo root, always `/`-separated" is a compile error rather than a
//! runtime surprise. The unix-separator distinction matters because file-hash maps and cache
//! archives are persisted as JSON/tar entries that must be stable across platforms.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use path_slash::{PathBufExt, PathExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathValidationError {
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
    #[error("path is not absolute: {0}")]
    NotAbsolute(PathBuf),
    #[error("path is not relative: {0}")]
    NotRelative(PathBuf),
}

/// An absolute, validated filesystem path (a project root, a repo root, a cache directory).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbsoluteSystemPathBuf(PathBuf);

impl AbsoluteSystemPathBuf {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PathValidationError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(PathValidationError::NotAbsolute(path));
        }
        Ok(Self(path))
    }

    /// Builds an absolute path from a known-absolute base plus a relative tail, without
    /// re-validating the result against the filesystem.
    pub fn join(&self, tail: impl AsRef<Path>) -> Self {
        Self(self.0.join(tail))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn to_str(&self) -> Result<&str, PathValidationError> {
        self.0
            .to_str()
            .ok_or_else(|| PathValidationError::NonUtf8(self.0.clone()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }

    /// Expresses `self` as a path relative to `base`, in repo-relative unix form.
    pub fn relative_to(&self, base: &AbsoluteSystemPathBuf) -> Option<RelativeUnixPathBuf> {
        let rel = self.0.strip_prefix(&base.0).ok()?;
        RelativeUnixPathBuf::new(rel).ok()
    }
}

impl fmt::Display for AbsoluteSystemPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsoluteSystemPathBuf {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// A repo-relative path, always `/`-separated regardless of host platform.
///
/// This is the form persisted in file-hash maps, state files, and cache archive entries, so
/// that a build state file produced on Windows and restored on Linux (or vice versa) compares
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativeUnixPathBuf(String);

impl RelativeUnixPathBuf {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PathValidationError> {
        let path = path.as_ref();
        if path.is_absolute() {
            return Err(PathValidationError::NotRelative(path.to_path_buf()));
        }
        let unix = path
            .to_slash()
            .ok_or_else(|| PathValidationError::NonUtf8(path.to_path_buf()))?;
        Ok(Self(unix.into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts back to a platform-native relative path.
    pub fn to_system_path(&self) -> PathBuf {
        PathBuf::from_slash(&self.0)
    }
}

impl fmt::Display for RelativeUnixPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A path anchored to (i.e. relative to) a known root, kept in platform-native separator form.
///
/// Used for cache-archive restore targets, where the path must be joined back onto an
/// `AbsoluteSystemPathBuf` with ordinary filesystem semantics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchoredSystemPathBuf(PathBuf);

impl AnchoredSystemPathBuf {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PathValidationError> {
        let path = path.into();
        if path.is_absolute() {
            return Err(PathValidationError::NotRelative(path));
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn resolve(&self, root: &AbsoluteSystemPathBuf) -> AbsoluteSystemPathBuf {
        root.join(&self.0)
    }
}

impl From<RelativeUnixPathBuf> for AnchoredSystemPathBuf {
    fn from(rel: RelativeUnixPathBuf) -> Self {
        Self(rel.to_system_path())
    }
}

impl fmt::Display for AnchoredSystemPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
