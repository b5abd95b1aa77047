//! The identifier used for a task in a single build invocation.
//!
//! A task's name is exactly its project's package name: there is one task per selected project
//! per invocation, so unlike a per-script task id, `TaskId` has no separate script component. It
//! is still its own type (rather than a bare `String`) so a project name and a task name can't
//! be swapped by accident at a call site.

use std::{borrow::Borrow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskIdError {
    #[error("task name cannot be empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(name: impl Into<String>) -> Result<Self, TaskIdError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TaskIdError::Empty);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_names() {
        assert_eq!(TaskId::new(""), Err(TaskIdError::Empty));
    }

    #[test]
    fn orders_lexicographically() {
        let mut ids = vec![
            TaskId::new("web").unwrap(),
            TaskId::new("api").unwrap(),
            TaskId::new("docs").unwrap(),
        ];
        ids.sort();
        assert_eq!(
            ids.iter().map(TaskId::as_str).collect::<Vec<_>>(),
            vec!["api", "docs", "web"]
        );
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        let id = TaskId::new("my-package").unwrap();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
