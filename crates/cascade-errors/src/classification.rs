//! Error classification for consistent error handling across cascade.
//!
//! Each crate's concrete error enum implements [`Classify`] so the runner can decide exit
//! codes and "is this worth a retry hint" without matching on every downstream variant.

use std::fmt;

/// Classification of errors by their nature and severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClassification {
    /// Project graph / selection errors (unknown project referenced).
    Configuration,

    /// File system errors (file not found, permission denied, disk full).
    FileSystem,

    /// Child process execution errors (spawn failures, non-zero exit codes).
    ProcessExecution,

    /// Invalid user input or arguments.
    UserInput,

    /// Internal logic errors or bugs.
    Internal,

    /// Build cache errors (restore/store failures).
    Cache,

    /// Task graph and execution errors (duplicate/unknown task, cycle).
    TaskExecution,

    /// Change-analyzer (VCS) errors.
    Environment,
}

impl ErrorClassification {
    /// Returns a suggested exit code for this error classification.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClassification::Configuration => 1,
            ErrorClassification::FileSystem => 1,
            ErrorClassification::ProcessExecution => 1,
            ErrorClassification::UserInput => 2,
            ErrorClassification::Internal => 100,
            ErrorClassification::Cache => 1,
            ErrorClassification::TaskExecution => 1,
            ErrorClassification::Environment => 1,
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClassification::Cache | ErrorClassification::Environment)
    }

    /// Returns whether this error is likely a user mistake.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ErrorClassification::Configuration | ErrorClassification::UserInput
        )
    }

    /// Returns whether this error indicates an internal bug.
    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorClassification::Internal)
    }

    /// Returns a human-readable category name for this classification.
    pub fn category_name(&self) -> &'static str {
        match self {
            ErrorClassification::Configuration => "Configuration",
            ErrorClassification::FileSystem => "File System",
            ErrorClassification::ProcessExecution => "Process Execution",
            ErrorClassification::UserInput => "User Input",
            ErrorClassification::Internal => "Internal",
            ErrorClassification::Cache => "Cache",
            ErrorClassification::TaskExecution => "Task Execution",
            ErrorClassification::Environment => "Environment",
        }
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category_name())
    }
}

/// Trait for types that can be classified into error categories.
pub trait Classify {
    fn classify(&self) -> ErrorClassification;
}
