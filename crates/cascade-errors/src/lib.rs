//! Shared error vocabulary used across the cascade workspace.
//!
//! Two things live here rather than in each downstream crate's own error module: the
//! [`ErrorClassification`] taxonomy (so the runner can pick an exit code without matching every
//! leaf variant), and [`AlreadyReportedError`], the sentinel that models "a human-readable
//! message was already written to the output collator for this failure, don't print another
//! one" without resorting to exceptions-as-control-flow.

mod classification;

pub use classification::{Classify, ErrorClassification};
use miette::Diagnostic;
use thiserror::Error;

/// Marks a failure whose user-facing message has already been written to the output
/// collator. Callers that see this variant should propagate a non-zero exit without
/// printing anything further.
#[derive(Debug, Error, Diagnostic)]
#[error("error already reported")]
pub struct AlreadyReportedError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_reported_has_a_stable_message() {
        assert_eq!(AlreadyReportedError.to_string(), "error already reported");
    }
}
