//! Error types for the guarded diagram pipeline.
//!
//! Uses thiserror for deriving std::error::Error and miette for rich diagnostics.
//!
//! Validation findings are not errors: [`crate::validator::validate`] returns
//! them as a value. The types here cover the outcomes a caller has to act on:
//! a denied output path, a template that cannot be rendered, and a sandboxed
//! run that did not succeed.

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::validator::{Violation, ViolationList};

/// Top-level error type for the pipeline and CLI.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Requested pattern is not in the catalog
    #[error("Unknown pattern '{pattern}'")]
    #[diagnostic(
        code(guard::template::unknown_pattern),
        help("Available patterns: {available}")
    )]
    UnknownPattern { pattern: String, available: String },

    /// Output stem sanitized down to nothing usable
    #[error("Output name '{raw}' is empty after sanitization")]
    #[diagnostic(
        code(guard::path::empty_name),
        help("Use letters, digits, '-' or '_' in the output name")
    )]
    EmptyOutputName { raw: String },

    /// Output path outside every allowed root
    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathViolation),

    /// Template could not be rendered
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    /// Sandboxed run did not succeed
    #[error("Error generating diagram:\n{0}")]
    #[diagnostic(code(guard::exec))]
    Execution(#[source] ExecutionFailure),
}

/// Output path confinement failures.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum PathViolation {
    /// Resolved path is not under any allowed root
    #[error("Output path not allowed. Allowed directories: {allowed}")]
    #[diagnostic(
        code(guard::path::denied),
        help("Choose an output location under one of the allowed directories")
    )]
    NotAllowed { path: PathBuf, allowed: String },

    /// Path could not be resolved to an absolute form
    #[error("Output path {} could not be resolved: {reason}", .path.display())]
    #[diagnostic(code(guard::path::unresolvable))]
    Unresolvable { path: PathBuf, reason: String },
}

/// Template rendering failures.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Placeholder other than `{name}` or `{output}`
    #[error("Unknown template placeholder '{{{name}}}'")]
    #[diagnostic(code(guard::template::placeholder))]
    UnknownPlaceholder { name: String },

    /// `{` with no closing `}`
    #[error("Unterminated placeholder at byte {offset}")]
    #[diagnostic(code(guard::template::unterminated))]
    Unterminated { offset: usize },

    /// Lone `}` not part of a `}}` escape
    #[error("Single '}}' encountered at byte {offset}")]
    #[diagnostic(code(guard::template::brace), help("Escape literal braces as '{{{{' and '}}}}'"))]
    UnmatchedBrace { offset: usize },
}

/// Why a sandboxed run did not produce a successful result.
#[derive(Error, Debug, Diagnostic)]
pub enum ExecutionFailure {
    /// Static validation found violations; nothing was written or spawned
    #[error("Code validation failed:\n{}", ViolationList(.0))]
    #[diagnostic(code(guard::exec::rejected))]
    Rejected(Vec<Violation>),

    /// Wall-clock budget exhausted; the child was killed
    #[error("Execution timed out after {} seconds", format_secs(.budget))]
    #[diagnostic(
        code(guard::exec::timeout),
        help("Raise the budget with --timeout if the diagram is legitimately large")
    )]
    TimedOut { budget: Duration },

    /// Child exited with a non-zero status
    #[error("Execution error:\n{stderr}")]
    #[diagnostic(code(guard::exec::exit_status))]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// Artifact preparation, spawn or wait failed
    #[error("Execution failed: {context}: {source}")]
    #[diagnostic(code(guard::exec::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Captured output is not valid UTF-8
    #[error("Execution failed: {stream} contains invalid UTF-8")]
    #[diagnostic(code(guard::exec::encoding))]
    OutputEncoding { stream: &'static str },
}

impl ExecutionFailure {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// `60` for whole seconds, `0.5` otherwise.
fn format_secs(budget: &Duration) -> String {
    if budget.subsec_nanos() == 0 {
        budget.as_secs().to_string()
    } else {
        let formatted = format!("{:.3}", budget.as_secs_f64());
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_lists_each_violation() {
        let failure = ExecutionFailure::Rejected(vec![
            Violation::import("os"),
            Violation::builtin("eval"),
        ]);
        assert_eq!(
            failure.to_string(),
            "Code validation failed:\n  - Blocked import: 'os'\n  - Blocked builtin call: 'eval()'"
        );
    }

    #[test]
    fn test_timeout_message() {
        let whole = ExecutionFailure::TimedOut {
            budget: Duration::from_secs(60),
        };
        assert_eq!(whole.to_string(), "Execution timed out after 60 seconds");

        let fractional = ExecutionFailure::TimedOut {
            budget: Duration::from_millis(500),
        };
        assert_eq!(fractional.to_string(), "Execution timed out after 0.5 seconds");
    }

    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let failure = ExecutionFailure::NonZeroExit {
            code: Some(1),
            stderr: "Traceback: boom".to_string(),
        };
        assert_eq!(failure.to_string(), "Execution error:\nTraceback: boom");
    }

    #[test]
    fn test_path_violation_names_roots() {
        let violation = PathViolation::NotAllowed {
            path: PathBuf::from("/etc/passwd"),
            allowed: "., /tmp".to_string(),
        };
        assert_eq!(
            violation.to_string(),
            "Output path not allowed. Allowed directories: ., /tmp"
        );
    }

    #[test]
    fn test_template_error_messages() {
        let err = TemplateError::UnknownPlaceholder {
            name: "title".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown template placeholder '{title}'");
        let err = TemplateError::UnmatchedBrace { offset: 3 };
        assert_eq!(err.to_string(), "Single '}' encountered at byte 3");
    }
}
