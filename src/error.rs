//! Error types shared by every management operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::rules::FileKind;

/// A persisted rule line (or record value) that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number inside the file, when known.
    pub line: Option<usize>,
    pub reason: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            line: None,
            reason: reason.into(),
        }
    }

    /// Attach the line number the error was found on.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// Errors that can occur during management operations.
#[derive(Debug, Error)]
pub enum MgmtError {
    /// Unknown record name or missing configuration file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rule position outside the context.
    #[error("index {index} out of range for {count} rules")]
    Index { index: usize, count: usize },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to read {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    /// The file changed in storage since this context fetched it.
    #[error("{kind} was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        kind: FileKind,
        expected: u64,
        actual: u64,
    },

    /// Type-mismatched or out-of-domain value.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("dequeue from empty list")]
    EmptyList,

    /// A rule of one kind was offered to a context bound to another.
    #[error("rule kind {actual} does not belong in {expected}")]
    WrongKind { expected: FileKind, actual: FileKind },
}

/// Result type for management operations.
pub type MgmtResult<T> = Result<T, MgmtError>;

impl MgmtError {
    /// Short label used for metrics and API error bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            MgmtError::NotFound(_) => "not_found",
            MgmtError::Index { .. } => "index",
            MgmtError::Parse(_) => "parse",
            MgmtError::ReadFailure { .. } => "read_failure",
            MgmtError::WriteFailure { .. } => "write_failure",
            MgmtError::ConcurrentModification { .. } => "concurrent_modification",
            MgmtError::InvalidValue(_) => "invalid_value",
            MgmtError::EmptyList => "empty_list",
            MgmtError::WrongKind { .. } => "wrong_kind",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("unknown key `foo`");
        assert_eq!(err.to_string(), "unknown key `foo`");

        let err = err.at_line(7);
        assert_eq!(err.to_string(), "line 7: unknown key `foo`");
    }

    #[test]
    fn test_error_display() {
        let err = MgmtError::Index { index: 4, count: 2 };
        assert_eq!(err.to_string(), "index 4 out of range for 2 rules");

        let err = MgmtError::ConcurrentModification {
            kind: FileKind::Plugin,
            expected: 3,
            actual: 4,
        };
        assert!(err.to_string().contains("plugin.config"));
        assert_eq!(err.error_type(), "concurrent_modification");
    }
}
