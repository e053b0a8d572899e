//! Error taxonomy for memory introspection.
//!
//! Most public entry points degrade instead of failing (an unreadable source
//! yields an empty result, a malformed line is skipped). These errors are
//! what the lower-level parsers return so callers can decide.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// An OS-exposed source (meminfo, maps, pagemap) could not be opened.
    #[error("source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single line or record could not be parsed.
    #[error("malformed record '{line}': {reason}")]
    MalformedRecord { line: String, reason: &'static str },

    /// A binary record was shorter than its fixed width.
    #[error("truncated record: expected {expected} bytes, got {actual}")]
    TruncatedRecord { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl InspectError {
    pub(crate) fn malformed(line: &str, reason: &'static str) -> Self {
        InspectError::MalformedRecord {
            line: line.trim_end().to_string(),
            reason,
        }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        InspectError::SourceUnavailable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, InspectError>;
