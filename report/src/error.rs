//! Error taxonomy for report generation.
//!
//! Comparison mismatches are not errors: they are recorded in the report as
//! `failed` verification results and the run continues. The variants here
//! abort report generation for the current run.

use std::path::PathBuf;

/// Errors raised while aggregating or persisting a verification report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A lifecycle event arrived without the node it needs to mutate.
    #[error("protocol violation on `{event}`: {reason}")]
    ProtocolViolation {
        /// Name of the rejected event.
        event: &'static str,
        /// What was missing or out of order.
        reason: String,
    },

    /// The file already at the destination is not a readable report.
    #[error("existing report at {} is not valid report content: {source}", path.display())]
    CorruptExistingReport {
        /// Location of the unreadable report.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// Creating the report directory or writing the report failed.
    #[error("failed to write report at {}: {source}", path.display())]
    Persistence {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The report document could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A line of an event log is not a valid event.
    #[error("malformed event on line {line}: {source}")]
    MalformedEvent {
        /// 1-based line number.
        line: usize,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The reporter configuration could not be parsed.
    #[error("invalid reporter configuration: {0}")]
    Config(String),
}

impl ReportError {
    pub(crate) fn protocol(event: &'static str, reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            event,
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error is a [`ReportError::ProtocolViolation`].
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReportError> = std::result::Result<T, E>;
