//! Error types for the agency client.

use std::io;
use thiserror::Error;

/// Result type alias using [`AgencyError`].
pub type Result<T> = std::result::Result<T, AgencyError>;

/// Every failure the agency client can report.
///
/// The variants follow the lifecycle of a session: connection setup,
/// encoding (rejected before anything is sent), mid-session I/O, and
/// malformed server responses.
#[derive(Debug, Error)]
pub enum AgencyError {
    /// The transport could not be established. The session never starts.
    #[error("failed to connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A record field does not fit a one-byte length prefix.
    #[error("field `{field}` is {len} bytes, limit is 255")]
    FieldTooLong { field: &'static str, len: usize },

    /// A batch payload does not fit a two-byte length prefix.
    #[error("batch payload is {len} bytes, limit is {limit}")]
    BatchTooLarge { len: usize, limit: usize },

    /// An encoding error, tagged with the batch and record that caused it.
    #[error("batch {batch}, record {record}: {source}")]
    Batch {
        batch: usize,
        record: usize,
        #[source]
        source: Box<AgencyError>,
    },

    /// I/O error on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection mid-read, or stopped accepting a write.
    #[error("connection closed early: expected {expected} bytes, received {received}")]
    PrematureClose { expected: usize, received: usize },

    /// The transport was already closed when an operation was attempted.
    #[error("transport is closed")]
    Closed,

    /// The session was cancelled from outside.
    #[error("session cancelled")]
    Cancelled,

    /// Malformed or incomplete server response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A line of the bets file could not be turned into a record.
    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    /// The record source failed for a reason other than a bad record.
    #[error("record source error: {0}")]
    Source(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AgencyError {
    /// Whether this error came from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgencyError::Cancelled)
    }

    /// Short label used by the reporter.
    pub fn kind(&self) -> &'static str {
        match self {
            AgencyError::Connection { .. } => "connection",
            AgencyError::FieldTooLong { .. } => "field_too_long",
            AgencyError::BatchTooLarge { .. } => "batch_too_large",
            AgencyError::Batch { source, .. } => source.kind(),
            AgencyError::Io(_) => "io",
            AgencyError::PrematureClose { .. } => "premature_close",
            AgencyError::Closed => "closed",
            AgencyError::Cancelled => "cancelled",
            AgencyError::Protocol(_) => "protocol",
            AgencyError::InvalidRecord { .. } => "invalid_record",
            AgencyError::Source(_) => "source",
            AgencyError::Config(_) => "config",
        }
    }
}
