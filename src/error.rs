//! Error taxonomy for include scanning.
//!
//! One enum covers the whole scan pipeline; the variants mirror how the
//! caller must react rather than where the error arose:
//! - `Io` / `Exec` are surfaced verbatim.
//! - `Interrupted` carries the operation and the file being worked on so
//!   cancellation reports read like "interrupted while visiting foo.cc".
//! - `MissingDep` is a distinct signal: the outer scheduler restarts the
//!   action once the missing upstream value has been computed.
//!
//! Illegal-output observations are deliberately *not* errors; they only
//! suppress caching of the affected resolution (see the inclusion cache).
//!
//! The I/O variant shares its `io::Error` behind an `Arc` because parse
//! results are memoized and handed to every waiter of the same file.

use std::fmt;
use std::io;
use std::sync::Arc;

/// Error raised by a scan invocation.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// I/O failure during parsing or filesystem probing.
    Io(Arc<io::Error>),
    /// A parser implementation's spawn/exec helper failed.
    Exec { detail: String },
    /// Cooperative cancellation was observed at a checkpoint.
    Interrupted { op: &'static str, what: String },
    /// An upstream dependency has not been computed yet.
    MissingDep,
}

impl ScanError {
    /// Creates an exec failure with human-readable context.
    pub fn exec(detail: impl Into<String>) -> Self {
        Self::Exec {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Exec { detail } => write!(f, "include extraction failed: {detail}"),
            Self::Interrupted { op, what } => {
                write!(f, "include scanning interrupted while {op} {what}")
            }
            Self::MissingDep => write!(f, "missing upstream dependency"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
