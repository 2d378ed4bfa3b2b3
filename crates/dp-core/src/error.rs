//! Error types shared across the pipeline crates.

use thiserror::Error;

/// Pipeline error type.
///
/// The variants mirror the failure modes of the staged analysis: transport
/// bootstrap (`Connection`), wire-format violations (`Validation`), batch
/// aggregation (`Merge`), the spectrum fit (`Fit`), and event-store reads
/// (`SourceRead`). Only `Connection` is ever retried; everything else is
/// handled where it occurs (see the stage loop's skip-and-ack policy).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport unreachable after the retry budget is exhausted
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or missing message fields at the transport boundary
    #[error("validation error: {0}")]
    Validation(String),

    /// Schema mismatch during batch aggregation
    #[error("merge error: {0}")]
    Merge(String),

    /// Non-convergent or numerically invalid fit
    #[error("fit error: {0}")]
    Fit(String),

    /// Event-store dataset inaccessible; the caller skips the dataset
    #[error("source read error for dataset '{dataset}': {reason}")]
    SourceRead {
        /// Dataset identifier that failed to read.
        dataset: String,
        /// Underlying failure description.
        reason: String,
    },
}

impl Error {
    /// True for failures the stage loop acknowledges and skips rather than
    /// treating as fatal.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Fit(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
