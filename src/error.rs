// Error types for the matching pipeline.
//
// Every failure is fatal for the current run: the caller gets one
// `MatchError` and no partial output. Count-mismatch errors are kept
// distinct from unparsable-field errors so a truncated file and a
// corrupted file report differently.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, MatchError>;

/// All errors the matching pipeline can report.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A numeric field in an input file could not be parsed.
    #[error("line {line}: malformed field {text:?}")]
    MalformedField { line: usize, text: String },

    /// A vector row runs backwards: its end note does not come after its
    /// start note. Intra-vectors are directed forward relations.
    #[error("line {line}: vector must run forward, got {start_index} -> {end_index}")]
    ReversedVector {
        line: usize,
        start_index: usize,
        end_index: usize,
    },

    /// A declared count header disagrees with the number of rows present.
    #[error("{what} count mismatch: header declares {declared}, found {actual}")]
    CountMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },

    /// The pattern score has no intra-vector spanning notes `index` to
    /// `index + 1`. Pattern vectors must be densely indexed.
    #[error("pattern has no unit edge starting at note {index}")]
    InvalidPattern { index: usize },

    /// The line sweep exhausted its configured step budget.
    #[error("sweep exceeded step budget of {limit}")]
    StepBudget { limit: u64 },

    /// Result serialization failed while writing output.
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MatchError {
    /// Wrap an I/O error with the path that produced it.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        MatchError::Io {
            path: path.into(),
            source,
        }
    }
}
