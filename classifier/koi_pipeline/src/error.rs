use koi_model::ModelError;
use koi_table::TableError;
use thiserror::Error;

/// Fatal pipeline failures. Data-quality gaps are never reported here; they
/// end up in the [`WarningLog`](crate::WarningLog).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("model rejected the feature matrix: {0}")]
    Model(#[from] ModelError),
    #[error("field '{field}' of candidate '{candidate}' is not numeric: '{value}'")]
    NonNumeric {
        candidate: String,
        field: String,
        value: String,
    },
    #[error("classifier produced class index {0}, expected 0 (false positive) or 1 (confirmed)")]
    UnknownClass(usize),
    #[error("{what} has shape {found:?}, expected {expected:?}")]
    Shape {
        what: &'static str,
        found: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("no candidate at position {index} (analysis has {len})")]
    CandidateOutOfRange { index: usize, len: usize },
    #[error("no candidate named '{0}'")]
    UnknownCandidate(String),
}
