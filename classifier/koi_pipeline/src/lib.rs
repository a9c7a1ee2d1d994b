//! Inference-and-explanation pipeline for Kepler Objects of Interest.
//!
//! [`analyze`] is the single entry point: it reconciles an uploaded table
//! against the trained schema, imputes gaps from the training means, predicts
//! a disposition with a confidence for every candidate and attaches per-field
//! attributions. The returned [`AnalysisBundle`] is self-contained; a
//! presentation layer renders it without further numerical work.
//!
//! ```no_run
//! use koi_model::{ArtifactPaths, Artifacts};
//! use koi_pipeline::{analyze, AnalysisOptions};
//! use koi_table::RawTable;
//!
//! let artifacts = Artifacts::load(&ArtifactPaths::in_dir("artifacts"))?;
//! let table = RawTable::from_csv_path("cumulative.csv")?;
//! let bundle = analyze(&table, &artifacts, &AnalysisOptions::default())?;
//! for row in bundle.results() {
//!     println!("{} {} {}", row.kepoi_name, row.prediction, row.confidence);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bundle;
pub mod error;
pub mod narrative;
pub mod predict;
pub mod reconcile;
pub mod warnings;

pub use bundle::{
    analyze, AnalysisBundle, AnalysisOptions, CandidateResult, PredictionSummary,
    DEFAULT_ADDITIVITY_TOLERANCE, PASSTHROUGH_FIELDS,
};
pub use error::PipelineError;
pub use narrative::{
    explain, explain_named, Factor, Narrative, NarrativeConfig, DEFAULT_MATERIALITY_THRESHOLD,
};
pub use predict::{predict_and_explain, Confidence, Predictions};
pub use reconcile::{reconcile, FeatureFrame, Reconciled};
pub use warnings::{DataQuality, DataWarning, WarningLog};

#[cfg(test)]
mod fixtures;
