//! The single pipeline entry point and the self-contained result it returns.

use std::sync::Arc;

use koi_model::{Artifacts, AttributionEngine, Attributions, Class, FeatureSchema};
use koi_table::RawTable;
use ndarray::{Array2, ArrayView1};
use serde::Serialize;

use crate::error::PipelineError;
use crate::predict::{predict_and_explain, Confidence};
use crate::reconcile::reconcile;
use crate::warnings::{DataQuality, WarningLog};

/// Measurements shown next to each prediction, in display order.
pub const PASSTHROUGH_FIELDS: [&str; 5] =
    ["koi_depth", "koi_duration", "koi_prad", "koi_teq", "koi_period"];

/// Default tolerance for the attribution additivity check.
pub const DEFAULT_ADDITIVITY_TOLERANCE: f64 = 1e-6;

/// One row of the result table. Field order is the display column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub kepoi_name: String,
    pub prediction: Class,
    pub confidence: Confidence,
    pub data_quality: DataQuality,
    pub koi_depth: Option<f64>,
    pub koi_duration: Option<f64>,
    pub koi_prad: Option<f64>,
    pub koi_teq: Option<f64>,
    pub koi_period: Option<f64>,
}

impl CandidateResult {
    /// Column headers matching the field order.
    pub const COLUMNS: [&'static str; 9] = [
        "kepoi_name",
        "prediction",
        "confidence",
        "data_quality",
        "koi_depth",
        "koi_duration",
        "koi_prad",
        "koi_teq",
        "koi_period",
    ];

    /// Pass-through measurements in [`PASSTHROUGH_FIELDS`] order.
    pub fn measurements(&self) -> [Option<f64>; 5] {
        [
            self.koi_depth,
            self.koi_duration,
            self.koi_prad,
            self.koi_teq,
            self.koi_period,
        ]
    }
}

/// Counts by predicted class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredictionSummary {
    pub total: usize,
    pub confirmed: usize,
    pub false_positive: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    /// Maximum allowed gap between `baseline + sum(attributions)` and the
    /// predicted probability. `None` skips the check.
    pub additivity_tolerance: Option<f64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            additivity_tolerance: Some(DEFAULT_ADDITIVITY_TOLERANCE),
        }
    }
}

/// Everything one analysis produced. Owns its data; nothing refers back to
/// the input table.
#[derive(Clone)]
pub struct AnalysisBundle {
    results: Vec<CandidateResult>,
    warnings: WarningLog,
    attributions: Attributions,
    features: Array2<f64>,
    probabilities: Array2<f64>,
    schema: FeatureSchema,
    engine: Arc<dyn AttributionEngine>,
}

impl std::fmt::Debug for AnalysisBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisBundle")
            .field("results", &self.results)
            .field("warnings", &self.warnings)
            .field("features", &self.features.dim())
            .field("engine", &self.engine.engine_name())
            .finish()
    }
}

impl AnalysisBundle {
    pub fn results(&self) -> &[CandidateResult] {
        &self.results
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    /// Axes (candidate, field, class).
    pub fn attributions(&self) -> &Attributions {
        &self.attributions
    }

    /// The exact matrix the classifier saw, in schema order.
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Axes (candidate, class).
    pub fn probabilities(&self) -> &Array2<f64> {
        &self.probabilities
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn engine(&self) -> &dyn AttributionEngine {
        self.engine.as_ref()
    }

    pub fn baseline(&self, class: Class) -> f64 {
        self.engine.baseline(class)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Row of the first candidate with this identifier.
    pub fn position(&self, kepoi_name: &str) -> Option<usize> {
        self.results.iter().position(|r| r.kepoi_name == kepoi_name)
    }

    /// Reconciled feature values of one candidate, in schema order.
    pub fn features_of(&self, candidate: usize) -> Option<ArrayView1<'_, f64>> {
        (candidate < self.len()).then(|| self.features.row(candidate))
    }

    pub fn summary(&self) -> PredictionSummary {
        let confirmed = self
            .results
            .iter()
            .filter(|r| r.prediction == Class::Confirmed)
            .count();
        PredictionSummary {
            total: self.results.len(),
            confirmed,
            false_positive: self.results.len() - confirmed,
        }
    }
}

/// Run the whole pipeline over one uploaded table.
///
/// Schema gaps are repaired and reported through the warning log; any
/// failure after reconciliation aborts the analysis with no partial result.
pub fn analyze(
    raw: &RawTable,
    artifacts: &Artifacts,
    options: &AnalysisOptions,
) -> Result<AnalysisBundle, PipelineError> {
    let schema = artifacts.schema();
    let reconciled = reconcile(raw, schema, artifacts.imputation());
    log::debug!(
        "reconciled {} candidates, quality {}",
        reconciled.n_candidates(),
        reconciled.quality
    );
    for warning in reconciled.warnings.entries() {
        log::info!("{warning}");
    }

    let features = reconciled.to_matrix()?;
    let predictions = predict_and_explain(
        features.view(),
        artifacts.classifier(),
        artifacts.engine(),
    )?;

    if let Some(tolerance) = options.additivity_tolerance {
        predictions.attributions.verify_additivity(
            artifacts.engine(),
            predictions.probabilities.view(),
            tolerance,
        )?;
    }

    let passthrough: Vec<Option<usize>> = PASSTHROUGH_FIELDS
        .iter()
        .map(|f| schema.index_of(f))
        .collect();
    let measure = |row: usize, slot: usize| passthrough[slot].map(|col| features[[row, col]]);

    let results = reconciled
        .identifiers
        .iter()
        .enumerate()
        .map(|(row, name)| CandidateResult {
            kepoi_name: name.clone(),
            prediction: predictions.classes[row],
            confidence: predictions.confidences[row],
            data_quality: reconciled.quality,
            koi_depth: measure(row, 0),
            koi_duration: measure(row, 1),
            koi_prad: measure(row, 2),
            koi_teq: measure(row, 3),
            koi_period: measure(row, 4),
        })
        .collect();

    Ok(AnalysisBundle {
        results,
        warnings: reconciled.warnings,
        attributions: predictions.attributions,
        features,
        probabilities: predictions.probabilities,
        schema: schema.clone(),
        engine: artifacts.engine_handle(),
    })
}
