//! Classifier and attribution-engine traits plus their error type.

use ndarray::{Array2, ArrayView2, Axis};
use thiserror::Error;

use crate::attribution::Attributions;
use crate::class::Class;

/// Errors raised by model inference or attribution.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Inference failed: {0}")]
    InferenceError(String),
    #[error(
        "attributions for candidate {candidate} ({class}) sum to {reconstructed:.8} \
         but the model predicts {expected:.8} (tolerance {tolerance:e})"
    )]
    Additivity {
        candidate: usize,
        class: Class,
        expected: f64,
        reconstructed: f64,
        tolerance: f64,
    },
}

/// A trained binary classifier over feature matrices in schema order.
pub trait Classifier: Send + Sync {
    /// Number of columns the classifier expects.
    fn n_features(&self) -> usize;

    /// Class probabilities, one row per candidate and one column per [`Class`].
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError>;

    /// Predicted class index per row.
    ///
    /// Derived from [`Classifier::predict_proba`] so labels and confidences
    /// always agree. Ties go to the lowest index.
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        let proba = self.predict_proba(features)?;
        Ok(argmax_rows(proba.view()))
    }

    fn backend_name(&self) -> &str;
}

/// Computes additive per-feature contributions to each class probability.
pub trait AttributionEngine: Send + Sync {
    /// Attribution array for a batch, axes (candidate, field, class).
    fn attributions(&self, features: ArrayView2<'_, f64>) -> Result<Attributions, ModelError>;

    /// Reference probability that contributions are measured from.
    fn baseline(&self, class: Class) -> f64;

    fn engine_name(&self) -> &str;
}

/// Column index of the largest value in each row; first one wins on ties.
pub fn argmax_rows(values: ArrayView2<'_, f64>) -> Vec<usize> {
    values
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (i, v) in row.iter().enumerate() {
                if *v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Shared shape check for classifier and engine inputs.
pub(crate) fn check_input(features: ArrayView2<'_, f64>, expected: usize) -> Result<(), ModelError> {
    if features.ncols() != expected {
        return Err(ModelError::InvalidInput(format!(
            "Expected {expected} features, got {}",
            features.ncols()
        )));
    }
    if let Some(((row, col), v)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ModelError::InvalidInput(format!(
            "value {v} at row {row}, column {col} is not finite"
        )));
    }
    Ok(())
}
