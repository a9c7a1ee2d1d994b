//! Prediction and attribution over a reconciled feature matrix.

use std::fmt;

use koi_model::{AttributionEngine, Attributions, Class, Classifier};
use ndarray::{Array2, ArrayView2};
use serde::{Serialize, Serializer};

use crate::error::PipelineError;

/// Probability of the predicted class. Displays as a two-decimal percentage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub fn from_probability(p: f64) -> Self {
        Confidence(p)
    }

    pub fn probability(self) -> f64 {
        self.0
    }

    /// Percentage rounded to two decimals, e.g. `93.47`.
    pub fn percent(self) -> f64 {
        (self.0 * 10_000.0).round() / 100.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.percent())
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Labels, confidences, probabilities and attributions for one batch.
#[derive(Debug, Clone)]
pub struct Predictions {
    pub classes: Vec<Class>,
    pub confidences: Vec<Confidence>,
    /// Axes (candidate, class).
    pub probabilities: Array2<f64>,
    pub attributions: Attributions,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Classify every row of `features` and attribute each probability to the
/// fields.
///
/// The label is the argmax of the same probability rows the confidence is
/// read from, so the confidence always belongs to the predicted class.
pub fn predict_and_explain(
    features: ArrayView2<'_, f64>,
    classifier: &dyn Classifier,
    engine: &dyn AttributionEngine,
) -> Result<Predictions, PipelineError> {
    let n = features.nrows();
    let probabilities = classifier.predict_proba(features)?;
    if probabilities.dim() != (n, Class::COUNT) {
        return Err(PipelineError::Shape {
            what: "class probabilities",
            found: probabilities.shape().to_vec(),
            expected: vec![n, Class::COUNT],
        });
    }

    let mut classes = Vec::with_capacity(n);
    let mut confidences = Vec::with_capacity(n);
    for (row, index) in koi_model::backend::argmax_rows(probabilities.view())
        .into_iter()
        .enumerate()
    {
        let class = Class::from_index(index).ok_or(PipelineError::UnknownClass(index))?;
        classes.push(class);
        confidences.push(Confidence::from_probability(probabilities[[row, index]]));
    }
    log::debug!(
        "{} classified {n} candidates",
        classifier.backend_name()
    );

    let attributions = engine.attributions(features)?;
    if attributions.n_candidates() != n || attributions.n_fields() != features.ncols() {
        return Err(PipelineError::Shape {
            what: "attribution array",
            found: attributions.as_array().shape().to_vec(),
            expected: vec![n, features.ncols(), Class::COUNT],
        });
    }
    log::debug!("{} attributed {n} candidates", engine.engine_name());

    Ok(Predictions {
        classes,
        confidences,
        probabilities,
        attributions,
    })
}
