//! Three-axis attribution array.

use ndarray::{s, Array3, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::backend::{AttributionEngine, ModelError};
use crate::class::Class;

/// Signed per-feature contributions, axes (candidate, field, class).
///
/// Access goes through [`Class`] for the class axis so that candidate and
/// class indices cannot be swapped by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributions {
    values: Array3<f64>,
}

impl Attributions {
    pub fn zeros(n_candidates: usize, n_fields: usize) -> Self {
        Self {
            values: Array3::zeros((n_candidates, n_fields, Class::COUNT)),
        }
    }

    pub fn from_array(values: Array3<f64>) -> Result<Self, ModelError> {
        if values.len_of(Axis(2)) != Class::COUNT {
            return Err(ModelError::InvalidInput(format!(
                "attribution array needs {} classes on its last axis, got {}",
                Class::COUNT,
                values.len_of(Axis(2))
            )));
        }
        Ok(Self { values })
    }

    pub fn n_candidates(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    pub fn n_fields(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    pub fn get(&self, candidate: usize, field: usize, class: Class) -> f64 {
        self.values[[candidate, field, class.index()]]
    }

    /// Contributions of every field for one candidate and class.
    pub fn candidate(&self, candidate: usize, class: Class) -> ArrayView1<'_, f64> {
        self.values.slice(s![candidate, .., class.index()])
    }

    /// Contributions for one class, axes (candidate, field).
    pub fn class_slice(&self, class: Class) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(2), class.index())
    }

    /// Sum over fields for one candidate and class.
    pub fn total(&self, candidate: usize, class: Class) -> f64 {
        self.candidate(candidate, class).sum()
    }

    /// Mutable (field, class) block for one candidate.
    pub(crate) fn candidate_mut(&mut self, candidate: usize) -> ArrayViewMut2<'_, f64> {
        self.values.index_axis_mut(Axis(0), candidate)
    }

    /// Check that `baseline + sum(contributions)` reproduces each candidate's
    /// class probability within `tolerance`.
    pub fn verify_additivity(
        &self,
        engine: &dyn AttributionEngine,
        probabilities: ArrayView2<'_, f64>,
        tolerance: f64,
    ) -> Result<(), ModelError> {
        if probabilities.dim() != (self.n_candidates(), Class::COUNT) {
            return Err(ModelError::InvalidInput(format!(
                "probabilities have shape {:?}, expected ({}, {})",
                probabilities.dim(),
                self.n_candidates(),
                Class::COUNT
            )));
        }
        let mut worst = 0.0_f64;
        for candidate in 0..self.n_candidates() {
            for class in Class::ALL {
                let expected = probabilities[[candidate, class.index()]];
                let reconstructed = engine.baseline(class) + self.total(candidate, class);
                let err = (expected - reconstructed).abs();
                if err > tolerance {
                    return Err(ModelError::Additivity {
                        candidate,
                        class,
                        expected,
                        reconstructed,
                        tolerance,
                    });
                }
                worst = worst.max(err);
            }
        }
        log::debug!("attribution additivity holds, max error {worst:.3e}");
        Ok(())
    }

    pub fn as_array(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn into_array(self) -> Array3<f64> {
        self.values
    }
}
