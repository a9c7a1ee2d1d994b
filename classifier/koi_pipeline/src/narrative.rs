//! Turning attribution values into a short plain-language explanation.
//!
//! Contributions are read from the confirmed-class slice. A confirmed
//! prediction is explained by the fields pushing towards confirmation, a
//! false positive by the fields pushing away from it. Each selected field is
//! rendered through a small per-field template.

use koi_model::Class;
use serde::{Deserialize, Serialize};

use crate::bundle::AnalysisBundle;
use crate::error::PipelineError;
use crate::predict::Confidence;

pub const DEFAULT_MATERIALITY_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Smallest contribution (in probability units) worth mentioning.
    pub materiality_threshold: f64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: DEFAULT_MATERIALITY_THRESHOLD,
        }
    }
}

/// One field that supports the prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    pub field: String,
    pub value: f64,
    /// Signed contribution to the confirmed-class probability.
    pub contribution: f64,
    pub clause: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub candidate: String,
    pub prediction: Class,
    pub confidence: Confidence,
    /// Confirmed-class baseline the contributions are measured from.
    pub baseline: f64,
    /// Confirmed-class probability for this candidate.
    pub probability: f64,
    pub factors: Vec<Factor>,
    pub text: String,
}

impl Narrative {
    /// No field cleared the materiality threshold.
    pub fn is_near_boundary(&self) -> bool {
        self.factors.is_empty()
    }
}

type Template = fn(f64) -> String;

fn flag(v: f64) -> bool {
    v >= 0.5
}

fn not_transit_like(v: f64) -> String {
    if flag(v) {
        "the light curve was flagged as not transit-like".to_string()
    } else {
        "the light curve has a transit-like shape".to_string()
    }
}

fn stellar_eclipse(v: f64) -> String {
    if flag(v) {
        "a secondary eclipse suggests an eclipsing binary".to_string()
    } else {
        "no stellar eclipse was detected".to_string()
    }
}

fn centroid_offset(v: f64) -> String {
    if flag(v) {
        "the signal comes from a source offset from the target star".to_string()
    } else {
        "the signal is centred on the target star".to_string()
    }
}

fn ephemeris_match(v: f64) -> String {
    if flag(v) {
        "the ephemeris matches a known contaminating source".to_string()
    } else {
        "the ephemeris matches no known contaminating source".to_string()
    }
}

fn signal_to_noise(v: f64) -> String {
    if v > 20.0 {
        format!("the transit signal-to-noise ratio of {v:.1} is high")
    } else {
        format!("the transit signal-to-noise ratio of {v:.1} is low")
    }
}

fn planet_radius(v: f64) -> String {
    let size = if v <= 1.5 {
        "Earth-sized"
    } else if v <= 4.0 {
        "super-Earth or mini-Neptune sized"
    } else if v <= 15.0 {
        "giant-planet sized"
    } else {
        "too large for a planet"
    };
    format!("the estimated radius of {v:.2} Earth radii is {size}")
}

fn transit_depth(v: f64) -> String {
    if v > 10_000.0 {
        format!("the transit depth of {v:.0} ppm is deep enough to suggest a stellar companion")
    } else {
        format!("the transit depth of {v:.0} ppm is consistent with a planet")
    }
}

fn transit_duration(v: f64) -> String {
    if v > 15.0 {
        format!("the transit lasts an unusually long {v:.2} hours")
    } else {
        format!("the transit lasts {v:.2} hours")
    }
}

fn orbital_period(v: f64) -> String {
    format!("the orbital period is {v:.2} days")
}

fn equilibrium_temperature(v: f64) -> String {
    if v > 2000.0 {
        format!("the equilibrium temperature of {v:.0} K is extremely hot")
    } else {
        format!("the equilibrium temperature is {v:.0} K")
    }
}

fn impact_parameter(v: f64) -> String {
    if v > 1.0 {
        format!("the impact parameter of {v:.2} indicates a grazing transit")
    } else {
        format!("the impact parameter of {v:.2} indicates a full transit")
    }
}

fn stellar_temperature(v: f64) -> String {
    format!("the host star's effective temperature is {v:.0} K")
}

const TEMPLATES: &[(&str, Template)] = &[
    ("koi_fpflag_nt", not_transit_like),
    ("koi_fpflag_ss", stellar_eclipse),
    ("koi_fpflag_co", centroid_offset),
    ("koi_fpflag_ec", ephemeris_match),
    ("koi_model_snr", signal_to_noise),
    ("koi_prad", planet_radius),
    ("koi_depth", transit_depth),
    ("koi_duration", transit_duration),
    ("koi_period", orbital_period),
    ("koi_teq", equilibrium_temperature),
    ("koi_impact", impact_parameter),
    ("koi_steff", stellar_temperature),
];

/// Clause describing `value` for `field`.
pub fn clause(field: &str, value: f64) -> String {
    match TEMPLATES.iter().find(|(name, _)| *name == field) {
        Some((_, template)) => template(value),
        None => format!("parameter {field} had value {value}"),
    }
}

/// Fields whose contribution supports `prediction` by more than `threshold`,
/// strongest first. Returns (field index, confirmed-class contribution).
fn select_factors(contributions: &[f64], prediction: Class, threshold: f64) -> Vec<(usize, f64)> {
    let direction = match prediction {
        Class::Confirmed => 1.0,
        Class::FalsePositive => -1.0,
    };
    let mut selected: Vec<(usize, f64)> = contributions
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, c)| c * direction > threshold)
        .collect();
    selected.sort_by(|a, b| (b.1 * direction).total_cmp(&(a.1 * direction)));
    selected
}

/// Explain the candidate at row `candidate` of `bundle`.
pub fn explain(
    bundle: &AnalysisBundle,
    candidate: usize,
    config: &NarrativeConfig,
) -> Result<Narrative, PipelineError> {
    let (result, values) = bundle
        .results()
        .get(candidate)
        .zip(bundle.features_of(candidate))
        .ok_or(PipelineError::CandidateOutOfRange {
            index: candidate,
            len: bundle.len(),
        })?;
    let contributions = bundle
        .attributions()
        .candidate(candidate, Class::Confirmed)
        .to_vec();

    let factors: Vec<Factor> = select_factors(
        &contributions,
        result.prediction,
        config.materiality_threshold,
    )
    .into_iter()
    .map(|(i, contribution)| {
        let field = bundle.schema().name(i).unwrap_or_default().to_string();
        let value = values[i];
        Factor {
            clause: clause(&field, value),
            field,
            value,
            contribution,
        }
    })
    .collect();

    let mut text = format!(
        "{} is classified as {} with {} confidence.",
        result.kepoi_name, result.prediction, result.confidence
    );
    if factors.is_empty() {
        text.push_str(" The prediction is near the decision boundary with no single dominant factor.");
    } else {
        let clauses: Vec<&str> = factors.iter().map(|f| f.clause.as_str()).collect();
        text.push_str(" Main factors: ");
        text.push_str(&clauses.join("; "));
        text.push('.');
    }

    Ok(Narrative {
        candidate: result.kepoi_name.clone(),
        prediction: result.prediction,
        confidence: result.confidence,
        baseline: bundle.baseline(Class::Confirmed),
        probability: bundle.probabilities()[[candidate, Class::Confirmed.index()]],
        factors,
        text,
    })
}

/// Explain the first candidate named `kepoi_name`.
pub fn explain_named(
    bundle: &AnalysisBundle,
    kepoi_name: &str,
    config: &NarrativeConfig,
) -> Result<Narrative, PipelineError> {
    let index = bundle
        .position(kepoi_name)
        .ok_or_else(|| PipelineError::UnknownCandidate(kepoi_name.to_string()))?;
    explain(bundle, index, config)
}
