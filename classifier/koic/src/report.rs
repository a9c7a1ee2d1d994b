//! Rendering an analysis for the terminal, as JSON, or as CSV.

use std::fmt::Write as _;
use std::io;

use koi_model::{Artifacts, Class};
use koi_pipeline::{AnalysisBundle, CandidateResult, Narrative, PredictionSummary};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Baseline {
    false_positive: f64,
    confirmed: f64,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    summary: PredictionSummary,
    warnings: Vec<String>,
    baseline: Baseline,
    results: &'a [CandidateResult],
    #[serde(skip_serializing_if = "no_explanations")]
    explanations: &'a [Narrative],
}

fn no_explanations(n: &&[Narrative]) -> bool {
    n.is_empty()
}

fn measurement(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Plain-text report: warnings, result table, class counts, explanations.
pub fn render_text(bundle: &AnalysisBundle, narratives: &[Narrative]) -> String {
    let mut out = String::new();
    for warning in bundle.warnings().entries() {
        let _ = writeln!(out, "note: {warning}");
    }
    out.push('\n');

    let rows: Vec<[String; 9]> = bundle
        .results()
        .iter()
        .map(|r| {
            let [depth, duration, prad, teq, period] = r.measurements().map(measurement);
            [
                r.kepoi_name.clone(),
                r.prediction.to_string(),
                r.confidence.to_string(),
                r.data_quality.to_string(),
                depth,
                duration,
                prad,
                teq,
                period,
            ]
        })
        .collect();

    let mut widths = CandidateResult::COLUMNS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }
    let _ = writeln!(out, "{}", padded(CandidateResult::COLUMNS.iter().copied(), &widths));
    for row in &rows {
        let _ = writeln!(out, "{}", padded(row.iter().map(String::as_str), &widths));
    }

    let s = bundle.summary();
    let _ = writeln!(
        out,
        "\n{} candidates: {} confirmed, {} false positive",
        s.total, s.confirmed, s.false_positive
    );

    for n in narratives {
        let _ = writeln!(out, "\n{}", n.text);
        let _ = writeln!(
            out,
            "  baseline {:.4} -> probability {:.4} (confirmed)",
            n.baseline, n.probability
        );
        for f in &n.factors {
            let _ = writeln!(out, "  {:+.4}  {} = {}", f.contribution, f.field, f.value);
        }
    }
    out
}

pub fn render_json(
    bundle: &AnalysisBundle,
    narratives: &[Narrative],
) -> Result<String, serde_json::Error> {
    let report = Report {
        summary: bundle.summary(),
        warnings: bundle.warnings().messages(),
        baseline: Baseline {
            false_positive: bundle.baseline(Class::FalsePositive),
            confirmed: bundle.baseline(Class::Confirmed),
        },
        results: bundle.results(),
        explanations: narratives,
    };
    serde_json::to_string_pretty(&report)
}

/// Result table as CSV, one row per candidate; absent measurements are empty.
pub fn write_csv<W: io::Write>(bundle: &AnalysisBundle, writer: W) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(CandidateResult::COLUMNS)?;
    for r in bundle.results() {
        let mut record = vec![
            r.kepoi_name.clone(),
            r.prediction.to_string(),
            r.confidence.to_string(),
            r.data_quality.to_string(),
        ];
        record.extend(r.measurements().map(measurement));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

/// Summary of the loaded artifacts.
pub fn render_inspect(artifacts: &Artifacts) -> String {
    let mut out = String::new();
    let schema = artifacts.schema();
    let _ = writeln!(out, "schema: {} fields", schema.len());
    for field in schema.iter() {
        match artifacts.imputation().get(field) {
            Some(v) => {
                let _ = writeln!(out, "  {field:<24} fallback {v}");
            }
            None => {
                let _ = writeln!(out, "  {field:<24} fallback 0 (not in reference)");
            }
        }
    }
    let _ = writeln!(
        out,
        "classifier: {} ({} features)",
        artifacts.classifier().backend_name(),
        artifacts.classifier().n_features()
    );
    let engine = artifacts.engine();
    let _ = writeln!(out, "attribution engine: {}", engine.engine_name());
    for class in Class::ALL {
        let _ = writeln!(out, "  baseline {class}: {:.4}", engine.baseline(class));
    }
    if let Some(card) = artifacts.card() {
        let _ = writeln!(out, "model: {}", card.name);
        if let Some(at) = &card.trained_at {
            let _ = writeln!(out, "  trained at {at}");
        }
        if let Some(n) = card.training_samples {
            let _ = writeln!(out, "  {n} training samples");
        }
        for (metric, value) in &card.metrics {
            let _ = writeln!(out, "  {metric}: {value:.4}");
        }
    }
    out
}
