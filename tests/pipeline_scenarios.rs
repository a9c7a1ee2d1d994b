use std::fs;

use koi_model::{ArtifactError, Artifacts, Class};
use koi_pipeline::{
    analyze, explain, explain_named, AnalysisOptions, DataQuality, DataWarning, NarrativeConfig,
    PipelineError,
};
use pretty_assertions::assert_eq;
use tests::{artifact_dir, artifacts, table, CANDIDATES_CSV, CONFIRMED_BASELINE, FIELDS};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const COMPLETE: &str = "\
kepoi_name,koi_fpflag_nt,koi_fpflag_ss,koi_fpflag_co,koi_fpflag_ec,koi_model_snr,koi_prad,koi_depth,koi_period,koi_duration,koi_teq
A,0,0,0,0,35.8,2.26,615.8,9.488,2.9575,793
B,0,1,0,0,505.6,33.46,8079.2,1.7369,2.406,1395
C,0,0,1,1,8.2,1.59,1008.0,0.6,1.21,1900
";

#[test]
fn demo_export_is_classified() {
    init();
    let bundle = analyze(
        &table(CANDIDATES_CSV),
        &artifacts(),
        &AnalysisOptions::default(),
    )
    .unwrap();

    let rows: Vec<(&str, Class, String)> = bundle
        .results()
        .iter()
        .map(|r| (r.kepoi_name.as_str(), r.prediction, r.confidence.to_string()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("K00752.01", Class::Confirmed, "69.92%".to_string()),
            ("K00752.02", Class::Confirmed, "69.92%".to_string()),
            ("K00754.01", Class::FalsePositive, "56.48%".to_string()),
            ("K00755.01", Class::Confirmed, "69.92%".to_string()),
            ("K00756.01", Class::FalsePositive, "53.05%".to_string()),
        ]
    );

    // K00755.01 has no equilibrium temperature in the export
    assert_eq!(
        bundle.warnings().messages(),
        vec!["Empty cells were filled with default values in columns: koi_teq"]
    );
    assert!(bundle
        .results()
        .iter()
        .all(|r| r.data_quality == DataQuality::Imputed));
    assert_eq!(bundle.results()[3].koi_teq, Some(1085.4));
    assert_eq!(bundle.results()[0].koi_teq, Some(793.0));
    assert_eq!(bundle.results()[0].koi_depth, Some(615.8));
}

#[test]
fn complete_input_has_sentinel_only() {
    let bundle = analyze(&table(COMPLETE), &artifacts(), &AnalysisOptions::default()).unwrap();
    assert_eq!(bundle.len(), 3);
    assert_eq!(
        bundle.warnings().entries(),
        &[DataWarning::Complete]
    );
    assert_eq!(
        bundle.warnings().messages(),
        vec!["Perfect analysis: all data was complete and in the expected format."]
    );
    assert!(bundle
        .results()
        .iter()
        .all(|r| r.data_quality == DataQuality::Complete));
}

#[test]
fn missing_column_is_filled_with_reference_mean() {
    let csv = "\
kepoi_name,koi_fpflag_nt,koi_fpflag_ss,koi_fpflag_co,koi_fpflag_ec,koi_prad,koi_depth,koi_period,koi_duration,koi_teq
A,0,0,0,0,2.26,615.8,9.488,2.9575,793
B,0,1,0,0,33.46,8079.2,1.7369,2.406,1395
C,0,0,1,1,1.59,1008.0,0.6,1.21,1900
";
    let bundle = analyze(&table(csv), &artifacts(), &AnalysisOptions::default()).unwrap();
    assert_eq!(
        bundle.warnings().entries(),
        &[DataWarning::SynthesizedColumns(vec!["koi_model_snr".to_string()])]
    );
    let snr = FIELDS.iter().position(|f| *f == "koi_model_snr").unwrap();
    assert!(bundle.features().column(snr).iter().all(|v| *v == 259.9));
    assert!(bundle
        .results()
        .iter()
        .all(|r| r.data_quality == DataQuality::Imputed));
}

#[test]
fn single_empty_cell_only_touches_that_row() {
    let csv = COMPLETE.replace("B,0,1,0,0,505.6,", "B,0,1,0,0,,");
    let bundle = analyze(&table(&csv), &artifacts(), &AnalysisOptions::default()).unwrap();
    assert_eq!(
        bundle.warnings().messages(),
        vec!["Empty cells were filled with default values in columns: koi_model_snr"]
    );
    let snr = FIELDS.iter().position(|f| *f == "koi_model_snr").unwrap();
    let column: Vec<f64> = bundle.features().column(snr).to_vec();
    assert_eq!(column, vec![35.8, 259.9, 8.2]);
}

#[test]
fn attributions_add_up_to_probabilities() {
    let bundle = analyze(
        &table(CANDIDATES_CSV),
        &artifacts(),
        &AnalysisOptions::default(),
    )
    .unwrap();
    assert!((bundle.baseline(Class::Confirmed) - CONFIRMED_BASELINE).abs() < 1e-12);
    for c in 0..bundle.len() {
        for class in Class::ALL {
            let reconstructed = bundle.baseline(class) + bundle.attributions().total(c, class);
            let p = bundle.probabilities()[[c, class.index()]];
            assert!((reconstructed - p).abs() < 1e-9, "candidate {c} {class}");
        }
    }
}

#[test]
fn false_positive_narrative_names_the_flags() {
    let bundle = analyze(&table(COMPLETE), &artifacts(), &AnalysisOptions::default()).unwrap();
    let n = explain_named(&bundle, "B", &NarrativeConfig::default()).unwrap();
    assert_eq!(n.prediction, Class::FalsePositive);
    let fields: Vec<&str> = n.factors.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["koi_fpflag_ss", "koi_prad"]);
    assert_eq!(
        n.text,
        "B is classified as FALSE POSITIVE with 56.48% confidence. \
         Main factors: a secondary eclipse suggests an eclipsing binary; \
         the estimated radius of 33.46 Earth radii is too large for a planet."
    );

    let c = explain(&bundle, 2, &NarrativeConfig::default()).unwrap();
    let fields: Vec<&str> = c.factors.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(
        fields,
        vec!["koi_fpflag_ec", "koi_fpflag_co", "koi_period", "koi_model_snr"]
    );
}

#[test]
fn numeric_identifiers_are_explained_by_their_spelling() {
    let csv = COMPLETE.replace("\nA,", "\n0123,").replace("\nB,", "\n752.10,");
    let bundle = analyze(&table(&csv), &artifacts(), &AnalysisOptions::default()).unwrap();
    let names: Vec<&str> = bundle.results().iter().map(|r| r.kepoi_name.as_str()).collect();
    assert_eq!(names, vec!["0123", "752.10", "C"]);

    let n = explain_named(&bundle, "752.10", &NarrativeConfig::default()).unwrap();
    assert_eq!(n.prediction, Class::FalsePositive);
    assert!(n.text.starts_with("752.10 is classified as FALSE POSITIVE"));
    assert!(explain_named(&bundle, "0123", &NarrativeConfig::default()).is_ok());
}

#[test]
fn raising_threshold_leaves_no_dominant_factor() {
    let bundle = analyze(&table(COMPLETE), &artifacts(), &AnalysisOptions::default()).unwrap();
    let config = NarrativeConfig {
        materiality_threshold: 0.2,
    };
    let n = explain(&bundle, 0, &config).unwrap();
    assert!(n.factors.is_empty());
    assert!(n
        .text
        .contains("near the decision boundary with no single dominant factor"));
}

#[test]
fn missing_artifact_fails_fast() {
    let (_dir, paths) = artifact_dir();
    fs::remove_file(&paths.model).unwrap();
    let err = Artifacts::load(&paths).unwrap_err();
    assert!(matches!(err, ArtifactError::Missing { .. }));
    assert!(err.to_string().contains("run the offline preparation step"));
}

#[test]
fn text_in_feature_column_is_fatal() {
    let csv = COMPLETE.replace("A,0,0,0,0,35.8", "A,0,0,0,0,strong");
    let err = analyze(&table(&csv), &artifacts(), &AnalysisOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::NonNumeric { .. }));
    assert!(err.to_string().contains("koi_model_snr"));
}

#[test]
fn shared_artifacts_serve_many_invocations() {
    let artifacts = artifacts();
    let first = analyze(&table(COMPLETE), &artifacts, &AnalysisOptions::default()).unwrap();
    let between = analyze(
        &table("kepoi_name,koi_prad\nX,\n"),
        &artifacts,
        &AnalysisOptions::default(),
    )
    .unwrap();
    assert_eq!(between.warnings().len(), 2);
    let second = analyze(&table(COMPLETE), &artifacts, &AnalysisOptions::default()).unwrap();
    assert_eq!(first.results(), second.results());
    assert_eq!(first.features(), second.features());
    assert_eq!(first.warnings(), second.warnings());
}

#[test]
fn concurrent_invocations_share_artifacts() {
    let artifacts = artifacts();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    analyze(&table(COMPLETE), &artifacts, &AnalysisOptions::default())
                        .unwrap()
                        .summary()
                })
            })
            .collect();
        for h in handles {
            let summary = h.join().unwrap();
            assert_eq!(summary.total, 3);
            assert_eq!(summary.confirmed, 1);
        }
    });
}
