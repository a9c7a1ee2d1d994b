//! Shared fixtures: the demo artifact set shipped under `demos/`.

use std::fs;
use std::path::Path;

use koi_model::{ArtifactPaths, Artifacts};
use koi_table::RawTable;
use tempfile::TempDir;

pub const MODEL_JSON: &str = include_str!("../../demos/artifacts/model.json");
pub const SCHEMA_JSON: &str = include_str!("../../demos/artifacts/schema.json");
pub const IMPUTATION_JSON: &str = include_str!("../../demos/artifacts/imputation.json");
pub const CANDIDATES_CSV: &str = include_str!("../../demos/candidates.csv");

/// Field order of the demo schema.
pub const FIELDS: [&str; 10] = [
    "koi_fpflag_nt",
    "koi_fpflag_ss",
    "koi_fpflag_co",
    "koi_fpflag_ec",
    "koi_model_snr",
    "koi_prad",
    "koi_depth",
    "koi_period",
    "koi_duration",
    "koi_teq",
];

/// Confirmed-class baseline of the demo forest.
pub const CONFIRMED_BASELINE: f64 = 0.506;

/// Write the demo artifacts into a fresh temporary directory.
pub fn artifact_dir() -> (TempDir, ArtifactPaths) {
    let dir = tempfile::tempdir().expect("tempdir");
    write_artifacts(dir.path());
    let paths = ArtifactPaths::in_dir(dir.path());
    (dir, paths)
}

pub fn write_artifacts(dir: &Path) {
    fs::write(dir.join("model.json"), MODEL_JSON).expect("write model");
    fs::write(dir.join("schema.json"), SCHEMA_JSON).expect("write schema");
    fs::write(dir.join("imputation.json"), IMPUTATION_JSON).expect("write imputation");
}

pub fn artifacts() -> Artifacts {
    let (_dir, paths) = artifact_dir();
    Artifacts::load(&paths).expect("load demo artifacts")
}

pub fn table(csv: &str) -> RawTable {
    RawTable::from_csv_str(csv).expect("parse csv")
}

/// CSV text with the given header and rows.
pub fn csv_text(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}
