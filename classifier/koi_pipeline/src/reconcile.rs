//! Aligning an arbitrary input table with the trained feature schema.
//!
//! Reconciliation never fails. Absent schema columns are synthesised from the
//! imputation reference, empty cells are filled from it, extra columns are
//! dropped, and every substitution is recorded in the [`WarningLog`].

use koi_model::{FeatureSchema, ImputationReference};
use koi_table::{Cell, RawTable, IDENTIFIER_COLUMN};
use ndarray::Array2;

use crate::error::PipelineError;
use crate::warnings::{DataQuality, DataWarning, WarningLog};

/// Reconciled cells: one row per candidate, one column per schema field in
/// schema order, no empty cells.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    fields: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl FeatureFrame {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, field: &str) -> Option<&Cell> {
        let col = self.fields.iter().position(|f| f == field)?;
        self.rows.get(row).map(|r| &r[col])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Output of [`reconcile`]: the feature frame plus the side table of
/// identifiers and quality tag used when assembling results.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub frame: FeatureFrame,
    pub identifiers: Vec<String>,
    pub quality: DataQuality,
    pub warnings: WarningLog,
}

impl Reconciled {
    /// Numeric feature matrix in schema order.
    ///
    /// Text left in a schema column cannot be fed to the model; that is a
    /// contract violation and fails the whole analysis.
    pub fn to_matrix(&self) -> Result<Array2<f64>, PipelineError> {
        let n_rows = self.frame.n_rows();
        let n_cols = self.frame.fields.len();
        let mut matrix = Array2::zeros((n_rows, n_cols));
        for (r, row) in self.frame.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                matrix[[r, c]] = match cell {
                    Cell::Number(v) => *v,
                    other => {
                        return Err(PipelineError::NonNumeric {
                            candidate: self.identifiers[r].clone(),
                            field: self.frame.fields[c].clone(),
                            value: other.to_string(),
                        })
                    }
                };
            }
        }
        Ok(matrix)
    }

    pub fn n_candidates(&self) -> usize {
        self.identifiers.len()
    }
}

/// Reconcile `raw` against `schema`, filling gaps from `imputation`.
pub fn reconcile(
    raw: &RawTable,
    schema: &FeatureSchema,
    imputation: &ImputationReference,
) -> Reconciled {
    let n_rows = raw.n_rows();
    let mut deviations = Vec::new();

    // Step 1: project onto the schema; anything else in the input is ignored.
    let sources: Vec<Option<usize>> = schema.iter().map(|f| raw.column_index(f)).collect();
    let ignored = raw
        .columns()
        .iter()
        .filter(|c| c.as_str() != IDENTIFIER_COLUMN && !schema.contains(c))
        .count();
    if ignored > 0 {
        log::debug!("ignoring {ignored} input columns outside the schema");
    }

    // Step 2: synthesise absent columns.
    let absent: Vec<&str> = schema
        .iter()
        .zip(&sources)
        .filter(|(_, src)| src.is_none())
        .map(|(f, _)| f)
        .collect();
    if !absent.is_empty() {
        deviations.push(DataWarning::synthesized_columns(absent.iter().copied()));
    }

    let mut rows: Vec<Vec<Cell>> = (0..n_rows)
        .map(|r| {
            schema
                .iter()
                .zip(&sources)
                .map(|(field, src)| match src {
                    Some(c) => raw.row(r).map(|row| row[*c].clone()).unwrap_or(Cell::Empty),
                    None => Cell::Number(imputation.fallback_for(field)),
                })
                .collect()
        })
        .collect();

    // Step 3: fill empty cells field by field.
    let mut with_gaps = Vec::new();
    let mut filled = 0usize;
    for (c, field) in schema.iter().enumerate() {
        let fallback = imputation.get(field);
        let mut gap = false;
        for row in rows.iter_mut() {
            if row[c].is_empty() {
                gap = true;
                filled += 1;
                row[c] = Cell::Number(fallback.unwrap_or(0.0));
            }
        }
        if gap {
            if fallback.is_none() {
                log::warn!("no imputation value for '{field}', empty cells set to 0.0");
            }
            with_gaps.push(field);
        }
    }
    if !with_gaps.is_empty() {
        log::debug!("filled {filled} empty cells across {} fields", with_gaps.len());
        deviations.push(DataWarning::filled_cells(with_gaps));
    }

    // Step 4: tag rows.
    let quality = if deviations.is_empty() {
        DataQuality::Complete
    } else {
        DataQuality::Imputed
    };
    let warnings = WarningLog::from_deviations(deviations);

    let identifiers = candidate_identifiers(raw);

    // Step 5: the frame already follows schema order.
    Reconciled {
        frame: FeatureFrame {
            fields: schema.fields().to_vec(),
            rows,
        },
        identifiers,
        quality,
        warnings,
    }
}

/// Candidate names, synthesised as `row-<n>` where the input has none.
fn candidate_identifiers(raw: &RawTable) -> Vec<String> {
    let fallback = |r: usize| format!("row-{}", r + 1);
    match raw.column(IDENTIFIER_COLUMN) {
        Some(cells) => cells
            .enumerate()
            .map(|(r, cell)| cell.as_text().unwrap_or_else(|| fallback(r)))
            .collect(),
        None => {
            if raw.n_rows() > 0 {
                log::warn!(
                    "input has no '{IDENTIFIER_COLUMN}' column; candidates are named by row number"
                );
            }
            (0..raw.n_rows()).map(fallback).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{imputation, schema};
    use pretty_assertions::assert_eq;

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv_str(csv).unwrap()
    }

    #[test]
    fn complete_input_gets_sentinel() {
        let raw = table(
            "kepoi_name,koi_fpflag_nt,koi_model_snr,koi_prad\n\
             A,0,35.8,2.26\nB,1,5.1,14.6\nC,0,12.0,1.1\n",
        );
        let r = reconcile(&raw, &schema(), &imputation());
        assert!(r.warnings.is_complete());
        assert_eq!(r.quality, DataQuality::Complete);
        assert_eq!(r.identifiers, vec!["A", "B", "C"]);
        assert_eq!(r.frame.cell(1, "koi_model_snr"), Some(&Cell::Number(5.1)));
    }

    #[test]
    fn absent_column_is_synthesised_from_reference() {
        let raw = table("kepoi_name,koi_fpflag_nt,koi_prad\nA,0,2.26\nB,1,14.6\n");
        let r = reconcile(&raw, &schema(), &imputation());
        assert_eq!(r.quality, DataQuality::Imputed);
        assert_eq!(
            r.warnings.messages(),
            vec!["Missing columns were filled with default values: koi_model_snr"]
        );
        for row in 0..2 {
            assert_eq!(r.frame.cell(row, "koi_model_snr"), Some(&Cell::Number(259.9)));
        }
    }

    #[test]
    fn only_empty_cells_are_replaced() {
        let raw = table("kepoi_name,koi_fpflag_nt,koi_model_snr,koi_prad\nA,0,35.8,2.26\nB,1,,14.6\nC,0,12.0,1.1\n");
        let r = reconcile(&raw, &schema(), &imputation());
        assert_eq!(
            r.warnings.messages(),
            vec!["Empty cells were filled with default values in columns: koi_model_snr"]
        );
        assert_eq!(r.frame.cell(0, "koi_model_snr"), Some(&Cell::Number(35.8)));
        assert_eq!(r.frame.cell(1, "koi_model_snr"), Some(&Cell::Number(259.9)));
        assert_eq!(r.frame.cell(2, "koi_model_snr"), Some(&Cell::Number(12.0)));
    }

    #[test]
    fn both_deviations_are_logged_in_order() {
        let raw = table("kepoi_name,koi_prad,koi_fpflag_nt\nA,,0\n");
        let r = reconcile(&raw, &schema(), &imputation());
        let entries = r.warnings.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], DataWarning::SynthesizedColumns(_)));
        assert_eq!(entries[1].fields(), &["koi_prad".to_string()]);
    }

    #[test]
    fn extra_columns_and_order_do_not_matter() {
        let a = table("koi_prad,kepoi_name,koi_disposition,koi_model_snr,koi_fpflag_nt\n2.26,A,CONFIRMED,35.8,0\n");
        let b = table("kepoi_name,koi_fpflag_nt,koi_model_snr,koi_prad\nA,0,35.8,2.26\n");
        let ra = reconcile(&a, &schema(), &imputation());
        let rb = reconcile(&b, &schema(), &imputation());
        assert_eq!(ra, rb);
        assert_eq!(ra.frame.fields(), schema().fields());
    }

    #[test]
    fn unreferenced_field_falls_back_to_zero() {
        let partial: ImputationReference = [("koi_prad".to_string(), 5.0)].into_iter().collect();
        let raw = table("kepoi_name,koi_fpflag_nt,koi_prad\nA,,3.0\n");
        let r = reconcile(&raw, &schema(), &partial);
        assert_eq!(r.frame.cell(0, "koi_fpflag_nt"), Some(&Cell::Number(0.0)));
        assert_eq!(r.frame.cell(0, "koi_model_snr"), Some(&Cell::Number(0.0)));
    }

    #[test]
    fn missing_identifier_column_names_rows() {
        let raw = table("koi_fpflag_nt,koi_model_snr,koi_prad\n0,1,2\n1,2,3\n");
        let r = reconcile(&raw, &schema(), &imputation());
        assert_eq!(r.identifiers, vec!["row-1", "row-2"]);
        assert!(r.warnings.is_complete());
    }

    #[test]
    fn text_in_schema_column_fails_matrix_conversion() {
        let raw = table("kepoi_name,koi_fpflag_nt,koi_model_snr,koi_prad\nA,0,high,2.0\n");
        let r = reconcile(&raw, &schema(), &imputation());
        let err = r.to_matrix().unwrap_err();
        match err {
            PipelineError::NonNumeric {
                candidate,
                field,
                value,
            } => {
                assert_eq!(candidate, "A");
                assert_eq!(field, "koi_model_snr");
                assert_eq!(value, "high");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn header_only_input_reconciles_to_empty_frame() {
        let raw = table("kepoi_name,koi_fpflag_nt,koi_model_snr,koi_prad\n");
        let r = reconcile(&raw, &schema(), &imputation());
        assert_eq!(r.n_candidates(), 0);
        assert_eq!(r.to_matrix().unwrap().dim(), (0, 3));
        assert!(r.warnings.is_complete());
    }
}
