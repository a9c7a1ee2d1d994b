//! Warning log produced by schema reconciliation.

use std::fmt;

use serde::{Serialize, Serializer};

/// One deviation applied while reconciling the input, or the success sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataWarning {
    /// Schema fields absent from the input, filled from the imputation reference.
    SynthesizedColumns(Vec<String>),
    /// Schema fields that had empty cells, filled from the imputation reference.
    FilledCells(Vec<String>),
    /// Nothing had to be changed.
    Complete,
}

impl DataWarning {
    /// Field lists are sorted so the message is stable across runs.
    pub fn synthesized_columns<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataWarning::SynthesizedColumns(sorted(fields))
    }

    pub fn filled_cells<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataWarning::FilledCells(sorted(fields))
    }

    /// Fields this warning names.
    pub fn fields(&self) -> &[String] {
        match self {
            DataWarning::SynthesizedColumns(f) | DataWarning::FilledCells(f) => f,
            DataWarning::Complete => &[],
        }
    }
}

fn sorted<I, S>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut v: Vec<String> = fields.into_iter().map(Into::into).collect();
    v.sort();
    v.dedup();
    v
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::SynthesizedColumns(fields) => write!(
                f,
                "Missing columns were filled with default values: {}",
                fields.join(", ")
            ),
            DataWarning::FilledCells(fields) => write!(
                f,
                "Empty cells were filled with default values in columns: {}",
                fields.join(", ")
            ),
            DataWarning::Complete => f.write_str(
                "Perfect analysis: all data was complete and in the expected format.",
            ),
        }
    }
}

impl Serialize for DataWarning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered, never-empty log of reconciliation deviations.
///
/// Holds either the deviations that were applied or exactly the
/// [`DataWarning::Complete`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WarningLog(Vec<DataWarning>);

impl WarningLog {
    pub fn complete() -> Self {
        WarningLog(vec![DataWarning::Complete])
    }

    /// Log for a set of deviations; falls back to the sentinel when there are none.
    pub fn from_deviations(deviations: Vec<DataWarning>) -> Self {
        let deviations: Vec<_> = deviations
            .into_iter()
            .filter(|w| *w != DataWarning::Complete)
            .collect();
        if deviations.is_empty() {
            Self::complete()
        } else {
            WarningLog(deviations)
        }
    }

    /// True when the input needed no substitution at all.
    pub fn is_complete(&self) -> bool {
        self.0 == [DataWarning::Complete]
    }

    pub fn entries(&self) -> &[DataWarning] {
        &self.0
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Whether any value shown for a candidate was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Complete,
    Imputed,
}

impl DataQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            DataQuality::Complete => "complete",
            DataQuality::Imputed => "imputed",
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
