//! Feature schema and imputation reference.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::backend::ModelError;

/// Ordered list of the numeric fields the classifier was trained on.
///
/// Column `i` of every feature matrix is field `i` of this schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    fields: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(fields: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(ModelError::InvalidModel(
                "feature schema must name at least one field".into(),
            ));
        }
        let mut seen = HashSet::new();
        for f in &fields {
            if f.trim().is_empty() {
                return Err(ModelError::InvalidModel(
                    "feature schema contains a blank field name".into(),
                ));
            }
            if !seen.insert(f.as_str()) {
                return Err(ModelError::InvalidModel(format!(
                    "feature schema lists '{f}' more than once"
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.index_of(field).is_some()
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = ModelError;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        FeatureSchema::new(fields)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.fields
    }
}

/// Per-field fallback values (training-set means).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImputationReference {
    values: BTreeMap<String, f64>,
}

impl ImputationReference {
    pub fn new(values: BTreeMap<String, f64>) -> Result<Self, ModelError> {
        if let Some((field, v)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::InvalidModel(format!(
                "imputation value for '{field}' is not finite ({v})"
            )));
        }
        Ok(Self { values })
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Reference value, or `0.0` for a field the reference does not cover.
    pub fn fallback_for(&self, field: &str) -> f64 {
        self.get(field).unwrap_or(0.0)
    }

    /// Schema fields that have no reference entry.
    pub fn uncovered<'a>(&self, schema: &'a FeatureSchema) -> Vec<&'a str> {
        schema
            .iter()
            .filter(|f| !self.values.contains_key(*f))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for ImputationReference {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
