//! Loading the trained artifacts into one immutable context object.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{AttributionEngine, Classifier, ModelError};
use crate::forest::{ModelCard, RandomForest};
use crate::schema::{FeatureSchema, ImputationReference};
use crate::shap::TreeExplainer;

pub const MODEL_FILE: &str = "model.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const IMPUTATION_FILE: &str = "imputation.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(
        "artifact '{}' not found; run the offline preparation step to produce the model artifacts first",
        path.display()
    )]
    Missing { path: PathBuf },
    #[error("cannot read artifact '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact '{}' is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact '{}' is invalid: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("model expects {model} features but the schema lists {schema}")]
    WidthMismatch { model: usize, schema: usize },
    #[error("model feature {index} is '{model}' but the schema has '{schema}' there")]
    SchemaMismatch {
        index: usize,
        model: String,
        schema: String,
    },
}

/// Where each artifact lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub schema: PathBuf,
    pub imputation: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside one directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            schema: dir.join(SCHEMA_FILE),
            imputation: dir.join(IMPUTATION_FILE),
        }
    }
}

fn read_artifact(path: &Path) -> Result<String, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing {
            path: path.to_path_buf(),
        });
    }
    read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_artifact<T: serde::de::DeserializeOwned>(path: &Path, text: &str) -> Result<T, ArtifactError> {
    serde_json::from_str(text).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The trained artifacts, loaded once and shared read-only by every analysis.
#[derive(Clone)]
pub struct Artifacts {
    schema: FeatureSchema,
    imputation: ImputationReference,
    classifier: Arc<dyn Classifier>,
    engine: Arc<dyn AttributionEngine>,
    card: Option<ModelCard>,
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("schema", &self.schema)
            .field("imputation", &self.imputation)
            .field("classifier", &self.classifier.backend_name())
            .field("engine", &self.engine.engine_name())
            .field("card", &self.card)
            .finish()
    }
}

impl Artifacts {
    /// Load all three artifacts. Every one of them must exist.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        // check presence first so the operator sees every missing file the same way
        for path in [&paths.model, &paths.schema, &paths.imputation] {
            if !path.exists() {
                return Err(ArtifactError::Missing { path: path.clone() });
            }
        }

        let schema: FeatureSchema =
            parse_artifact(&paths.schema, &read_artifact(&paths.schema)?)?;
        let imputation: ImputationReference =
            parse_artifact(&paths.imputation, &read_artifact(&paths.imputation)?)?;
        let forest = RandomForest::from_json_str(&read_artifact(&paths.model)?).map_err(
            |source| ArtifactError::Invalid {
                path: paths.model.clone(),
                source,
            },
        )?;

        log::info!(
            "loaded artifacts: {} schema fields, {} imputation entries, {} trees",
            schema.len(),
            imputation.len(),
            forest.trees().len()
        );
        Self::from_forest(schema, imputation, forest)
    }

    /// Assemble artifacts around a random forest and its tree explainer.
    pub fn from_forest(
        schema: FeatureSchema,
        imputation: ImputationReference,
        forest: RandomForest,
    ) -> Result<Self, ArtifactError> {
        if let Some(names) = forest.feature_names() {
            if let Some((index, (model, expected))) = names
                .iter()
                .zip(schema.iter())
                .enumerate()
                .find(|(_, (m, s))| m.as_str() != *s)
            {
                return Err(ArtifactError::SchemaMismatch {
                    index,
                    model: model.clone(),
                    schema: expected.to_string(),
                });
            }
        }
        let card = forest.card().cloned();
        let forest = Arc::new(forest);
        let engine = Arc::new(TreeExplainer::new(forest.clone()));
        let mut artifacts = Self::with_backends(schema, imputation, forest, engine)?;
        artifacts.card = card;
        Ok(artifacts)
    }

    /// Assemble artifacts around any classifier and compatible attribution engine.
    pub fn with_backends(
        schema: FeatureSchema,
        imputation: ImputationReference,
        classifier: Arc<dyn Classifier>,
        engine: Arc<dyn AttributionEngine>,
    ) -> Result<Self, ArtifactError> {
        if classifier.n_features() != schema.len() {
            return Err(ArtifactError::WidthMismatch {
                model: classifier.n_features(),
                schema: schema.len(),
            });
        }
        let uncovered = imputation.uncovered(&schema);
        if !uncovered.is_empty() {
            log::warn!(
                "imputation reference has no value for {}; 0.0 will be used",
                uncovered.join(", ")
            );
        }
        Ok(Self {
            schema,
            imputation,
            classifier,
            engine,
            card: None,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn imputation(&self) -> &ImputationReference {
        &self.imputation
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn engine(&self) -> &dyn AttributionEngine {
        self.engine.as_ref()
    }

    /// Shared handle to the attribution engine, for result bundles.
    pub fn engine_handle(&self) -> Arc<dyn AttributionEngine> {
        Arc::clone(&self.engine)
    }

    pub fn card(&self) -> Option<&ModelCard> {
        self.card.as_ref()
    }
}
