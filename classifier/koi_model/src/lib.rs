//! Offline-trained artifacts for the KOI classifier and the inference
//! machinery that runs on top of them.
//!
//! The artifacts are produced once by the training step and are read-only
//! afterwards: the ordered [`FeatureSchema`], the [`ImputationReference`]
//! of training means, the [`RandomForest`] and its [`TreeExplainer`].
//! [`Artifacts`] bundles all four into one context object.

pub mod artifacts;
pub mod attribution;
pub mod backend;
pub mod class;
pub mod forest;
pub mod schema;
pub mod shap;

pub use artifacts::{ArtifactError, ArtifactPaths, Artifacts};
pub use attribution::Attributions;
pub use backend::{AttributionEngine, Classifier, ModelError};
pub use class::Class;
pub use forest::{DecisionTree, ModelCard, RandomForest, TreeNode};
pub use schema::{FeatureSchema, ImputationReference};
pub use shap::TreeExplainer;

#[cfg(test)]
mod test_support;
