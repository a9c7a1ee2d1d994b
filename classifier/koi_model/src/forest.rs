//! Random-forest classifier exported from the training step.
//!
//! Trees follow the scikit-learn convention: a split sends
//! `x[feature] <= threshold` to the left child, leaves carry a class
//! distribution, and every node records its cover (number of training
//! samples that reached it). The forest probability is the mean of the leaf
//! distributions the candidate lands in.

use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::backend::{check_input, Classifier, ModelError};
use crate::class::Class;

/// Descriptive metadata written alongside the model by the training step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_samples: Option<usize>,
    /// Cross-validated metrics, e.g. `accuracy`, `roc_auc`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: Vec<f64>,
        cover: f64,
    },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single binary decision tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Build a tree, checking structure and normalising leaf distributions.
    pub fn new(mut nodes: Vec<TreeNode>, n_features: usize) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::InvalidModel("tree has no nodes".into()));
        }
        let covers: Vec<f64> = nodes.iter().map(TreeNode::cover).collect();
        let n = nodes.len();
        for (idx, node) in nodes.iter_mut().enumerate() {
            let cover = covers[idx];
            if !(cover.is_finite() && cover > 0.0) {
                return Err(ModelError::InvalidModel(format!(
                    "node {idx} has non-positive cover {cover}"
                )));
            }
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(ModelError::InvalidModel(format!(
                            "node {idx} splits on feature {feature} but the model has {n_features}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::InvalidModel(format!(
                            "node {idx} has non-finite threshold"
                        )));
                    }
                    // Children after parents keeps every tree acyclic.
                    for child in [*left, *right] {
                        if child <= idx || child >= n {
                            return Err(ModelError::InvalidModel(format!(
                                "node {idx} has invalid child {child}"
                            )));
                        }
                    }
                    if left == right {
                        return Err(ModelError::InvalidModel(format!(
                            "node {idx} uses node {left} for both children"
                        )));
                    }
                    let children = covers[*left] + covers[*right];
                    if (children - cover).abs() > 1e-9 * cover.max(1.0) {
                        return Err(ModelError::InvalidModel(format!(
                            "node {idx} cover {cover} differs from its children's {children}"
                        )));
                    }
                }
                TreeNode::Leaf { value, .. } => {
                    if value.len() != Class::COUNT {
                        return Err(ModelError::InvalidModel(format!(
                            "leaf {idx} has {} class values, expected {}",
                            value.len(),
                            Class::COUNT
                        )));
                    }
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                        return Err(ModelError::InvalidModel(format!(
                            "leaf {idx} has a negative or non-finite class value"
                        )));
                    }
                    let total: f64 = value.iter().sum();
                    if total <= 0.0 {
                        return Err(ModelError::InvalidModel(format!(
                            "leaf {idx} has an all-zero class distribution"
                        )));
                    }
                    // class counts become proportions
                    value.iter_mut().for_each(|v| *v /= total);
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    pub fn cover(&self, index: usize) -> f64 {
        self.nodes[index].cover()
    }

    /// Class distribution of the leaf reached by `features`.
    pub fn predict(&self, features: ArrayView1<'_, f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean leaf distribution, i.e. the tree's output with no
    /// feature known.
    pub fn expected_value(&self) -> Array1<f64> {
        let mut expected = vec![Array1::<f64>::zeros(Class::COUNT); self.nodes.len()];
        for idx in (0..self.nodes.len()).rev() {
            let value = match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => Array1::from(value.clone()),
                TreeNode::Split {
                    left, right, cover, ..
                } => {
                    (&expected[*left] * self.cover(*left) + &expected[*right] * self.cover(*right))
                        / *cover
                }
            };
            expected[idx] = value;
        }
        expected.swap_remove(0)
    }
}

/// Ensemble of decision trees averaged into class probabilities.
///
/// Only [`RandomForest::from_json_str`] reads exports, so every loaded forest
/// has been validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RandomForest {
    n_features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card: Option<ModelCard>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(n_features: usize, trees: Vec<DecisionTree>) -> Result<Self, ModelError> {
        if n_features == 0 {
            return Err(ModelError::InvalidModel(
                "forest must use at least one feature".into(),
            ));
        }
        if trees.is_empty() {
            return Err(ModelError::InvalidModel("forest has no trees".into()));
        }
        Ok(Self {
            n_features,
            feature_names: None,
            card: None,
            trees,
        })
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self, ModelError> {
        if names.len() != self.n_features {
            return Err(ModelError::InvalidModel(format!(
                "{} feature names given for a {}-feature forest",
                names.len(),
                self.n_features
            )));
        }
        self.feature_names = Some(names);
        Ok(self)
    }

    pub fn with_card(mut self, card: ModelCard) -> Self {
        self.card = Some(card);
        self
    }

    /// Parse and validate a forest from its JSON export.
    pub fn from_json_str(text: &str) -> Result<Self, ModelError> {
        #[derive(Deserialize)]
        struct Raw {
            n_features: usize,
            #[serde(default)]
            feature_names: Option<Vec<String>>,
            #[serde(default)]
            card: Option<ModelCard>,
            trees: Vec<RawTree>,
        }
        #[derive(Deserialize)]
        struct RawTree {
            nodes: Vec<TreeNode>,
        }

        let raw: Raw = serde_json::from_str(text)
            .map_err(|e| ModelError::InvalidModel(format!("cannot parse forest: {e}")))?;
        let trees = raw
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                DecisionTree::new(t.nodes, raw.n_features).map_err(|e| match e {
                    ModelError::InvalidModel(msg) => {
                        ModelError::InvalidModel(format!("tree {i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut forest = RandomForest::new(raw.n_features, trees)?;
        if let Some(names) = raw.feature_names {
            forest = forest.with_feature_names(names)?;
        }
        if let Some(card) = raw.card {
            forest = forest.with_card(card);
        }
        log::debug!(
            "loaded forest with {} trees over {} features",
            forest.trees.len(),
            forest.n_features
        );
        Ok(forest)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = read_to_string(path).map_err(|e| {
            ModelError::InvalidModel(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn card(&self) -> Option<&ModelCard> {
        self.card.as_ref()
    }

    /// Probability row for a single candidate.
    pub fn predict_row(&self, features: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut acc = Array1::<f64>::zeros(Class::COUNT);
        for tree in &self.trees {
            for (a, v) in acc.iter_mut().zip(tree.predict(features)) {
                *a += v;
            }
        }
        acc / self.trees.len() as f64
    }

    /// Mean of the trees' expected values.
    pub fn expected_value(&self) -> Array1<f64> {
        let sum = self
            .trees
            .iter()
            .fold(Array1::<f64>::zeros(Class::COUNT), |acc, t| {
                acc + t.expected_value()
            });
        sum / self.trees.len() as f64
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_input(features, self.n_features)?;
        let mut out = Array2::zeros((features.nrows(), Class::COUNT));
        for (row, mut target) in features.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            target.assign(&self.predict_row(row));
        }
        Ok(out)
    }

    fn backend_name(&self) -> &str {
        "random_forest"
    }
}
