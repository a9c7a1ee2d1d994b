//! Exact TreeSHAP attributions for [`RandomForest`].
//!
//! Implements the path-dependent polynomial-time algorithm of Lundberg et al.
//! ("Consistent Individualized Feature Attribution for Tree Ensembles",
//! Algorithm 2). Unknown features are marginalised using node covers, so the
//! baseline for each class is the forest's cover-weighted expected output and
//! for every candidate `baseline + sum(attributions) == probability`.

use std::sync::Arc;

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut2, Axis};

use crate::attribution::Attributions;
use crate::backend::{check_input, AttributionEngine, Classifier, ModelError};
use crate::class::Class;
use crate::forest::{DecisionTree, RandomForest, TreeNode};

/// Attribution engine bound to one forest.
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    forest: Arc<RandomForest>,
    expected_value: Array1<f64>,
}

impl TreeExplainer {
    pub fn new(forest: Arc<RandomForest>) -> Self {
        let expected_value = forest.expected_value();
        log::debug!("tree explainer baseline: {expected_value}");
        Self {
            forest,
            expected_value,
        }
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Attributions for one candidate into a (field, class) block.
    fn explain_row(&self, row: ArrayView1<'_, f64>, mut phi: ArrayViewMut2<'_, f64>) {
        let trees = self.forest.trees();
        for tree in trees {
            recurse(tree, row, &mut phi, 0, &[], 1.0, 1.0, None);
        }
        phi.mapv_inplace(|v| v / trees.len() as f64);
    }
}

impl AttributionEngine for TreeExplainer {
    fn attributions(&self, features: ArrayView2<'_, f64>) -> Result<Attributions, ModelError> {
        check_input(features, self.forest.n_features())?;
        let mut out = Attributions::zeros(features.nrows(), features.ncols());
        for (i, row) in features.axis_iter(Axis(0)).enumerate() {
            self.explain_row(row, out.candidate_mut(i));
        }
        log::debug!(
            "computed attributions for {} candidates over {} trees",
            features.nrows(),
            self.forest.trees().len()
        );
        Ok(out)
    }

    fn baseline(&self, class: Class) -> f64 {
        self.expected_value[class.index()]
    }

    fn engine_name(&self) -> &str {
        "tree_shap"
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` only for the root placeholder.
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    // pweights stay in place; only the split descriptions shift down
    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((depth - i) as f64 / denom);
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((depth - i) as f64 / denom);
        }
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &DecisionTree,
    x: ArrayView1<'_, f64>,
    phi: &mut ArrayViewMut2<'_, f64>,
    node: usize,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = Vec::with_capacity(parent_path.len() + 1);
    path.extend_from_slice(parent_path);
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match tree.node(node) {
        TreeNode::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    let scale = weight * (el.one_fraction - el.zero_fraction);
                    for (class, v) in value.iter().enumerate() {
                        phi[[f, class]] += scale * v;
                    }
                }
            }
        }
        TreeNode::Split {
            feature: split,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if x[*split] <= *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };
            let hot_zero = tree.cover(hot) / cover;
            let cold_zero = tree.cover(cold) / cover;
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;

            // A feature split on earlier in the path is merged, not repeated.
            if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            recurse(
                tree,
                x,
                phi,
                hot,
                &path,
                hot_zero * incoming_zero,
                incoming_one,
                Some(*split),
            );
            recurse(
                tree,
                x,
                phi,
                cold,
                &path,
                cold_zero * incoming_zero,
                0.0,
                Some(*split),
            );
        }
    }
}
