//! Three-field schema and a three-stump forest shared by unit tests.
//!
//! Each stump splits on a different field, so every attribution equals
//! `(leaf - tree mean) / 3` and expected values can be worked out by hand.
//! Confirmed-class probabilities per stump:
//!
//! | field           | split  | left | right | mean   |
//! |-----------------|--------|------|-------|--------|
//! | koi_fpflag_nt   | <= 0.5 | 0.75 | 0.05  | 0.4    |
//! | koi_model_snr   | <= 20  | 0.25 | 0.8   | 0.525  |
//! | koi_prad        | <= 10  | 0.7  | 0.125 | 0.4125 |

use koi_model::{Artifacts, DecisionTree, FeatureSchema, ImputationReference, RandomForest, TreeNode};
use koi_table::RawTable;

pub(crate) const FIELDS: [&str; 3] = ["koi_fpflag_nt", "koi_model_snr", "koi_prad"];

pub(crate) fn schema() -> FeatureSchema {
    FeatureSchema::new(FIELDS).unwrap()
}

pub(crate) fn imputation() -> ImputationReference {
    [
        ("koi_fpflag_nt".to_string(), 0.2),
        ("koi_model_snr".to_string(), 259.9),
        ("koi_prad".to_string(), 102.9),
    ]
    .into_iter()
    .collect()
}

pub(crate) fn stump(feature: usize, threshold: f64, left: [f64; 2], right: [f64; 2]) -> DecisionTree {
    let leaf = |counts: [f64; 2]| TreeNode::Leaf {
        value: counts.to_vec(),
        cover: counts.iter().sum(),
    };
    let nodes = vec![
        TreeNode::Split {
            feature,
            threshold,
            left: 1,
            right: 2,
            cover: left.iter().sum::<f64>() + right.iter().sum::<f64>(),
        },
        leaf(left),
        leaf(right),
    ];
    DecisionTree::new(nodes, FIELDS.len()).unwrap()
}

pub(crate) fn forest() -> RandomForest {
    forest_of(vec![
        stump(0, 0.5, [10.0, 30.0], [38.0, 2.0]),
        stump(1, 20.0, [30.0, 10.0], [8.0, 32.0]),
        stump(2, 10.0, [12.0, 28.0], [35.0, 5.0]),
    ])
}

pub(crate) fn forest_of(trees: Vec<DecisionTree>) -> RandomForest {
    RandomForest::new(FIELDS.len(), trees)
        .unwrap()
        .with_feature_names(FIELDS.iter().map(|f| f.to_string()).collect())
        .unwrap()
}

pub(crate) fn artifacts() -> Artifacts {
    artifacts_of(forest())
}

pub(crate) fn artifacts_of(forest: RandomForest) -> Artifacts {
    Artifacts::from_forest(schema(), imputation(), forest).unwrap()
}

/// Confirmed-class baseline of [`forest`].
pub(crate) const BASELINE: f64 = (0.4 + 0.525 + 0.4125) / 3.0;

/// A: confirmed (0.75), B: false positive (0.141667), C: confirmed (0.566667).
pub(crate) fn three_candidates() -> RawTable {
    RawTable::from_csv_str(
        "kepoi_name,koi_fpflag_nt,koi_model_snr,koi_prad,koi_depth,koi_period\n\
         A,0,35.8,2.26,615.8,9.488\n\
         B,1,5.1,14.6,874.8,19.899\n\
         C,0,12.0,1.1,10829.0,1.737\n",
    )
    .unwrap()
}
