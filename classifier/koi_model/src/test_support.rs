//! Small hand-built trees shared by unit tests.

use crate::forest::TreeNode;

/// One split on `feature`; leaf values are class counts.
pub(crate) fn stump(feature: usize, threshold: f64, left: [f64; 2], right: [f64; 2]) -> Vec<TreeNode> {
    let lc: f64 = left.iter().sum();
    let rc: f64 = right.iter().sum();
    vec![
        TreeNode::Split {
            feature,
            threshold,
            left: 1,
            right: 2,
            cover: lc + rc,
        },
        TreeNode::Leaf {
            value: left.to_vec(),
            cover: lc,
        },
        TreeNode::Leaf {
            value: right.to_vec(),
            cover: rc,
        },
    ]
}

pub(crate) fn leaf(counts: [f64; 2]) -> TreeNode {
    TreeNode::Leaf {
        value: counts.to_vec(),
        cover: counts.iter().sum(),
    }
}

pub(crate) fn split(feature: usize, threshold: f64, left: usize, right: usize, cover: f64) -> TreeNode {
    TreeNode::Split {
        feature,
        threshold,
        left,
        right,
        cover,
    }
}
