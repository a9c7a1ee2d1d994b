use std::fmt;

use serde::{Deserialize, Serialize};

/// The two dispositions the classifier distinguishes.
///
/// The discriminants are the class indices used by the training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Class {
    #[serde(rename = "FALSE POSITIVE")]
    FalsePositive = 0,
    #[serde(rename = "CONFIRMED")]
    Confirmed = 1,
}

impl Class {
    pub const COUNT: usize = 2;
    pub const ALL: [Class; Class::COUNT] = [Class::FalsePositive, Class::Confirmed];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Class> {
        match index {
            0 => Some(Class::FalsePositive),
            1 => Some(Class::Confirmed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Class::FalsePositive => "FALSE POSITIVE",
            Class::Confirmed => "CONFIRMED",
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
