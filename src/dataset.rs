use std::fmt;

use crate::feature::{SparseFeatureVector, StringFeatureVector};

/// A training instance before vocabulary lookup
#[derive(Debug, Clone, PartialEq)]
pub struct StringInstance {
    /// Label string
    pub label: String,
    /// Raw `(type, value)` features
    pub features: StringFeatureVector,
}

impl StringInstance {
    pub fn new<S: Into<String>>(label: S, features: StringFeatureVector) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }
}

/// A training instance whose features are already indexed but whose label
/// is still a string
#[derive(Debug, Clone, PartialEq)]
pub struct SparseInstance {
    pub label: String,
    pub features: SparseFeatureVector,
}

impl SparseInstance {
    pub fn new<S: Into<String>>(label: S, features: SparseFeatureVector) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }
}

/// A fully resolved instance: label index plus indexed features
#[derive(Debug, Clone, PartialEq)]
pub struct IntInstance {
    /// Label index
    pub label: usize,
    /// Resolved features
    pub features: SparseFeatureVector,
}

impl IntInstance {
    pub fn new(label: usize, features: SparseFeatureVector) -> Self {
        Self { label, features }
    }

    pub fn is_label(&self, label: usize) -> bool {
        self.label == label
    }
}

impl fmt::Display for IntInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "{} {}", self.label, self.features)
        }
    }
}
