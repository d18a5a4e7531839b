use std::fmt;

/// Raw feature vector keyed by `(type, value)` pairs
///
/// This is the form produced by feature extractors, before any vocabulary
/// lookup. A vector is either weighted or unweighted for its whole lifetime;
/// entries of an unweighted vector score with weight `1.0`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringFeatureVector {
    types: Vec<u32>,
    values: Vec<String>,
    weights: Option<Vec<f64>>,
}

impl StringFeatureVector {
    /// Create an empty unweighted vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty weighted vector
    pub fn weighted() -> Self {
        Self {
            weights: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Append a feature; weighted vectors record it with weight `1.0`
    pub fn add_feature<S: Into<String>>(&mut self, ftype: u32, value: S) {
        self.types.push(ftype);
        self.values.push(value.into());
        if let Some(weights) = &mut self.weights {
            weights.push(1.0);
        }
    }

    /// Append a feature with an explicit weight
    ///
    /// The weight is discarded when the vector was created unweighted.
    pub fn add_weighted_feature<S: Into<String>>(&mut self, ftype: u32, value: S, weight: f64) {
        debug_assert!(self.has_weight(), "weight given to an unweighted vector");
        self.types.push(ftype);
        self.values.push(value.into());
        if let Some(weights) = &mut self.weights {
            weights.push(weight);
        }
    }

    pub fn has_weight(&self) -> bool {
        self.weights.is_some()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn ftype(&self, index: usize) -> u32 {
        self.types[index]
    }

    pub fn value(&self, index: usize) -> &str {
        &self.values[index]
    }

    pub fn weight(&self, index: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[index])
    }

    /// Iterate over `(type, value, weight)` entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, f64)> + '_ {
        (0..self.len()).map(move |i| (self.types[i], self.values[i].as_str(), self.weight(i)))
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for StringFeatureVector {
    fn from_iter<T: IntoIterator<Item = (u32, S)>>(iter: T) -> Self {
        let mut vector = Self::new();
        for (ftype, value) in iter {
            vector.add_feature(ftype, value);
        }
        vector
    }
}

impl<S: Into<String>> FromIterator<(u32, S, f64)> for StringFeatureVector {
    fn from_iter<T: IntoIterator<Item = (u32, S, f64)>>(iter: T) -> Self {
        let mut vector = Self::weighted();
        for (ftype, value, weight) in iter {
            vector.add_weighted_feature(ftype, value, weight);
        }
        vector
    }
}

/// Resolved feature vector keyed by global feature index
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseFeatureVector {
    indices: Vec<usize>,
    weights: Option<Vec<f64>>,
}

impl SparseFeatureVector {
    /// Create an empty unweighted vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty weighted vector
    pub fn weighted() -> Self {
        Self {
            indices: Vec::new(),
            weights: Some(Vec::new()),
        }
    }

    pub(crate) fn with_capacity(cap: usize, weighted: bool) -> Self {
        Self {
            indices: Vec::with_capacity(cap),
            weights: if weighted {
                Some(Vec::with_capacity(cap))
            } else {
                None
            },
        }
    }

    pub fn add_feature(&mut self, index: usize) {
        self.indices.push(index);
        if let Some(weights) = &mut self.weights {
            weights.push(1.0);
        }
    }

    /// Append a feature with an explicit weight
    ///
    /// The weight is discarded when the vector was created unweighted.
    pub fn add_weighted_feature(&mut self, index: usize, weight: f64) {
        debug_assert!(self.has_weight(), "weight given to an unweighted vector");
        self.indices.push(index);
        if let Some(weights) = &mut self.weights {
            weights.push(weight);
        }
    }

    pub fn has_weight(&self) -> bool {
        self.weights.is_some()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn index(&self, i: usize) -> usize {
        self.indices[i]
    }

    pub fn weight(&self, i: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[i])
    }

    /// Largest feature index, if any
    pub fn max_index(&self) -> Option<usize> {
        self.indices.iter().copied().max()
    }

    /// Iterate over `(index, weight)` entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.len()).map(move |i| (self.indices[i], self.weight(i)))
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.indices.shrink_to_fit();
        if let Some(weights) = &mut self.weights {
            weights.shrink_to_fit();
        }
    }
}

impl FromIterator<usize> for SparseFeatureVector {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self {
            indices: iter.into_iter().collect(),
            weights: None,
        }
    }
}

impl FromIterator<(usize, f64)> for SparseFeatureVector {
    fn from_iter<T: IntoIterator<Item = (usize, f64)>>(iter: T) -> Self {
        let (indices, weights) = iter.into_iter().unzip();
        Self {
            indices,
            weights: Some(weights),
        }
    }
}

impl fmt::Display for SparseFeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (index, weight)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if self.has_weight() {
                write!(f, "{}:{}", index, weight)?;
            } else {
                write!(f, "{}", index)?;
            }
        }
        Ok(())
    }
}
