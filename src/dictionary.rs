use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::feature::{SparseFeatureVector, StringFeatureVector};

/// Scratch frequency counts, kept in first-seen order so that index
/// assignment is deterministic
#[derive(Debug, Clone, Default)]
struct Counter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Counter {
    fn add(&mut self, key: &str) {
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        } else {
            self.order.push(key.to_string());
            self.counts.insert(key.to_string(), 1);
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.order
            .iter()
            .map(move |key| (key.as_str(), self.counts[key.as_str()]))
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Bijection between label strings and label indices
///
/// Labels are counted with [`LabelMap::collect`] and receive an index only
/// when [`LabelMap::finalize`] sees a frequency above the cutoff. Indices
/// start at 0 and are never reassigned.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    /// Map from label to index
    str_to_id: HashMap<String, usize>,
    /// Map from index to label
    id_to_str: Vec<String>,
    counts: Counter,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a finalized map from labels listed in index order
    pub(crate) fn from_labels(labels: Vec<String>) -> Result<Self> {
        let mut map = Self::new();
        for label in labels {
            if map.str_to_id.contains_key(&label) {
                return Err(Error::format(format!("duplicate label '{}'", label)));
            }
            map.str_to_id.insert(label.clone(), map.id_to_str.len());
            map.id_to_str.push(label);
        }
        Ok(map)
    }

    /// Count one occurrence of `label`
    pub fn collect(&mut self, label: &str) {
        self.counts.add(label);
    }

    /// Assign indices to every counted label whose frequency is strictly
    /// greater than `cutoff`
    ///
    /// Labels that already have an index keep it. Returns the label count.
    pub fn finalize(&mut self, cutoff: usize) -> usize {
        for (label, count) in self.counts.iter() {
            if count > cutoff && !self.str_to_id.contains_key(label) {
                self.str_to_id.insert(label.to_string(), self.id_to_str.len());
                self.id_to_str.push(label.to_string());
            }
        }
        self.id_to_str.len()
    }

    /// Label count [`LabelMap::finalize`] would return for `cutoff`,
    /// without assigning anything
    pub fn finalized_len(&self, cutoff: usize) -> usize {
        let new = self
            .counts
            .iter()
            .filter(|&(label, count)| count > cutoff && !self.str_to_id.contains_key(label))
            .count();
        self.id_to_str.len() + new
    }

    /// Drop the scratch frequency counts, keeping assigned indices
    pub fn clear_counts(&mut self) {
        self.counts = Counter::default();
    }

    /// Drop everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.str_to_id.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.id_to_str.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.id_to_str
    }

    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    /// Whether counts are pending finalization
    pub fn has_counts(&self) -> bool {
        !self.counts.is_empty()
    }

    /// Iterate over all (label, index) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.id_to_str
            .iter()
            .enumerate()
            .map(|(id, s)| (s.as_str(), id))
    }
}

/// Bijection between typed feature keys and global feature indices
///
/// Keys are partitioned by an integer feature type; the index space is
/// shared by all types. Index 0 is reserved for the bias, so the first
/// assigned feature gets index 1.
#[derive(Debug, Clone)]
pub struct FeatureMap {
    /// Per-type map from value to index
    maps: HashMap<u32, HashMap<String, usize>>,
    /// Keys in index order, starting at index 1
    keys: Vec<(u32, String)>,
    counts: BTreeMap<u32, Counter>,
}

impl Default for FeatureMap {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureMap {
    pub fn new() -> Self {
        Self {
            maps: HashMap::new(),
            keys: Vec::new(),
            counts: BTreeMap::new(),
        }
    }

    /// Count one occurrence of `value` under feature type `ftype`
    pub fn collect(&mut self, ftype: u32, value: &str) {
        self.counts.entry(ftype).or_default().add(value);
    }

    /// Count every entry of a raw feature vector
    pub fn collect_vector(&mut self, x: &StringFeatureVector) {
        for (ftype, value, _) in x.iter() {
            self.collect(ftype, value);
        }
    }

    /// Assign indices to every counted key whose frequency is strictly
    /// greater than `cutoff`
    ///
    /// Types are visited in ascending order, values in first-seen order.
    /// Already indexed keys are left alone. Returns the feature count,
    /// bias included.
    pub fn finalize(&mut self, cutoff: usize) -> usize {
        let counts = std::mem::take(&mut self.counts);
        for (&ftype, counter) in &counts {
            for (value, count) in counter.iter() {
                if count > cutoff && self.index_of(ftype, value).is_none() {
                    self.insert(ftype, value.to_string());
                }
            }
        }
        self.counts = counts;
        self.len()
    }

    fn insert(&mut self, ftype: u32, value: String) -> usize {
        let index = self.keys.len() + 1;
        self.maps
            .entry(ftype)
            .or_default()
            .insert(value.clone(), index);
        self.keys.push((ftype, value));
        index
    }

    /// Append a key that must receive exactly `index`; used when reloading
    pub(crate) fn push_indexed(&mut self, ftype: u32, value: String, index: usize) -> Result<()> {
        if index != self.keys.len() + 1 {
            return Err(Error::format(format!(
                "feature index {} out of sequence",
                index
            )));
        }
        if self.index_of(ftype, &value).is_some() {
            return Err(Error::format(format!(
                "duplicate feature {}:{}",
                ftype, value
            )));
        }
        self.insert(ftype, value);
        Ok(())
    }

    /// Drop the scratch frequency counts, keeping assigned indices
    pub fn clear_counts(&mut self) {
        self.counts.clear();
    }

    /// Drop everything
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn index_of(&self, ftype: u32, value: &str) -> Option<usize> {
        self.maps
            .get(&ftype)
            .and_then(|map| map.get(value))
            .copied()
    }

    /// The `(type, value)` key of a feature index
    pub fn key(&self, index: usize) -> Option<(u32, &str)> {
        if index == 0 {
            return None;
        }
        self.keys
            .get(index - 1)
            .map(|(ftype, value)| (*ftype, value.as_str()))
    }

    /// Feature count including the bias
    pub fn len(&self) -> usize {
        self.keys.len() + 1
    }

    /// Whether no feature besides the bias has an index
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over `(index, type, value)` in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32, &str)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, (ftype, value))| (i + 1, *ftype, value.as_str()))
    }

    /// Map a raw vector onto feature indices
    ///
    /// Entries without an index are dropped; order and weights of the
    /// surviving entries are kept.
    pub fn resolve(&self, x: &StringFeatureVector) -> SparseFeatureVector {
        let mut sparse = SparseFeatureVector::with_capacity(x.len(), x.has_weight());
        for (ftype, value, weight) in x.iter() {
            if let Some(index) = self.index_of(ftype, value) {
                if x.has_weight() {
                    sparse.add_weighted_feature(index, weight);
                } else {
                    sparse.add_feature(index);
                }
            }
        }
        sparse.shrink_to_fit();
        sparse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_cutoff() {
        let mut labels = LabelMap::new();
        for label in ["sunny", "rainy", "sunny", "cloudy", "sunny", "rainy"] {
            labels.collect(label);
        }

        assert_eq!(labels.finalize(2), 1);
        assert_eq!(labels.index_of("sunny"), Some(0));
        assert_eq!(labels.index_of("rainy"), None);

        assert_eq!(labels.finalize(0), 3);
        assert_eq!(labels.index_of("sunny"), Some(0));
        assert_eq!(labels.index_of("rainy"), Some(1));
        assert_eq!(labels.index_of("cloudy"), Some(2));
        assert_eq!(labels.label(2), Some("cloudy"));
        assert_eq!(labels.label(3), None);
    }

    #[test]
    fn test_label_finalize_is_idempotent() {
        let mut labels = LabelMap::new();
        labels.collect("a");
        labels.collect("b");
        labels.finalize(0);
        let before: Vec<_> = labels.iter().map(|(s, i)| (s.to_string(), i)).collect();

        labels.finalize(0);
        labels.clear_counts();
        labels.collect("b");
        labels.collect("c");
        labels.finalize(0);

        for (label, index) in before {
            assert_eq!(labels.index_of(&label), Some(index));
        }
        assert_eq!(labels.index_of("c"), Some(2));
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_feature_indices_are_global() {
        let mut features = FeatureMap::new();
        features.collect(1, "take");
        features.collect(0, "study");
        features.collect(0, "studies");
        features.collect(1, "take");
        features.collect(0, "study");

        assert_eq!(features.finalize(0), 4);
        // type 0 first, values in first-seen order
        assert_eq!(features.index_of(0, "study"), Some(1));
        assert_eq!(features.index_of(0, "studies"), Some(2));
        assert_eq!(features.index_of(1, "take"), Some(3));
        assert_eq!(features.index_of(1, "study"), None);
        assert_eq!(features.index_of(7, "take"), None);
        assert_eq!(features.key(3), Some((1, "take")));
        assert_eq!(features.key(0), None);
    }

    #[test]
    fn test_feature_cutoff_promotes_later() {
        let mut features = FeatureMap::new();
        features.collect(0, "rare");
        features.collect(0, "common");
        features.collect(0, "common");

        assert_eq!(features.finalize(1), 2);
        assert_eq!(features.index_of(0, "common"), Some(1));
        assert_eq!(features.index_of(0, "rare"), None);

        assert_eq!(features.finalize(0), 3);
        assert_eq!(features.index_of(0, "common"), Some(1));
        assert_eq!(features.index_of(0, "rare"), Some(2));
    }

    #[test]
    fn test_sparse_feature_types() {
        let mut features = FeatureMap::new();
        features.collect(4_000_000_000, "x");
        features.collect(u32::MAX, "y");
        features.collect(3, "z");

        assert_eq!(features.finalize(0), 4);
        assert_eq!(features.index_of(3, "z"), Some(1));
        assert_eq!(features.index_of(4_000_000_000, "x"), Some(2));
        assert_eq!(features.index_of(u32::MAX, "y"), Some(3));
        assert_eq!(features.index_of(4_000_000_001, "x"), None);
        assert_eq!(features.key(2), Some((4_000_000_000, "x")));
    }

    #[test]
    fn test_label_finalized_len() {
        let mut labels = LabelMap::new();
        for label in ["a", "b", "a", "c"] {
            labels.collect(label);
        }
        assert_eq!(labels.finalized_len(0), 3);
        assert_eq!(labels.finalized_len(1), 1);
        assert!(labels.is_empty());

        labels.finalize(1);
        labels.collect("d");
        // "a" is already indexed and not counted twice
        assert_eq!(labels.finalized_len(0), 4);
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_resolve_drops_unknown() {
        let mut features = FeatureMap::new();
        features.collect(0, "walk");
        features.collect(1, "shop");
        features.finalize(0);

        let mut x = StringFeatureVector::weighted();
        x.add_weighted_feature(1, "shop", 0.5);
        x.add_weighted_feature(0, "clean", 2.0);
        x.add_weighted_feature(0, "walk", 3.0);

        let sparse = features.resolve(&x);
        assert_eq!(sparse.iter().collect::<Vec<_>>(), vec![(2, 0.5), (1, 3.0)]);
    }

    #[test]
    fn test_push_indexed_sequence() {
        let mut features = FeatureMap::new();
        assert!(features.push_indexed(0, "a".to_string(), 1).is_ok());
        assert!(features.push_indexed(0, "b".to_string(), 3).is_err());
        assert!(features.push_indexed(0, "a".to_string(), 2).is_err());
        assert_eq!(features.len(), 2);
    }
}
