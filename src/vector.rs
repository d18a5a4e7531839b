use std::fmt;

use crate::error::{Error, Result};
use crate::feature::SparseFeatureVector;

/// Memory layout of a weight buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One weight per feature, two virtual labels
    Binary,
    /// `labels x features` weights, one contiguous label block per feature
    Multi,
}

impl Layout {
    pub fn name(&self) -> &'static str {
        match self {
            Layout::Binary => "binary",
            Layout::Multi => "multi",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A saved copy of a weight buffer
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSnapshot {
    label_count: usize,
    feature_count: usize,
    weights: Vec<f32>,
}

impl WeightSnapshot {
    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }
}

/// Dense weight storage with a fixed layout and a linear score function
///
/// Feature index 0 is the bias. Entries of a feature vector whose index is
/// 0 or beyond [`WeightVector::feature_count`] are ignored when scoring.
pub trait WeightVector: Clone + fmt::Debug + Default + Send + Sync {
    const LAYOUT: Layout;

    /// Most labels the layout can hold
    const MAX_LABELS: usize;

    /// Rebuild a vector from persisted dimensions and weights
    fn from_parts(label_count: usize, feature_count: usize, weights: Vec<f32>) -> Result<Self>;

    fn label_count(&self) -> usize;

    fn feature_count(&self) -> usize;

    /// Grow to at least `label_count x feature_count`
    ///
    /// Existing weights keep their values. Returns whether anything grew.
    fn expand(&mut self, label_count: usize, feature_count: usize) -> Result<bool>;

    /// Raw scores of every label
    fn scores(&self, x: &SparseFeatureVector) -> Vec<f64>;

    /// Position of the weight for `(label, feature)` in the flat buffer
    fn weight_index(&self, label: usize, feature: usize) -> usize;

    /// Map a per-label gradient on one feature onto weight coordinates
    ///
    /// `grad` holds `(label, u)` pairs; `(weight index, u)` pairs are
    /// appended to `out`.
    fn project(&self, feature: usize, grad: &[(usize, f64)], out: &mut Vec<(usize, f64)>);

    /// Label with the best score, and that score
    fn best(&self, scores: &[f64]) -> (usize, f64);

    fn as_slice(&self) -> &[f32];

    fn as_mut_slice(&mut self) -> &mut [f32];

    /// Number of weights in the flat buffer
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Scores turned into a probability distribution with softmax
    fn normalized_scores(&self, x: &SparseFeatureVector) -> Vec<f64> {
        let mut scores = self.scores(x);
        softmax(&mut scores);
        scores
    }

    /// Copy out the weights of `label`, one per feature
    fn weights(&self, label: usize) -> Vec<f32> {
        let buf = self.as_slice();
        (0..self.feature_count())
            .map(|f| buf[self.weight_index(label, f)])
            .collect()
    }

    /// Overwrite the weights of `label`; extra values are ignored
    fn set_weights(&mut self, label: usize, weights: &[f32]) {
        let n = weights.len().min(self.feature_count());
        for (f, &w) in weights.iter().enumerate().take(n) {
            let i = self.weight_index(label, f);
            self.as_mut_slice()[i] = w;
        }
    }

    fn get(&self, index: usize) -> f32 {
        self.as_slice()[index]
    }

    fn set(&mut self, index: usize, value: f32) {
        self.as_mut_slice()[index] = value;
    }

    fn add(&mut self, index: usize, value: f32) {
        self.as_mut_slice()[index] += value;
    }

    fn snapshot(&self) -> WeightSnapshot {
        WeightSnapshot {
            label_count: self.label_count(),
            feature_count: self.feature_count(),
            weights: self.as_slice().to_vec(),
        }
    }

    /// Copy a snapshot back; its dimensions must match
    fn restore(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        if snapshot.weights.len() != self.len()
            || snapshot.feature_count != self.feature_count()
            || snapshot.label_count != self.label_count()
        {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                actual: snapshot.weights.len(),
            });
        }
        self.as_mut_slice().copy_from_slice(&snapshot.weights);
        Ok(())
    }
}

/// In-place softmax, shifted by the maximum for stability
pub fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

/// First index holding the maximum score
pub(crate) fn argmax(scores: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, &s) in scores.iter().enumerate() {
        if s > best.1 {
            best = (i, s);
        }
    }
    best
}

/// Single weight track for a two-label model
///
/// Label [`BinaryWeightVector::POSITIVE`] scores `s`, label
/// [`BinaryWeightVector::NEGATIVE`] scores `-s`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinaryWeightVector {
    weights: Vec<f32>,
}

impl BinaryWeightVector {
    pub const POSITIVE: usize = 0;
    pub const NEGATIVE: usize = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Score of the positive label
    pub fn score(&self, x: &SparseFeatureVector) -> f64 {
        let Some(&bias) = self.weights.first() else {
            return 0.0;
        };
        let mut score = bias as f64;
        for (f, v) in x.iter() {
            if 0 < f && f < self.weights.len() {
                score += self.weights[f] as f64 * v;
            }
        }
        score
    }
}

impl WeightVector for BinaryWeightVector {
    const LAYOUT: Layout = Layout::Binary;

    const MAX_LABELS: usize = 2;

    fn from_parts(label_count: usize, feature_count: usize, weights: Vec<f32>) -> Result<Self> {
        if label_count > Self::MAX_LABELS {
            return Err(Error::DimensionMismatch {
                expected: Self::MAX_LABELS,
                actual: label_count,
            });
        }
        if weights.len() != feature_count {
            return Err(Error::DimensionMismatch {
                expected: feature_count,
                actual: weights.len(),
            });
        }
        Ok(Self { weights })
    }

    fn label_count(&self) -> usize {
        2
    }

    fn feature_count(&self) -> usize {
        self.weights.len()
    }

    fn expand(&mut self, label_count: usize, feature_count: usize) -> Result<bool> {
        if label_count > Self::MAX_LABELS {
            return Err(Error::DimensionMismatch {
                expected: Self::MAX_LABELS,
                actual: label_count,
            });
        }
        if feature_count <= self.weights.len() {
            return Ok(false);
        }
        self.weights.resize(feature_count, 0.0);
        Ok(true)
    }

    fn scores(&self, x: &SparseFeatureVector) -> Vec<f64> {
        let score = self.score(x);
        vec![score, -score]
    }

    fn weight_index(&self, _label: usize, feature: usize) -> usize {
        feature
    }

    fn project(&self, feature: usize, grad: &[(usize, f64)], out: &mut Vec<(usize, f64)>) {
        let mut u = 0.0;
        for &(label, g) in grad {
            if label == Self::POSITIVE {
                u += g;
            } else {
                u -= g;
            }
        }
        u /= 2.0;
        if u != 0.0 {
            out.push((feature, u));
        }
    }

    fn best(&self, scores: &[f64]) -> (usize, f64) {
        if scores[Self::POSITIVE] > 0.0 {
            (Self::POSITIVE, scores[Self::POSITIVE])
        } else {
            (Self::NEGATIVE, scores[Self::NEGATIVE])
        }
    }

    fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    /// The positive track as is, or negated for [`BinaryWeightVector::NEGATIVE`]
    fn weights(&self, label: usize) -> Vec<f32> {
        if label == Self::POSITIVE {
            self.weights.clone()
        } else {
            self.weights.iter().map(|w| -w).collect()
        }
    }

    /// Writing the negative label stores the negated values
    fn set_weights(&mut self, label: usize, weights: &[f32]) {
        let sign = if label == Self::POSITIVE { 1.0 } else { -1.0 };
        for (w, &v) in self.weights.iter_mut().zip(weights) {
            *w = sign * v;
        }
    }
}

/// Weights for `L` labels laid out as `feature * L + label`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiWeightVector {
    label_count: usize,
    feature_count: usize,
    weights: Vec<f32>,
}

impl MultiWeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-stripe every feature block to `label_count` slots
    fn expand_labels(&mut self, label_count: usize) {
        let old = self.label_count;
        let mut weights = vec![0.0; label_count * self.feature_count];
        for f in 0..self.feature_count {
            weights[f * label_count..f * label_count + old]
                .copy_from_slice(&self.weights[f * old..(f + 1) * old]);
        }
        self.weights = weights;
        self.label_count = label_count;
    }
}

impl WeightVector for MultiWeightVector {
    const LAYOUT: Layout = Layout::Multi;

    const MAX_LABELS: usize = usize::MAX;

    fn from_parts(label_count: usize, feature_count: usize, weights: Vec<f32>) -> Result<Self> {
        let expected = label_count * feature_count;
        if weights.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: weights.len(),
            });
        }
        Ok(Self {
            label_count,
            feature_count,
            weights,
        })
    }

    fn label_count(&self) -> usize {
        self.label_count
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn expand(&mut self, label_count: usize, feature_count: usize) -> Result<bool> {
        let mut grown = false;
        // labels first: new feature blocks must already use the new stride
        if label_count > self.label_count {
            self.expand_labels(label_count);
            grown = true;
        }
        if feature_count > self.feature_count {
            self.weights
                .resize(feature_count * self.label_count, 0.0);
            self.feature_count = feature_count;
            grown = true;
        }
        Ok(grown)
    }

    fn scores(&self, x: &SparseFeatureVector) -> Vec<f64> {
        let l = self.label_count;
        if self.feature_count == 0 {
            return vec![0.0; l];
        }
        let mut scores: Vec<f64> = self.weights[..l].iter().map(|&w| w as f64).collect();
        for (f, v) in x.iter() {
            if 0 < f && f < self.feature_count {
                let block = &self.weights[f * l..(f + 1) * l];
                for (score, &w) in scores.iter_mut().zip(block) {
                    *score += w as f64 * v;
                }
            }
        }
        scores
    }

    fn weight_index(&self, label: usize, feature: usize) -> usize {
        feature * self.label_count + label
    }

    fn project(&self, feature: usize, grad: &[(usize, f64)], out: &mut Vec<(usize, f64)>) {
        for &(label, u) in grad {
            if u != 0.0 {
                out.push((self.weight_index(label, feature), u));
            }
        }
    }

    fn best(&self, scores: &[f64]) -> (usize, f64) {
        argmax(scores)
    }

    fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.weights
    }
}
