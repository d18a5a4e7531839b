use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::Path;

use tracing::info;

use crate::dataset::{IntInstance, SparseInstance, StringInstance};
use crate::dictionary::{FeatureMap, LabelMap};
use crate::error::{Error, Result};
use crate::feature::{SparseFeatureVector, StringFeatureVector};
use crate::format::ModelData;
use crate::model_writer::ModelWriter;
use crate::vector::{Layout, WeightVector};

/// A label with its score
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

impl Prediction {
    pub fn new<S: Into<String>>(label: S, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Order label indices best first: the layout's best label, then the rest
/// by descending score, ties kept in index order
fn rank<W: WeightVector>(weights: &W, labels: &LabelMap, scores: &[f64]) -> Vec<Prediction> {
    if scores.is_empty() {
        return Vec::new();
    }
    let (best, _) = weights.best(scores);
    let mut rest: Vec<usize> = (0..scores.len()).filter(|&i| i != best).collect();
    rest.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    std::iter::once(best)
        .chain(rest)
        .filter_map(|i| labels.label(i).map(|label| Prediction::new(label, scores[i])))
        .collect()
}

/// Scoring and label ranking shared by all model kinds
pub trait Classifier {
    /// Feature vector form accepted by the model
    type Input: ?Sized;
    type Weights: WeightVector;

    fn labels(&self) -> &LabelMap;

    fn weights(&self) -> &Self::Weights;

    /// Raw scores of every label slot of the weight vector
    fn scores(&self, x: &Self::Input) -> Vec<f64>;

    /// All labels with an index, best first
    fn predict_all(&self, x: &Self::Input) -> Vec<Prediction> {
        rank(self.weights(), self.labels(), &self.scores(x))
    }

    /// The layout's best label; `None` when that label has no index
    fn predict_best(&self, x: &Self::Input) -> Option<Prediction> {
        let scores = self.scores(x);
        if scores.is_empty() {
            return None;
        }
        let (best, score) = self.weights().best(&scores);
        self.labels()
            .label(best)
            .map(|label| Prediction::new(label, score))
    }

    fn predict_top2(&self, x: &Self::Input) -> Vec<Prediction> {
        let mut all = self.predict_all(x);
        all.truncate(2);
        all
    }
}

/// Fail before any vocabulary changes when finalizing would yield more
/// labels than the layout holds
fn check_label_capacity<W: WeightVector>(labels: &LabelMap, cutoff: usize) -> Result<()> {
    let label_count = labels.finalized_len(cutoff);
    if label_count > W::MAX_LABELS {
        return Err(Error::DimensionMismatch {
            expected: W::MAX_LABELS,
            actual: label_count,
        });
    }
    Ok(())
}

/// Label slots a persisted weight buffer was laid out for
fn persisted_label_count<W: WeightVector>(data: &ModelData) -> usize {
    match W::LAYOUT {
        Layout::Multi if data.feature_count > 0 => data.weights.len() / data.feature_count,
        _ => data.labels.len(),
    }
}

/// Model over raw `(type, value)` features
///
/// Instances are collected with [`StringModel::add_instance`]; the
/// vocabularies are only finalized by
/// [`StringModel::initialize_for_training`], which may be called again
/// after more instances are added to extend the model.
#[derive(Debug, Clone, Default)]
pub struct StringModel<W> {
    labels: LabelMap,
    features: FeatureMap,
    weights: W,
    instances: Vec<StringInstance>,
}

impl<W: WeightVector> StringModel<W> {
    pub fn new() -> Self {
        Self {
            labels: LabelMap::new(),
            features: FeatureMap::new(),
            weights: W::default(),
            instances: Vec::new(),
        }
    }

    /// Count the instance's label and features and keep it for training
    pub fn add_instance(&mut self, instance: StringInstance) {
        self.labels.collect(&instance.label);
        self.features.collect_vector(&instance.features);
        self.instances.push(instance);
    }

    /// Instances added since the last initialization
    pub fn instances(&self) -> &[StringInstance] {
        &self.instances
    }

    /// Finalize both vocabularies, grow the weights to match and convert the
    /// collected instances
    ///
    /// Collected instances and frequency counts are cleared afterwards. On
    /// error the model is left as it was.
    pub fn initialize_for_training(
        &mut self,
        label_cutoff: usize,
        feature_cutoff: usize,
    ) -> Result<Vec<IntInstance>> {
        check_label_capacity::<W>(&self.labels, label_cutoff)?;
        let label_count = self.labels.finalize(label_cutoff);
        let feature_count = self.features.finalize(feature_cutoff);
        self.weights.expand(label_count, feature_count)?;

        let instances = std::mem::take(&mut self.instances);
        let resolved: Vec<_> = instances
            .iter()
            .filter_map(|instance| self.to_int_instance(instance))
            .collect();
        self.labels.clear_counts();
        self.features.clear_counts();

        info!(
            labels = label_count,
            features = feature_count,
            instances = resolved.len(),
            dropped = instances.len() - resolved.len(),
            "initialized {} model",
            W::LAYOUT
        );
        Ok(resolved)
    }

    /// Resolve an instance; `None` when its label has no index or none of
    /// its features do
    pub fn to_int_instance(&self, instance: &StringInstance) -> Option<IntInstance> {
        let label = self.labels.index_of(&instance.label)?;
        let features = self.features.resolve(&instance.features);
        if features.is_empty() {
            return None;
        }
        Some(IntInstance::new(label, features))
    }

    pub fn resolve(&self, x: &StringFeatureVector) -> SparseFeatureVector {
        self.features.resolve(x)
    }

    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    pub fn weights_mut(&mut self) -> &mut W {
        &mut self.weights
    }

    /// Clear vocabularies, weights and collected instances
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn save<Wr: Write + Seek>(&self, writer: &mut Wr) -> Result<()> {
        ModelWriter::new(writer)?.write(
            &self.labels,
            Some(&self.features),
            self.weights.feature_count(),
            &self.weights,
        )
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.save(&mut file)
    }

    pub fn load(buf: &[u8]) -> Result<Self> {
        let data = ModelData::parse(buf, W::LAYOUT)?;
        let label_count = persisted_label_count::<W>(&data);
        let features = data
            .features
            .ok_or_else(|| Error::format("model has no feature dictionary"))?;
        let weights = W::from_parts(label_count, data.feature_count, data.weights)?;
        Ok(Self {
            labels: data.labels,
            features,
            weights,
            instances: Vec::new(),
        })
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        Self::load(&buf)
    }
}

impl<W: WeightVector> Classifier for StringModel<W> {
    type Input = StringFeatureVector;
    type Weights = W;

    fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn weights(&self) -> &W {
        &self.weights
    }

    fn scores(&self, x: &StringFeatureVector) -> Vec<f64> {
        self.weights.scores(&self.features.resolve(x))
    }
}

/// Model over features that are already indexed
///
/// The feature count is one past the largest index seen, and never grows
/// past the feature limit.
#[derive(Debug, Clone)]
pub struct SparseModel<W> {
    labels: LabelMap,
    feature_count: usize,
    feature_limit: usize,
    weights: W,
    instances: Vec<SparseInstance>,
}

impl<W: WeightVector> SparseModel<W> {
    /// Feature count a new model accepts
    pub const DEFAULT_FEATURE_LIMIT: usize = 1 << 24;

    pub fn new() -> Self {
        Self {
            labels: LabelMap::new(),
            feature_count: 1,
            feature_limit: Self::DEFAULT_FEATURE_LIMIT,
            weights: W::default(),
            instances: Vec::new(),
        }
    }

    /// Count the instance's label and keep it for training
    ///
    /// Fails without changing the model when a feature index would push the
    /// feature count past [`SparseModel::feature_limit`].
    pub fn add_instance(&mut self, instance: SparseInstance) -> Result<()> {
        if let Some(max) = instance.features.max_index() {
            let count = max
                .checked_add(1)
                .filter(|&count| count <= self.feature_limit)
                .ok_or_else(|| {
                    Error::invalid(
                        "feature index",
                        format!("{} is not below the limit of {}", max, self.feature_limit),
                    )
                })?;
            self.feature_count = self.feature_count.max(count);
        }
        self.labels.collect(&instance.label);
        self.instances.push(instance);
        Ok(())
    }

    pub fn feature_limit(&self) -> usize {
        self.feature_limit
    }

    /// Bound the feature count; it cannot drop below the current count
    pub fn set_feature_limit(&mut self, limit: usize) -> Result<()> {
        if limit < self.feature_count {
            return Err(Error::invalid(
                "feature_limit",
                format!("must be at least the feature count {}", self.feature_count),
            ));
        }
        self.feature_limit = limit;
        Ok(())
    }

    pub fn instances(&self) -> &[SparseInstance] {
        &self.instances
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Finalize the label vocabulary, grow the weights and convert the
    /// collected instances
    pub fn initialize_for_training(&mut self, label_cutoff: usize) -> Result<Vec<IntInstance>> {
        check_label_capacity::<W>(&self.labels, label_cutoff)?;
        let label_count = self.labels.finalize(label_cutoff);
        self.weights.expand(label_count, self.feature_count)?;

        let instances = std::mem::take(&mut self.instances);
        let total = instances.len();
        let resolved: Vec<_> = instances
            .into_iter()
            .filter_map(|instance| self.to_int_instance(instance))
            .collect();
        self.labels.clear_counts();

        info!(
            labels = label_count,
            features = self.feature_count,
            instances = resolved.len(),
            dropped = total - resolved.len(),
            "initialized sparse {} model",
            W::LAYOUT
        );
        Ok(resolved)
    }

    pub fn to_int_instance(&self, instance: SparseInstance) -> Option<IntInstance> {
        let label = self.labels.index_of(&instance.label)?;
        if instance.features.is_empty() {
            return None;
        }
        Some(IntInstance::new(label, instance.features))
    }

    pub fn weights_mut(&mut self) -> &mut W {
        &mut self.weights
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn save<Wr: Write + Seek>(&self, writer: &mut Wr) -> Result<()> {
        ModelWriter::new(writer)?.write(
            &self.labels,
            None,
            self.weights.feature_count(),
            &self.weights,
        )
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.save(&mut file)
    }

    pub fn load(buf: &[u8]) -> Result<Self> {
        let data = ModelData::parse(buf, W::LAYOUT)?;
        if data.features.is_some() {
            return Err(Error::format("unexpected feature dictionary"));
        }
        let label_count = persisted_label_count::<W>(&data);
        let weights = W::from_parts(label_count, data.feature_count, data.weights)?;
        let feature_count = data.feature_count.max(1);
        Ok(Self {
            labels: data.labels,
            feature_count,
            feature_limit: Self::DEFAULT_FEATURE_LIMIT.max(feature_count),
            weights,
            instances: Vec::new(),
        })
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        Self::load(&buf)
    }
}

impl<W: WeightVector> Default for SparseModel<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: WeightVector> Classifier for SparseModel<W> {
    type Input = SparseFeatureVector;
    type Weights = W;

    fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn weights(&self) -> &W {
        &self.weights
    }

    fn scores(&self, x: &SparseFeatureVector) -> Vec<f64> {
        self.weights.scores(x)
    }
}
