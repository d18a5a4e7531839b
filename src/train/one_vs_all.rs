use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use crate::dataset::IntInstance;
use crate::error::{Error, Result};
use crate::feature::SparseFeatureVector;
use crate::vector::{argmax, BinaryWeightVector, WeightSnapshot, WeightVector};

use super::driver::Trainable;
use super::trainer::{AdaGradParams, EpochSummary, OnlineTrainer, Trainer, UpdateRule};

type BinaryTrainer = Box<dyn OnlineTrainer<BinaryWeightVector>>;

/// Relabel instances for the sub-model of `label`
fn binarize(instances: &[IntInstance], label: usize) -> Vec<IntInstance> {
    instances
        .iter()
        .map(|instance| {
            let target = if instance.is_label(label) {
                BinaryWeightVector::POSITIVE
            } else {
                BinaryWeightVector::NEGATIVE
            };
            IntInstance::new(target, instance.features.clone())
        })
        .collect()
}

/// One binary model per label, trained side by side
///
/// Every sub-model owns its weights, its trainer and its RNG, so epochs can
/// run on a thread pool without sharing any mutable state.
pub struct OneVsAll {
    trainers: Vec<BinaryTrainer>,
    weights: Vec<BinaryWeightVector>,
    pool: ThreadPool,
}

impl OneVsAll {
    /// Build `label_count` sub-models over `feature_count` features
    ///
    /// A shuffle seed `s` becomes `s + label` for each sub-model.
    pub fn new<R: UpdateRule + 'static>(
        instances: &[IntInstance],
        label_count: usize,
        feature_count: usize,
        adagrad: &AdaGradParams,
        params: &R::Params,
        threads: usize,
    ) -> Result<Self> {
        R::check(params)?;
        if instances.is_empty() {
            return Err(Error::NoInstances);
        }
        let mut trainers: Vec<BinaryTrainer> = Vec::with_capacity(label_count);
        let mut weights = Vec::with_capacity(label_count);
        for label in 0..label_count {
            let mut w = BinaryWeightVector::new();
            w.expand(2, feature_count)?;
            let mut adagrad = adagrad.clone();
            adagrad.set_shuffle_seed(adagrad.shuffle_seed().map(|s| s.wrapping_add(label as u64)));
            let trainer = Trainer::<R, BinaryWeightVector>::with_params(
                binarize(instances, label),
                &w,
                adagrad,
                params.clone(),
            )?;
            trainers.push(Box::new(trainer));
            weights.push(w);
        }
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        info!(
            labels = label_count,
            features = feature_count,
            threads = pool.current_num_threads(),
            "created one-vs-all ensemble"
        );
        Ok(Self {
            trainers,
            weights,
            pool,
        })
    }

    pub fn label_count(&self) -> usize {
        self.weights.len()
    }

    /// Weights of the sub-model for `label`
    pub fn weights(&self, label: usize) -> &BinaryWeightVector {
        &self.weights[label]
    }

    /// Run one epoch of every sub-model concurrently
    pub fn train_epoch(&mut self) -> Result<Vec<EpochSummary>> {
        let trainers = &mut self.trainers;
        let weights = &mut self.weights;
        self.pool.install(|| {
            trainers
                .par_iter_mut()
                .zip(weights.par_iter_mut())
                .map(|(trainer, w)| trainer.train_epoch(w))
                .collect()
        })
    }

    /// Positive score of every sub-model
    pub fn scores(&self, x: &SparseFeatureVector) -> Vec<f64> {
        self.weights.iter().map(|w| w.score(x)).collect()
    }

    /// Label of the highest positive score
    pub fn predict(&self, x: &SparseFeatureVector) -> Option<(usize, f64)> {
        if self.weights.is_empty() {
            return None;
        }
        Some(argmax(&self.scores(x)))
    }

    /// Fraction of instances predicted correctly
    pub fn accuracy(&self, instances: &[IntInstance]) -> f64 {
        if instances.is_empty() {
            return 0.0;
        }
        let correct = instances
            .iter()
            .filter(|instance| {
                self.predict(&instance.features)
                    .is_some_and(|(label, _)| label == instance.label)
            })
            .count();
        correct as f64 / instances.len() as f64
    }
}

impl Trainable for OneVsAll {
    type Snapshot = Vec<WeightSnapshot>;

    fn train_epoch(&mut self) -> Result<EpochSummary> {
        let summaries = OneVsAll::train_epoch(self)?;
        Ok(summaries
            .into_iter()
            .fold(EpochSummary::default(), |acc, s| EpochSummary {
                instances: acc.instances + s.instances,
                updates: acc.updates + s.updates,
            }))
    }

    fn snapshot(&self) -> Vec<WeightSnapshot> {
        self.weights.iter().map(|w| w.snapshot()).collect()
    }

    fn restore(&mut self, snapshot: &Vec<WeightSnapshot>) -> Result<()> {
        for (w, s) in self.weights.iter_mut().zip(snapshot) {
            w.restore(s)?;
        }
        Ok(())
    }
}
