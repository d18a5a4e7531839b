use std::fmt;
use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::dataset::IntInstance;
use crate::error::{Error, Result};
use crate::feature::SparseFeatureVector;
use crate::vector::WeightVector;

mod lr;
mod rrm;

pub use self::lr::LrParams;
pub use self::rrm::RrmParams;

/// Update rule marker for logistic-style soft updates.
#[derive(Debug, Clone, Copy)]
pub struct Lr;

/// Update rule marker for margin-ranking updates.
#[derive(Debug, Clone, Copy)]
pub struct Rrm;

/// Update rule interface.
///
/// A rule only decides the per-label gradient of one instance; the AdaGrad
/// step that applies it is shared.
pub trait UpdateRule: Sized + Send {
    type Params: Default + Clone + fmt::Debug + Send;

    const NAME: &'static str;

    /// Reject parameter sets the rule cannot train with
    fn check(params: &Self::Params) -> Result<()>;

    /// Append `(label, u)` pairs for `instance`; nothing means no update
    fn gradient<W: WeightVector>(
        params: &Self::Params,
        weights: &W,
        instance: &IntInstance,
        grad: &mut Vec<(usize, f64)>,
    );
}

/// Shared AdaGrad parameters.
#[derive(Debug, Clone)]
pub struct AdaGradParams {
    alpha: f64,
    rho: f64,
    bias: f64,
    average: bool,
    shuffle_seed: Option<u64>,
}

impl Default for AdaGradParams {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            rho: 0.1,
            bias: 0.0,
            average: false,
            shuffle_seed: None,
        }
    }
}

impl AdaGradParams {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(Error::invalid("alpha", "must be positive"));
        }
        self.alpha = alpha;
        Ok(())
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn set_rho(&mut self, rho: f64) -> Result<()> {
        if !(rho > 0.0 && rho.is_finite()) {
            return Err(Error::invalid("rho", "must be positive"));
        }
        self.rho = rho;
        Ok(())
    }

    /// Value of the always-on feature at index 0; `0` disables it
    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f64) -> Result<()> {
        if !bias.is_finite() {
            return Err(Error::invalid("bias", "must be finite"));
        }
        self.bias = bias;
        Ok(())
    }

    pub fn average(&self) -> bool {
        self.average
    }

    pub fn set_average(&mut self, average: bool) {
        self.average = average;
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

/// Counts from one pass over the training instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochSummary {
    pub instances: usize,
    pub updates: usize,
}

/// Anything that can run training epochs against a weight vector
pub trait OnlineTrainer<W: WeightVector>: Send {
    /// One shuffled pass over the instances, updating `weights` in place
    fn train_epoch(&mut self, weights: &mut W) -> Result<EpochSummary>;

    /// Current effective step size of a weight coordinate
    fn learning_rate(&self, index: usize) -> f64;

    fn instances(&self) -> &[IntInstance];
}

/// AdaGrad trainer
///
/// Holds the training instances, the accumulated squared gradients (one per
/// weight coordinate) and the shuffling RNG. The weight vector itself is
/// passed to every epoch, and only vectors of the layout the trainer was
/// built for are accepted:
///
/// ```compile_fail
/// use linmod::train::{AdaGradParams, OnlineTrainer, Rrm, RrmParams, Trainer};
/// use linmod::{BinaryWeightVector, IntInstance, MultiWeightVector, WeightVector};
///
/// let mut multi = MultiWeightVector::new();
/// multi.expand(2, 2)?;
/// let instances = vec![IntInstance::new(0, vec![1usize].into_iter().collect())];
/// let mut trainer = Trainer::<Rrm, _>::with_params(
///     instances,
///     &multi,
///     AdaGradParams::default(),
///     RrmParams::with_margin(1.0),
/// )?;
/// let mut binary = BinaryWeightVector::new();
/// binary.expand(2, 4)?;
/// trainer.train_epoch(&mut binary)?;
/// # Ok::<(), linmod::Error>(())
/// ```
#[derive(Debug)]
pub struct Trainer<R: UpdateRule, W: WeightVector> {
    /// Training instances, reshuffled every epoch
    instances: Vec<IntInstance>,
    /// Shared AdaGrad parameters
    adagrad: AdaGradParams,
    /// Rule parameters
    params: R::Params,
    /// Running sums of squared gradients
    gradients: Vec<f64>,
    /// Time-weighted update sums for averaging
    average: Option<Vec<f64>>,
    rng: StdRng,
    epochs: usize,
    layout: PhantomData<W>,
}

impl<R: UpdateRule, W: WeightVector> Trainer<R, W> {
    /// Create a trainer with default parameters
    pub fn new(instances: Vec<IntInstance>, weights: &W) -> Result<Self> {
        Self::with_params(instances, weights, AdaGradParams::default(), R::Params::default())
    }

    /// Create a trainer for `weights`
    ///
    /// Fails before touching any data when the rule parameters are
    /// incomplete, there are no instances, or an instance's label has no
    /// slot in the weight vector.
    pub fn with_params(
        instances: Vec<IntInstance>,
        weights: &W,
        adagrad: AdaGradParams,
        params: R::Params,
    ) -> Result<Self> {
        R::check(&params)?;
        if instances.is_empty() {
            return Err(Error::NoInstances);
        }
        if let Some(label) = instances.iter().map(|inst| inst.label).max() {
            if label >= weights.label_count() {
                return Err(Error::DimensionMismatch {
                    expected: weights.label_count(),
                    actual: label + 1,
                });
            }
        }
        let rng = match adagrad.shuffle_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let average = if adagrad.average() {
            Some(vec![0.0; weights.len()])
        } else {
            None
        };
        info!(
            rule = R::NAME,
            layout = %W::LAYOUT,
            instances = instances.len(),
            weights = weights.len(),
            alpha = adagrad.alpha(),
            rho = adagrad.rho(),
            bias = adagrad.bias(),
            average = adagrad.average(),
            "created AdaGrad trainer"
        );
        Ok(Self {
            instances,
            gradients: vec![0.0; weights.len()],
            adagrad,
            params,
            average,
            rng,
            epochs: 0,
            layout: PhantomData,
        })
    }

    pub fn adagrad(&self) -> &AdaGradParams {
        &self.adagrad
    }

    pub fn params(&self) -> &R::Params {
        &self.params
    }

    /// Accumulated squared gradients, one per weight coordinate
    pub fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    /// Number of completed epochs
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    fn cost(&self, index: usize) -> f64 {
        self.adagrad.alpha / (self.adagrad.rho + self.gradients[index].sqrt())
    }

    /// Expand a per-label gradient over the instance's features
    ///
    /// Produces `(weight index, u * x)` for the bias and every entry whose
    /// feature index the weight vector covers.
    fn coordinates(
        &self,
        weights: &W,
        x: &SparseFeatureVector,
        grad: &[(usize, f64)],
        coords: &mut Vec<(usize, f64)>,
    ) {
        let mut projected = Vec::with_capacity(grad.len());
        let bias = self.adagrad.bias;
        if bias != 0.0 {
            weights.project(0, grad, &mut projected);
            coords.extend(projected.drain(..).map(|(i, u)| (i, u * bias)));
        }
        for (f, v) in x.iter() {
            if 0 < f && f < weights.feature_count() {
                weights.project(f, grad, &mut projected);
                coords.extend(projected.drain(..).map(|(i, u)| (i, u * v)));
            }
        }
    }

    /// Accumulate every coordinate's squared gradient, then step each one
    fn apply(&mut self, weights: &mut W, coords: &[(usize, f64)], step: usize) {
        for &(i, z) in coords {
            self.gradients[i] += z * z;
        }
        for &(i, z) in coords {
            let delta = self.cost(i) * z;
            weights.add(i, delta as f32);
            if let Some(average) = &mut self.average {
                average[i] += delta * step as f64;
            }
        }
    }

    fn epoch(&mut self, weights: &mut W) -> Result<EpochSummary> {
        if weights.len() != self.gradients.len() {
            return Err(Error::DimensionMismatch {
                expected: self.gradients.len(),
                actual: weights.len(),
            });
        }
        self.instances.shuffle(&mut self.rng);
        if let Some(average) = &mut self.average {
            average.iter_mut().for_each(|a| *a = 0.0);
        }

        let mut grad = Vec::new();
        let mut coords = Vec::new();
        let mut updates = 0;
        for t in 0..self.instances.len() {
            grad.clear();
            coords.clear();
            let instance = &self.instances[t];
            R::gradient(&self.params, weights, instance, &mut grad);
            if grad.is_empty() {
                continue;
            }
            self.coordinates(weights, &instance.features, &grad, &mut coords);
            self.apply(weights, &coords, t + 1);
            updates += 1;
        }

        if let Some(average) = &self.average {
            let total = (self.instances.len() + 1) as f64;
            for (i, a) in average.iter().enumerate() {
                if *a != 0.0 {
                    weights.add(i, -(a / total) as f32);
                }
            }
        }

        self.epochs += 1;
        debug!(
            epoch = self.epochs,
            instances = self.instances.len(),
            updates,
            "finished epoch"
        );
        Ok(EpochSummary {
            instances: self.instances.len(),
            updates,
        })
    }
}

impl<R: UpdateRule, W: WeightVector> OnlineTrainer<W> for Trainer<R, W> {
    fn train_epoch(&mut self, weights: &mut W) -> Result<EpochSummary> {
        self.epoch(weights)
    }

    fn learning_rate(&self, index: usize) -> f64 {
        self.cost(index)
    }

    fn instances(&self) -> &[IntInstance] {
        &self.instances
    }
}
