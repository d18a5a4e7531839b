use crate::dataset::IntInstance;
use crate::error::{Error, Result};
use crate::vector::WeightVector;

use super::{Lr, UpdateRule};

/// LR update parameters.
#[derive(Debug, Clone)]
pub struct LrParams {
    threshold: f64,
}

impl Default for LrParams {
    fn default() -> Self {
        Self { threshold: 0.01 }
    }
}

impl LrParams {
    /// Minimum residual of the true label for an instance to update
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        if !(0.0..1.0).contains(&threshold) {
            return Err(Error::invalid("threshold", "must be in [0, 1)"));
        }
        self.threshold = threshold;
        Ok(())
    }
}

impl UpdateRule for Lr {
    type Params = LrParams;

    const NAME: &'static str = "lr";

    fn check(_params: &LrParams) -> Result<()> {
        Ok(())
    }

    /// Softmax residuals `[y == l] - p(l)` for every label, once the true
    /// label's residual exceeds the threshold
    fn gradient<W: WeightVector>(
        params: &LrParams,
        weights: &W,
        instance: &IntInstance,
        grad: &mut Vec<(usize, f64)>,
    ) {
        let probs = weights.normalized_scores(&instance.features);
        let residual = |l: usize| {
            if instance.is_label(l) {
                1.0 - probs[l]
            } else {
                -probs[l]
            }
        };
        if residual(instance.label) <= params.threshold {
            return;
        }
        grad.extend((0..probs.len()).map(|l| (l, residual(l))));
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::super::{AdaGradParams, OnlineTrainer, Trainer};
    use super::*;
    use crate::feature::SparseFeatureVector;
    use crate::vector::{BinaryWeightVector, MultiWeightVector};

    #[test]
    fn test_uniform_residuals() {
        let mut weights = MultiWeightVector::new();
        weights.expand(4, 3).unwrap();
        let instance = IntInstance::new(2, vec![1usize].into_iter().collect());
        let mut grad = Vec::new();
        Lr::gradient(&LrParams::default(), &weights, &instance, &mut grad);
        assert_eq!(grad, vec![(0, -0.25), (1, -0.25), (2, 0.75), (3, -0.25)]);
    }

    #[test]
    fn test_confident_instance_is_skipped() {
        let mut weights = BinaryWeightVector::new();
        weights.expand(2, 2).unwrap();
        weights.set(1, 10.0);
        let instance = IntInstance::new(0, vec![1usize].into_iter().collect());
        let mut grad = Vec::new();
        Lr::gradient(&LrParams::default(), &weights, &instance, &mut grad);
        assert!(grad.is_empty());

        let mut params = LrParams::default();
        assert!(params.set_threshold(1.0).is_err());
        params.set_threshold(0.0).unwrap();
        Lr::gradient(&params, &weights, &instance, &mut grad);
        assert_eq!(grad.len(), 2);
    }

    #[test]
    fn test_adagrad_step() {
        // uniform probabilities give residuals [0.5, -0.5]; the bias track
        // sees u * 1 and feature 1 sees u * 2
        let mut weights = MultiWeightVector::new();
        weights.expand(2, 2).unwrap();
        let mut params = AdaGradParams::default();
        params.set_alpha(0.5).unwrap();
        params.set_rho(1.0).unwrap();
        params.set_bias(1.0).unwrap();
        let x: SparseFeatureVector = vec![(1usize, 2.0)].into_iter().collect();
        let mut trainer = Trainer::<Lr, _>::with_params(
            vec![IntInstance::new(0, x)],
            &weights,
            params,
            LrParams::default(),
        )
        .unwrap();
        trainer.train_epoch(&mut weights).unwrap();

        let g = trainer.gradients();
        assert_eq!(g[weights.weight_index(0, 0)], 0.25);
        assert_eq!(g[weights.weight_index(1, 0)], 0.25);
        assert_eq!(g[weights.weight_index(0, 1)], 1.0);
        assert_eq!(g[weights.weight_index(1, 1)], 1.0);

        // w = alpha / (rho + sqrt(g)) * u * x
        let w = |l, f| weights.get(weights.weight_index(l, f));
        assert_abs_diff_eq!(w(0, 0), 1.0 / 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w(1, 0), -1.0 / 6.0, epsilon = 1e-6);
        assert_eq!(w(0, 1), 0.25);
        assert_eq!(w(1, 1), -0.25);
    }
}
