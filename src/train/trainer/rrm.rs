use crate::dataset::IntInstance;
use crate::error::{Error, Result};
use crate::vector::{argmax, WeightVector};

use super::{Rrm, UpdateRule};

/// RRM update parameters.
///
/// The margin has no default and must be set before a trainer is built.
#[derive(Debug, Clone, Default)]
pub struct RrmParams {
    margin: Option<f64>,
}

impl RrmParams {
    pub fn with_margin(margin: f64) -> Self {
        Self {
            margin: Some(margin),
        }
    }

    pub fn margin(&self) -> Option<f64> {
        self.margin
    }

    pub fn set_margin(&mut self, margin: f64) -> Result<()> {
        if !(margin >= 0.0 && margin.is_finite()) {
            return Err(Error::invalid("margin", "must be non-negative"));
        }
        self.margin = Some(margin);
        Ok(())
    }
}

impl UpdateRule for Rrm {
    type Params = RrmParams;

    const NAME: &'static str = "rrm";

    fn check(params: &RrmParams) -> Result<()> {
        match params.margin {
            Some(_) => Ok(()),
            None => Err(Error::MissingParameter {
                name: "margin",
                rule: Self::NAME,
            }),
        }
    }

    /// Push the true label up and the best rival down when the rival
    /// outscores the true label less the margin
    fn gradient<W: WeightVector>(
        params: &RrmParams,
        weights: &W,
        instance: &IntInstance,
        grad: &mut Vec<(usize, f64)>,
    ) {
        let margin = params.margin.unwrap_or(0.0);
        let mut scores = weights.scores(&instance.features);
        scores[instance.label] -= margin;
        let (rival, _) = argmax(&scores);
        if rival != instance.label {
            grad.push((instance.label, 1.0));
            grad.push((rival, -1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{BinaryWeightVector, MultiWeightVector};

    #[test]
    fn test_violation_pushes_pair() {
        let mut weights = MultiWeightVector::new();
        weights.expand(3, 2).unwrap();
        let i = weights.weight_index(1, 1);
        weights.set(i, 0.5);
        let instance = IntInstance::new(1, vec![1usize].into_iter().collect());
        let params = RrmParams::with_margin(1.0);

        let mut grad = Vec::new();
        Rrm::gradient(&params, &weights, &instance, &mut grad);
        assert_eq!(grad, vec![(1, 1.0), (0, -1.0)]);

        weights.set(i, 1.5);
        grad.clear();
        Rrm::gradient(&params, &weights, &instance, &mut grad);
        assert!(grad.is_empty());
    }

    #[test]
    fn test_binary_direction() {
        let mut weights = BinaryWeightVector::new();
        weights.expand(2, 2).unwrap();
        let params = RrmParams::with_margin(1.0);
        for (label, expected) in [(0, 1.0), (1, -1.0)] {
            let instance = IntInstance::new(label, vec![1usize].into_iter().collect());
            let mut grad = Vec::new();
            Rrm::gradient(&params, &weights, &instance, &mut grad);
            let mut coords = Vec::new();
            weights.project(1, &grad, &mut coords);
            assert_eq!(coords, vec![(1, expected)]);
        }
    }

    #[test]
    fn test_margin_required() {
        assert!(Rrm::check(&RrmParams::default()).is_err());
        let mut params = RrmParams::default();
        assert!(params.set_margin(-1.0).is_err());
        params.set_margin(0.5).unwrap();
        assert!(Rrm::check(&params).is_ok());
    }
}
