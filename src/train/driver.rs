use tracing::{debug, info};

use crate::dataset::IntInstance;
use crate::error::{Error, Result};
use crate::vector::{WeightSnapshot, WeightVector};

use super::trainer::{EpochSummary, OnlineTrainer};

/// Something whose state can be trained an epoch at a time and rolled back
/// to an earlier epoch
pub trait Trainable {
    type Snapshot;

    fn train_epoch(&mut self) -> Result<EpochSummary>;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: &Self::Snapshot) -> Result<()>;
}

/// A trainer paired with the weight vector it updates
pub struct Session<'a, W: WeightVector, T: OnlineTrainer<W> + ?Sized> {
    pub trainer: &'a mut T,
    pub weights: &'a mut W,
}

impl<'a, W: WeightVector, T: OnlineTrainer<W> + ?Sized> Session<'a, W, T> {
    pub fn new(trainer: &'a mut T, weights: &'a mut W) -> Self {
        Self { trainer, weights }
    }
}

impl<'a, W: WeightVector, T: OnlineTrainer<W> + ?Sized> Trainable for Session<'a, W, T> {
    type Snapshot = WeightSnapshot;

    fn train_epoch(&mut self) -> Result<EpochSummary> {
        self.trainer.train_epoch(self.weights)
    }

    fn snapshot(&self) -> WeightSnapshot {
        self.weights.snapshot()
    }

    fn restore(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        self.weights.restore(snapshot)
    }
}

/// Outcome of an early-stopped training run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    /// Epochs run
    pub epochs: usize,
    /// 0-based epoch whose weights were kept
    pub best_epoch: usize,
    /// Development score of the kept weights
    pub best_score: f64,
}

/// Development-set early stopping
///
/// After every epoch the weights are scored; a strictly better score is
/// snapshotted. Training stops after `patience + 1` consecutive epochs
/// without improvement, or after `max_epochs`, and the best snapshot is
/// restored either way.
#[derive(Debug, Clone, Default)]
pub struct EarlyStopping {
    patience: usize,
    max_epochs: Option<usize>,
}

impl EarlyStopping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn set_patience(&mut self, patience: usize) {
        self.patience = patience;
    }

    pub fn max_epochs(&self) -> Option<usize> {
        self.max_epochs
    }

    pub fn set_max_epochs(&mut self, max_epochs: Option<usize>) -> Result<()> {
        if max_epochs == Some(0) {
            return Err(Error::invalid("max_epochs", "must be at least 1"));
        }
        self.max_epochs = max_epochs;
        Ok(())
    }

    /// Train `weights` until the development score stops improving
    pub fn train<W, T, F>(
        &self,
        trainer: &mut T,
        weights: &mut W,
        mut evaluate: F,
    ) -> Result<TrainingReport>
    where
        W: WeightVector,
        T: OnlineTrainer<W> + ?Sized,
        F: FnMut(&W) -> f64,
    {
        let mut session = Session::new(trainer, weights);
        self.run(&mut session, |session| evaluate(&*session.weights))
    }

    /// Drive any [`Trainable`] until the development score stops improving
    pub fn run<T, F>(&self, target: &mut T, mut evaluate: F) -> Result<TrainingReport>
    where
        T: Trainable,
        F: FnMut(&T) -> f64,
    {
        let mut best: Option<(usize, f64, T::Snapshot)> = None;
        let mut stale = 0;
        let mut epoch = 0;
        loop {
            if self.max_epochs.is_some_and(|max| epoch >= max) {
                info!(epochs = epoch, "reached epoch limit");
                break;
            }
            let summary = target.train_epoch()?;
            let score = evaluate(target);
            debug!(
                epoch,
                updates = summary.updates,
                instances = summary.instances,
                "trained epoch"
            );
            let improved = match &best {
                Some((_, best_score, _)) => score > *best_score,
                None => true,
            };
            info!(epoch, score, improved, "evaluated epoch");
            epoch += 1;
            if improved {
                best = Some((epoch - 1, score, target.snapshot()));
                stale = 0;
            } else {
                stale += 1;
                if stale > self.patience {
                    info!(epochs = epoch, "stopping early");
                    break;
                }
            }
        }

        match best {
            Some((best_epoch, best_score, snapshot)) => {
                target.restore(&snapshot)?;
                info!(best_epoch, best_score, "restored best epoch");
                Ok(TrainingReport {
                    epochs: epoch,
                    best_epoch,
                    best_score,
                })
            }
            None => Err(Error::invalid("max_epochs", "no epoch was run")),
        }
    }
}

/// Fraction of instances whose best-scoring label is the true one
pub fn accuracy<W: WeightVector>(weights: &W, instances: &[IntInstance]) -> f64 {
    if instances.is_empty() {
        return 0.0;
    }
    let correct = instances
        .iter()
        .filter(|instance| {
            let scores = weights.scores(&instance.features);
            weights.best(&scores).0 == instance.label
        })
        .count();
    correct as f64 / instances.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MultiWeightVector;

    /// Bumps the first weight by one each epoch
    struct Counter;

    impl OnlineTrainer<MultiWeightVector> for Counter {
        fn train_epoch(&mut self, weights: &mut MultiWeightVector) -> Result<EpochSummary> {
            weights.add(0, 1.0);
            Ok(EpochSummary::default())
        }

        fn learning_rate(&self, _index: usize) -> f64 {
            0.0
        }

        fn instances(&self) -> &[IntInstance] {
            &[]
        }
    }

    fn run(stopping: &EarlyStopping, scores: &[f64]) -> (TrainingReport, f32) {
        let mut weights = MultiWeightVector::new();
        weights.expand(1, 1).unwrap();
        let report = stopping
            .train(&mut Counter, &mut weights, |w| {
                let epoch = w.get(0) as usize - 1;
                scores[epoch.min(scores.len() - 1)]
            })
            .unwrap();
        (report, weights.get(0))
    }

    #[test]
    fn test_restores_last_improving_epoch() {
        let (report, w) = run(&EarlyStopping::new(), &[0.1, 0.2, 0.3, 0.25, 0.9]);
        assert_eq!(report.epochs, 4);
        assert_eq!(report.best_epoch, 2);
        assert_eq!(report.best_score, 0.3);
        assert_eq!(w, 3.0);
    }

    #[test]
    fn test_patience() {
        let mut stopping = EarlyStopping::new();
        stopping.set_patience(1);
        let (report, w) = run(&stopping, &[0.1, 0.3, 0.2, 0.4, 0.35, 0.3, 0.9]);
        assert_eq!(report.epochs, 6);
        assert_eq!(report.best_epoch, 3);
        assert_eq!(w, 4.0);
    }

    #[test]
    fn test_max_epochs() {
        let mut stopping = EarlyStopping::new();
        stopping.set_max_epochs(Some(3)).unwrap();
        assert!(stopping.set_max_epochs(Some(0)).is_err());
        let (report, w) = run(&stopping, &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(report.epochs, 3);
        assert_eq!(report.best_epoch, 2);
        assert_eq!(w, 3.0);
    }

    #[test]
    fn test_equal_score_is_not_an_improvement() {
        let (report, w) = run(&EarlyStopping::new(), &[0.5, 0.5]);
        assert_eq!(report.epochs, 2);
        assert_eq!(report.best_epoch, 0);
        assert_eq!(w, 1.0);
    }
}
