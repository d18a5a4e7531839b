use std::fmt;
use std::str::FromStr;

use crate::dataset::IntInstance;
use crate::error::{Error, Result};
use crate::vector::{Layout, WeightVector};

use super::driver::EarlyStopping;
use super::one_vs_all::OneVsAll;
use super::trainer::{AdaGradParams, Lr, LrParams, OnlineTrainer, Rrm, RrmParams, Trainer};

/// Update rule selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleKind {
    #[default]
    Lr,
    Rrm,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Lr => f.write_str("lr"),
            RuleKind::Rrm => f.write_str("rrm"),
        }
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(name, format!("cannot parse '{}'", value)))
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::invalid(name, format!("cannot parse '{}'", value))),
    }
}

/// String-keyed training configuration
///
/// ```text
/// vector=multi rule=rrm margin=1 alpha=0.01 rho=0.1 bias=1 average=true
/// ```
#[derive(Debug, Clone)]
pub struct TrainConfig {
    vector: Layout,
    label_cutoff: usize,
    feature_cutoff: usize,
    rule: RuleKind,
    adagrad: AdaGradParams,
    lr: LrParams,
    rrm: RrmParams,
    threads: usize,
    stopping: EarlyStopping,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            vector: Layout::Multi,
            label_cutoff: 0,
            feature_cutoff: 0,
            rule: RuleKind::Lr,
            adagrad: AdaGradParams::default(),
            lr: LrParams::default(),
            rrm: RrmParams::default(),
            threads: 1,
            stopping: EarlyStopping::default(),
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from whitespace separated `key=value` tokens
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::new();
        for token in text.split_whitespace() {
            let (name, value) = token
                .split_once('=')
                .ok_or_else(|| Error::UnknownParameter(token.to_string()))?;
            config.set(name, value)?;
        }
        Ok(config)
    }

    /// Set a parameter by name
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "vector" => {
                self.vector = match value.trim() {
                    "binary" => Layout::Binary,
                    "multi" => Layout::Multi,
                    _ => return Err(Error::invalid("vector", "must be 'binary' or 'multi'")),
                }
            }
            "label_cutoff" => self.label_cutoff = parse_value("label_cutoff", value)?,
            "feature_cutoff" => self.feature_cutoff = parse_value("feature_cutoff", value)?,
            "rule" => {
                self.rule = match value.trim() {
                    "lr" => RuleKind::Lr,
                    "rrm" => RuleKind::Rrm,
                    _ => return Err(Error::invalid("rule", "must be 'lr' or 'rrm'")),
                }
            }
            "alpha" => self.adagrad.set_alpha(parse_value("alpha", value)?)?,
            "rho" => self.adagrad.set_rho(parse_value("rho", value)?)?,
            "bias" => self.adagrad.set_bias(parse_value("bias", value)?)?,
            "average" => self.adagrad.set_average(parse_bool("average", value)?),
            "seed" => self.adagrad.set_shuffle_seed(Some(parse_value("seed", value)?)),
            "threshold" => self.lr.set_threshold(parse_value("threshold", value)?)?,
            "margin" => self.rrm.set_margin(parse_value("margin", value)?)?,
            "threads" => self.threads = parse_value("threads", value)?,
            "patience" => self.stopping.set_patience(parse_value("patience", value)?),
            "max_epochs" => self
                .stopping
                .set_max_epochs(Some(parse_value("max_epochs", value)?))?,
            _ => return Err(Error::UnknownParameter(name.to_string())),
        }
        Ok(())
    }

    /// Get a parameter by name; unset optional values read as an empty
    /// string
    pub fn get(&self, name: &str) -> Result<String> {
        let value = match name {
            "vector" => self.vector.name().to_string(),
            "label_cutoff" => self.label_cutoff.to_string(),
            "feature_cutoff" => self.feature_cutoff.to_string(),
            "rule" => self.rule.to_string(),
            "alpha" => self.adagrad.alpha().to_string(),
            "rho" => self.adagrad.rho().to_string(),
            "bias" => self.adagrad.bias().to_string(),
            "average" => self.adagrad.average().to_string(),
            "seed" => optional(self.adagrad.shuffle_seed()),
            "threshold" => self.lr.threshold().to_string(),
            "margin" => optional(self.rrm.margin()),
            "threads" => self.threads.to_string(),
            "patience" => self.stopping.patience().to_string(),
            "max_epochs" => optional(self.stopping.max_epochs()),
            _ => return Err(Error::UnknownParameter(name.to_string())),
        };
        Ok(value)
    }

    pub fn vector(&self) -> Layout {
        self.vector
    }

    pub fn rule(&self) -> RuleKind {
        self.rule
    }

    pub fn label_cutoff(&self) -> usize {
        self.label_cutoff
    }

    pub fn feature_cutoff(&self) -> usize {
        self.feature_cutoff
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn adagrad(&self) -> &AdaGradParams {
        &self.adagrad
    }

    pub fn lr(&self) -> &LrParams {
        &self.lr
    }

    pub fn rrm(&self) -> &RrmParams {
        &self.rrm
    }

    pub fn early_stopping(&self) -> &EarlyStopping {
        &self.stopping
    }

    /// Build the configured trainer for `weights`
    ///
    /// Fails when the configured vector kind is not `W`'s layout or the rule
    /// is missing a parameter.
    pub fn trainer<W: WeightVector + 'static>(
        &self,
        instances: Vec<IntInstance>,
        weights: &W,
    ) -> Result<Box<dyn OnlineTrainer<W>>> {
        if self.vector != W::LAYOUT {
            return Err(Error::LayoutMismatch {
                expected: self.vector.name(),
                found: W::LAYOUT.name(),
            });
        }
        let adagrad = self.adagrad.clone();
        let trainer: Box<dyn OnlineTrainer<W>> = match self.rule {
            RuleKind::Lr => Box::new(Trainer::<Lr, W>::with_params(
                instances,
                weights,
                adagrad,
                self.lr.clone(),
            )?),
            RuleKind::Rrm => Box::new(Trainer::<Rrm, W>::with_params(
                instances,
                weights,
                adagrad,
                self.rrm.clone(),
            )?),
        };
        Ok(trainer)
    }

    /// Build a one-vs-all ensemble with the configured rule and threads
    pub fn one_vs_all(
        &self,
        instances: &[IntInstance],
        label_count: usize,
        feature_count: usize,
    ) -> Result<OneVsAll> {
        match self.rule {
            RuleKind::Lr => OneVsAll::new::<Lr>(
                instances,
                label_count,
                feature_count,
                &self.adagrad,
                &self.lr,
                self.threads,
            ),
            RuleKind::Rrm => OneVsAll::new::<Rrm>(
                instances,
                label_count,
                feature_count,
                &self.adagrad,
                &self.rrm,
                self.threads,
            ),
        }
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{BinaryWeightVector, MultiWeightVector};

    #[test]
    fn test_parse_and_get() {
        let config =
            TrainConfig::parse("vector=binary rule=rrm margin=0.5 alpha=0.02 average=true seed=7")
                .unwrap();
        assert_eq!(config.vector(), Layout::Binary);
        assert_eq!(config.rule(), RuleKind::Rrm);
        assert_eq!(config.get("margin").unwrap(), "0.5");
        assert_eq!(config.get("alpha").unwrap(), "0.02");
        assert_eq!(config.get("average").unwrap(), "true");
        assert_eq!(config.get("seed").unwrap(), "7");
        assert_eq!(config.get("threshold").unwrap(), "0.01");
        assert_eq!(config.get("max_epochs").unwrap(), "");
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = TrainConfig::new();
        assert!(matches!(
            config.set("gamma", "1"),
            Err(Error::UnknownParameter(_))
        ));
        assert!(config.get("gamma").is_err());
        assert!(config.set("alpha", "-1").is_err());
        assert!(config.set("alpha", "abc").is_err());
        assert!(config.set("vector", "dense").is_err());
        assert!(config.set("average", "maybe").is_err());
        assert!(TrainConfig::parse("alpha").is_err());
    }

    #[test]
    fn test_trainer_construction() {
        let instances = vec![IntInstance::new(0, vec![1usize].into_iter().collect())];
        let mut weights = MultiWeightVector::new();
        weights.expand(2, 2).unwrap();

        let config = TrainConfig::parse("rule=rrm").unwrap();
        assert!(matches!(
            config.trainer(instances.clone(), &weights),
            Err(Error::MissingParameter { name: "margin", rule: "rrm" })
        ));

        let config = TrainConfig::parse("rule=rrm margin=1").unwrap();
        assert!(config.trainer(instances.clone(), &weights).is_ok());

        let mut binary = BinaryWeightVector::new();
        binary.expand(2, 2).unwrap();
        assert!(matches!(
            config.trainer(instances, &binary),
            Err(Error::LayoutMismatch { .. })
        ));
    }
}
