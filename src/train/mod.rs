//! Training for linear models
//!
//! This module contains the AdaGrad trainer with its two update rules, the
//! early-stopping driver, one-vs-all ensembles and the string-keyed
//! training configuration.

mod config;
mod driver;
mod one_vs_all;
mod trainer;

// Re-export public types
pub use self::config::{RuleKind, TrainConfig};
pub use self::driver::{accuracy, EarlyStopping, Session, Trainable, TrainingReport};
pub use self::one_vs_all::OneVsAll;
pub use self::trainer::{
    AdaGradParams, EpochSummary, Lr, LrParams, OnlineTrainer, Rrm, RrmParams, Trainer, UpdateRule,
};
