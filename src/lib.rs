//! Online sparse linear classifiers
//!
//! This library builds frequency-cut vocabularies over typed string
//! features, stores binary or multi-class weights in flat buffers and trains
//! them with AdaGrad, stopping early on a development set.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use linmod::train::{accuracy, TrainConfig};
//! use linmod::{Classifier, MultiWeightVector, StringFeatureVector, StringInstance, StringModel};
//!
//! let mut model = StringModel::<MultiWeightVector>::new();
//! let x: StringFeatureVector = vec![(0u32, "walk"), (1u32, "park")].into_iter().collect();
//! model.add_instance(StringInstance::new("sunny", x));
//! let instances = model.initialize_for_training(0, 0)?;
//!
//! let config = TrainConfig::parse("rule=rrm margin=1 bias=1 average=true")?;
//! let dev = instances.clone();
//! let mut trainer = config.trainer(instances, model.weights())?;
//! config
//!     .early_stopping()
//!     .train(trainer.as_mut(), model.weights_mut(), |w| accuracy(w, &dev))?;
//! model.save_file("model.lmdl")?;
//! # Ok::<(), linmod::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use linmod::{Classifier, MultiWeightVector, StringFeatureVector, StringModel};
//!
//! let model = StringModel::<MultiWeightVector>::load_file("model.lmdl")?;
//! let x: StringFeatureVector = vec![(0u32, "walk")].into_iter().collect();
//! if let Some(best) = model.predict_best(&x) {
//!     println!("{} {}", best.label, best.score);
//! }
//! # Ok::<(), linmod::Error>(())
//! ```

mod dataset;
mod dictionary;
mod error;
mod feature;
mod format;
mod model;
mod model_writer;
mod reader;
mod vector;

/// Trainers, early stopping and training configuration
pub mod train;

// Re-export main types
pub use self::dataset::{IntInstance, SparseInstance, StringInstance};
pub use self::dictionary::{FeatureMap, LabelMap};
pub use self::error::{Error, Result};
pub use self::feature::{SparseFeatureVector, StringFeatureVector};
pub use self::model::{Classifier, Prediction, SparseModel, StringModel};
pub use self::reader::{InstanceReader, SparseInstanceReader};
pub use self::vector::{
    softmax, BinaryWeightVector, Layout, MultiWeightVector, WeightSnapshot, WeightVector,
};
