use linmod::train::{
    accuracy, AdaGradParams, EarlyStopping, Lr, LrParams, OnlineTrainer, Rrm, RrmParams,
    TrainConfig, Trainer,
};
use linmod::{
    BinaryWeightVector, Classifier, InstanceReader, IntInstance, MultiWeightVector,
    StringFeatureVector, StringModel, WeightVector,
};

const WEATHER: &str = "\
sunny 0:walk 1:park 2:warm
sunny 0:walk 1:beach 2:warm
sunny 0:swim 1:beach 2:warm
rainy 0:clean 1:home 2:wet
rainy 0:read 1:home 2:wet
rainy 0:clean 1:home 2:cold
cloudy 0:walk 1:home 2:grey
cloudy 0:read 1:park 2:grey
cloudy 0:shop 1:mall 2:grey
";

fn weather_model() -> (StringModel<MultiWeightVector>, Vec<IntInstance>) {
    let mut model = StringModel::new();
    for instance in InstanceReader::new(WEATHER.as_bytes()) {
        model.add_instance(instance.unwrap());
    }
    let instances = model.initialize_for_training(0, 0).unwrap();
    (model, instances)
}

fn seeded(alpha: f64, bias: f64, average: bool) -> AdaGradParams {
    let mut params = AdaGradParams::default();
    params.set_alpha(alpha).unwrap();
    params.set_bias(bias).unwrap();
    params.set_average(average);
    params.set_shuffle_seed(Some(5));
    params
}

#[test]
fn test_lr_learns_training_set() {
    let (mut model, instances) = weather_model();
    let mut trainer = Trainer::<Lr, _>::with_params(
        instances.clone(),
        model.weights(),
        seeded(0.3, 1.0, false),
        LrParams::default(),
    )
    .unwrap();
    for _ in 0..40 {
        trainer.train_epoch(model.weights_mut()).unwrap();
    }
    assert_eq!(accuracy(model.weights(), &instances), 1.0);

    let x: StringFeatureVector = vec![(0u32, "clean"), (1u32, "home"), (2u32, "wet")]
        .into_iter()
        .collect();
    assert_eq!(model.predict_best(&x).unwrap().label, "rainy");
}

#[test]
fn test_rrm_learns_training_set() {
    let (mut model, instances) = weather_model();
    let mut trainer = Trainer::<Rrm, _>::with_params(
        instances.clone(),
        model.weights(),
        seeded(0.5, 0.0, false),
        RrmParams::with_margin(1.0),
    )
    .unwrap();
    let first = trainer.train_epoch(model.weights_mut()).unwrap();
    assert_eq!(first.instances, 9);
    assert!(first.updates > 0);
    for _ in 0..30 {
        trainer.train_epoch(model.weights_mut()).unwrap();
    }
    assert_eq!(accuracy(model.weights(), &instances), 1.0);
}

#[test]
fn test_averaged_weights_are_mean_of_iterates() {
    // one instance per epoch: the average of the iterates before and after
    // the single update is half the update
    let mut weights = MultiWeightVector::new();
    weights.expand(2, 2).unwrap();
    let instance = IntInstance::new(1, vec![1usize].into_iter().collect());

    let mut plain = weights.clone();
    let mut trainer = Trainer::<Rrm, _>::with_params(
        vec![instance.clone()],
        &plain,
        seeded(0.5, 0.0, false),
        RrmParams::with_margin(1.0),
    )
    .unwrap();
    trainer.train_epoch(&mut plain).unwrap();

    let mut trainer = Trainer::<Rrm, _>::with_params(
        vec![instance],
        &weights,
        seeded(0.5, 0.0, true),
        RrmParams::with_margin(1.0),
    )
    .unwrap();
    trainer.train_epoch(&mut weights).unwrap();

    for (avg, raw) in weights.as_slice().iter().zip(plain.as_slice()) {
        assert!((avg - raw / 2.0).abs() < 1e-6);
    }
    assert!(weights.get(weights.weight_index(1, 1)) > 0.0);
}

#[test]
fn test_same_seed_same_weights() {
    let (model, instances) = weather_model();
    let run = || {
        let mut weights = model.weights().clone();
        let mut trainer = Trainer::<Lr, _>::with_params(
            instances.clone(),
            &weights,
            seeded(0.05, 1.0, true),
            LrParams::default(),
        )
        .unwrap();
        for _ in 0..3 {
            trainer.train_epoch(&mut weights).unwrap();
        }
        weights
    };
    assert_eq!(run(), run());
}

#[test]
fn test_step_sizes_shrink_with_updates() {
    let (model, instances) = weather_model();
    let mut weights = model.weights().clone();
    let mut trainer = Trainer::<Rrm, _>::with_params(
        instances,
        &weights,
        seeded(0.1, 1.0, false),
        RrmParams::with_margin(1.0),
    )
    .unwrap();

    let bias = weights.weight_index(0, 0);
    let mut last = trainer.learning_rate(bias);
    for _ in 0..5 {
        trainer.train_epoch(&mut weights).unwrap();
        let rate = trainer.learning_rate(bias);
        assert!(rate <= last);
        last = rate;
    }
}

#[test]
fn test_configured_training_with_early_stopping() {
    let (mut model, instances) = weather_model();
    let dev = instances.clone();
    let config =
        TrainConfig::parse("rule=rrm margin=1 alpha=0.1 bias=1 average=true seed=5").unwrap();

    let mut trainer = config.trainer(instances, model.weights()).unwrap();
    let report = config
        .early_stopping()
        .train(trainer.as_mut(), model.weights_mut(), |w| accuracy(w, &dev))
        .unwrap();

    assert!(report.epochs >= report.best_epoch + 1);
    assert_eq!(report.best_score, accuracy(model.weights(), &dev));
}

#[test]
fn test_early_stopping_keeps_best_snapshot() {
    let (mut model, instances) = weather_model();
    let dev = instances.clone();
    let mut trainer = Trainer::<Lr, _>::with_params(
        instances,
        model.weights(),
        seeded(0.1, 1.0, false),
        LrParams::default(),
    )
    .unwrap();

    // a dev score that rises for three epochs and then drops
    let mut epoch = 0;
    let mut snapshots = Vec::new();
    let mut stopping = EarlyStopping::new();
    stopping.set_max_epochs(Some(10)).unwrap();
    let report = stopping
        .train(&mut trainer, model.weights_mut(), |w| {
            snapshots.push(w.clone());
            epoch += 1;
            [0.1, 0.2, 0.3, 0.25][epoch - 1]
        })
        .unwrap();

    assert_eq!(report.epochs, 4);
    assert_eq!(report.best_epoch, 2);
    assert_eq!(model.weights(), &snapshots[2]);
    assert!(accuracy(model.weights(), &dev) > 0.0);
}

#[test]
fn test_bootstrap_retraining() {
    let (mut model, instances) = weather_model();
    let mut trainer = Trainer::<Rrm, _>::with_params(
        instances,
        model.weights(),
        seeded(0.1, 1.0, false),
        RrmParams::with_margin(1.0),
    )
    .unwrap();
    for _ in 0..5 {
        trainer.train_epoch(model.weights_mut()).unwrap();
    }
    let before = model.weights().weights(0);

    // a second pass adds a label and new features
    for instance in InstanceReader::new("snowy 0:ski 1:mountain 2:cold\n".as_bytes()) {
        model.add_instance(instance.unwrap());
    }
    let instances = model.initialize_for_training(0, 0).unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(model.labels().len(), 4);
    assert_eq!(&model.weights().weights(0)[..before.len()], &before[..]);

    // the old trainer no longer matches the grown weights
    assert!(trainer.train_epoch(model.weights_mut()).is_err());
    let mut trainer = Trainer::<Rrm, _>::with_params(
        instances,
        model.weights(),
        seeded(0.1, 1.0, false),
        RrmParams::with_margin(1.0),
    )
    .unwrap();
    trainer.train_epoch(model.weights_mut()).unwrap();
}

#[test]
fn test_binary_training() {
    let mut model = StringModel::<BinaryWeightVector>::new();
    let text = "\
pos 0:good 1:great
pos 0:good 1:fine
neg 0:bad 1:awful
neg 0:bad 1:poor
";
    for instance in InstanceReader::new(text.as_bytes()) {
        model.add_instance(instance.unwrap());
    }
    let instances = model.initialize_for_training(0, 0).unwrap();
    let config = TrainConfig::parse("vector=binary rule=lr alpha=0.5 bias=1 seed=3").unwrap();
    let mut trainer = config.trainer(instances.clone(), model.weights()).unwrap();
    for _ in 0..10 {
        trainer.train_epoch(model.weights_mut()).unwrap();
    }
    assert_eq!(accuracy(model.weights(), &instances), 1.0);

    let x: StringFeatureVector = vec![(0u32, "good")].into_iter().collect();
    assert_eq!(model.predict_best(&x).unwrap().label, "pos");
    let x: StringFeatureVector = vec![(0u32, "bad")].into_iter().collect();
    assert_eq!(model.predict_best(&x).unwrap().label, "neg");
}

#[test]
fn test_one_vs_all_ensemble() {
    let (model, instances) = weather_model();
    let config = TrainConfig::parse("rule=lr alpha=0.2 bias=1 seed=11 threads=2").unwrap();
    let mut ova = config
        .one_vs_all(
            &instances,
            model.labels().len(),
            model.features().len(),
        )
        .unwrap();
    let report = EarlyStopping::new()
        .run(&mut ova, |ova| ova.accuracy(&instances))
        .unwrap();
    assert!(report.best_score > 0.5);
    assert_eq!(ova.accuracy(&instances), report.best_score);
}
