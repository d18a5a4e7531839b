use linmod::train::{accuracy, TrainConfig};
use linmod::{Classifier, InstanceReader, MultiWeightVector, StringFeatureVector, StringModel};

const TRAIN: &str = "\
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

const DEV: &str = "\
sunny 0:swim 1:park 2:warm
rainy 0:read 1:home 2:cold
cloudy 0:shop 1:park 2:grey
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Linear Classifier Training and Prediction Example");
    println!("==================================================\n");

    let config =
        TrainConfig::parse("rule=rrm margin=1 alpha=0.1 bias=1 average=true seed=42 patience=2")?;
    println!("Parameters:");
    for name in ["rule", "margin", "alpha", "rho", "bias", "average", "patience"] {
        println!("  {}: {}", name, config.get(name)?);
    }

    // Collect vocabularies and resolve the training set
    let mut model = StringModel::<MultiWeightVector>::new();
    for instance in InstanceReader::new(TRAIN.as_bytes()) {
        model.add_instance(instance?);
    }
    let train = model.initialize_for_training(config.label_cutoff(), config.feature_cutoff())?;
    let dev = InstanceReader::new(DEV.as_bytes())
        .map(|instance| -> linmod::Result<_> { Ok(model.to_int_instance(&instance?)) })
        .collect::<linmod::Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    println!(
        "\nTraining data: {} instances, {} labels, {} features\n",
        train.len(),
        model.labels().len(),
        model.features().len()
    );

    println!("Training model...");
    let mut trainer = config.trainer(train, model.weights())?;
    let report = config
        .early_stopping()
        .train(trainer.as_mut(), model.weights_mut(), |w| accuracy(w, &dev))?;
    println!(
        "  Stopped after {} epochs, kept epoch {} (dev accuracy {:.3})\n",
        report.epochs, report.best_epoch, report.best_score
    );

    let model_path = std::env::temp_dir().join("example_model.lmdl");
    model.save_file(&model_path)?;
    println!("Saved model to {}", model_path.display());

    let model = StringModel::<MultiWeightVector>::load_file(&model_path)?;
    let x: StringFeatureVector = vec![(0u32, "walk"), (1u32, "beach"), (2u32, "warm")]
        .into_iter()
        .collect();
    println!("\nPredictions for walk / beach / warm:");
    for prediction in model.predict_all(&x) {
        println!("  {:>8} {:8.4}", prediction.label, prediction.score);
    }

    Ok(())
}
