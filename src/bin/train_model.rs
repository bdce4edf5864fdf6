// Train the crop recommender and write model + metrics artifacts
//
// Usage: cargo run --release --bin train_model

use agro_advisor::model::training::{save_metrics, save_model, train_from_path};
use agro_advisor::model::TrainingConfig;
use agro_advisor::Settings;
use anyhow::Context;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agro_advisor=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();
    let paths = settings.paths();
    let dataset = paths.training_dataset();

    let start = Instant::now();
    let config = TrainingConfig::default();
    let artifacts = train_from_path(&config, &dataset).with_context(|| {
        format!(
            "Training failed; fetch the dataset first with `download_dataset --output-dir {}`",
            paths.data_raw.display()
        )
    })?;

    let model_path = save_model(&artifacts.pipeline, &paths.artifacts_models)?;
    let metrics_path = save_metrics(&artifacts.metrics, &paths.artifacts_metrics)?;

    println!("Trained on {} features in {:.2?}", artifacts.feature_names.len(), start.elapsed());
    println!("Accuracy: {:.4}", artifacts.metrics.accuracy);
    println!("Macro F1: {:.4}", artifacts.metrics.macro_f1);
    println!("Model:    {}", model_path.display());
    println!("Metrics:  {}", metrics_path.display());

    Ok(())
}
