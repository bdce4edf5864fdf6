//! Model Training
//!
//! Fits the feature pipeline and random forest on a train split, scores the
//! held-out split and persists both the model and its metrics as JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use smartcore::metrics::{accuracy, f1, precision, recall};

use super::features::FeaturePipeline;
use super::forest::{argmax, ForestParams, RandomForest};
use crate::data::{load_dataset, split_dataset, DatasetSplit, SoilSample};
use crate::utils::{mean, population_std};

pub const MODEL_FILE_NAME: &str = "crop_recommender.json";
pub const METRICS_FILE_NAME: &str = "training_metrics.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl TrainingConfig {
    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            random_state: self.random_state,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Feature encoding plus classifier, persisted as one JSON document
#[derive(Debug, Serialize, Deserialize)]
pub struct CropPipeline {
    pub features: FeaturePipeline,
    pub classifier: RandomForest,
}

impl CropPipeline {
    pub fn fit(samples: &[SoilSample], labels: &[String], use_region: bool, params: &ForestParams) -> Result<Self> {
        let features = FeaturePipeline::fit(samples, use_region)?;
        let x = features.transform_all(samples)?;
        let classifier = RandomForest::fit(&x, labels, params)?;
        Ok(Self { features, classifier })
    }

    /// Class probabilities ordered like [`Self::classes`]
    pub fn predict_proba(&self, sample: &SoilSample) -> Result<Vec<f64>> {
        self.classifier.predict_proba(&self.features.transform(sample)?)
    }

    pub fn predict_proba_batch(&self, samples: &[SoilSample]) -> Result<Vec<Vec<f64>>> {
        self.classifier.predict_proba_batch(&self.features.transform_all(samples)?)
    }

    pub fn predict(&self, sample: &SoilSample) -> Result<&str> {
        self.classifier.predict(&self.features.transform(sample)?)
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: BTreeMap<String, ClassMetrics>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySummary {
    pub max_mean: f64,
    pub max_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub classification_report: ClassificationReport,
    pub probability_summary: ProbabilitySummary,
}

/// One-vs-rest indicator vector for `label`
fn indicator(values: &[String], label: &str) -> Vec<f64> {
    values.iter().map(|v| if v == label { 1.0 } else { 0.0 }).collect()
}

/// Per-class precision/recall/F1 over the union of true and predicted labels
///
/// Scores come from smartcore's binary metrics on one-vs-rest indicators.
/// A class never predicted (or never present) scores 0 instead of NaN.
pub fn classification_report(y_true: &[String], y_pred: &[String]) -> ClassificationReport {
    let labels: BTreeSet<&String> = y_true.iter().chain(y_pred).collect();

    let mut classes = BTreeMap::new();
    for label in labels {
        let truth = indicator(y_true, label);
        let predicted = indicator(y_pred, label);
        let support = truth.iter().filter(|&&v| v > 0.0).count();
        let any_predicted = predicted.iter().any(|&v| v > 0.0);

        let p = if any_predicted { precision(&truth, &predicted) } else { 0.0 };
        let r = if support > 0 { recall(&truth, &predicted) } else { 0.0 };
        let f = if p > 0.0 && r > 0.0 { f1(&truth, &predicted, 1.0) } else { 0.0 };
        classes.insert(
            label.clone(),
            ClassMetrics { precision: p, recall: r, f1_score: f, support },
        );
    }

    let total: usize = classes.values().map(|m| m.support).sum();
    let n_classes = classes.len().max(1) as f64;
    let macro_avg = ClassMetrics {
        precision: classes.values().map(|m| m.precision).sum::<f64>() / n_classes,
        recall: classes.values().map(|m| m.recall).sum::<f64>() / n_classes,
        f1_score: classes.values().map(|m| m.f1_score).sum::<f64>() / n_classes,
        support: total,
    };
    let weight = |pick: fn(&ClassMetrics) -> f64| -> f64 {
        if total == 0 {
            return 0.0;
        }
        classes.values().map(|m| pick(m) * m.support as f64).sum::<f64>() / total as f64
    };
    let weighted_avg = ClassMetrics {
        precision: weight(|m| m.precision),
        recall: weight(|m| m.recall),
        f1_score: weight(|m| m.f1_score),
        support: total,
    };

    // Shared label codes so accuracy compares like with like
    let codes: Vec<&String> = classes.keys().collect();
    let encode = |values: &[String]| -> Vec<u32> {
        values
            .iter()
            .map(|v| codes.binary_search(&v).unwrap_or_default() as u32)
            .collect()
    };
    let overall = if y_true.is_empty() { 0.0 } else { accuracy(&encode(y_true), &encode(y_pred)) };

    ClassificationReport {
        classes,
        accuracy: overall,
        macro_avg,
        weighted_avg,
    }
}

// ============================================================================
// Training
// ============================================================================

pub struct TrainingArtifacts {
    pub pipeline: CropPipeline,
    pub metrics: TrainingMetrics,
    pub feature_names: Vec<String>,
}

/// Fit on the train split and evaluate on the test split
pub fn train_model(config: &TrainingConfig, split: &DatasetSplit) -> Result<TrainingArtifacts> {
    let start = Instant::now();
    info!(
        train_rows = split.x_train.len(),
        test_rows = split.x_test.len(),
        n_estimators = config.n_estimators,
        "Training crop recommender"
    );

    let pipeline = CropPipeline::fit(&split.x_train, &split.y_train, split.has_region, &config.forest_params())?;

    let mut predictions = Vec::with_capacity(split.x_test.len());
    let mut row_max = Vec::with_capacity(split.x_test.len());
    for proba in pipeline.predict_proba_batch(&split.x_test)? {
        let best = argmax(&proba);
        predictions.push(pipeline.classes()[best].clone());
        row_max.push(proba.get(best).copied().unwrap_or(0.0));
    }

    let report = classification_report(&split.y_test, &predictions);
    let metrics = TrainingMetrics {
        accuracy: report.accuracy,
        macro_f1: report.macro_avg.f1_score,
        probability_summary: ProbabilitySummary {
            max_mean: mean(&row_max).unwrap_or(0.0),
            max_std: population_std(&row_max).unwrap_or(0.0),
        },
        classification_report: report,
    };

    info!(
        accuracy = metrics.accuracy,
        macro_f1 = metrics.macro_f1,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Training complete"
    );

    Ok(TrainingArtifacts {
        feature_names: pipeline.features.feature_names(),
        pipeline,
        metrics,
    })
}

/// Load the CSV, split it and train
pub fn train_from_path(config: &TrainingConfig, dataset_path: &Path) -> Result<TrainingArtifacts> {
    let dataset = load_dataset(dataset_path)?;
    let split = split_dataset(&dataset, config.test_size, config.random_state, true)?;
    train_model(config, &split)
}

// ============================================================================
// Persistence
// ============================================================================

pub fn save_model(pipeline: &CropPipeline, model_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(model_dir)
        .with_context(|| format!("Failed to create {}", model_dir.display()))?;
    let path = model_dir.join(MODEL_FILE_NAME);
    let json = serde_json::to_string(pipeline).context("Failed to serialize model")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Saved model");
    Ok(path)
}

pub fn load_model(path: &Path) -> Result<CropPipeline> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse model {}", path.display()))
}

pub fn save_metrics(metrics: &TrainingMetrics, metrics_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(metrics_dir)
        .with_context(|| format!("Failed to create {}", metrics_dir.display()))?;
    let path = metrics_dir.join(METRICS_FILE_NAME);
    let json = serde_json::to_string_pretty(metrics).context("Failed to serialize metrics")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Three well separated crops, `per_class` rows each
    pub(crate) fn synthetic_split(per_class: usize) -> DatasetSplit {
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for i in 0..per_class {
            let jitter = i as f64 * 0.5;
            samples.push(SoilSample::from_features([90.0 + jitter, 42.0, 43.0, 21.0, 82.0, 6.5, 203.0], None));
            labels.push("rice".to_string());
            samples.push(SoilSample::from_features([20.0 + jitter, 67.0, 20.0, 18.0, 17.0, 6.0, 80.0], None));
            labels.push("chickpea".to_string());
            samples.push(SoilSample::from_features([118.0 + jitter, 46.0, 20.0, 24.0, 80.0, 6.8, 68.0], None));
            labels.push("cotton".to_string());
        }
        let split_at = samples.len() * 4 / 5;
        DatasetSplit {
            x_test: samples.split_off(split_at),
            y_test: labels.split_off(split_at),
            x_train: samples,
            y_train: labels,
            has_region: false,
        }
    }

    pub(crate) fn small_config() -> TrainingConfig {
        TrainingConfig { n_estimators: 15, ..TrainingConfig::default() }
    }

    #[test]
    fn test_train_separable_data() {
        let artifacts = train_model(&small_config(), &synthetic_split(10)).unwrap();

        assert_relative_eq!(artifacts.metrics.accuracy, 1.0);
        assert_relative_eq!(artifacts.metrics.macro_f1, 1.0);
        assert_eq!(artifacts.feature_names.len(), 7);
        assert_eq!(artifacts.pipeline.classes(), ["chickpea", "cotton", "rice"]);
        assert!(artifacts.metrics.probability_summary.max_mean > 0.5);
    }

    #[test]
    fn test_classification_report_zero_division() {
        let y_true: Vec<String> = ["a", "a", "b"].iter().map(|s| s.to_string()).collect();
        let y_pred: Vec<String> = ["a", "a", "a"].iter().map(|s| s.to_string()).collect();
        let report = classification_report(&y_true, &y_pred);

        let b = &report.classes["b"];
        assert_relative_eq!(b.precision, 0.0);
        assert_relative_eq!(b.f1_score, 0.0);
        assert_eq!(b.support, 1);

        let a = &report.classes["a"];
        assert_relative_eq!(a.precision, 2.0 / 3.0);
        assert_relative_eq!(a.recall, 1.0);
        assert_relative_eq!(report.accuracy, 2.0 / 3.0);
        assert_relative_eq!(report.macro_avg.f1_score, 0.4);
    }

    #[test]
    fn test_save_and_load_model() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = train_model(&small_config(), &synthetic_split(6)).unwrap();

        let model_path = save_model(&artifacts.pipeline, dir.path()).unwrap();
        assert!(model_path.ends_with(MODEL_FILE_NAME));
        let loaded = load_model(&model_path).unwrap();
        assert_eq!(loaded.classes(), artifacts.pipeline.classes());

        let metrics_path = save_metrics(&artifacts.metrics, dir.path()).unwrap();
        let text = std::fs::read_to_string(metrics_path).unwrap();
        assert!(text.contains("\"macro avg\""));
        assert!(text.contains("\"max_mean\""));
    }
}
