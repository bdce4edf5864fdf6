//! Crop Predictor
//!
//! Ranks crops for a soil sample from a trained [`CropPipeline`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use super::features::normalize_region;
use super::training::{load_model, save_model, train_from_path, CropPipeline, TrainingConfig};
use crate::config::ProjectPaths;
use crate::data::SoilSample;
use crate::error::AdvisorError;

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldCategory {
    High,
    Medium,
    Low,
}

impl YieldCategory {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.7 {
            YieldCategory::High
        } else if probability >= 0.4 {
            YieldCategory::Medium
        } else {
            YieldCategory::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YieldCategory::High => "High",
            YieldCategory::Medium => "Medium",
            YieldCategory::Low => "Low",
        }
    }
}

impl fmt::Display for YieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub crop: String,
    pub probability: f64,
    pub yield_category: YieldCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug)]
pub struct CropPredictor {
    pipeline: CropPipeline,
    top_k: usize,
}

impl CropPredictor {
    pub fn new(pipeline: CropPipeline, top_k: usize) -> Self {
        Self { pipeline, top_k: top_k.max(1) }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn pipeline(&self) -> &CropPipeline {
        &self.pipeline
    }

    /// Top-k crops by probability, highest first; equal probabilities order by crop name
    pub fn recommend(&self, sample: &SoilSample) -> Result<RecommendationResult> {
        let mut sample = sample.clone();
        if sample.region.is_some() || self.pipeline.features.uses_region() {
            sample.region = Some(normalize_region(sample.region.as_deref()));
        }

        let proba = self.pipeline.predict_proba(&sample)?;
        let classes = self.pipeline.classes();

        let mut ranked: Vec<(usize, f64)> = proba.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| classes[a.0].cmp(&classes[b.0])));

        let recommendations = ranked
            .into_iter()
            .take(self.top_k)
            .map(|(index, probability)| Recommendation {
                crop: classes[index].clone(),
                probability,
                yield_category: YieldCategory::from_probability(probability),
            })
            .collect();

        Ok(RecommendationResult { recommendations })
    }
}

/// Load the persisted pipeline
///
/// The artifact model is preferred, then the legacy `models/` location. A
/// missing model is `ModelNotReady`; a model that fails to parse is rebuilt
/// from the training dataset and saved over the artifact path.
pub fn load_pipeline(paths: &ProjectPaths) -> Result<CropPipeline> {
    let path = [paths.model(), paths.legacy_model()]
        .into_iter()
        .find(|p| p.exists())
        .ok_or(AdvisorError::ModelNotReady)?;

    match load_model(&path) {
        Ok(pipeline) => {
            info!(path = %path.display(), classes = pipeline.classes().len(), "Loaded crop model");
            Ok(pipeline)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Model load failed, re-training a compatible model");
            retrain(paths)
        }
    }
}

fn retrain(paths: &ProjectPaths) -> Result<CropPipeline> {
    let artifacts = train_from_path(&TrainingConfig::default(), &paths.training_dataset())?;
    let saved: PathBuf = save_model(&artifacts.pipeline, &paths.artifacts_models)?;
    info!(path = %saved.display(), accuracy = artifacts.metrics.accuracy, "Re-trained crop model");
    Ok(artifacts.pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::model::training::tests::{small_config, synthetic_split};
    use crate::model::training::train_model;

    fn predictor(top_k: usize) -> CropPredictor {
        let artifacts = train_model(&small_config(), &synthetic_split(10)).unwrap();
        CropPredictor::new(artifacts.pipeline, top_k)
    }

    #[test]
    fn test_yield_category_thresholds() {
        assert_eq!(YieldCategory::from_probability(0.7), YieldCategory::High);
        assert_eq!(YieldCategory::from_probability(0.69), YieldCategory::Medium);
        assert_eq!(YieldCategory::from_probability(0.4), YieldCategory::Medium);
        assert_eq!(YieldCategory::from_probability(0.39), YieldCategory::Low);
    }

    #[test]
    fn test_recommend_ranks_top_k() {
        let predictor = predictor(2);
        let sample = SoilSample::from_features([90.0, 42.0, 43.0, 21.0, 82.0, 6.5, 203.0], None);
        let result = predictor.recommend(&sample).unwrap();

        assert_eq!(result.recommendations.len(), 2);
        assert_eq!(result.recommendations[0].crop, "rice");
        assert!(result.recommendations[0].probability >= result.recommendations[1].probability);
    }

    #[test]
    fn test_ties_break_by_name() {
        let predictor = predictor(3);
        let sample = SoilSample::from_features([90.0, 42.0, 43.0, 21.0, 82.0, 6.5, 203.0], None);
        let recs = predictor.recommend(&sample).unwrap().recommendations;

        for pair in recs.windows(2) {
            if pair[0].probability == pair[1].probability {
                assert!(pair[0].crop < pair[1].crop);
            }
        }
    }

    #[test]
    fn test_missing_model_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Settings::for_data_dir(dir.path()).paths();
        let err = load_pipeline(&paths).unwrap_err();
        assert!(matches!(err.downcast_ref::<AdvisorError>(), Some(AdvisorError::ModelNotReady)));
    }

    #[test]
    fn test_corrupt_model_without_dataset_errors() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Settings::for_data_dir(dir.path()).paths();
        std::fs::create_dir_all(&paths.artifacts_models).unwrap();
        std::fs::write(paths.model(), "not json").unwrap();

        let err = load_pipeline(&paths).unwrap_err();
        assert!(matches!(err.downcast_ref::<AdvisorError>(), Some(AdvisorError::DatasetNotFound(_))));
    }
}
