//! Models
//!
//! - `features`: standard scaling plus optional region one-hot encoding
//! - `forest`: CART random forest classifier with probability output
//! - `training`: fit/evaluate/persist the crop recommendation pipeline
//! - `predictor`: top-k crop ranking from a trained pipeline
//! - `yield_estimator`: heuristic yield projection per crop
//! - `disease`: colour-statistics leaf disease heuristic

pub mod features;
pub mod forest;
pub mod training;
pub mod predictor;
pub mod yield_estimator;
pub mod disease;

pub use features::FeaturePipeline;
pub use forest::{ForestParams, RandomForest};
pub use training::{train_model, CropPipeline, TrainingArtifacts, TrainingConfig, TrainingMetrics};
pub use predictor::{load_pipeline, CropPredictor, Recommendation, RecommendationResult, YieldCategory};
pub use yield_estimator::{YieldEstimator, YieldPrediction};
pub use disease::{CropDiseaseClassifier, DiseasePrediction};
