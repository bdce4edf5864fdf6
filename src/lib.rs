//! Agro Advisor
//!
//! Farmer-facing agronomy advisory: crop recommendation from soil and climate
//! readings, fertilizer and pesticide plans, yield projection, market prices,
//! weather lookups and a crop chatbot.
//!
//! Layout:
//! - `data/`: training dataset, dataset download, static lookup tables, soil profiles, crop guide
//! - `model/`: feature pipeline, random forest, training, predictor, yield heuristic, disease heuristic
//! - `advisory/`: threshold rule tables (fertilizer, pesticide, soil health, weather)
//! - `services/`: HTTP-backed market prices and weather with TTL caches
//! - `chatbot/`: keyword routing, retrieval and LLM providers with rule-based fallback
//! - `api_server` / `web/`: axum JSON API and dashboard pages (feature `api`)

pub mod config;
pub mod error;
pub mod utils;
pub mod data;
pub mod model;
pub mod advisory;
pub mod recommendation;
pub mod services;
pub mod chatbot;

#[cfg(feature = "api")]
pub mod api_server;

#[cfg(feature = "api")]
pub mod web;

// Re-export commonly used types
pub use config::{ProjectPaths, Settings};
pub use error::AdvisorError;
pub use data::{SoilSample, FEATURE_COLUMNS};
pub use model::{CropPredictor, Recommendation, RecommendationResult, YieldEstimator};
pub use recommendation::{recommend_crops, CropRecommendationResponse};

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
