//! Runtime configuration
//!
//! Settings are read from environment variables (optionally seeded from a
//! `.env` file by the binaries). Every value has a default so a bare checkout
//! runs with the public demo market key and the rule-based chatbot.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public data.gov.in demo key used when `MARKET_API_KEY` is unset
pub const DEFAULT_MARKET_API_KEY: &str = "579b464db66ec23bdd000001cdd3946e44ce4aad7209ff7b23ac571b";

/// Expected SHA-256 of the Kaggle crop recommendation CSV
pub const DEFAULT_DATASET_SHA256: &str =
    "1c75a44aa8562f02d293baff342a2aa4bae442bfc9a7da478f4a45f307319813";

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub port: u16,
    pub top_k: usize,

    pub openweather_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_embedding_model: String,
    pub rag_rebuild: bool,

    pub market_api_key: String,
    pub dataset_url: Option<String>,
    pub dataset_sha256: String,

    pub market_cache_ttl: Duration,
    pub weather_cache_ttl: Duration,
    pub response_cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifacts_dir: PathBuf::from("artifacts"),
            port: 3000,
            top_k: 3,
            openweather_api_key: None,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            rag_rebuild: false,
            market_api_key: DEFAULT_MARKET_API_KEY.to_string(),
            dataset_url: None,
            dataset_sha256: DEFAULT_DATASET_SHA256.to_string(),
            market_cache_ttl: Duration::from_secs(6 * 60 * 60),
            weather_cache_ttl: Duration::from_secs(30 * 60),
            response_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl Settings {
    /// Build settings from the process environment
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            data_dir: env_string("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            artifacts_dir: env_string("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            port: env_string("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            top_k: env_string("TOP_K")
                .and_then(|k| k.parse().ok())
                .filter(|k: &usize| *k > 0)
                .unwrap_or(defaults.top_k),
            openweather_api_key: env_string("OPENWEATHER_API_KEY"),
            gemini_api_key: env_string("GEMINI_API_KEY"),
            gemini_model: env_string("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            openai_api_key: env_string("OPENAI_API_KEY"),
            openai_model: env_string("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_embedding_model: env_string("OPENAI_EMBEDDING_MODEL")
                .unwrap_or(defaults.openai_embedding_model),
            rag_rebuild: env_string("RAG_REBUILD").as_deref() == Some("1"),
            market_api_key: env_string("MARKET_API_KEY").unwrap_or(defaults.market_api_key),
            dataset_url: env_string("CROP_DATASET_URL"),
            dataset_sha256: env_string("CROP_DATASET_SHA256").unwrap_or(defaults.dataset_sha256),
            ..defaults
        }
    }

    /// Settings rooted at a specific data directory, artifacts alongside it
    pub fn for_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            data_dir: dir.join("data"),
            artifacts_dir: dir.join("artifacts"),
            ..Self::default()
        }
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(&self.data_dir, &self.artifacts_dir)
    }
}

/// Trimmed, non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolved file locations for datasets and artifacts
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub data_dir: PathBuf,
    pub data_raw: PathBuf,
    pub artifacts_models: PathBuf,
    pub artifacts_metrics: PathBuf,
}

impl ProjectPaths {
    pub fn new(data_dir: &Path, artifacts_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            data_raw: data_dir.join("raw"),
            artifacts_models: artifacts_dir.join("models"),
            artifacts_metrics: artifacts_dir.join("metrics"),
        }
    }

    /// Kaggle training set (N, P, K, temperature, humidity, ph, rainfall, label)
    pub fn training_dataset(&self) -> PathBuf {
        self.data_raw.join("crop_recommendation.csv")
    }

    /// Richer per-crop dataset with soil, season and water columns
    pub fn crop_dataset(&self) -> PathBuf {
        self.data_raw.join("Crop recommendation dataset.csv")
    }

    pub fn crop_details(&self) -> PathBuf {
        self.data_dir.join("crop_details.json")
    }

    pub fn soil_profiles(&self) -> PathBuf {
        self.data_dir.join("soil_profiles.csv")
    }

    pub fn embeddings_cache(&self) -> PathBuf {
        self.data_dir.join("ai_agri_embeddings.json")
    }

    pub fn model(&self) -> PathBuf {
        self.artifacts_models.join("crop_recommender.json")
    }

    /// Legacy location checked when the artifact model is missing
    pub fn legacy_model(&self) -> PathBuf {
        self.data_dir
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("models")
            .join("trained_model.json")
    }

    pub fn metrics(&self) -> PathBuf {
        self.artifacts_metrics.join("training_metrics.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derived_from_dirs() {
        let settings = Settings::for_data_dir("/tmp/agro");
        let paths = settings.paths();

        assert_eq!(paths.training_dataset(), PathBuf::from("/tmp/agro/data/raw/crop_recommendation.csv"));
        assert_eq!(paths.model(), PathBuf::from("/tmp/agro/artifacts/models/crop_recommender.json"));
        assert_eq!(paths.legacy_model(), PathBuf::from("/tmp/agro/models/trained_model.json"));
        assert_eq!(paths.metrics(), PathBuf::from("/tmp/agro/artifacts/metrics/training_metrics.json"));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.market_cache_ttl, Duration::from_secs(21_600));
        assert_eq!(settings.weather_cache_ttl, Duration::from_secs(1_800));
        assert!(!settings.rag_rebuild);
    }
}
