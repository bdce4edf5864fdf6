//! Chat Context
//!
//! What the chatbot knows locally: the merged crop guide, raw soil profile
//! rows and the running conversation. Crop matching and water estimates read
//! from here.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::keywords::{water_fallback, CROP_ALIASES};
use super::llm::ChatProviders;
use super::rag::{ensure_index, EmbeddingIndex};
use crate::config::ProjectPaths;
use crate::data::crop_guide::{CropDetails, CropGuide};
use crate::data::{column_as_strings, read_csv};
use crate::utils::{normalize_crop_key, normalize_text};

static WATER_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*[-to]+\s*(\d+(?:\.\d+)?)\s*mm").expect("valid water range pattern")
});
static WATER_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*mm").expect("valid water value pattern"));

/// One soil profile CSV row, header → cell text
pub type SoilRow = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatContext {
    crops: Arc<CropGuide>,
    soil_rows: Arc<Vec<SoilRow>>,
    conversation: Vec<ChatTurn>,
    paths: ProjectPaths,
    index: Arc<OnceCell<Option<Arc<EmbeddingIndex>>>>,
}

impl ChatContext {
    pub fn load(paths: &ProjectPaths) -> Self {
        Self::from_guide(paths, Arc::new(CropGuide::load(paths)))
    }

    /// Reuse an already loaded crop guide
    pub fn from_guide(paths: &ProjectPaths, crops: Arc<CropGuide>) -> Self {
        let soil_rows = match load_soil_rows(&paths.soil_profiles()) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Soil profile rows unavailable for chat");
                Vec::new()
            }
        };
        info!(crops = crops.len(), soil_rows = soil_rows.len(), "Loaded chat context");
        Self::new(crops, soil_rows, paths)
    }

    pub fn new(crops: Arc<CropGuide>, soil_rows: Vec<SoilRow>, paths: &ProjectPaths) -> Self {
        Self {
            crops,
            soil_rows: Arc::new(soil_rows),
            conversation: Vec::new(),
            paths: paths.clone(),
            index: Arc::new(OnceCell::new()),
        }
    }

    /// Same knowledge with a different conversation attached
    pub fn with_conversation(&self, conversation: Vec<ChatTurn>) -> Self {
        Self {
            conversation,
            ..self.clone()
        }
    }

    pub fn crops(&self) -> &CropGuide {
        &self.crops
    }

    pub fn soil_rows(&self) -> &[SoilRow] {
        &self.soil_rows
    }

    pub fn conversation(&self) -> &[ChatTurn] {
        &self.conversation
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Embedding index, resolved once per loaded context
    pub async fn embedding_index(&self, providers: &ChatProviders) -> Option<Arc<EmbeddingIndex>> {
        self.index
            .get_or_init(|| async { ensure_index(self, providers).await.map(Arc::new) })
            .await
            .clone()
    }

    /// First crop named in the query (aliases before catalogue order)
    pub fn extract_crop(&self, query: &str) -> Option<(&str, &CropDetails)> {
        let compact = normalize_crop_key(&normalize_text(query));

        for (alias, canonical) in CROP_ALIASES {
            if compact.contains(alias) {
                if let Some((key, details)) = self.entry(canonical) {
                    return Some((key, details));
                }
            }
        }

        self.crops.iter().find_map(|(key, details)| {
            let name_key = normalize_crop_key(&details.name);
            let by_name = !name_key.is_empty() && compact.contains(&name_key);
            let by_key = !key.is_empty() && compact.contains(key.as_str());
            (by_name || by_key).then_some((key.as_str(), details))
        })
    }

    /// Every crop named in the query, ordered by position in the query
    pub fn extract_crops(&self, query: &str) -> Vec<(&str, &CropDetails)> {
        let compact = normalize_crop_key(&normalize_text(query));
        let mut found: Vec<(usize, &str, &CropDetails)> = Vec::new();

        for (alias, canonical) in CROP_ALIASES {
            if found.iter().any(|(_, key, _)| key == canonical) {
                continue;
            }
            if let (Some(idx), Some((key, details))) = (compact.find(alias), self.entry(canonical)) {
                found.push((idx, key, details));
            }
        }

        for (key, details) in self.crops.iter() {
            if found.iter().any(|(_, k, _)| *k == key.as_str()) {
                continue;
            }
            let name_key = normalize_crop_key(&details.name);
            let by_key = compact.find(key.as_str());
            let by_name = (!name_key.is_empty()).then(|| compact.find(&name_key)).flatten();
            if let Some(idx) = by_key.or(by_name) {
                found.push((idx, key.as_str(), details));
            }
        }

        found.sort_by_key(|(idx, _, _)| *idx);
        found.into_iter().map(|(_, key, details)| (key, details)).collect()
    }

    fn entry(&self, key: &str) -> Option<(&str, &CropDetails)> {
        self.crops
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(k, d)| (k.as_str(), d))
    }
}

/// Seasonal water range (mm) from irrigation text, else the fallback table
pub fn estimate_water_range_mm(crop_key: &str, crop: &CropDetails) -> Option<(f64, f64)> {
    let notes = (!crop.irrigation.notes.is_empty()).then_some(&crop.irrigation.notes);
    for text in crop.irrigation.stage_wise.iter().chain(notes) {
        if let Some(caps) = WATER_RANGE.captures(text) {
            let a: f64 = caps[1].parse().unwrap_or(0.0);
            let b: f64 = caps[2].parse().unwrap_or(0.0);
            return Some(if a <= b { (a, b) } else { (b, a) });
        }
        if let Some(caps) = WATER_SINGLE.captures(text) {
            let v: f64 = caps[1].parse().unwrap_or(0.0);
            return Some((v, v));
        }
    }
    water_fallback(crop_key)
}

fn load_soil_rows(path: &Path) -> anyhow::Result<Vec<SoilRow>> {
    let df = read_csv(path)?;
    let names: Vec<String> = df.get_column_names().into_iter().map(|s| s.to_string()).collect();

    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(column_as_strings(&df, name)?);
    }

    let rows = (0..df.height())
        .map(|row| {
            names
                .iter()
                .zip(&columns)
                .filter_map(|(name, values)| values[row].clone().map(|v| (name.clone(), v)))
                .collect()
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::crop_guide::{FertilizerGuide, IrrigationGuide, PestGuide};

    fn details(name: &str, season: &str, stage_wise: &[&str], notes: &str) -> CropDetails {
        CropDetails {
            name: name.to_string(),
            season: season.to_string(),
            duration: "120 days".to_string(),
            fertilizer: FertilizerGuide {
                basal: format!("Basal dose for {}", name),
                top_dressing: vec!["Urea at tillering".to_string(), "Urea at panicle".to_string()],
                ..FertilizerGuide::default()
            },
            irrigation: IrrigationGuide {
                stage_wise: stage_wise.iter().map(|s| s.to_string()).collect(),
                frequency: "Weekly".to_string(),
                notes: notes.to_string(),
            },
            pests: PestGuide {
                common_pests: vec!["Stem borer".to_string()],
                common_diseases: vec!["Blast".to_string()],
                prevention: "Use resistant varieties".to_string(),
                pesticides: Vec::new(),
            },
            ..CropDetails::default()
        }
    }

    /// Small catalogue: rice, wheat, ragi and a crop without water figures
    pub(crate) fn sample_context() -> ChatContext {
        let mut curated = BTreeMap::new();
        curated.insert(
            "rice".to_string(),
            details("Rice", "Kharif", &["Keep 5 cm standing water"], "Clay or alluvial soil"),
        );
        curated.insert(
            "wheat".to_string(),
            details("Wheat", "Rabi", &["Estimated water demand: 450 to 650 mm"], "Loamy soil, black soil"),
        );
        curated.insert(
            "ragi".to_string(),
            details("Ragi", "Kharif", &["Needs about 400 mm"], "Red soil"),
        );
        curated.insert(
            "jute".to_string(),
            details("Jute", "Kharif", &[], "Alluvial soil"),
        );
        let guide = CropGuide::from_parts(curated, BTreeMap::new(), BTreeMap::new());

        let mut row = SoilRow::new();
        row.insert("region".to_string(), "Punjab".to_string());
        row.insert("n_avg".to_string(), "120".to_string());
        row.insert("p_avg".to_string(), "45".to_string());
        row.insert("k_avg".to_string(), "60".to_string());
        row.insert("ph".to_string(), "7.4".to_string());

        let paths = ProjectPaths::new(Path::new("/nonexistent/agro-data"), Path::new("/nonexistent/agro-artifacts"));
        ChatContext::new(Arc::new(guide), vec![row], &paths)
    }

    #[test]
    fn test_extract_crop_prefers_alias() {
        let ctx = sample_context();
        let (key, crop) = ctx.extract_crop("Fertilizer for finger millet").unwrap();
        assert_eq!(key, "ragi");
        assert_eq!(crop.name, "Ragi");

        assert_eq!(ctx.extract_crop("how to grow RICE").unwrap().0, "rice");
        assert!(ctx.extract_crop("best crop for winter").is_none());
    }

    #[test]
    fn test_extract_crops_in_query_order() {
        let ctx = sample_context();
        let keys: Vec<&str> = ctx
            .extract_crops("wheat or rice, which needs less water than nachni?")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["wheat", "rice", "ragi"]);
    }

    #[test]
    fn test_water_estimates() {
        let ctx = sample_context();
        let wheat = ctx.crops().get("wheat").unwrap();
        assert_eq!(estimate_water_range_mm("wheat", wheat), Some((450.0, 650.0)));

        let ragi = ctx.crops().get("ragi").unwrap();
        assert_eq!(estimate_water_range_mm("ragi", ragi), Some((400.0, 400.0)));

        // No figures in text: rice falls back to the table, jute has nothing
        let rice = ctx.crops().get("rice").unwrap();
        assert_eq!(estimate_water_range_mm("rice", rice), Some((1200.0, 2500.0)));
        let jute = ctx.crops().get("jute").unwrap();
        assert_eq!(estimate_water_range_mm("jute", jute), None);
    }

    #[test]
    fn test_with_conversation_shares_knowledge() {
        let ctx = sample_context();
        let turn = ChatTurn { role: "user".to_string(), content: "hi".to_string() };
        let with_history = ctx.with_conversation(vec![turn.clone()]);
        assert_eq!(with_history.conversation(), &[turn]);
        assert_eq!(with_history.crops().len(), 4);
        assert!(ctx.conversation().is_empty());
    }
}
