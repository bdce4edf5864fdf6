//! Crop Guide
//!
//! Per-crop cultivation notes (season, stages, fertilizer, irrigation, pests,
//! harvest). Curated entries come from `crop_details.json`; any crop only
//! present in the rich dataset gets a summary synthesised from its rows
//! (mode of categorical columns, means of numeric ones).

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::{column_as_strings, optional_f64, read_csv, upper_case_headers};
use crate::config::ProjectPaths;
use crate::utils::{mean, midpoint_mean, mode_str, normalize_crop_key, title_case};

const NOT_SPECIFIED: &str = "Not specified";

/// Local names mapped to the dataset crop key
const ALIASES: [(&str, &str); 10] = [
    ("arhar", "pigeonpeas"),
    ("tur", "pigeonpeas"),
    ("redgram", "pigeonpeas"),
    ("moong", "mungbean"),
    ("greengram", "mungbean"),
    ("urad", "blackgram"),
    ("rajma", "kidneybeans"),
    ("bengalgram", "chickpea"),
    ("gram", "chickpea"),
    ("sorghum", "jowar"),
];

/// Normalised key with local aliases resolved
pub fn resolve_crop_key(name: &str) -> String {
    let key = normalize_crop_key(name);
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(key)
}

// ============================================================================
// Crop details document
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropStage {
    #[serde(default)]
    pub name: String,
    #[serde(default = "na", deserialize_with = "lenient_string")]
    pub days: String,
    #[serde(default)]
    pub activities: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FertilizerGuide {
    #[serde(default)]
    pub basal: String,
    #[serde(default)]
    pub top_dressing: Vec<String>,
    #[serde(default)]
    pub fertilizers: Vec<String>,
    #[serde(default)]
    pub organic: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrrigationGuide {
    #[serde(default)]
    pub stage_wise: Vec<String>,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PestGuide {
    #[serde(default)]
    pub common_pests: Vec<String>,
    #[serde(default)]
    pub common_diseases: Vec<String>,
    #[serde(default)]
    pub prevention: String,
    #[serde(default)]
    pub pesticides: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestGuide {
    #[serde(default)]
    pub indicators: String,
    #[serde(default, rename = "yield")]
    pub yield_range: String,
    #[serde(default)]
    pub post_harvest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default = "not_specified", rename = "type")]
    pub crop_type: String,
    #[serde(default = "not_specified")]
    pub season: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub duration: String,
    #[serde(default)]
    pub stages: Vec<CropStage>,
    #[serde(default)]
    pub fertilizer: FertilizerGuide,
    #[serde(default)]
    pub irrigation: IrrigationGuide,
    #[serde(default)]
    pub pests: PestGuide,
    #[serde(default)]
    pub harvest: HarvestGuide,
}

impl CropDetails {
    /// Display name, title-cased, falling back to the key
    pub fn display_name(&self, key: &str) -> String {
        if self.name.trim().is_empty() {
            title_case(key)
        } else {
            title_case(self.name.trim())
        }
    }

    /// "Sowing window (NA) | Harvest window (NA)" for the first four stages
    pub fn stage_summary(&self) -> String {
        self.stages
            .iter()
            .take(4)
            .map(|s| {
                let name = if s.name.is_empty() { "Stage" } else { s.name.as_str() };
                format!("{} ({})", name, s.days)
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

fn not_specified() -> String {
    NOT_SPECIFIED.to_string()
}

fn na() -> String {
    "NA".to_string()
}

/// Accept strings or numbers (curated JSON uses both for days/duration)
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ============================================================================
// Guide
// ============================================================================

/// Merged crop catalogue keyed by normalised crop name
#[derive(Debug, Clone, Default)]
pub struct CropGuide {
    details: BTreeMap<String, CropDetails>,
    water_averages: BTreeMap<String, f64>,
}

impl CropGuide {
    /// Curated JSON first, dataset-derived entries for the remaining crops
    pub fn load(paths: &ProjectPaths) -> Self {
        let curated = match load_details_json(&paths.crop_details()) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "Crop details JSON unavailable");
                BTreeMap::new()
            }
        };

        let (derived, water_averages) = match read_csv(&paths.crop_dataset()).and_then(|mut df| {
            upper_case_headers(&mut df)?;
            details_from_frame(&df)
        }) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "Crop dataset unavailable for crop guide");
                (BTreeMap::new(), BTreeMap::new())
            }
        };

        let guide = Self::from_parts(curated, derived, water_averages);
        info!(crops = guide.len(), "Loaded crop guide");
        guide
    }

    pub fn from_parts(
        curated: BTreeMap<String, CropDetails>,
        derived: BTreeMap<String, CropDetails>,
        water_averages: BTreeMap<String, f64>,
    ) -> Self {
        let mut details = derived;
        details.extend(curated);
        Self { details, water_averages }
    }

    pub fn get(&self, name: &str) -> Option<&CropDetails> {
        if name.trim().is_empty() {
            return None;
        }
        self.details.get(&resolve_crop_key(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CropDetails)> {
        self.details.iter()
    }

    /// Mean seasonal water requirement (mm) for a crop in the rich dataset
    pub fn dataset_water_average(&self, crop: &str) -> Option<f64> {
        self.water_averages.get(&resolve_crop_key(crop)).copied()
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

fn load_details_json(path: &Path) -> Result<BTreeMap<String, CropDetails>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut details = BTreeMap::new();
    for (key, value) in raw {
        if !value.is_object() {
            continue;
        }
        match serde_json::from_value::<CropDetails>(value) {
            Ok(entry) => {
                details.insert(normalize_crop_key(&key), entry);
            }
            Err(e) => warn!(crop = %key, error = %e, "Skipping malformed crop details entry"),
        }
    }
    Ok(details)
}

/// Synthesise details for every crop in the rich dataset
///
/// Returns the details plus each crop's mean water requirement midpoint.
pub fn details_from_frame(
    df: &DataFrame,
) -> Result<(BTreeMap<String, CropDetails>, BTreeMap<String, f64>)> {
    let mut details = BTreeMap::new();
    let mut water_averages = BTreeMap::new();
    if df.column("CROPS").is_err() {
        return Ok((details, water_averages));
    }

    let crops = column_as_strings(df, "CROPS")?;
    let mut groups: BTreeMap<String, (String, Vec<usize>)> = BTreeMap::new();
    for (row, crop) in crops.iter().enumerate() {
        let Some(name) = crop else { continue };
        let key = normalize_crop_key(name);
        if key.is_empty() {
            continue;
        }
        groups
            .entry(key)
            .or_insert_with(|| (name.clone(), Vec::new()))
            .1
            .push(row);
    }

    let text_col = |name: &str| -> Result<Option<Vec<Option<String>>>> {
        match df.column(name) {
            Ok(_) => column_as_strings(df, name).map(Some),
            Err(_) => Ok(None),
        }
    };
    let crop_type = text_col("TYPE_OF_CROP")?;
    let season = text_col("SEASON")?;
    let sown = text_col("SOWN")?;
    let harvested = text_col("HARVESTED")?;
    let water_source = text_col("WATER_SOURCE")?;
    let soil = text_col("SOIL")?;

    let n = optional_f64(df, "N")?;
    let p = optional_f64(df, "P")?;
    let k = optional_f64(df, "K")?;
    let ph_low = optional_f64(df, "SOIL_PH")?;
    let ph_high = optional_f64(df, "SOIL_PH_HIGH")?;
    let duration_low = optional_f64(df, "CROPDURATION")?;
    let duration_high = optional_f64(df, "CROPDURATION_MAX")?;
    let water_low = optional_f64(df, "WATERREQUIRED")?;
    let water_high = optional_f64(df, "WATERREQUIRED_MAX")?;
    let temp = optional_f64(df, "TEMP")?;
    let temp_max = optional_f64(df, "MAX_TEMP")?;
    let rh_low = optional_f64(df, "RELATIVE_HUMIDITY")?;
    let rh_high = optional_f64(df, "RELATIVE_HUMIDITY_MAX")?;

    for (key, (raw_name, rows)) in groups {
        let mode_of = |col: &Option<Vec<Option<String>>>| -> String {
            col.as_ref()
                .and_then(|values| mode_str(rows.iter().filter_map(|&r| values[r].as_deref())))
                .unwrap_or_else(not_specified)
        };
        let mean_of = |col: &Option<Vec<Option<f64>>>| -> Option<f64> {
            let values: Vec<f64> = col
                .as_ref()
                .map(|values| rows.iter().filter_map(|&r| values[r]).collect())
                .unwrap_or_default();
            mean(&values)
        };

        let sown_txt = mode_of(&sown);
        let harvested_txt = mode_of(&harvested);
        let water_source_txt = mode_of(&water_source);
        let soil_txt = mode_of(&soil);

        let duration = match (mean_of(&duration_low), mean_of(&duration_high)) {
            (Some(lo), Some(hi)) => format!("{:.0}-{:.0} days", lo, hi),
            (Some(lo), None) => format!("{:.0} days", lo),
            _ => not_specified(),
        };

        let mut stage_wise = Vec::new();
        if let (Some(lo), Some(hi)) = (mean_of(&water_low), mean_of(&water_high)) {
            stage_wise.push(format!("Estimated water demand from dataset: {:.0}-{:.0} mm.", lo, hi));
        }
        if water_source_txt != NOT_SPECIFIED {
            stage_wise.push(format!("Water source pattern in dataset: {}.", water_source_txt));
        }
        if stage_wise.is_empty() {
            stage_wise.push("Use local irrigation scheduling.".to_string());
        }

        let basal = match (mean_of(&n), mean_of(&p), mean_of(&k)) {
            (Some(n), Some(p), Some(k)) => {
                format!("Dataset average NPK baseline: N={:.1}, P={:.1}, K={:.1}.", n, p, k)
            }
            _ => "Use soil-test-based NPK planning.".to_string(),
        };

        let ph_summary = match (mean_of(&ph_low), mean_of(&ph_high)) {
            (Some(lo), Some(hi)) => format!("{:.1}-{:.1}", lo, hi),
            (Some(lo), None) => format!("{:.1}", lo),
            _ => not_specified(),
        };

        let mut climate = Vec::new();
        if let Some(t) = mean_of(&temp) {
            climate.push(format!("Temp {:.1} C", t));
        }
        if let Some(t) = mean_of(&temp_max) {
            climate.push(format!("max {:.1} C", t));
        }
        if let Some(h) = mean_of(&rh_low) {
            climate.push(format!("RH {:.1}%", h));
        }
        if let Some(h) = mean_of(&rh_high) {
            climate.push(format!("RH max {:.1}%", h));
        }

        let mut notes = format!("Typical soil in dataset: {}.", soil_txt);
        if !climate.is_empty() {
            notes.push_str(&format!(" Climate profile: {}.", climate.join(", ")));
        }

        if let Some(base) = water_low.as_ref() {
            let base_rows: Vec<Option<f64>> = rows.iter().map(|&r| base[r]).collect();
            let high_rows: Option<Vec<Option<f64>>> =
                water_high.as_ref().map(|h| rows.iter().map(|&r| h[r]).collect());
            if let Some(avg) = midpoint_mean(&base_rows, high_rows.as_deref()) {
                water_averages.insert(key.clone(), avg);
            }
        }

        let entry = CropDetails {
            name: title_case(&raw_name),
            crop_type: title_case(&mode_of(&crop_type)),
            season: title_case(&mode_of(&season)),
            duration,
            stages: vec![
                CropStage {
                    name: "Sowing window".to_string(),
                    days: na(),
                    activities: format!("Sowing month in dataset: {}.", sown_txt),
                },
                CropStage {
                    name: "Harvest window".to_string(),
                    days: na(),
                    activities: format!("Harvest month in dataset: {}.", harvested_txt),
                },
            ],
            fertilizer: FertilizerGuide {
                basal,
                top_dressing: vec![
                    "Split nutrient application by growth stage based on local agronomy.".to_string(),
                    format!("Soil pH profile in dataset: {}.", ph_summary),
                ],
                fertilizers: vec!["NPK blends as per soil test".to_string()],
                organic: "Add compost/FYM based on soil condition.".to_string(),
            },
            irrigation: IrrigationGuide {
                stage_wise,
                frequency: "Adjust by rainfall and soil moisture status.".to_string(),
                notes,
            },
            pests: PestGuide {
                common_pests: Vec::new(),
                common_diseases: Vec::new(),
                prevention: "Follow local extension advisories for pest and disease management.".to_string(),
                pesticides: Vec::new(),
            },
            harvest: HarvestGuide {
                indicators: format!("Harvest month in dataset: {}.", harvested_txt),
                yield_range: "Yield range not provided in this dataset.".to_string(),
                post_harvest: "Dry and store produce safely as per crop-specific best practices.".to_string(),
            },
        };
        details.insert(key, entry);
    }

    Ok((details, water_averages))
}
