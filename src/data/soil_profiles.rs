//! Soil Profiles
//!
//! Derives typical N, P, K, pH and climate values per soil type from the rich
//! crop dataset (`Crop recommendation dataset.csv`), so the dashboard can
//! prefill the recommendation form from a soil choice.
//!
//! Range columns are collapsed to per-row midpoints (`(base + max) / 2`,
//! falling back to `base`) before averaging. The dataset has no rainfall
//! column; the seasonal water requirement stands in for it.

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::{column_as_strings, optional_f64, read_csv, upper_case_headers, SoilSample};
use crate::utils::{midpoint_mean, normalize_region_key};

pub const DEFAULT_TEMPERATURE: f64 = 26.0;
pub const DEFAULT_HUMIDITY: f64 = 60.0;
pub const DEFAULT_RAINFALL: f64 = 160.0;
pub const DEFAULT_PH: f64 = 6.5;

const FALLBACK_SOIL_OPTIONS: [(&str, &str); 5] = [
    ("Alluvial soil", "alluvial_soil"),
    ("Black soil", "black_soil"),
    ("Clay soil", "clay_soil"),
    ("Loamy soil", "loamy_soil"),
    ("Sandy soil", "sandy_soil"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilOption {
    pub label: String,
    pub key: String,
}

/// Averaged readings for one soil type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilProfile {
    pub key: String,
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "K")]
    pub k: f64,
    pub ph: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

impl SoilProfile {
    pub fn to_sample(&self) -> SoilSample {
        SoilSample::from_features(
            [self.n, self.p, self.k, self.temperature, self.humidity, self.ph, self.rainfall],
            None,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SoilProfileTable {
    profiles: BTreeMap<String, SoilProfile>,
    options: Vec<SoilOption>,
}

impl SoilProfileTable {
    /// Load from the rich dataset; an unreadable file yields the fallback options
    pub fn load(path: &Path) -> Self {
        let loaded = read_csv(path).and_then(|mut df| {
            upper_case_headers(&mut df)?;
            Self::from_frame(&df)
        });

        match loaded {
            Ok(table) => {
                info!(profiles = table.profiles.len(), "Loaded soil profiles");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Soil dataset unavailable, using fallback soil options");
                Self::fallback()
            }
        }
    }

    /// No profiles, the five generic soil types as options
    pub fn fallback() -> Self {
        Self {
            profiles: BTreeMap::new(),
            options: fallback_options(),
        }
    }

    /// Build from a frame whose headers are already upper-cased
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        if df.column("SOIL").is_err() {
            return Ok(Self::fallback());
        }
        let soils = column_as_strings(df, "SOIL")?;

        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut options = Vec::new();
        for (row, soil) in soils.iter().enumerate() {
            let Some(label) = soil else { continue };
            let key = normalize_region_key(label);
            if key.is_empty() {
                continue;
            }
            let rows = groups.entry(key.clone()).or_default();
            if rows.is_empty() {
                options.push(SoilOption { label: label.clone(), key });
            }
            rows.push(row);
        }

        let ranged = |base: &str, high: &str| -> Result<RangeColumn> {
            Ok(RangeColumn {
                base: optional_f64(df, base)?,
                high: optional_f64(df, high)?,
            })
        };
        let n_col = ranged("N", "N_MAX")?;
        let p_col = ranged("P", "P_MAX")?;
        let k_col = ranged("K", "K_MAX")?;
        let ph_col = ranged("SOIL_PH", "SOIL_PH_HIGH")?;
        let temp = ranged("TEMP", "MAX_TEMP")?;
        let humidity = ranged("RELATIVE_HUMIDITY", "RELATIVE_HUMIDITY_MAX")?;
        let water = ranged("WATERREQUIRED", "WATERREQUIRED_MAX")?;

        let mut profiles = BTreeMap::new();
        for (key, rows) in groups {
            let (Some(n), Some(p), Some(k), Some(ph)) =
                (n_col.mean(&rows), p_col.mean(&rows), k_col.mean(&rows), ph_col.mean(&rows))
            else {
                continue;
            };

            profiles.insert(
                key.clone(),
                SoilProfile {
                    key,
                    n,
                    p,
                    k,
                    ph,
                    temperature: temp.mean(&rows).unwrap_or(DEFAULT_TEMPERATURE),
                    humidity: humidity.mean(&rows).unwrap_or(DEFAULT_HUMIDITY),
                    rainfall: water.mean(&rows).unwrap_or(DEFAULT_RAINFALL),
                },
            );
        }

        options.sort_by_key(|o| o.label.to_lowercase());
        if options.is_empty() {
            options = fallback_options();
        }

        Ok(Self { profiles, options })
    }

    pub fn get(&self, key: &str) -> Option<&SoilProfile> {
        self.profiles.get(&normalize_region_key(key))
    }

    /// Soil choices sorted by lowercase label
    pub fn options(&self) -> &[SoilOption] {
        &self.options
    }

    pub fn labels(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn fallback_options() -> Vec<SoilOption> {
    FALLBACK_SOIL_OPTIONS
        .iter()
        .map(|(label, key)| SoilOption { label: label.to_string(), key: key.to_string() })
        .collect()
}

/// Base column with an optional upper-bound column
struct RangeColumn {
    base: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
}

impl RangeColumn {
    fn mean(&self, rows: &[usize]) -> Option<f64> {
        let base = self.base.as_ref()?;
        let pick = |col: &Vec<Option<f64>>| -> Vec<Option<f64>> { rows.iter().map(|&r| col[r]).collect() };

        let base_rows = pick(base);
        let high_rows = self.high.as_ref().map(pick);
        midpoint_mean(&base_rows, high_rows.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_frame() -> DataFrame {
        df! {
            "SOIL" => &["Black soil", "black  soil", "Sandy soil", "Red Soil"],
            "N" => &[Some(80.0), Some(100.0), Some(20.0), None],
            "N_MAX" => &[Some(120.0), None, Some(40.0), None],
            "P" => &[40.0, 60.0, 10.0, 30.0],
            "K" => &[40.0, 40.0, 20.0, 30.0],
            "SOIL_PH" => &[7.0, 7.5, 6.0, 5.5],
            "SOIL_PH_HIGH" => &[8.0, 8.5, 7.0, 6.5],
            "TEMP" => &[25.0, 27.0, 30.0, 24.0]
        }
        .unwrap()
    }

    #[test]
    fn test_profiles_use_midpoint_means() {
        let table = SoilProfileTable::from_frame(&sample_frame()).unwrap();

        let black = table.get("Black Soil").unwrap();
        // Rows: midpoint(80,120)=100 and 100 (no max) → 100
        assert_relative_eq!(black.n, 100.0);
        assert_relative_eq!(black.ph, 7.75);
        assert_relative_eq!(black.temperature, 26.0);
        assert_relative_eq!(black.humidity, DEFAULT_HUMIDITY);
        assert_relative_eq!(black.rainfall, DEFAULT_RAINFALL);

        // Red soil has no nitrogen reading at all
        assert!(table.get("red_soil").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_options_sorted_and_deduplicated() {
        let table = SoilProfileTable::from_frame(&sample_frame()).unwrap();
        assert_eq!(table.labels(), vec!["Black soil", "Red Soil", "Sandy soil"]);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let table = SoilProfileTable::load(Path::new("/nonexistent/soil.csv"));
        assert!(table.is_empty());
        assert_eq!(table.options().len(), 5);
        assert_eq!(table.options()[0].key, "alluvial_soil");
    }
}
