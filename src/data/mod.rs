//! Data Layer
//!
//! Soil/climate sample types shared by every advisory, plus loaders for the
//! CSV datasets and the static lookup tables.

pub mod dataset;
pub mod ingestion;
pub mod lookup;
pub mod soil_profiles;
pub mod crop_guide;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AdvisorError;

pub use dataset::{load_dataset, split_dataset, CropDataset, DatasetSplit, FEATURE_COLUMNS, TARGET_COLUMN};

/// Accepted `(min, max)` per reading, in `FEATURE_COLUMNS` order
pub const FEATURE_BOUNDS: [(f64, f64); 7] = [
    (0.0, 200.0),
    (0.0, 200.0),
    (0.0, 200.0),
    (0.0, 50.0),
    (0.0, 100.0),
    (3.5, 9.5),
    (0.0, 400.0),
];

/// Complete soil and climate reading used for crop recommendation
///
/// Field names follow the dataset columns (`N`, `P`, `K`, ...). `region` is
/// optional and only used when the trained pipeline carries a region encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilSample {
    #[serde(rename = "N", alias = "n")]
    pub n: f64,
    #[serde(rename = "P", alias = "p")]
    pub p: f64,
    #[serde(rename = "K", alias = "k")]
    pub k: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl SoilSample {
    /// Numeric features in `FEATURE_COLUMNS` order
    pub fn features(&self) -> [f64; 7] {
        [
            self.n,
            self.p,
            self.k,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ]
    }

    pub fn from_features(values: [f64; 7], region: Option<String>) -> Self {
        let [n, p, k, temperature, humidity, ph, rainfall] = values;
        Self { n, p, k, temperature, humidity, ph, rainfall, region }
    }

    /// Every reading must be finite and inside [`FEATURE_BOUNDS`]
    pub fn validate(&self) -> Result<(), AdvisorError> {
        let fields = FEATURE_COLUMNS.iter().zip(self.features()).zip(FEATURE_BOUNDS);
        for ((name, value), (min, max)) in fields {
            if !value.is_finite() {
                return Err(AdvisorError::InvalidInput(format!("{} must be a finite number", name)));
            }
            if value < min || value > max {
                return Err(AdvisorError::InvalidInput(format!(
                    "{} must be between {} and {} (got {})",
                    name, min, max, value
                )));
            }
        }
        Ok(())
    }
}

/// Partial reading: advisories that tolerate missing values take this
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilReadings {
    #[serde(default, rename = "N", alias = "n")]
    pub n: Option<f64>,
    #[serde(default, rename = "P", alias = "p")]
    pub p: Option<f64>,
    #[serde(default, rename = "K", alias = "k")]
    pub k: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub rainfall: Option<f64>,
}

impl From<&SoilSample> for SoilReadings {
    fn from(sample: &SoilSample) -> Self {
        Self {
            n: Some(sample.n),
            p: Some(sample.p),
            k: Some(sample.k),
            temperature: Some(sample.temperature),
            humidity: Some(sample.humidity),
            ph: Some(sample.ph),
            rainfall: Some(sample.rainfall),
        }
    }
}

// ============================================================================
// Polars helpers
// ============================================================================

/// Read a headered CSV file into a DataFrame
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.into()))
        .with_context(|| format!("Failed to create CSV reader: {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to load CSV: {}", path.display()))
}

/// Trim and upper-case every header so lookups ignore source casing
pub fn upper_case_headers(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .collect();
    df.set_column_names(names)
        .context("Duplicate column names after normalising headers")?;
    Ok(())
}

/// Like [`column_as_f64`] but `None` when the column is absent
pub fn optional_f64(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    match df.column(name) {
        Ok(_) => column_as_f64(df, name).map(Some),
        Err(_) => Ok(None),
    }
}

/// Column cast to f64; unparseable cells become `None`
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let casted = df
        .column(name)
        .with_context(|| format!("Missing column: {}", name))?
        .cast(&DataType::Float64)
        .with_context(|| format!("Column {} is not numeric", name))?;

    Ok(casted.f64()?.into_iter().collect())
}

/// Column cast to strings, trimmed; blanks become `None`
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = df
        .column(name)
        .with_context(|| format!("Missing column: {}", name))?
        .cast(&DataType::String)?;

    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}
