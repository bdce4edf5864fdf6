//! Feature Pipeline
//!
//! Standard-scales the seven numeric readings with smartcore's
//! `StandardScaler` and, when the training data carried a region column,
//! appends a one-hot block for the regions seen during fit. Unknown regions
//! encode as all zeros.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smartcore::api::{Transformer, UnsupervisedEstimator};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::preprocessing::numerical::{StandardScaler, StandardScalerParameters};

use crate::data::{SoilSample, FEATURE_COLUMNS};
use crate::error::AdvisorError;

/// Region value used for missing or blank input
pub const UNKNOWN_REGION: &str = "unknown";

/// Missing/blank → `unknown`, otherwise trimmed and lowercased
pub fn normalize_region(region: Option<&str>) -> String {
    match region.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_lowercase(),
        _ => UNKNOWN_REGION.to_string(),
    }
}

fn numeric_rows(samples: &[SoilSample]) -> Vec<Vec<f64>> {
    samples.iter().map(|s| s.features().to_vec()).collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeaturePipeline {
    scaler: StandardScaler<f64>,
    /// Sorted region categories; `None` when region is not a feature
    regions: Option<Vec<String>>,
}

impl FeaturePipeline {
    pub fn fit(samples: &[SoilSample], use_region: bool) -> Result<Self> {
        if samples.is_empty() {
            return Err(AdvisorError::InvalidInput("cannot fit features on an empty dataset".to_string()).into());
        }

        let matrix = DenseMatrix::from_2d_vec(&numeric_rows(samples));
        let scaler = StandardScaler::fit(&matrix, StandardScalerParameters::default())
            .context("Failed to fit standard scaler")?;

        let regions = use_region.then(|| {
            let mut cats: Vec<String> = samples
                .iter()
                .map(|s| normalize_region(s.region.as_deref()))
                .collect();
            cats.sort();
            cats.dedup();
            cats
        });

        Ok(Self { scaler, regions })
    }

    /// Encode a batch of samples into model rows
    ///
    /// Zero-variance columns come out of the scaler non-finite; they carry
    /// no signal and encode as 0.
    pub fn transform_all(&self, samples: &[SoilSample]) -> Result<Vec<Vec<f64>>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let scaled = self
            .scaler
            .transform(&DenseMatrix::from_2d_vec(&numeric_rows(samples)))
            .context("Failed to scale features")?;
        let (n_rows, n_cols) = scaled.shape();

        let mut rows = Vec::with_capacity(n_rows);
        for (r, sample) in samples.iter().enumerate().take(n_rows) {
            let mut row: Vec<f64> = (0..n_cols)
                .map(|c| {
                    let v = *scaled.get((r, c));
                    if v.is_finite() { v } else { 0.0 }
                })
                .collect();
            if let Some(regions) = &self.regions {
                let region = normalize_region(sample.region.as_deref());
                row.extend(regions.iter().map(|cat| if *cat == region { 1.0 } else { 0.0 }));
            }
            rows.push(row);
        }
        Ok(rows)
    }

    pub fn transform(&self, sample: &SoilSample) -> Result<Vec<f64>> {
        self.transform_all(std::slice::from_ref(sample))?
            .pop()
            .ok_or_else(|| AdvisorError::InvalidInput("feature transform produced no rows".to_string()).into())
    }

    pub fn uses_region(&self) -> bool {
        self.regions.is_some()
    }

    /// Output column names: numeric features then `region_<category>`
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        if let Some(regions) = &self.regions {
            names.extend(regions.iter().map(|r| format!("region_{}", r)));
        }
        names
    }

    pub fn n_outputs(&self) -> usize {
        FEATURE_COLUMNS.len() + self.regions.as_ref().map_or(0, Vec::len)
    }
}
