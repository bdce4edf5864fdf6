//! Crop Recommendation Dataset
//!
//! Loads the Kaggle-style CSV (`N, P, K, temperature, humidity, ph, rainfall,
//! label`) and produces reproducible train/test splits.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::{column_as_f64, column_as_strings, read_csv, SoilSample};
use crate::error::AdvisorError;

pub const FEATURE_COLUMNS: [&str; 7] = ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"];
pub const TARGET_COLUMN: &str = "crop";
pub const RAW_LABEL_COLUMN: &str = "label";
pub const REGION_COLUMN: &str = "region";

/// Loaded dataset: one sample and one crop label per row
#[derive(Debug, Clone)]
pub struct CropDataset {
    pub samples: Vec<SoilSample>,
    pub labels: Vec<String>,
    /// True when the CSV carried a `region` column
    pub has_region: bool,
}

impl CropDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Train/test partitions
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub x_train: Vec<SoilSample>,
    pub x_test: Vec<SoilSample>,
    pub y_train: Vec<String>,
    pub y_test: Vec<String>,
    pub has_region: bool,
}

/// Load the dataset, validating the schema and renaming `label` to `crop`
///
/// Rows with a missing feature or label are skipped with a warning.
pub fn load_dataset(path: &Path) -> Result<CropDataset> {
    if !path.exists() {
        return Err(AdvisorError::DatasetNotFound(path.display().to_string()).into());
    }

    let df = read_csv(path)?;

    let missing: Vec<String> = FEATURE_COLUMNS
        .iter()
        .chain(std::iter::once(&RAW_LABEL_COLUMN))
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AdvisorError::DatasetSchema(missing).into());
    }

    let columns: Vec<Vec<Option<f64>>> = FEATURE_COLUMNS
        .iter()
        .map(|name| column_as_f64(&df, name))
        .collect::<Result<_>>()?;
    let labels = column_as_strings(&df, RAW_LABEL_COLUMN)?;
    let regions = match df.column(REGION_COLUMN) {
        Ok(_) => Some(column_as_strings(&df, REGION_COLUMN)?),
        Err(_) => None,
    };

    let mut dataset = CropDataset {
        samples: Vec::with_capacity(df.height()),
        labels: Vec::with_capacity(df.height()),
        has_region: regions.is_some(),
    };
    let mut skipped = 0usize;

    for row in 0..df.height() {
        let mut values = [0.0; 7];
        let mut complete = true;
        for (slot, column) in values.iter_mut().zip(&columns) {
            match column[row] {
                Some(v) => *slot = v,
                None => complete = false,
            }
        }

        let label = labels[row].clone();
        match (complete, label) {
            (true, Some(label)) => {
                let region = regions.as_ref().and_then(|r| r[row].clone());
                dataset.samples.push(SoilSample::from_features(values, region));
                dataset.labels.push(label);
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped dataset rows with missing values");
    }
    info!(rows = dataset.len(), path = %path.display(), "Loaded crop dataset");

    Ok(dataset)
}

/// Split into train/test partitions with a seeded shuffle
///
/// Stratified splits shuffle each class separately and hold out
/// `round(n * test_size)` rows per class, at least one and at most `n - 1`
/// for classes with two or more rows. Classes are visited in label order so
/// the result depends only on the data and `random_state`.
pub fn split_dataset(
    dataset: &CropDataset,
    test_size: f64,
    random_state: u64,
    stratify: bool,
) -> Result<DatasetSplit> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(AdvisorError::InvalidInput(format!(
            "test_size must be in [0, 1), got {}",
            test_size
        ))
        .into());
    }

    let mut rng = StdRng::seed_from_u64(random_state);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    if stratify {
        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, label) in dataset.labels.iter().enumerate() {
            by_class.entry(label.as_str()).or_default().push(idx);
        }

        for (_, mut indices) in by_class {
            indices.shuffle(&mut rng);
            let n = indices.len();
            let n_test = if n >= 2 && test_size > 0.0 {
                ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
            } else {
                0
            };
            test_idx.extend_from_slice(&indices[..n_test]);
            train_idx.extend_from_slice(&indices[n_test..]);
        }

        train_idx.shuffle(&mut rng);
        test_idx.shuffle(&mut rng);
    } else {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        indices.shuffle(&mut rng);
        let n_test = (dataset.len() as f64 * test_size).round() as usize;
        test_idx.extend_from_slice(&indices[..n_test]);
        train_idx.extend_from_slice(&indices[n_test..]);
    }

    let pick = |idx: &[usize]| -> (Vec<SoilSample>, Vec<String>) {
        idx.iter()
            .map(|&i| (dataset.samples[i].clone(), dataset.labels[i].clone()))
            .unzip()
    };
    let (x_train, y_train) = pick(&train_idx);
    let (x_test, y_test) = pick(&test_idx);

    Ok(DatasetSplit {
        x_train,
        x_test,
        y_train,
        y_test,
        has_region: dataset.has_region,
    })
}
