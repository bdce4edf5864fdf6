//! Typed errors for failures callers branch on
//!
//! Everything else travels as `anyhow::Error` with context attached.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Trained model artifact is missing
    #[error("Crop recommendation model is missing. Run the train_model binary first.")]
    ModelNotReady,

    /// Training dataset is absent
    #[error("Dataset not found at {0}. Download it with the download_dataset binary first.")]
    DatasetNotFound(String),

    /// Required columns are missing from a dataset
    #[error("Dataset is missing required columns: {0:?}")]
    DatasetSchema(Vec<String>),

    /// Dataset could not be downloaded or verified
    #[error("{0}")]
    DatasetDownload(String),

    /// Crop is not present in any lookup table
    #[error("Unknown crop: {0}")]
    UnknownCrop(String),

    /// Caller supplied an input the model cannot use
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
