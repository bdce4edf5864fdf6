//! Dataset Download
//!
//! Fetches the crop recommendation CSV from public mirrors, verifies its
//! SHA-256 and records which mirror served it in a `.source` marker file.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::AdvisorError;

pub const DATASET_FILE_NAME: &str = "crop_recommendation.csv";

/// One place the dataset can be downloaded from
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMirror {
    pub url: String,
    pub description: String,
}

impl DatasetMirror {
    fn new(url: &str, description: &str) -> Self {
        Self { url: url.to_string(), description: description.to_string() }
    }
}

/// Built-in public mirrors
pub fn default_mirrors() -> Vec<DatasetMirror> {
    vec![
        DatasetMirror::new(
            "https://raw.githubusercontent.com/dphi-official/Datasets/master/Crop_recommendation.csv",
            "DPhi public GitHub mirror",
        ),
        DatasetMirror::new(
            "https://raw.githubusercontent.com/insaid2018/Term-Project/master/Term%202%20-%20Project%20Crop%20Recommendation%20System/Data/Crop_recommendation.csv",
            "Insaid teaching repository mirror",
        ),
    ]
}

/// Mirrors in the order they are tried: a custom URL first, then the defaults
pub fn candidate_mirrors(custom_url: Option<&str>) -> Vec<DatasetMirror> {
    let mut mirrors = Vec::new();
    if let Some(url) = custom_url.filter(|u| !u.trim().is_empty()) {
        mirrors.push(DatasetMirror::new(url.trim(), "Custom URL provided via CROP_DATASET_URL"));
    }
    mirrors.extend(default_mirrors());
    mirrors
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub overwrite: bool,
    pub verify_checksum: bool,
    pub expected_sha256: String,
    pub mirrors: Vec<DatasetMirror>,
}

impl DownloadOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            overwrite: false,
            verify_checksum: true,
            expected_sha256: settings.dataset_sha256.clone(),
            mirrors: candidate_mirrors(settings.dataset_url.as_deref()),
        }
    }
}

pub fn dataset_path(dest_dir: &Path) -> PathBuf {
    dest_dir.join(DATASET_FILE_NAME)
}

/// Marker file sitting next to the dataset (`crop_recommendation.source`)
pub fn source_marker_path(dataset: &Path) -> PathBuf {
    dataset.with_extension("source")
}

/// Hex SHA-256 of a file
pub fn compute_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

fn checksum_matches(path: &Path, expected: &str) -> Result<bool> {
    Ok(compute_sha256(path)?.eq_ignore_ascii_case(expected.trim()))
}

/// Download (or reuse) the dataset into `dest_dir`
///
/// An existing file is kept when `overwrite` is false and its checksum passes
/// (or verification is off). Otherwise mirrors are tried in order and the
/// first successful download is verified.
pub async fn download_dataset(dest_dir: &Path, options: &DownloadOptions) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    let target = dataset_path(dest_dir);
    let marker = source_marker_path(&target);

    if !options.overwrite && target.exists() {
        let reusable = !options.verify_checksum || checksum_matches(&target, &options.expected_sha256)?;
        if reusable {
            if !marker.exists() {
                tokio::fs::write(&marker, "pre-existing").await?;
            }
            info!(path = %target.display(), "Reusing existing dataset");
            return Ok(target);
        }
        warn!(path = %target.display(), "Existing dataset failed checksum, downloading again");
    }

    if options.mirrors.is_empty() {
        return Err(AdvisorError::DatasetDownload(
            "No dataset sources configured. Set CROP_DATASET_URL to a valid CSV URL.".to_string(),
        )
        .into());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;

    let mut served_by = None;
    for mirror in &options.mirrors {
        match stream_to_file(&client, &mirror.url, &target).await {
            Ok(()) => {
                served_by = Some(mirror);
                break;
            }
            Err(e) => warn!(url = %mirror.url, error = %e, "Dataset mirror failed"),
        }
    }

    let mirror = served_by
        .ok_or_else(|| AdvisorError::DatasetDownload("All dataset mirrors failed".to_string()))?;

    if options.verify_checksum && !checksum_matches(&target, &options.expected_sha256)? {
        return Err(AdvisorError::DatasetDownload("Checksum mismatch after download".to_string()).into());
    }

    tokio::fs::write(&marker, format!("{} | {}", mirror.description, mirror.url)).await?;
    info!(path = %target.display(), source = %mirror.description, "Dataset downloaded");

    Ok(target)
}

async fn stream_to_file(client: &reqwest::Client, url: &str, target: &Path) -> Result<()> {
    let response = client.get(url).send().await?.error_for_status()?;

    let mut file = tokio::fs::File::create(target)
        .await
        .with_context(|| format!("Failed to create {}", target.display()))?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_options(verify: bool, expected: &str) -> DownloadOptions {
        DownloadOptions {
            overwrite: false,
            verify_checksum: verify,
            expected_sha256: expected.to_string(),
            // Port 9 (discard) is closed on test hosts
            mirrors: vec![DatasetMirror::new("http://127.0.0.1:9/crop.csv", "closed port")],
        }
    }

    #[test]
    fn test_candidate_mirrors_prepend_custom_url() {
        let mirrors = candidate_mirrors(Some("https://example.org/data.csv"));
        assert_eq!(mirrors.len(), 3);
        assert_eq!(mirrors[0].url, "https://example.org/data.csv");
        assert!(mirrors[1].url.contains("dphi-official"));

        assert_eq!(candidate_mirrors(Some("  ")).len(), 2);
    }

    #[test]
    fn test_sha256_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            compute_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_existing_file_reused_and_marked() {
        let dir = tempfile::tempdir().unwrap();
        let target = dataset_path(dir.path());
        std::fs::write(&target, "abc").unwrap();

        let expected = compute_sha256(&target).unwrap();
        let path = download_dataset(dir.path(), &offline_options(true, &expected)).await.unwrap();

        assert_eq!(path, target);
        let marker = std::fs::read_to_string(source_marker_path(&target)).unwrap();
        assert_eq!(marker, "pre-existing");
    }

    #[tokio::test]
    async fn test_all_mirrors_failing() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_dataset(dir.path(), &offline_options(false, "")).await.unwrap_err();
        assert_eq!(err.to_string(), "All dataset mirrors failed");
    }
}
