//! Leaf Disease Classifier
//!
//! Colour-statistics heuristic over a 224×224 resize of the leaf photo. A
//! pluggable [`DiseaseBackend`] (for a real CNN) takes precedence when set;
//! if its logits do not line up with its labels the heuristic answers.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

const INPUT_SIZE: u32 = 224;

struct DiseaseInfo {
    label: &'static str,
    symptom: &'static str,
    /// Low, medium and high thresholds
    severity_scale: (f64, f64, f64),
}

static LIBRARY: &[DiseaseInfo] = &[
    DiseaseInfo {
        label: "leaf rust",
        symptom: "Rust-coloured pustules and brown lesions spreading from margins.",
        severity_scale: (0.3, 0.6, 0.85),
    },
    DiseaseInfo {
        label: "bacterial leaf blight",
        symptom: "Yellowing along veins with water-soaked stripes spreading quickly.",
        severity_scale: (0.25, 0.55, 0.8),
    },
    DiseaseInfo {
        label: "powdery mildew",
        symptom: "Whitish powdery growth on surfaces, distorted young tissues.",
        severity_scale: (0.2, 0.5, 0.75),
    },
    DiseaseInfo {
        label: "healthy",
        symptom: "Leaf appears vigorous with balanced chlorophyll and minimal stress.",
        severity_scale: (0.0, 0.2, 0.35),
    },
];

fn library_entry(label: &str) -> &'static DiseaseInfo {
    LIBRARY
        .iter()
        .find(|d| d.label == label)
        .unwrap_or(&LIBRARY[LIBRARY.len() - 1])
}

/// Labels the heuristic can produce
pub fn known_labels() -> Vec<&'static str> {
    LIBRARY.iter().map(|d| d.label).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub disease: String,
    pub severity: String,
    pub confidence: f64,
    pub symptom_summary: String,
}

/// Model producing raw logits and the label for each logit
pub trait DiseaseBackend: Send + Sync {
    fn infer(&self, image: &RgbImage) -> Result<(Vec<f64>, Vec<String>)>;
}

#[derive(Default)]
pub struct CropDiseaseClassifier {
    backend: Option<Box<dyn DiseaseBackend>>,
}

impl CropDiseaseClassifier {
    pub fn new() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Box<dyn DiseaseBackend>) -> Self {
        Self { backend: Some(backend) }
    }

    /// Decode an encoded image (PNG/JPEG) and classify it
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<DiseasePrediction> {
        let image = image::load_from_memory(bytes).context("Failed to decode leaf image")?;
        self.predict(&image)
    }

    pub fn predict(&self, image: &DynamicImage) -> Result<DiseasePrediction> {
        let rgb = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom).to_rgb8();
        match &self.backend {
            Some(backend) => self.predict_with_backend(backend.as_ref(), &rgb),
            None => Ok(predict_with_heuristics(&rgb)),
        }
    }

    fn predict_with_backend(&self, backend: &dyn DiseaseBackend, rgb: &RgbImage) -> Result<DiseasePrediction> {
        let (logits, labels) = backend.infer(rgb)?;
        let probabilities = softmax(&logits);
        let Some((index, &confidence)) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            return Ok(predict_with_heuristics(rgb));
        };
        let Some(label) = labels.get(index) else {
            return Ok(predict_with_heuristics(rgb));
        };

        let info = library_entry(label);
        Ok(DiseasePrediction {
            disease: label.clone(),
            severity: map_severity(confidence, info.severity_scale).to_string(),
            confidence,
            symptom_summary: info.symptom.to_string(),
        })
    }
}

fn predict_with_heuristics(rgb: &RgbImage) -> DiseasePrediction {
    let pixels = rgb.pixels().count().max(1) as f64;
    let mut sums = [0.0f64; 3];
    let mut sum_sq = 0.0;
    for pixel in rgb.pixels() {
        for (c, value) in pixel.0.iter().enumerate() {
            let v = *value as f64 / 255.0;
            sums[c] += v;
            sum_sq += v * v;
        }
    }
    let [red, green, blue] = sums.map(|s| s / pixels);
    // Variance over every channel value, not per channel
    let overall_mean = (red + green + blue) / 3.0;
    let variance = (sum_sq / (pixels * 3.0) - overall_mean * overall_mean).max(0.0);

    let (label, score) = if green < 0.35 && red > 0.35 {
        ("leaf rust", (red + variance).min(0.95))
    } else if green < 0.4 && blue > 0.3 {
        ("bacterial leaf blight", (blue + (1.0 - green)).min(0.9))
    } else if variance > 0.06 && blue < 0.45 {
        ("powdery mildew", (variance * 4.0).min(0.85))
    } else {
        ("healthy", green.max(0.6))
    };

    let info = library_entry(label);
    DiseasePrediction {
        disease: label.to_string(),
        severity: map_severity(score, info.severity_scale).to_string(),
        confidence: score,
        symptom_summary: info.symptom.to_string(),
    }
}

fn map_severity(score: f64, (low, medium, high): (f64, f64, f64)) -> &'static str {
    if score >= high {
        "High"
    } else if score >= medium {
        "Medium"
    } else if score >= low {
        "Low"
    } else {
        "Very Low"
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{ImageBuffer, ImageOutputFormat, Rgb};

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(32, 32, Rgb([r, g, b])))
    }

    struct FixedBackend {
        logits: Vec<f64>,
        labels: Vec<String>,
    }

    impl DiseaseBackend for FixedBackend {
        fn infer(&self, _image: &RgbImage) -> Result<(Vec<f64>, Vec<String>)> {
            Ok((self.logits.clone(), self.labels.clone()))
        }
    }

    #[test]
    fn test_reddish_leaf_is_rust() {
        let prediction = CropDiseaseClassifier::new().predict(&solid(150, 60, 40)).unwrap();
        assert_eq!(prediction.disease, "leaf rust");
        assert!(prediction.symptom_summary.starts_with("Rust-coloured"));
    }

    #[test]
    fn test_bluish_leaf_is_blight() {
        let prediction = CropDiseaseClassifier::new().predict(&solid(60, 80, 200)).unwrap();
        assert_eq!(prediction.disease, "bacterial leaf blight");
        assert_relative_eq!(prediction.confidence, 0.9);
        assert_eq!(prediction.severity, "High");
    }

    #[test]
    fn test_green_leaf_is_healthy() {
        let prediction = CropDiseaseClassifier::new().predict(&solid(120, 200, 120)).unwrap();
        assert_eq!(prediction.disease, "healthy");
        assert!(prediction.confidence >= 0.6);
    }

    #[test]
    fn test_predict_from_png_bytes() {
        let mut bytes = Vec::new();
        solid(120, 200, 120).write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
        let prediction = CropDiseaseClassifier::new().predict_bytes(&bytes).unwrap();
        assert_eq!(prediction.disease, "healthy");

        assert!(CropDiseaseClassifier::new().predict_bytes(b"not an image").is_err());
    }

    #[test]
    fn test_backend_takes_precedence() {
        let backend = FixedBackend {
            logits: vec![0.0, 5.0, 0.0],
            labels: known_labels().iter().take(3).map(|s| s.to_string()).collect(),
        };
        let classifier = CropDiseaseClassifier::with_backend(Box::new(backend));
        let prediction = classifier.predict(&solid(120, 200, 120)).unwrap();

        assert_eq!(prediction.disease, "bacterial leaf blight");
        assert!(prediction.confidence > 0.98);
        assert_eq!(prediction.severity, "High");
    }

    #[test]
    fn test_misaligned_backend_falls_back() {
        let backend = FixedBackend { logits: vec![0.0, 0.0, 9.0], labels: vec!["leaf rust".to_string()] };
        let classifier = CropDiseaseClassifier::with_backend(Box::new(backend));
        let prediction = classifier.predict(&solid(120, 200, 120)).unwrap();
        assert_eq!(prediction.disease, "healthy");
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(map_severity(0.9, (0.3, 0.6, 0.85)), "High");
        assert_eq!(map_severity(0.6, (0.3, 0.6, 0.85)), "Medium");
        assert_eq!(map_severity(0.3, (0.3, 0.6, 0.85)), "Low");
        assert_eq!(map_severity(0.1, (0.3, 0.6, 0.85)), "Very Low");
    }
}
