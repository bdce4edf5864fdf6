//! Yield Estimator
//!
//! Explainable yield projection: a nutrient score against an ideal NPK
//! balance and a climate score against per-crop rainfall/temperature comfort
//! ranges, blended 55/45.

use serde::{Deserialize, Serialize};

use crate::data::SoilReadings;
use crate::utils::title_case;

const IDEAL_NPK: [f64; 3] = [110.0, 58.0, 58.0];
const MAX_DEVIATION: f64 = 1.5;

const NUTRIENT_WEIGHT: f64 = 0.55;
const CLIMATE_WEIGHT: f64 = 0.45;

#[derive(Debug, Clone, Copy)]
struct CropTarget {
    crop: &'static str,
    rainfall: (f64, f64),
    temperature: (f64, f64),
    quintal_per_acre: f64,
}

const fn target(crop: &'static str, rainfall: (f64, f64), temperature: (f64, f64), quintal_per_acre: f64) -> CropTarget {
    CropTarget { crop, rainfall, temperature, quintal_per_acre }
}

static TARGETS: &[CropTarget] = &[
    target("rice", (120.0, 220.0), (20.0, 32.0), 22.0),
    target("wheat", (100.0, 180.0), (18.0, 28.0), 18.0),
    target("maize", (80.0, 150.0), (21.0, 34.0), 20.0),
    target("cotton", (70.0, 130.0), (25.0, 37.0), 10.0),
    target("groundnut", (60.0, 120.0), (22.0, 34.0), 12.0),
];

const DEFAULT_TARGET: CropTarget = target("default", (80.0, 180.0), (20.0, 35.0), 15.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPrediction {
    pub crop: String,
    pub yield_level: String,
    pub estimated_quintal_per_acre: f64,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YieldEstimator;

impl YieldEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Missing readings default to N 90, P 60, K 60, rainfall 120, temperature 28
    pub fn predict(&self, crop: &str, readings: &SoilReadings) -> YieldPrediction {
        let key = crop.trim().to_lowercase();
        let baseline = TARGETS.iter().find(|t| t.crop == key).copied().unwrap_or(DEFAULT_TARGET);

        let n = readings.n.unwrap_or(90.0);
        let p = readings.p.unwrap_or(60.0);
        let k = readings.k.unwrap_or(60.0);
        let rainfall = readings.rainfall.unwrap_or(120.0);
        let temperature = readings.temperature.unwrap_or(28.0);

        let nutrient = nutrient_score(n, p, k);
        let climate = climate_score(rainfall, temperature, &baseline);
        let aggregate = (NUTRIENT_WEIGHT * nutrient + CLIMATE_WEIGHT * climate).clamp(0.0, 1.0);

        let level = if aggregate >= 0.75 {
            "High"
        } else if aggregate >= 0.45 {
            "Medium"
        } else {
            "Low"
        };

        let estimate = baseline.quintal_per_acre * (0.7 + 0.6 * aggregate);
        let confidence = 0.55 + 0.4 * (aggregate - 0.5).abs();

        let reasoning = [
            if nutrient < 0.5 {
                "Soil nutrients require correction for peak performance."
            } else {
                "NPK balance favourable for the crop."
            },
            if climate < 0.5 {
                "Weather outlook is a limiting factor; plan risk mitigation."
            } else {
                "Weather conditions align with crop comfort zone."
            },
        ]
        .join(" ");

        YieldPrediction {
            crop: title_case(crop),
            yield_level: level.to_string(),
            estimated_quintal_per_acre: round_to(estimate, 1),
            confidence: round_to(confidence, 2),
            reasoning,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn nutrient_score(n: f64, p: f64, k: f64) -> f64 {
    let total: f64 = [n, p, k]
        .iter()
        .zip(IDEAL_NPK)
        .map(|(observed, ideal)| ((observed - ideal).abs() / (ideal + 1e-6)).clamp(0.0, MAX_DEVIATION))
        .sum();
    (1.0 - (total / 3.0) / MAX_DEVIATION).clamp(0.0, 1.0)
}

fn climate_score(rainfall: f64, temperature: f64, baseline: &CropTarget) -> f64 {
    let rain = range_score(rainfall, baseline.rainfall);
    let temp = range_score(temperature, baseline.temperature);
    (rain + temp) / 2.0
}

/// 1 inside the range, decaying linearly with distance to the nearest bound
fn range_score(value: f64, (lower, upper): (f64, f64)) -> f64 {
    if (lower..=upper).contains(&value) {
        return 1.0;
    }
    let distance = (value - lower).abs().min((value - upper).abs());
    let spread = if upper - lower == 0.0 { 1.0 } else { upper - lower };
    (1.0 - distance / spread).max(0.0)
}
