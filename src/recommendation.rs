//! Recommendation Facade
//!
//! Presentation-ready responses assembled from the predictor, yield estimator,
//! disease classifier and rule tables. The HTTP handlers and dashboard pages
//! call only into this module.

use anyhow::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::advisory::{
    advise_pesticide, generate_soil_health_tips, generate_weather_warnings, list_supported_diseases,
    recommend_fertilizers,
};
use crate::data::lookup::{average_npk, get_npk_for_region};
use crate::data::soil_profiles::{DEFAULT_HUMIDITY, DEFAULT_PH, DEFAULT_RAINFALL, DEFAULT_TEMPERATURE};
use crate::data::{SoilReadings, SoilSample};
use crate::model::{CropDiseaseClassifier, CropPredictor, YieldEstimator};
use crate::utils::{largest_remainder_percentages, title_case};

// ============================================================================
// Crop recommendation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRecommendation {
    pub name: String,
    pub score: f64,
    pub suitability: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRecommendationResponse {
    pub recommendations: Vec<CropRecommendation>,
    pub soil_tips: Vec<String>,
    /// Warnings for the top-ranked crop
    pub weather_notes: Vec<String>,
}

pub fn recommend_crops(predictor: &CropPredictor, sample: &SoilSample) -> Result<CropRecommendationResponse> {
    let result = predictor.recommend(sample)?;

    let recommendations: Vec<CropRecommendation> = result
        .recommendations
        .iter()
        .map(|entry| {
            let name = title_case(&entry.crop);
            CropRecommendation {
                rationale: format!(
                    "Why this crop? Balanced nutrients and climate indicators favour {} for the upcoming season.",
                    name
                ),
                name,
                score: entry.probability,
                suitability: entry.yield_category.to_string(),
            }
        })
        .collect();

    let top_crop = recommendations.first().map(|r| r.name.as_str()).unwrap_or("");
    let weather_notes = generate_weather_warnings(&SoilReadings::from(sample), top_crop);

    Ok(CropRecommendationResponse {
        soil_tips: generate_soil_health_tips(sample),
        weather_notes,
        recommendations,
    })
}

/// Where a regional shortlist came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortlistSource {
    /// Crops actually grown in the region per the dataset
    Regional,
    /// Region missing from the dataset; picked from the overall distribution
    Synthetic,
}

/// Wrap a regional crop shortlist (top 3) as recommendations
///
/// Crops without a score get 0.5.
pub fn build_regional_recommendations(
    crops: &[String],
    scores: Option<&FxHashMap<String, f64>>,
    region: Option<&str>,
    source: ShortlistSource,
) -> Vec<CropRecommendation> {
    let region = region.map(str::trim).filter(|r| !r.is_empty()).map(title_case);

    crops
        .iter()
        .take(3)
        .map(|crop| {
            let score = scores.and_then(|s| s.get(crop)).copied().unwrap_or(0.5);
            let (suitability, rationale) = match (source, &region) {
                (ShortlistSource::Synthetic, Some(r)) => {
                    ("Synthetic match", format!("Synthetic fallback based on overall dataset for {}.", r))
                }
                (ShortlistSource::Synthetic, None) => {
                    ("Synthetic match", "Synthetic fallback based on overall dataset.".to_string())
                }
                (ShortlistSource::Regional, Some(r)) => {
                    ("Regional match", format!("Commonly grown in {} based on dataset distribution.", r))
                }
                (ShortlistSource::Regional, None) => (
                    "Regional match",
                    "Commonly grown in this region based on dataset distribution.".to_string(),
                ),
            };
            CropRecommendation {
                name: crop.clone(),
                score,
                suitability: suitability.to_string(),
                rationale,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalShortlist {
    pub region: String,
    pub source: ShortlistSource,
    pub recommendations: Vec<CropRecommendation>,
}

/// Top crops for a region under seasonal default climate
///
/// Regions in the NPK table are scored on their reference nutrients. Others
/// use the mean reference over all regions and are marked synthetic.
pub fn regional_shortlist(predictor: &CropPredictor, region: &str) -> Result<RegionalShortlist> {
    let (npk, source) = match get_npk_for_region(region) {
        Some(npk) => (npk, ShortlistSource::Regional),
        None => (average_npk(), ShortlistSource::Synthetic),
    };
    let sample = SoilSample::from_features(
        [npk.n, npk.p, npk.k, DEFAULT_TEMPERATURE, DEFAULT_HUMIDITY, DEFAULT_PH, DEFAULT_RAINFALL],
        Some(region.to_string()),
    );

    let ranked = predictor.recommend(&sample)?.recommendations;
    let crops: Vec<String> = ranked.iter().map(|r| title_case(&r.crop)).collect();
    let scores: FxHashMap<String, f64> = crops
        .iter()
        .zip(&ranked)
        .map(|(name, r)| (name.clone(), r.probability))
        .collect();

    Ok(RegionalShortlist {
        region: title_case(region.trim()),
        source,
        recommendations: build_regional_recommendations(&crops, Some(&scores), Some(region), source),
    })
}

/// Whole-number percentages for display, always summing to 100
pub fn display_percentages(recommendations: &[CropRecommendation]) -> Vec<u32> {
    let scores: Vec<f64> = recommendations.iter().map(|r| r.score).collect();
    largest_remainder_percentages(&scores)
}

/// Card label per recommendation
///
/// An explicit low/medium/high suitability wins. Otherwise, when the scores
/// look like a probability distribution (each in [0, 1], summing to
/// 0.95–1.05) the rank decides; failing that the score thresholds 0.6/0.35.
pub fn suitability_labels(recommendations: &[CropRecommendation]) -> Vec<&'static str> {
    let total: f64 = recommendations.iter().map(|r| r.score).sum();
    let probability_like = !recommendations.is_empty()
        && recommendations.iter().all(|r| (0.0..=1.0).contains(&r.score))
        && (0.95..=1.05).contains(&total);

    let mut rank = vec![0usize; recommendations.len()];
    let mut order: Vec<usize> = (0..recommendations.len()).collect();
    order.sort_by(|&a, &b| recommendations[b].score.total_cmp(&recommendations[a].score));
    for (position, idx) in order.into_iter().enumerate() {
        rank[idx] = position;
    }

    recommendations
        .iter()
        .enumerate()
        .map(|(idx, rec)| match rec.suitability.to_lowercase().as_str() {
            "high" => "High",
            "medium" => "Medium",
            "low" => "Low",
            _ if probability_like => match rank[idx] {
                0 => "High",
                1 => "Medium",
                _ => "Low",
            },
            _ if rec.score >= 0.6 => "High",
            _ if rec.score >= 0.35 => "Medium",
            _ => "Low",
        })
        .collect()
}

// ============================================================================
// Yield, fertilizer, pesticide, disease
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldProjection {
    pub crop: String,
    pub level: String,
    pub estimated_output: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub weather_notes: Vec<String>,
}

impl YieldProjection {
    /// Revenue per acre at the given ₹/quintal price
    pub fn estimated_revenue(&self, price_per_quintal: f64) -> f64 {
        self.estimated_output * price_per_quintal
    }
}

pub fn predict_yield(estimator: &YieldEstimator, crop: &str, readings: &SoilReadings) -> YieldProjection {
    let outcome = estimator.predict(crop, readings);
    YieldProjection {
        crop: title_case(crop),
        level: outcome.yield_level,
        estimated_output: outcome.estimated_quintal_per_acre,
        confidence: outcome.confidence,
        reasoning: outcome.reasoning,
        weather_notes: generate_weather_warnings(readings, crop),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerPlanItem {
    pub nutrient: String,
    pub product: String,
    pub quantity: String,
    pub rationale: String,
    pub organic_option: String,
}

pub fn recommend_fertilizer(crop: &str, readings: &SoilReadings) -> Vec<FertilizerPlanItem> {
    recommend_fertilizers(crop, readings)
        .into_iter()
        .map(|item| FertilizerPlanItem {
            nutrient: item.nutrient,
            product: item.fertilizer,
            quantity: item.quantity_per_acre,
            rationale: item.explanation,
            organic_option: item.organic_option,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PesticidePlan {
    pub disease: String,
    pub chemical: String,
    pub dosage: String,
    pub frequency: String,
    pub organic_alternative: String,
    pub safety: String,
    pub severity_note: String,
}

pub fn recommend_pesticide(disease: &str, severity: Option<&str>) -> PesticidePlan {
    let advice = advise_pesticide(disease, severity);
    PesticidePlan {
        disease: title_case(&advice.disease),
        chemical: advice.chemical_name,
        dosage: advice.chemical_dosage_per_acre,
        frequency: advice.application_frequency,
        organic_alternative: advice.organic_option,
        safety: advice.safety_guidance,
        severity_note: advice.severity_adjustment,
    }
}

/// Catalogued diseases for dropdowns, title-cased
pub fn supported_diseases() -> Vec<String> {
    list_supported_diseases().into_iter().map(title_case).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseDiagnosis {
    pub crop: String,
    pub disease: String,
    pub severity: String,
    pub symptoms: String,
    pub confidence: f64,
}

pub fn diagnose_disease(classifier: &CropDiseaseClassifier, crop: &str, image_bytes: &[u8]) -> Result<DiseaseDiagnosis> {
    let prediction = classifier.predict_bytes(image_bytes)?;
    Ok(DiseaseDiagnosis {
        crop: title_case(crop),
        disease: title_case(&prediction.disease),
        severity: title_case(&prediction.severity),
        symptoms: prediction.symptom_summary,
        confidence: prediction.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, score: f64, suitability: &str) -> CropRecommendation {
        CropRecommendation {
            name: name.to_string(),
            score,
            suitability: suitability.to_string(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_regional_wording() {
        let crops: Vec<String> = ["rice", "wheat", "maize", "cotton"].iter().map(|s| s.to_string()).collect();
        let mut scores = FxHashMap::default();
        scores.insert("rice".to_string(), 0.8);

        let recs = build_regional_recommendations(&crops, Some(&scores), Some("tamil nadu"), ShortlistSource::Regional);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].score, 0.8);
        assert_eq!(recs[1].score, 0.5);
        assert_eq!(recs[0].suitability, "Regional match");
        assert_eq!(recs[0].rationale, "Commonly grown in Tamil Nadu based on dataset distribution.");

        let synthetic = build_regional_recommendations(&crops, None, None, ShortlistSource::Synthetic);
        assert_eq!(synthetic[2].rationale, "Synthetic fallback based on overall dataset.");
        assert!(build_regional_recommendations(&[], None, None, ShortlistSource::Regional).is_empty());
    }

    #[test]
    fn test_regional_shortlist_sources() {
        use crate::model::training::tests::{small_config, synthetic_split};
        use crate::model::training::train_model;

        let artifacts = train_model(&small_config(), &synthetic_split(10)).unwrap();
        let predictor = CropPredictor::new(artifacts.pipeline, 3);

        let known = regional_shortlist(&predictor, "punjab").unwrap();
        assert_eq!(known.source, ShortlistSource::Regional);
        assert_eq!(known.region, "Punjab");
        assert_eq!(known.recommendations.len(), 3);
        assert_eq!(known.recommendations[0].suitability, "Regional match");
        assert!(known.recommendations[0].score >= known.recommendations[1].score);

        let unknown = regional_shortlist(&predictor, "atlantis").unwrap();
        assert_eq!(unknown.source, ShortlistSource::Synthetic);
        assert!(unknown.recommendations[0].rationale.contains("Atlantis"));
    }

    #[test]
    fn test_display_percentages_sum_to_100() {
        let recs = vec![rec("a", 0.5, ""), rec("b", 0.3, ""), rec("c", 0.1, "")];
        assert_eq!(display_percentages(&recs), vec![56, 33, 11]);
    }

    #[test]
    fn test_suitability_labels() {
        // Explicit labels win
        let explicit = vec![rec("a", 0.1, "high"), rec("b", 0.9, "Low")];
        assert_eq!(suitability_labels(&explicit), vec!["High", "Low"]);

        // Probability-like scores rank
        let ranked = vec![rec("a", 0.2, "Regional match"), rec("b", 0.5, ""), rec("c", 0.3, "")];
        assert_eq!(suitability_labels(&ranked), vec!["Low", "High", "Medium"]);

        // Otherwise thresholds
        let thresholds = vec![rec("a", 0.5, ""), rec("b", 0.5, ""), rec("c", 0.2, "")];
        assert_eq!(suitability_labels(&thresholds), vec!["Medium", "Medium", "Low"]);
    }

    #[test]
    fn test_pesticide_plan_title_cases() {
        let plan = recommend_pesticide("sheath blight", Some("low"));
        assert_eq!(plan.disease, "Sheath Blight");
        assert_eq!(plan.chemical, "Hexaconazole 5% SC");
        assert_eq!(supported_diseases()[0], "Bacterial Leaf Blight");
    }

    #[test]
    fn test_yield_projection_carries_weather_notes() {
        let readings = SoilReadings { rainfall: Some(50.0), temperature: Some(25.0), humidity: Some(60.0), ..Default::default() };
        let projection = predict_yield(&YieldEstimator::new(), "wheat", &readings);
        assert_eq!(projection.crop, "Wheat");
        assert_eq!(projection.weather_notes.len(), 2);
        assert!(projection.estimated_revenue(2275.0) > 0.0);
    }

    #[test]
    fn test_fertilizer_plan_fields() {
        let readings = SoilReadings { n: Some(90.0), p: Some(60.0), k: Some(60.0), ph: Some(6.5), ..Default::default() };
        let plan = recommend_fertilizer("rice", &readings);
        assert_eq!(plan[0].product, "NPK 10-26-26 + micronutrient foliar mix");
    }
}
