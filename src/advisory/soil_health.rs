//! Soil-health tips for a complete sample: macro-nutrients, then pH, then climate.

use crate::data::lookup::{PH_ACIDIC, PH_ALKALINE};
use crate::data::SoilSample;
use crate::utils::dedup_preserving_order;

pub fn generate_soil_health_tips(sample: &SoilSample) -> Vec<String> {
    let mut tips: Vec<&'static str> = Vec::new();

    if sample.n < 50.0 {
        tips.push("Nitrogen levels are low; consider applying urea or incorporating legume cover crops.");
    } else if sample.n > 120.0 {
        tips.push("Nitrogen is high; reduce nitrogenous fertilizers to avoid foliage burn.");
    }
    if sample.p < 40.0 {
        tips.push("Phosphorus deficiency detected; use rock phosphate or DAP before sowing.");
    } else if sample.p > 110.0 {
        tips.push("Phosphorus is excessive; switch to balanced NPK blends to prevent soil fixation.");
    }
    if sample.k < 40.0 {
        tips.push("Potassium is low; supplement with muriate of potash or apply wood ash.");
    } else if sample.k > 120.0 {
        tips.push("Potassium level is high; avoid additional potassic fertilizers this season.");
    }

    tips.push(if sample.ph < PH_ACIDIC {
        "Soil is acidic; add agricultural lime or dolomite to raise pH towards neutral."
    } else if sample.ph > PH_ALKALINE {
        "Soil is alkaline; apply elemental sulfur or organic compost to lower pH gradually."
    } else {
        "Soil pH is within optimal range for most crops."
    });

    if sample.humidity < 30.0 {
        tips.push("Low humidity may stress moisture-loving crops; prioritize drought-tolerant varieties.");
    } else if sample.humidity > 85.0 {
        tips.push("High humidity increases fungal risk; schedule preventive fungicide sprays.");
    }
    if sample.rainfall < 80.0 {
        tips.push("Limited rainfall expected; plan supplemental irrigation or select low-water crops.");
    } else if sample.rainfall > 250.0 {
        tips.push("Excess rainfall forecast; ensure proper drainage to prevent waterlogging.");
    }
    if sample.temperature < 15.0 {
        tips.push("Cool temperatures; opt for Rabi-season crops or use nursery trays to raise seedlings.");
    } else if sample.temperature > 35.0 {
        tips.push("High temperatures predicted; implement mulching to conserve soil moisture.");
    }

    dedup_preserving_order(tips.into_iter().map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_sample_only_reports_ph() {
        let sample = SoilSample::from_features([90.0, 60.0, 60.0, 25.0, 60.0, 6.5, 150.0], None);
        assert_eq!(
            generate_soil_health_tips(&sample),
            vec!["Soil pH is within optimal range for most crops."]
        );
    }

    #[test]
    fn test_stressed_sample_in_order() {
        let sample = SoilSample::from_features([30.0, 120.0, 30.0, 40.0, 90.0, 5.0, 60.0], None);
        let tips = generate_soil_health_tips(&sample);

        assert_eq!(tips.len(), 7);
        assert!(tips[0].starts_with("Nitrogen levels are low"));
        assert!(tips[1].starts_with("Phosphorus is excessive"));
        assert!(tips[2].starts_with("Potassium is low"));
        assert!(tips[3].starts_with("Soil is acidic"));
        assert!(tips[4].starts_with("High humidity"));
        assert!(tips[5].starts_with("Limited rainfall"));
        assert!(tips[6].starts_with("High temperatures"));
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let sample = SoilSample::from_features([50.0, 40.0, 40.0, 15.0, 30.0, 5.5, 80.0], None);
        assert_eq!(generate_soil_health_tips(&sample).len(), 1);
    }
}
