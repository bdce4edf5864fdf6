//! Fertilizer Advice
//!
//! One corrective entry per out-of-range nutrient (N, P, K) and pH. When
//! everything is in range a balanced maintenance plan is returned instead.
//! Missing readings count as N/P/K 0 and pH 7.

use serde::{Deserialize, Serialize};

use crate::data::lookup::{PH_ACIDIFYING, PH_LIMING};
use crate::data::SoilReadings;
use crate::utils::title_case;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerAdvice {
    pub nutrient: String,
    pub fertilizer: String,
    pub quantity_per_acre: String,
    pub explanation: String,
    pub organic_option: String,
}

fn advice(nutrient: &str, fertilizer: &str, quantity: &str, explanation: String, organic: &str) -> FertilizerAdvice {
    FertilizerAdvice {
        nutrient: nutrient.to_string(),
        fertilizer: fertilizer.to_string(),
        quantity_per_acre: quantity.to_string(),
        explanation,
        organic_option: organic.to_string(),
    }
}

pub fn recommend_fertilizers(crop: &str, readings: &SoilReadings) -> Vec<FertilizerAdvice> {
    let crop = title_case(crop);
    let n = readings.n.unwrap_or(0.0);
    let p = readings.p.unwrap_or(0.0);
    let k = readings.k.unwrap_or(0.0);
    let ph = readings.ph.unwrap_or(7.0);

    let mut plan = Vec::new();

    if n < 60.0 {
        plan.push(advice(
            "Nitrogen",
            "Urea (46% N)",
            "40-50 kg broadcast in two splits",
            format!("Leaf colour indicates nitrogen hunger; boost vegetative growth for {}.", crop),
            "Farmyard manure (1.5 tons/acre) or legume green manure incorporation.",
        ));
    } else if n > 130.0 {
        plan.push(advice(
            "Nitrogen",
            "Reduce nitrogen inputs",
            "Skip top dressing this cycle",
            format!("Soil already rich in nitrogen; avoid lodging risk for {}.", crop),
            "Adopt foliar bio-stimulants rather than synthetic N sources.",
        ));
    }

    if p < 45.0 {
        plan.push(advice(
            "Phosphorus",
            "DAP (18-46-0)",
            "25 kg basal dose",
            format!("Low phosphorus detected; support rooting and early tillering for {}.", crop),
            "Rock phosphate (fine grade) with compost for slow release.",
        ));
    } else if p > 120.0 {
        plan.push(advice(
            "Phosphorus",
            "Balanced NPK (10-26-26)",
            "25 kg basal + 20 kg top dressing",
            "Excess phosphorus; switch to balanced mixes to avoid micronutrient lockout.".to_string(),
            "Apply composted poultry manure to improve microbial P utilisation.",
        ));
    }

    if k < 50.0 {
        plan.push(advice(
            "Potassium",
            "Muriate of potash (60% K2O)",
            "15-20 kg side dressing",
            format!("Potassium deficiency lowers disease tolerance and grain filling in {}.", crop),
            "Wood ash (150 kg) or banana pseudostem compost for gradual K supply.",
        ));
    } else if k > 130.0 {
        plan.push(advice(
            "Potassium",
            "Avoid additional potash",
            "No potash this season",
            "Soil already saturated with potassium; excessive K antagonises magnesium uptake.".to_string(),
            "Focus on micronutrient foliar sprays instead of potash products.",
        ));
    }

    if ph < PH_LIMING {
        plan.push(advice(
            "pH",
            "Agricultural lime",
            "200 kg split into two applications",
            format!("Acidic soil reduces nutrient availability; liming will stabilise pH for {}.", crop),
            "Incorporate biochar or composted poultry litter to buffer acidity.",
        ));
    } else if ph > PH_ACIDIFYING {
        plan.push(advice(
            "pH",
            "Elemental sulphur or gypsum",
            "40 kg elemental sulphur worked into soil",
            "Alkaline reaction can lock micronutrients; acidifying amendments restore balance.".to_string(),
            "Apply acidic compost (coco-peat based) with drip fertigation.",
        ));
    }

    if plan.is_empty() {
        plan.push(advice(
            "Balanced",
            "NPK 10-26-26 + micronutrient foliar mix",
            "20 kg basal + micronutrient spray at 30 DAS",
            "Soil nutrients look balanced; maintain through split NPK and foliar micronutrients.".to_string(),
            "Vermicompost tea foliar spray with seaweed extract.",
        ));
    }

    plan
}
