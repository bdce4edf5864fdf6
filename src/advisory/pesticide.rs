//! Pesticide Advice
//!
//! Spray plans for catalogued diseases, with a generic carbendazim plan for
//! anything else, plus a note that adapts to the reported severity.

use serde::{Deserialize, Serialize};

struct SprayPlan {
    disease: &'static str,
    chemical: &'static str,
    dosage: &'static str,
    frequency: &'static str,
    organic: &'static str,
    safety: &'static str,
}

static CATALOG: &[SprayPlan] = &[
    SprayPlan {
        disease: "rice blast",
        chemical: "Tricyclazole 75% WP",
        dosage: "0.6 kg in 500 L water",
        frequency: "Apply at early stages and repeat after 10 days",
        organic: "Neem oil (3%) with sticking agent",
        safety: "Avoid inhalation, wear mask and gloves, do not spray near open water bodies.",
    },
    SprayPlan {
        disease: "sheath blight",
        chemical: "Hexaconazole 5% SC",
        dosage: "1 L in 500 L water",
        frequency: "Two sprays at 7-day interval",
        organic: "Pseudomonas fluorescens foliar spray",
        safety: "Use protective goggles, avoid evening sprays to reduce drift.",
    },
    SprayPlan {
        disease: "leaf rust",
        chemical: "Propiconazole 25% EC",
        dosage: "0.5 L in 400 L water",
        frequency: "Apply at first signs, repeat in 14 days if needed",
        organic: "Sulphur dusting (80% WP) at 10 kg/ha",
        safety: "Wear long sleeves and boots, dispose containers responsibly.",
    },
    SprayPlan {
        disease: "powdery mildew",
        chemical: "Wettable sulphur 80% WP",
        dosage: "2.5 kg in 500 L water",
        frequency: "Repeat at 10-day interval during favourable weather",
        organic: "Potassium bicarbonate + horticultural oil spray",
        safety: "Avoid inhalation; sulphur irritates eyes and skin, keep children away.",
    },
    SprayPlan {
        disease: "bacterial leaf blight",
        chemical: "Copper oxychloride 50% WP",
        dosage: "3 kg in 600 L water",
        frequency: "Two sprays at 5-day interval",
        organic: "Fermented cow dung + asafoetida foliar extract",
        safety: "Use PPE, copper residues can burn skin; clean equipment thoroughly.",
    },
];

static GENERIC: SprayPlan = SprayPlan {
    disease: "generic",
    chemical: "Carbendazim 50% WP",
    dosage: "1 kg in 500 L water",
    frequency: "Repeat every 12 days if symptoms persist",
    organic: "Garlic-chilli-kadukkai (GCK) extract foliar spray",
    safety: "Always use gloves, mask, and avoid spraying under strong wind.",
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PesticideAdvice {
    pub disease: String,
    pub chemical_name: String,
    pub chemical_dosage_per_acre: String,
    pub application_frequency: String,
    pub organic_option: String,
    pub safety_guidance: String,
    pub severity_adjustment: String,
}

pub fn advise_pesticide(disease: &str, severity: Option<&str>) -> PesticideAdvice {
    let key = disease.trim().to_lowercase();
    let plan = CATALOG.iter().find(|p| p.disease == key).unwrap_or(&GENERIC);

    PesticideAdvice {
        disease: disease.to_string(),
        chemical_name: plan.chemical.to_string(),
        chemical_dosage_per_acre: plan.dosage.to_string(),
        application_frequency: plan.frequency.to_string(),
        organic_option: plan.organic.to_string(),
        safety_guidance: plan.safety.to_string(),
        severity_adjustment: severity_note(severity).to_string(),
    }
}

fn severity_note(severity: Option<&str>) -> &'static str {
    match severity.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("high") => "High severity detected: tighten spray interval and integrate field sanitation.",
        Some("medium") => "Medium severity: follow label interval and reassess in 5-7 days.",
        Some("low") => "Low severity: single spray plus organic alternative may suffice.",
        _ => "Monitor plot after application; adjust based on field scouting.",
    }
}

/// Catalogued diseases, sorted
pub fn list_supported_diseases() -> Vec<&'static str> {
    let mut diseases: Vec<&'static str> = CATALOG.iter().map(|p| p.disease).collect();
    diseases.sort_unstable();
    diseases
}
