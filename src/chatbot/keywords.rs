//! Keyword tables for chat routing
//!
//! Every check is a substring test against the normalised query, so
//! multi-word phrases ("soil test", "share market") match as written.

use crate::utils::normalize_text;

pub const AGRI_KEYWORDS: &[&str] = &[
    "crop", "farming", "farm", "agriculture", "agri", "soil", "fertilizer", "fertiliser",
    "water", "irrigation", "pest", "disease", "season", "kharif", "rabi", "zaid", "harvest",
    "cultivation", "sowing", "yield", "grow", "best", "suitable", "recommend", "recommended",
    "seed", "variety", "varieties", "nursery", "transplant", "spacing", "weeding", "weed",
    "herbicide", "pesticide", "fungicide", "insecticide", "organic", "compost",
    "vermicompost", "mulch", "drip", "sprinkler", "soil test", "ph", "salinity", "health",
    "nutrition", "diet", "food", "edible", "human consumption", "millet", "millets", "ragi",
];

pub const NON_AGRI_KEYWORDS: &[&str] = &[
    "politics", "election", "movie", "film", "actor", "actress", "music", "song", "sports",
    "cricket", "football", "basketball", "coding", "programming", "python", "java",
    "javascript", "react", "html", "css", "travel", "tourism", "bitcoin", "crypto", "stock",
    "share market",
];

pub const NPK_KEYWORDS: &[&str] = &["npk", "n:p:k", "nitrogen", "phosphorus", "potassium"];

/// Local names for finger millet, matched against the compacted query
pub const CROP_ALIASES: &[(&str, &str)] = &[
    ("ragi", "ragi"),
    ("fingermillet", "ragi"),
    ("fingermillets", "ragi"),
    ("mandua", "ragi"),
    ("nachni", "ragi"),
];

/// Seasonal water need (mm) used when crop notes carry no figure
pub const WATER_FALLBACK_MM: &[(&str, (f64, f64))] = &[
    ("rice", (1200.0, 2500.0)),
    ("wheat", (450.0, 650.0)),
    ("maize", (500.0, 800.0)),
    ("cotton", (700.0, 1300.0)),
    ("groundnut", (500.0, 700.0)),
    ("sugarcane", (1500.0, 2500.0)),
    ("banana", (1200.0, 2200.0)),
    ("coffee", (800.0, 1200.0)),
    ("jowar", (350.0, 600.0)),
    ("ragi", (350.0, 650.0)),
];

pub fn water_fallback(crop_key: &str) -> Option<(f64, f64)> {
    WATER_FALLBACK_MM
        .iter()
        .find(|(key, _)| *key == crop_key)
        .map(|(_, range)| *range)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Cultivation,
    Fertilizer,
    Pest,
    Water,
    Season,
    Soil,
    Harvest,
    Utilization,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Cultivation,
        Topic::Fertilizer,
        Topic::Pest,
        Topic::Water,
        Topic::Season,
        Topic::Soil,
        Topic::Harvest,
        Topic::Utilization,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Topic::Cultivation => &["cultivation", "how to grow", "planting", "sowing", "stages"],
            Topic::Fertilizer => &["fertilizer", "fertiliser", "npk", "nutrient", "manure"],
            Topic::Pest => &["pest", "disease", "fungus", "infection", "spray", "pesticide"],
            Topic::Water => &["water", "irrigation", "rainfall", "moisture"],
            Topic::Season => &["season", "kharif", "rabi", "zaid", "summer", "winter", "monsoon"],
            Topic::Soil => &["soil", "ph", "alkaline", "acidic"],
            Topic::Harvest => &["harvest", "maturity", "yield", "post-harvest", "post harvest"],
            Topic::Utilization => &[
                "uses",
                "use",
                "utilization",
                "utilisation",
                "value addition",
                "processing",
                "food",
                "nutrition",
                "health benefits",
                "benefits",
                "byproducts",
                "by-products",
                "human consumption",
            ],
        }
    }

    /// Heading word, e.g. "Fertilizer"
    pub fn title(self) -> &'static str {
        match self {
            Topic::Cultivation => "Cultivation",
            Topic::Fertilizer => "Fertilizer",
            Topic::Pest => "Pest",
            Topic::Water => "Water",
            Topic::Season => "Season",
            Topic::Soil => "Soil",
            Topic::Harvest => "Harvest",
            Topic::Utilization => "Utilization",
        }
    }
}

fn contains_any(normalized: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| normalized.contains(k))
}

pub fn contains_agri_intent(query: &str) -> bool {
    contains_any(&normalize_text(query), AGRI_KEYWORDS)
}

pub fn is_non_agri_query(query: &str) -> bool {
    let normalized = normalize_text(query);
    !normalized.is_empty() && contains_any(&normalized, NON_AGRI_KEYWORDS)
}

pub fn is_npk_query(query: &str) -> bool {
    contains_any(&normalize_text(query), NPK_KEYWORDS)
}

/// Topics mentioned in the query, in fixed topic order
pub fn detect_topics(query: &str) -> Vec<Topic> {
    let normalized = normalize_text(query);
    Topic::ALL
        .into_iter()
        .filter(|t| contains_any(&normalized, t.keywords()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_detection_order() {
        let topics = detect_topics("Irrigation and FERTILIZER plan for the kharif season");
        assert_eq!(topics, vec![Topic::Fertilizer, Topic::Water, Topic::Season]);
        assert!(detect_topics("hello there").is_empty());
    }

    #[test]
    fn test_intent_checks() {
        assert!(contains_agri_intent("Which crop suits my farm?"));
        assert!(!contains_agri_intent("tell me a joke"));
        assert!(is_non_agri_query("Who won the cricket match"));
        assert!(!is_non_agri_query("   "));
        assert!(is_npk_query("What is the N:P:K ratio"));
    }

    #[test]
    fn test_water_fallback_lookup() {
        assert_eq!(water_fallback("wheat"), Some((450.0, 650.0)));
        assert_eq!(water_fallback("apple"), None);
    }
}
