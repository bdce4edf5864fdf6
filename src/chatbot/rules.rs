//! Rule-based chat replies
//!
//! Markdown answers assembled from the crop guide and soil rows when no
//! language model is reachable: NPK guidance, water comparison, per-crop
//! advisories (focused or full) and a general crop advisory with season and
//! soil shortlists.

use std::collections::BTreeSet;

use super::context::{estimate_water_range_mm, ChatContext};
use super::keywords::{contains_agri_intent, detect_topics, Topic};
use super::NON_AGRI_REPLY;
use crate::data::crop_guide::CropDetails;
use crate::utils::{normalize_text, title_case};

const NOT_SPECIFIED: &str = "Not specified";

const SOIL_TERMS: [&str; 7] = [
    "black soil",
    "alluvial soil",
    "loamy soil",
    "sandy soil",
    "sandy loam",
    "clay soil",
    "red soil",
];

const FEATURED_CROPS: [&str; 10] = [
    "Rice", "Wheat", "Maize", "Cotton", "Groundnut", "Sugarcane", "Soybean", "Ragi", "Jowar", "Banana",
];

fn or_unspecified(text: &str) -> &str {
    if text.trim().is_empty() {
        NOT_SPECIFIED
    } else {
        text
    }
}

fn first_joined(items: &[String], n: usize, sep: &str) -> String {
    items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(sep)
}

/// Basal and top-dressing NPK lines for one crop
pub fn build_npk_response(crop_key: &str, crop: &CropDetails) -> String {
    let mut lines = vec![format!("### NPK Guidance for {}", crop.display_name(crop_key))];
    lines.push(format!("- Basal NPK: {}", or_unspecified(&crop.fertilizer.basal)));
    if !crop.fertilizer.top_dressing.is_empty() {
        lines.push(format!("- Top dressing: {}", first_joined(&crop.fertilizer.top_dressing, 3, "; ")));
    }
    lines.push("- Note: Adjust final NPK dose based on soil test, variety, and local recommendations.".to_string());
    lines.push("- Caution: Over-application can reduce soil health; follow label and extension guidance.".to_string());
    lines.join("\n")
}

/// First six soil profile rows as "- region: N=.., P=.., K=.., pH=.."
pub fn format_soil_profiles(ctx: &ChatContext) -> String {
    let rows = ctx.soil_rows();
    if rows.is_empty() {
        return "- Soil profile reference is not available right now.".to_string();
    }

    rows.iter()
        .take(6)
        .map(|row| {
            let field = |name: &str, default: &'static str| {
                row.get(name).map(String::as_str).unwrap_or(default).to_string()
            };
            format!(
                "- {}: N={}, P={}, K={}, pH={}",
                field("region", "unknown"),
                field("n_avg", "NA"),
                field("p_avg", "NA"),
                field("k_avg", "NA"),
                field("ph", "NA"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reply used when no language model answered
pub fn build_rule_based_response(query: &str, ctx: &ChatContext) -> String {
    let mentioned = ctx.extract_crop(query);
    if !contains_agri_intent(query) && mentioned.is_none() {
        return NON_AGRI_REPLY.to_string();
    }

    let topics = detect_topics(query);
    let matched = ctx.extract_crops(query);
    if matched.len() >= 2 && topics.contains(&Topic::Water) {
        return water_comparison(&matched);
    }

    match mentioned {
        Some((key, crop)) => crop_advisory(key, crop, &topics, ctx),
        None => general_agri_response(query, ctx, &topics),
    }
}

fn water_comparison(matched: &[(&str, &CropDetails)]) -> String {
    let mut lines = vec!["### Water Comparison Advisory".to_string()];
    let mut comparable: Vec<(String, f64)> = Vec::new();

    for (key, crop) in matched.iter().take(3) {
        let name = crop.display_name(key);
        match estimate_water_range_mm(key, crop) {
            None => lines.push(format!("- {}: water estimate not available in current dataset.", name)),
            Some((lo, hi)) => {
                if lo == hi {
                    lines.push(format!("- {}: estimated water need ~ {:.0} mm.", name, lo));
                } else {
                    lines.push(format!("- {}: estimated water need ~ {:.0}-{:.0} mm.", name, lo, hi));
                }
                comparable.push((name, (lo + hi) / 2.0));
            }
        }
    }

    if comparable.len() >= 2 {
        // First of equal averages wins on both ends
        let lowest = comparable.iter().fold(&comparable[0], |best, c| if c.1 < best.1 { c } else { best });
        let highest = comparable.iter().fold(&comparable[0], |best, c| if c.1 > best.1 { c } else { best });
        lines.push(format!("- Conclusion: {} generally needs less water than {}.", lowest.0, highest.0));
    } else {
        lines.push("- Conclusion: not enough comparable data to rank all listed crops.".to_string());
    }

    lines.push("- Note: actual requirement varies by soil, climate, irrigation method, and variety.".to_string());
    lines.push("- Source: data/crop_details.json, data/raw/Crop recommendation dataset.csv".to_string());
    lines.join("\n")
}

fn crop_advisory(crop_key: &str, crop: &CropDetails, topics: &[Topic], ctx: &ChatContext) -> String {
    let crop_name = crop.display_name(crop_key);
    let single_topic = topics.len() == 1;
    let wants = |topic: Topic| topics.is_empty() || topics.contains(&topic);

    let mut lines = Vec::new();
    if single_topic {
        lines.push(format!("### {} Advisory for {}", topics[0].title(), crop_name));
    } else {
        lines.push(format!("### Advisory for {}", crop_name));
        lines.push("- This guidance is dataset-based and should be validated with local extension experts.".to_string());
    }

    if wants(Topic::Cultivation) {
        if !crop.stages.is_empty() {
            lines.push(format!("- Cultivation stages: {}", crop.stage_summary()));
        }
        lines.push(format!("- Suitable season: {}", or_unspecified(&crop.season)));
        lines.push(format!("- Typical duration: {}", or_unspecified(&crop.duration)));
    }

    if wants(Topic::Fertilizer) {
        lines.push(format!("- Basal fertilizer: {}", or_unspecified(&crop.fertilizer.basal)));
        if !crop.fertilizer.top_dressing.is_empty() {
            lines.push(format!("- Top dressing: {}", first_joined(&crop.fertilizer.top_dressing, 3, "; ")));
        }
    }

    if wants(Topic::Pest) {
        let pests = &crop.pests;
        if !pests.common_pests.is_empty() {
            lines.push(format!("- Common pests: {}", first_joined(&pests.common_pests, 5, ", ")));
        }
        if !pests.common_diseases.is_empty() {
            lines.push(format!("- Common diseases: {}", first_joined(&pests.common_diseases, 5, ", ")));
        }
        if !pests.prevention.is_empty() {
            lines.push(format!("- Prevention: {}", pests.prevention));
        }
    }

    if wants(Topic::Water) {
        let irrigation = &crop.irrigation;
        if !irrigation.stage_wise.is_empty() {
            lines.push(format!("- Water management: {}", first_joined(&irrigation.stage_wise, 3, " | ")));
        }
        lines.push(format!("- Irrigation frequency: {}", or_unspecified(&irrigation.frequency)));
    }

    if wants(Topic::Soil) {
        lines.push("- Soil suitability (regional reference):".to_string());
        lines.push(format_soil_profiles(ctx));
    }

    if wants(Topic::Harvest) {
        lines.push(format!("- Harvest indicators: {}", or_unspecified(&crop.harvest.indicators)));
        lines.push(format!("- Post-harvest: {}", or_unspecified(&crop.harvest.post_harvest)));
    }

    if !single_topic {
        lines.push("- Caution: adapt doses and spray plans to local soil-test and label instructions.".to_string());
        lines.push("- Next step: share location and sowing month for a more specific stage-wise action plan.".to_string());
    }
    lines.push("- Source: data/crop_details.json, data/soil_profiles.csv".to_string());
    lines.join("\n")
}

/// Catalogue-level advice when no crop is named
pub fn general_agri_response(query: &str, ctx: &ChatContext, topics: &[Topic]) -> String {
    let normalized = normalize_text(query);
    let wants = |topic: Topic| topics.is_empty() || topics.contains(&topic);

    struct CropItem {
        name: String,
        season: String,
        notes: String,
    }
    let items: Vec<CropItem> = ctx
        .crops()
        .iter()
        .map(|(key, crop)| CropItem {
            name: crop.display_name(key),
            season: crop.season.to_lowercase(),
            notes: crop.irrigation.notes.to_lowercase(),
        })
        .collect();
    let crop_names: Vec<String> = items.iter().map(|i| i.name.clone()).collect::<BTreeSet<_>>().into_iter().collect();

    let season_pref = ["kharif", "rabi", "zaid"].into_iter().find(|s| normalized.contains(s));
    let season_candidates: Vec<String> = season_pref
        .map(|season| {
            items
                .iter()
                .filter(|i| i.season.contains(season))
                .map(|i| i.name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default();

    let soil_pref = SOIL_TERMS.into_iter().find(|t| normalized.contains(t));
    let soil_candidates: Vec<String> = soil_pref
        .map(|soil| {
            items
                .iter()
                .filter(|i| i.notes.contains(soil))
                .map(|i| i.name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default();

    let mut featured: Vec<String> = FEATURED_CROPS
        .iter()
        .filter(|name| crop_names.iter().any(|c| c == *name))
        .map(|name| name.to_string())
        .collect();
    if featured.len() < 8 {
        let missing = 8 - featured.len();
        let extra: Vec<String> = crop_names.iter().filter(|c| !featured.contains(c)).take(missing).cloned().collect();
        featured.extend(extra);
    }

    let mut lines = vec!["### Crop Advisory".to_string()];
    let best_crop_query = (normalized.contains("best") || normalized.contains("recommend") || normalized.contains("suitable"))
        && (normalized.contains("crop") || normalized.contains("grow"));

    if best_crop_query {
        match (season_pref, soil_pref) {
            (Some(season), _) if !season_candidates.is_empty() => lines.push(format!(
                "- Suitable {} options from dataset: {}.",
                title_case(season),
                first_joined(&season_candidates, 10, ", ")
            )),
            (_, Some(soil)) if !soil_candidates.is_empty() => lines.push(format!(
                "- Suitable options for {}: {}.",
                title_case(soil),
                first_joined(&soil_candidates, 10, ", ")
            )),
            _ => lines.push(format!("- Common crop options from dataset: {}.", first_joined(&featured, 10, ", "))),
        }
        lines.push("- Choose based on local rainfall, soil type/pH, irrigation availability, and market demand.".to_string());
        lines.push("- For better accuracy, share your location, season, and whether the field is irrigated.".to_string());
    } else {
        lines.push("- I can answer cultivation, fertilizer, pest/disease, irrigation, season, soil, and harvest questions.".to_string());
    }

    if wants(Topic::Season) {
        lines.push("- Season guide: Kharif (monsoon), Rabi (winter), Zaid (summer). Match crop to local climate window.".to_string());
    }
    if wants(Topic::Soil) {
        lines.push("- Soil tip: use pH and texture to shortlist crops; confirm with local soil test if possible.".to_string());
        if let Some(soil) = soil_pref.filter(|_| !soil_candidates.is_empty()) {
            lines.push(format!("- {} crop shortlist: {}.", title_case(soil), first_joined(&soil_candidates, 10, ", ")));
        }
    }
    if wants(Topic::Water) {
        lines.push("- Water tip: prioritize low-water crops for rainfed fields and water-demanding crops for assured irrigation.".to_string());
    }
    if wants(Topic::Fertilizer) {
        lines.push("- Fertilizer tip: apply balanced NPK in splits and adjust final dose using soil-test report.".to_string());
    }
    if wants(Topic::Pest) {
        lines.push("- Pest tip: follow integrated pest management with scouting, sanitation, and need-based sprays.".to_string());
    }

    let preview = if crop_names.is_empty() {
        "No crop list available".to_string()
    } else {
        first_joined(&crop_names, 12, ", ")
    };
    lines.push(format!("- Available crop catalog examples: {}.", preview));
    lines.push("- Ask follow-up like: `best rabi crop for low water` or `top crops for black soil`.".to_string());
    lines.push("- Source: data/crop_details.json, data/raw/Crop recommendation dataset.csv, data/soil_profiles.csv".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::context::tests::sample_context;

    #[test]
    fn test_npk_guidance() {
        let ctx = sample_context();
        let (key, rice) = ctx.extract_crop("npk for rice").unwrap();
        let reply = build_npk_response(key, rice);

        assert!(reply.starts_with("### NPK Guidance for Rice"));
        assert!(reply.contains("- Basal NPK: Basal dose for Rice"));
        assert!(reply.contains("- Top dressing: Urea at tillering; Urea at panicle"));
    }

    #[test]
    fn test_refuses_off_topic() {
        let ctx = sample_context();
        assert_eq!(build_rule_based_response("tell me a joke", &ctx), NON_AGRI_REPLY);
    }

    #[test]
    fn test_water_comparison() {
        let ctx = sample_context();
        let reply = build_rule_based_response("Does ragi or wheat or jute need less water?", &ctx);

        assert!(reply.starts_with("### Water Comparison Advisory"));
        assert!(reply.contains("- Ragi: estimated water need ~ 400 mm."));
        assert!(reply.contains("- Wheat: estimated water need ~ 450-650 mm."));
        assert!(reply.contains("- Jute: water estimate not available in current dataset."));
        assert!(reply.contains("- Conclusion: Ragi generally needs less water than Wheat."));
    }

    #[test]
    fn test_single_topic_advisory() {
        let ctx = sample_context();
        let reply = build_rule_based_response("pest problems in rice", &ctx);

        assert!(reply.starts_with("### Pest Advisory for Rice"));
        assert!(reply.contains("- Common pests: Stem borer"));
        assert!(reply.contains("- Prevention: Use resistant varieties"));
        assert!(!reply.contains("Caution"));
        assert!(!reply.contains("Basal fertilizer"));
    }

    #[test]
    fn test_full_advisory_includes_soil_rows() {
        let ctx = sample_context();
        let reply = build_rule_based_response("tell me about wheat", &ctx);

        assert!(reply.starts_with("### Advisory for Wheat"));
        assert!(reply.contains("- Suitable season: Rabi"));
        assert!(reply.contains("- Punjab: N=120, P=45, K=60, pH=7.4"));
        assert!(reply.contains("- Next step:"));
        assert!(reply.ends_with("- Source: data/crop_details.json, data/soil_profiles.csv"));
    }

    #[test]
    fn test_general_best_crop_by_season() {
        let ctx = sample_context();
        let reply = build_rule_based_response("best kharif crop to grow", &ctx);

        assert!(reply.starts_with("### Crop Advisory"));
        assert!(reply.contains("- Suitable Kharif options from dataset: Jute, Ragi, Rice."));
        assert!(reply.contains("- Available crop catalog examples: Jute, Ragi, Rice, Wheat."));
    }

    #[test]
    fn test_general_soil_shortlist() {
        let ctx = sample_context();
        let reply = general_agri_response("which crops suit black soil", &ctx, &detect_topics("which crops suit black soil"));

        assert!(reply.contains("- I can answer cultivation"));
        assert!(reply.contains("- Black Soil crop shortlist: Wheat."));
        assert!(!reply.contains("Water tip"));
    }
}
