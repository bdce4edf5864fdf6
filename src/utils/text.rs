//! Text Helpers
//!
//! Key normalisation used by every lookup table plus the title casing applied
//! to crop names in user-facing text.

use std::collections::HashSet;

/// Title-case each word: first letter of every alphabetic run upper, rest lower
///
/// Mirrors the usual "str.title" behaviour: "kidney beans" → "Kidney Beans",
/// "rice blast" → "Rice Blast", "o'neil" → "O'Neil".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }

    out
}

/// Collapse whitespace and lowercase
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Crop key: lowercase alphanumerics only ("Kidney Beans" → "kidneybeans")
pub fn normalize_crop_key(name: &str) -> String {
    normalize_text(name)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Region/soil key: non-alphanumerics become spaces, words joined by `_`
///
/// "Black Soil (Regur)" → "black_soil_regur"
pub fn normalize_region_key(value: &str) -> String {
    let cleaned: String = value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == ' ' { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Remove duplicates while keeping first-seen order
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
