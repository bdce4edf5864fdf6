//! Static Agronomy Lookup Tables
//!
//! Embedded reference data used when no live or dataset-derived value exists:
//! - NPK averages (kg/ha) for Indian states, union territories and major cities
//!   (Soil Health Card example values, not exhaustive)
//! - Seasonal water requirement per crop
//! - MSP / market average prices (₹/quintal) and data.gov.in commodity names
//! - pH thresholds shared by the soil-health and fertilizer rules

use serde::Serialize;

use crate::utils::normalize_crop_key;

// ============================================================================
// pH thresholds
// ============================================================================

/// Below this the soil-health advisory calls the soil acidic
pub const PH_ACIDIC: f64 = 5.5;
/// Above this the soil-health advisory calls the soil alkaline
pub const PH_ALKALINE: f64 = 7.5;
/// Fertilizer plan adds lime below this
pub const PH_LIMING: f64 = 5.8;
/// Fertilizer plan adds sulphur or gypsum above this
pub const PH_ACIDIFYING: f64 = 7.8;

// ============================================================================
// NPK by region
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionNpk {
    #[serde(skip)]
    pub region: &'static str,
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "K")]
    pub k: f64,
}

const fn npk(region: &'static str, n: f64, p: f64, k: f64) -> RegionNpk {
    RegionNpk { region, n, p, k }
}

static NPK_LOOKUP: &[RegionNpk] = &[
    // States
    npk("andhra pradesh", 70.0, 28.0, 36.0),
    npk("arunachal pradesh", 65.0, 25.0, 30.0),
    npk("assam", 68.0, 27.0, 32.0),
    npk("bihar", 88.0, 37.0, 43.0),
    npk("chhattisgarh", 72.0, 29.0, 35.0),
    npk("goa", 60.0, 22.0, 28.0),
    npk("gujarat", 83.0, 34.0, 41.0),
    npk("haryana", 92.0, 41.0, 46.0),
    npk("himachal pradesh", 67.0, 26.0, 31.0),
    npk("jharkhand", 74.0, 30.0, 37.0),
    npk("karnataka", 85.0, 32.0, 42.0),
    npk("kerala", 69.0, 27.0, 33.0),
    npk("madhya pradesh", 86.0, 36.0, 44.0),
    npk("maharashtra", 80.0, 35.0, 40.0),
    npk("manipur", 62.0, 23.0, 29.0),
    npk("meghalaya", 63.0, 24.0, 30.0),
    npk("mizoram", 61.0, 22.0, 28.0),
    npk("nagaland", 64.0, 25.0, 31.0),
    npk("odisha", 77.0, 31.0, 38.0),
    npk("punjab", 95.0, 42.0, 48.0),
    npk("rajasthan", 84.0, 35.0, 41.0),
    npk("sikkim", 66.0, 25.0, 30.0),
    npk("tamil nadu", 82.0, 34.0, 41.0),
    npk("telangana", 75.0, 30.0, 38.0),
    npk("tripura", 60.0, 22.0, 28.0),
    npk("uttar pradesh", 90.0, 40.0, 45.0),
    npk("uttarakhand", 68.0, 27.0, 32.0),
    npk("west bengal", 78.0, 33.0, 39.0),
    // Union territories
    npk("andaman and nicobar islands", 55.0, 20.0, 25.0),
    npk("chandigarh", 58.0, 21.0, 27.0),
    npk("dadra and nagar haveli and daman and diu", 59.0, 22.0, 28.0),
    npk("jammu and kashmir", 70.0, 28.0, 36.0),
    npk("ladakh", 56.0, 20.0, 25.0),
    npk("lakshadweep", 54.0, 19.0, 24.0),
    npk("puducherry", 73.0, 29.0, 36.0),
    // Major cities/districts
    npk("mumbai", 81.0, 36.0, 41.0),
    npk("pune", 80.0, 35.0, 40.0),
    npk("nagpur", 80.0, 35.0, 40.0),
    npk("hyderabad", 75.0, 30.0, 38.0),
    npk("chennai", 82.0, 34.0, 41.0),
    npk("bengaluru", 85.0, 32.0, 42.0),
    npk("kolkata", 78.0, 33.0, 39.0),
    npk("delhi", 87.0, 36.0, 44.0),
];

/// Average NPK for a state, UT or city (case and surrounding space ignored)
pub fn get_npk_for_region(region: &str) -> Option<RegionNpk> {
    let key = region.trim().to_lowercase();
    NPK_LOOKUP.iter().find(|entry| entry.region == key).copied()
}

/// Mean NPK over every region in the table
pub fn average_npk() -> RegionNpk {
    let count = NPK_LOOKUP.len() as f64;
    let (n, p, k) = NPK_LOOKUP
        .iter()
        .fold((0.0, 0.0, 0.0), |acc, e| (acc.0 + e.n, acc.1 + e.p, acc.2 + e.k));
    npk("overall", n / count, p / count, k / count)
}

/// All region keys in table order
pub fn npk_regions() -> impl Iterator<Item = &'static str> {
    NPK_LOOKUP.iter().map(|entry| entry.region)
}

// ============================================================================
// Water requirement
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct WaterRequirement {
    pub crop: &'static str,
    pub mm: &'static str,
    pub cycles: &'static str,
    pub stage: &'static str,
}

const fn water(crop: &'static str, mm: &'static str, cycles: &'static str, stage: &'static str) -> WaterRequirement {
    WaterRequirement { crop, mm, cycles, stage }
}

static WATER_REQUIREMENT: &[WaterRequirement] = &[
    water("rice", "1200-1400", "20-25", "Flowering & Grain filling"),
    water("wheat", "450-650", "4-6", "Crown root initiation"),
    water("maize", "500-800", "6-8", "Tasseling & Silking"),
    water("cotton", "700-1300", "6-8", "Flowering-Boll formation"),
    water("groundnut", "500-700", "5-6", "Pegging & Pod development"),
    water("sugarcane", "1500-2500", "30-35", "Grand growth phase"),
    water("banana", "1200-1500", "Weekly", "Bunch emergence"),
    water("apple", "800-1000", "10-12", "Fruit development"),
    water("mango", "400-600", "6-8", "Flowering & Fruit set"),
    water("grapes", "500-700", "Weekly", "Berry development"),
    water("coffee", "1500-2500", "15-20", "Flowering & Berry expansion"),
    water("jute", "500-800", "5-7", "Vegetative growth"),
    water("coconut", "1300-2500", "Monthly", "Year-round"),
    water("papaya", "1500-2000", "Weekly", "Fruit development"),
    water("orange", "900-1200", "8-12", "Flowering & Fruit set"),
    water("chickpea", "300-400", "2-3", "Flowering"),
    water("kidneybeans", "400-500", "4-5", "Flowering & Pod fill"),
    water("pigeonpeas", "600-700", "3-4", "Flowering"),
    water("mothbeans", "200-300", "2-3", "Flowering"),
    water("mungbean", "300-400", "3-4", "Flowering & Pod fill"),
    water("blackgram", "300-400", "3-4", "Flowering"),
    water("lentil", "250-350", "2-3", "Flowering & Pod fill"),
    water("pomegranate", "500-800", "6-8", "Fruit development"),
    water("watermelon", "400-600", "5-6", "Fruit expansion"),
    water("muskmelon", "400-500", "5-6", "Fruit development"),
];

const DEFAULT_WATER: WaterRequirement = water("default", "400-600", "5-8", "Flowering");

/// Water guidance shown next to a recommended crop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterInfo {
    pub crop: String,
    pub mm: String,
    pub cycles: String,
    pub stage: String,
    /// `dataset` when `mm` comes from the crop dataset average, else `fallback`
    pub source: &'static str,
}

pub fn water_requirement(crop: &str) -> Option<&'static WaterRequirement> {
    let key = normalize_crop_key(crop);
    WATER_REQUIREMENT.iter().find(|w| w.crop == key)
}

/// Water info for a crop, preferring a dataset average for the seasonal total
///
/// A dataset figure carries no irrigation count, so `cycles` is `-` then.
pub fn get_water_info(crop: &str, dataset_avg_mm: Option<f64>) -> WaterInfo {
    let entry = water_requirement(crop).unwrap_or(&DEFAULT_WATER);

    match dataset_avg_mm.filter(|mm| mm.is_finite() && *mm > 0.0) {
        Some(mm) => WaterInfo {
            crop: crop.to_string(),
            mm: format!("{:.0}", mm),
            cycles: "-".to_string(),
            stage: entry.stage.to_string(),
            source: "dataset",
        },
        None => WaterInfo {
            crop: crop.to_string(),
            mm: entry.mm.to_string(),
            cycles: entry.cycles.to_string(),
            stage: entry.stage.to_string(),
            source: "fallback",
        },
    }
}

// ============================================================================
// Market fallback prices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPrice {
    pub crop: &'static str,
    /// data.gov.in commodity name
    pub commodity: &'static str,
    /// ₹ per quintal
    pub price: f64,
    pub trend: &'static str,
    pub demand: &'static str,
    pub source: &'static str,
}

const fn price(
    crop: &'static str,
    commodity: &'static str,
    price: f64,
    trend: &'static str,
    demand: &'static str,
    source: &'static str,
) -> FallbackPrice {
    FallbackPrice { crop, commodity, price, trend, demand, source }
}

static FALLBACK_PRICES: &[FallbackPrice] = &[
    price("rice", "Rice", 2183.0, "Stable", "High", "MSP 2024-25"),
    price("wheat", "Wheat", 2275.0, "Stable", "High", "MSP 2024-25"),
    price("maize", "Maize", 2090.0, "Rising", "Moderate", "MSP 2024-25"),
    price("cotton", "Cotton", 7020.0, "Rising", "High", "MSP 2024-25"),
    price("groundnut", "Groundnut", 6377.0, "Rising", "High", "MSP 2024-25"),
    price("sugarcane", "Sugarcane", 315.0, "Stable", "High", "FRP 2024-25"),
    price("banana", "Banana", 1800.0, "Rising", "High", "Market Avg"),
    price("apple", "Apple", 8500.0, "Seasonal", "Moderate", "Market Avg"),
    price("mango", "Mango", 4500.0, "Seasonal", "High", "Market Avg"),
    price("grapes", "Grapes", 4200.0, "Rising", "Moderate", "Market Avg"),
    price("coffee", "Coffee", 9500.0, "Rising", "High", "Market Avg"),
    price("jute", "Jute", 5050.0, "Stable", "Moderate", "MSP 2024-25"),
    price("coconut", "Coconut", 2800.0, "Stable", "High", "Market Avg"),
    price("papaya", "Papaya", 2000.0, "Rising", "Moderate", "Market Avg"),
    price("orange", "Orange", 3500.0, "Stable", "High", "Market Avg"),
    price("chickpea", "Bengal Gram(Gram)", 5440.0, "Rising", "High", "MSP 2024-25"),
    price("kidneybeans", "Rajma", 6800.0, "Stable", "Moderate", "Market Avg"),
    price("pigeonpeas", "Arhar (Tur/Red Gram)", 7000.0, "Rising", "High", "MSP 2024-25"),
    price("mothbeans", "Moth", 5650.0, "Stable", "Moderate", "Market Avg"),
    price("mungbean", "Green Gram (Moong)", 8558.0, "Rising", "High", "MSP 2024-25"),
    price("blackgram", "Black Gram (Urd Beans)", 6950.0, "Rising", "High", "MSP 2024-25"),
    price("lentil", "Masur Dal", 6425.0, "Stable", "High", "MSP 2024-25"),
    price("pomegranate", "Pomegranate", 8500.0, "Rising", "Moderate", "Market Avg"),
    price("watermelon", "Watermelon", 1500.0, "Seasonal", "High", "Market Avg"),
    price("muskmelon", "Muskmelon", 2200.0, "Seasonal", "Moderate", "Market Avg"),
];

/// Used for crops missing from the fallback table
pub const UNKNOWN_CROP_PRICE: FallbackPrice = price("", "", 3000.0, "Stable", "Moderate", "Estimated");

pub fn fallback_price(crop: &str) -> Option<&'static FallbackPrice> {
    let key = crop.trim().to_lowercase();
    FALLBACK_PRICES.iter().find(|p| p.crop == key)
}

/// data.gov.in commodity name for a crop key
pub fn commodity_for_crop(crop: &str) -> Option<&'static str> {
    fallback_price(crop).map(|p| p.commodity)
}

/// Reverse mapping, falling back to the lowercased commodity
pub fn crop_for_commodity(commodity: &str) -> String {
    FALLBACK_PRICES
        .iter()
        .find(|p| p.commodity == commodity)
        .map(|p| p.crop.to_string())
        .unwrap_or_else(|| commodity.to_lowercase())
}

/// Crops with fallback prices in table order
pub fn priced_crops() -> impl Iterator<Item = &'static str> {
    FALLBACK_PRICES.iter().map(|p| p.crop)
}
