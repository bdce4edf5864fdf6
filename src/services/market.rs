//! Market Prices
//!
//! Live mandi prices from the data.gov.in "Daily Price of Various
//! Commodities" resource, averaged across the returned markets. Trend compares
//! against the MSP/market fallback; demand reads the min-max spread. Live
//! answers are cached per `crop:state`; fallbacks are never cached so the
//! next request retries the API.

use chrono::Local;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::lookup::{commodity_for_crop, crop_for_commodity, fallback_price, priced_crops, UNKNOWN_CROP_PRICE};
use crate::utils::{dedup_preserving_order, mean};

pub const DATA_GOV_API_BASE: &str = "https://api.data.gov.in/resource";
pub const COMMODITY_PRICE_RESOURCE_ID: &str = "9ef84268-d588-465a-a308-a864a43d0070";

const RECORD_LIMIT: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    /// ₹ per quintal
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    pub trend: String,
    pub demand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub last_updated: String,
    pub source: String,
    pub is_live: bool,
}

impl MarketPrice {
    /// Static MSP/market rate for a crop (₹3000 "Estimated" when unknown)
    pub fn fallback(crop: &str) -> Self {
        let entry = fallback_price(crop).unwrap_or(&UNKNOWN_CROP_PRICE);
        Self {
            price: entry.price,
            min_price: None,
            max_price: None,
            trend: entry.trend.to_string(),
            demand: entry.demand.to_string(),
            market: None,
            state: None,
            last_updated: "Static MSP/Market Rates".to_string(),
            source: entry.source.to_string(),
            is_live: false,
        }
    }
}

/// Rising above +5 %, Falling below −5 % of the reference price
pub fn determine_trend(current: f64, reference: f64) -> &'static str {
    if current > reference * 1.05 {
        "Rising"
    } else if current < reference * 0.95 {
        "Falling"
    } else {
        "Stable"
    }
}

/// Narrow spread means steady buying; a wide one signals volatility
pub fn determine_demand(modal: f64, min: f64, max: f64) -> &'static str {
    if modal > 0.0 {
        let spread = (max - min) / modal;
        if spread < 0.15 {
            return "High";
        }
        if spread > 0.30 {
            return "Low";
        }
    }
    "Moderate"
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Numeric field that may arrive as a JSON number or a numeric string
fn record_number(record: &Value, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn record_text(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Modal, min and max price of one record
///
/// An absent field reads as 0. A field that is present but not a number
/// rejects the whole record.
fn record_prices(record: &Value) -> Option<[f64; 3]> {
    let field = |name: &str| match record.get(name) {
        None => Some(0.0),
        Some(_) => record_number(record, name),
    };
    Some([field("modal_price")?, field("min_price")?, field("max_price")?])
}

/// Average the API records for one commodity; `None` without a positive modal price
pub fn summarize_records(commodity: &str, records: &[Value]) -> Option<MarketPrice> {
    let parsed: Vec<(&Value, [f64; 3])> = records
        .iter()
        .filter_map(|r| record_prices(r).map(|prices| (r, prices)))
        .collect();
    let positive = |idx: usize| -> Vec<f64> {
        parsed
            .iter()
            .map(|(_, prices)| prices[idx])
            .filter(|v| *v > 0.0)
            .collect()
    };

    let avg_price = mean(&positive(0))?;
    let avg_min = mean(&positive(1));
    let avg_max = mean(&positive(2));

    let crop = crop_for_commodity(commodity);
    let reference = fallback_price(&crop).map_or(avg_price, |p| p.price);

    let markets = dedup_preserving_order(parsed.iter().take(3).filter_map(|(r, _)| record_text(r, "market")));
    let states = dedup_preserving_order(parsed.iter().take(2).filter_map(|(r, _)| record_text(r, "state")));

    Some(MarketPrice {
        price: round2(avg_price),
        min_price: avg_min.map(round2),
        max_price: avg_max.map(round2),
        trend: determine_trend(avg_price, reference).to_string(),
        demand: determine_demand(
            avg_price,
            avg_min.unwrap_or(avg_price * 0.9),
            avg_max.unwrap_or(avg_price * 1.1),
        )
        .to_string(),
        market: Some(markets.join(", ")),
        state: Some(states.join(", ")),
        last_updated: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        source: "data.gov.in (Live)".to_string(),
        is_live: true,
    })
}

#[derive(Clone)]
pub struct MarketPriceService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    cache: Cache<String, MarketPrice>,
}

impl MarketPriceService {
    pub fn new(api_key: &str, ttl: Duration) -> Self {
        Self::with_base_url(api_key, ttl, DATA_GOV_API_BASE)
    }

    pub fn with_base_url(api_key: &str, ttl: Duration, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Cache::builder().max_capacity(1_000).time_to_live(ttl).build(),
        }
    }

    /// Live price when available, otherwise the static fallback
    pub async fn get_market_price(&self, crop: &str, state: Option<&str>) -> MarketPrice {
        let crop_key = crop.trim().to_lowercase();
        let state = state.map(str::trim).unwrap_or("");
        let cache_key = format!("{}:{}", crop_key, state);

        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!("Cache hit for market price {}", cache_key);
            return cached;
        }

        if let Some(commodity) = commodity_for_crop(&crop_key) {
            match self.fetch_live_prices(commodity, state).await {
                Ok(Some(live)) => {
                    self.cache.insert(cache_key, live.clone()).await;
                    return live;
                }
                Ok(None) => debug!(commodity, "No usable live price records"),
                Err(e) => warn!(commodity, error = %e, "Failed to fetch live prices"),
            }
        }

        MarketPrice::fallback(&crop_key)
    }

    async fn fetch_live_prices(&self, commodity: &str, state: &str) -> anyhow::Result<Option<MarketPrice>> {
        let url = format!("{}/{}", self.base_url, COMMODITY_PRICE_RESOURCE_ID);
        let mut params = vec![
            ("api-key", self.api_key.clone()),
            ("format", "json".to_string()),
            ("limit", RECORD_LIMIT.to_string()),
            ("filters[commodity]", commodity.to_string()),
        ];
        if !state.is_empty() {
            params.push(("filters[state]", state.to_string()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let payload: Value = response.json().await?;
        let records = payload
            .get("records")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        Ok(summarize_records(commodity, records))
    }

    /// Prices for every crop in the fallback table, keyed by crop
    pub async fn get_all_crop_prices(&self) -> BTreeMap<String, MarketPrice> {
        let mut prices = BTreeMap::new();
        for crop in priced_crops() {
            prices.insert(crop.to_string(), self.get_market_price(crop, None).await);
        }
        prices
    }

    /// Drop cached prices, then prefetch every crop
    pub async fn refresh_price_cache(&self) {
        self.cache.invalidate_all();
        let prices = self.get_all_crop_prices().await;
        let live = prices.values().filter(|p| p.is_live).count();
        info!(crops = prices.len(), live, "Refreshed market price cache");
    }
}
