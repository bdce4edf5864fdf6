//! Weather Lookup
//!
//! Current conditions from OpenWeather (metric units), cached per location
//! for 30 minutes. A snapshot can overwrite the climate fields of a soil
//! sample before recommendation.

use chrono::{DateTime, TimeZone, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::data::SoilSample;

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const PROVIDER: &str = "openweather";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("OPENWEATHER_API_KEY is not configured")]
    MissingApiKey,

    #[error("Location must be provided for weather lookup")]
    EmptyLocation,

    #[error("OpenWeather request failed: {0}")]
    Request(String),

    #[error("OpenWeather response missing fields: {0}")]
    MissingFields(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub rainfall_mm: f64,
    pub provider: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Replace the sample's temperature, humidity and rainfall with observed values
    pub fn apply_to(&self, sample: &mut SoilSample) {
        sample.temperature = self.temperature_c;
        sample.humidity = self.humidity_pct;
        sample.rainfall = self.rainfall_mm;
    }

    /// Normalise an OpenWeather current-weather payload
    ///
    /// Rainfall prefers `rain.1h`, then `rain.3h`, else 0.
    pub fn from_openweather(location: &str, payload: &Value) -> Result<Self, WeatherError> {
        let main = payload
            .get("main")
            .filter(|m| m.is_object())
            .ok_or_else(|| WeatherError::MissingFields("main".to_string()))?;

        let rain = payload.get("rain");
        let rain_value = |window: &str| rain.and_then(|r| r.get(window)).and_then(Value::as_f64);
        let rainfall = rain_value("1h").filter(|v| *v != 0.0).or_else(|| rain_value("3h")).unwrap_or(0.0);

        let dt = payload.get("dt").and_then(Value::as_i64).unwrap_or(0);
        let observed_at = Utc
            .timestamp_opt(dt, 0)
            .single()
            .ok_or_else(|| WeatherError::MissingFields(format!("invalid dt {}", dt)))?;

        Ok(Self {
            location: location.to_string(),
            temperature_c: main.get("temp").and_then(Value::as_f64).unwrap_or(0.0),
            humidity_pct: main.get("humidity").and_then(Value::as_f64).unwrap_or(0.0),
            rainfall_mm: rainfall,
            provider: PROVIDER.to_string(),
            observed_at,
        })
    }
}

#[derive(Clone)]
pub struct WeatherService {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    cache: Cache<String, WeatherSnapshot>,
}

impl WeatherService {
    pub fn new(api_key: Option<String>, ttl: Duration) -> Self {
        Self::with_endpoint(api_key, ttl, OPENWEATHER_URL)
    }

    pub fn with_endpoint(api_key: Option<String>, ttl: Duration, endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: endpoint.to_string(),
            cache: Cache::builder().max_capacity(1_000).time_to_live(ttl).build(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn cache_key(location: &str) -> String {
        format!("{}:{}", PROVIDER, location.trim().to_lowercase())
    }

    pub async fn get_weather_snapshot(&self, location: &str, use_cache: bool) -> Result<WeatherSnapshot, WeatherError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(WeatherError::EmptyLocation);
        }
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;

        let key = Self::cache_key(location);
        if use_cache {
            if let Some(cached) = self.cache.get(&key).await {
                debug!("Cache hit for weather {}", key);
                return Ok(cached);
            }
        }

        let snapshot = self.fetch_openweather(location, api_key).await?;
        self.cache.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn fetch_openweather(&self, location: &str, api_key: &str) -> Result<WeatherSnapshot, WeatherError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", location), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        WeatherSnapshot::from_openweather(location, &payload)
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload_prefers_hourly_rain() {
        let payload = json!({
            "main": {"temp": 31.5, "humidity": 70},
            "rain": {"1h": 2.5, "3h": 6.0},
            "dt": 1_700_000_000
        });
        let snapshot = WeatherSnapshot::from_openweather("Chennai", &payload).unwrap();

        assert_eq!(snapshot.temperature_c, 31.5);
        assert_eq!(snapshot.humidity_pct, 70.0);
        assert_eq!(snapshot.rainfall_mm, 2.5);
        assert_eq!(snapshot.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_payload_rain_fallbacks() {
        let three_hour = json!({"main": {"temp": 20.0}, "rain": {"3h": 4.0}});
        assert_eq!(WeatherSnapshot::from_openweather("x", &three_hour).unwrap().rainfall_mm, 4.0);

        let dry = json!({"main": {"temp": 20.0}});
        assert_eq!(WeatherSnapshot::from_openweather("x", &dry).unwrap().rainfall_mm, 0.0);

        let broken = json!({"weather": []});
        assert!(matches!(
            WeatherSnapshot::from_openweather("x", &broken),
            Err(WeatherError::MissingFields(_))
        ));
    }

    #[test]
    fn test_apply_to_overwrites_climate_only() {
        let mut sample = SoilSample::from_features([90.0, 42.0, 43.0, 20.0, 80.0, 6.5, 200.0], None);
        let snapshot = WeatherSnapshot::from_openweather("Pune", &json!({"main": {"temp": 33.0, "humidity": 40}})).unwrap();
        snapshot.apply_to(&mut sample);

        assert_eq!(sample.temperature, 33.0);
        assert_eq!(sample.humidity, 40.0);
        assert_eq!(sample.rainfall, 0.0);
        assert_eq!(sample.n, 90.0);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let unconfigured = WeatherService::new(None, Duration::from_secs(60));
        assert!(matches!(
            unconfigured.get_weather_snapshot("Delhi", true).await,
            Err(WeatherError::MissingApiKey)
        ));
        assert!(matches!(
            unconfigured.get_weather_snapshot("   ", true).await,
            Err(WeatherError::EmptyLocation)
        ));

        let offline = WeatherService::with_endpoint(Some("key".to_string()), Duration::from_secs(60), "http://127.0.0.1:9/weather");
        assert!(matches!(
            offline.get_weather_snapshot("Delhi", false).await,
            Err(WeatherError::Request(_))
        ));
    }
}
