//! Weather Warnings
//!
//! Rainfall, temperature and humidity risks with prescriptive guidance for
//! the crop being planned. Missing readings count as 0.

use crate::data::SoilReadings;
use crate::utils::{dedup_preserving_order, title_case};

pub fn generate_weather_warnings(readings: &SoilReadings, crop: &str) -> Vec<String> {
    let rainfall = readings.rainfall.unwrap_or(0.0);
    let temperature = readings.temperature.unwrap_or(0.0);
    let humidity = readings.humidity.unwrap_or(0.0);

    let mut warnings = Vec::new();

    if rainfall < 80.0 {
        warnings.push(format!(
            "Rainfall outlook is low; prefer drought-tolerant crops or secure irrigation before planting {}.",
            title_case(crop)
        ));
        warnings.push("Delay puddled rice planting; adopt direct-seeded rice or millets instead.".to_string());
    } else if rainfall > 260.0 {
        warnings.push(
            "Excess rainfall expected; ensure drainage and consider short-duration varieties to escape waterlogging."
                .to_string(),
        );
    }

    if temperature > 35.0 {
        warnings.push("High temperature stress likely; use mulching and evening irrigation to reduce canopy heat.".to_string());
    } else if temperature < 15.0 {
        warnings.push("Cool spell forecast; raise seedlings in protected nursery before transplanting.".to_string());
    }

    if humidity > 85.0 {
        warnings.push("Very high humidity may trigger fungal outbreaks; schedule preventive fungicide sprays.".to_string());
    } else if humidity < 30.0 {
        warnings.push(
            "Dry air can cause rapid evapotranspiration; adopt antitranspirant sprays or shade nets for tender crops."
                .to_string(),
        );
    }

    if warnings.is_empty() {
        warnings.push("Weather outlook is favourable; maintain routine scouting and irrigation schedule.".to_string());
    }

    dedup_preserving_order(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(rainfall: f64, temperature: f64, humidity: f64) -> SoilReadings {
        SoilReadings {
            rainfall: Some(rainfall),
            temperature: Some(temperature),
            humidity: Some(humidity),
            ..SoilReadings::default()
        }
    }

    #[test]
    fn test_favourable_outlook() {
        let warnings = generate_weather_warnings(&readings(150.0, 25.0, 60.0), "rice");
        assert_eq!(
            warnings,
            vec!["Weather outlook is favourable; maintain routine scouting and irrigation schedule."]
        );
    }

    #[test]
    fn test_dry_spell_adds_two_warnings() {
        let warnings = generate_weather_warnings(&readings(50.0, 25.0, 60.0), "black gram");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].ends_with("before planting Black Gram."));
        assert!(warnings[1].starts_with("Delay puddled rice planting"));
    }

    #[test]
    fn test_missing_readings_default_to_zero() {
        let warnings = generate_weather_warnings(&SoilReadings::default(), "maize");
        // rainfall 0, temperature 0, humidity 0
        assert_eq!(warnings.len(), 4);
        assert!(warnings[2].starts_with("Cool spell"));
        assert!(warnings[3].starts_with("Dry air"));
    }

    #[test]
    fn test_wet_hot_humid() {
        let warnings = generate_weather_warnings(&readings(300.0, 38.0, 90.0), "rice");
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].starts_with("Excess rainfall"));
    }
}
