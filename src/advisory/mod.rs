//! Rule-based agronomy advisories
//!
//! - `fertilizer`: corrective inputs from NPK and pH readings
//! - `pesticide`: spray plans per diagnosed disease
//! - `soil_health`: nutrient, pH and climate tips for a full sample
//! - `weather`: crop-specific weather warnings

pub mod fertilizer;
pub mod pesticide;
pub mod soil_health;
pub mod weather;

pub use fertilizer::{recommend_fertilizers, FertilizerAdvice};
pub use pesticide::{advise_pesticide, list_supported_diseases, PesticideAdvice};
pub use soil_health::generate_soil_health_tips;
pub use weather::generate_weather_warnings;
