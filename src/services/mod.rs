//! HTTP-backed services
//!
//! - `market`: data.gov.in mandi prices with MSP fallback
//! - `weather`: OpenWeather current conditions
//!
//! Both keep a moka TTL cache so dashboard reloads do not hammer the APIs.

pub mod market;
pub mod weather;

pub use market::{MarketPrice, MarketPriceService};
pub use weather::{WeatherError, WeatherService, WeatherSnapshot};
