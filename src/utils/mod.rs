//! Utility modules shared across the advisory pipeline
//!
//! - Text: title casing, key normalisation, order-preserving dedup
//! - Stats: means, modes and the largest-remainder percentage split

pub mod text;
pub mod stats;

// Re-export commonly used helpers
pub use text::{dedup_preserving_order, normalize_crop_key, normalize_region_key, normalize_text, title_case};
pub use stats::{largest_remainder_percentages, mean, midpoint_mean, mode_str, population_std};
