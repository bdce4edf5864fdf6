//! Small statistics helpers
//!
//! Column summaries for the CSV loaders and the probability summary.

use std::collections::HashMap;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0)
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Mean of per-row midpoints between a base and optional max column
///
/// Rows with a max value use `(base + max) / 2`, rows without fall back to
/// `base`; rows with no base are skipped.
pub fn midpoint_mean(base: &[Option<f64>], high: Option<&[Option<f64>]>) -> Option<f64> {
    let merged: Vec<f64> = base
        .iter()
        .enumerate()
        .filter_map(|(idx, b)| {
            let b = (*b)?;
            let h = high.and_then(|h| h.get(idx).copied().flatten());
            Some(match h {
                Some(h) => (b + h) / 2.0,
                None => b,
            })
        })
        .collect();

    mean(&merged)
}

/// Most frequent non-blank string; ties go to the value seen first
pub fn mode_str<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, value) in values.into_iter().enumerate() {
        let key = value.trim();
        if key.is_empty() {
            continue;
        }
        let entry = counts.entry(key).or_insert((0, order));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(k, _)| k.to_string())
}

/// Split 100% across scores using the largest-remainder method
///
/// Scores are normalised by their sum (equal shares when the sum is not
/// positive), floored, then the leftover points go to the largest fractional
/// parts. The result always sums to 100 for a non-empty input.
pub fn largest_remainder_percentages(scores: &[f64]) -> Vec<u32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let total: f64 = scores.iter().sum();
    let n = scores.len() as f64;
    let scaled: Vec<f64> = scores
        .iter()
        .map(|s| if total <= 0.0 { 100.0 / n } else { s / total * 100.0 })
        .collect();

    let mut floored: Vec<u32> = scaled.iter().map(|v| v.floor() as u32).collect();
    let assigned: u32 = floored.iter().sum();
    let remainder = 100u32.saturating_sub(assigned) as usize;

    let mut order: Vec<usize> = (0..scaled.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = scaled[a] - scaled[a].floor();
        let fb = scaled[b] - scaled[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
    });

    for &idx in order.iter().take(remainder) {
        floored[idx] += 1;
    }

    floored
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
        assert_relative_eq!(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_midpoint_mean() {
        let base = [Some(10.0), Some(20.0), None];
        let high = [Some(30.0), None, Some(100.0)];
        // (10+30)/2 = 20, 20 → mean 20
        assert_relative_eq!(midpoint_mean(&base, Some(&high)).unwrap(), 20.0);
        assert_relative_eq!(midpoint_mean(&base, None).unwrap(), 15.0);
        assert_eq!(midpoint_mean(&[None], None), None);
    }

    #[test]
    fn test_mode_str() {
        assert_eq!(mode_str(vec!["kharif", " rabi", "rabi ", ""]), Some("rabi".to_string()));
        assert_eq!(mode_str(vec!["a", "b"]), Some("a".to_string()));
        assert_eq!(mode_str(vec!["  "]), None);
    }

    #[test]
    fn test_largest_remainder_sums_to_100() {
        let pct = largest_remainder_percentages(&[0.5, 0.3, 0.1]);
        assert_eq!(pct.iter().sum::<u32>(), 100);
        assert_eq!(pct, vec![56, 33, 11]);

        let equal = largest_remainder_percentages(&[0.0, 0.0, 0.0]);
        assert_eq!(equal.iter().sum::<u32>(), 100);
        assert_eq!(equal, vec![34, 33, 33]);
    }
}
