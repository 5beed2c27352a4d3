//! Numeric helpers used to stabilize noisy landmark coordinates.

use nalgebra::{Vector2, Vector3};
use crate::utils::coordinate::NormalizedLandmark;

/// Default IQR fence multiplier (Tukey fences).
pub const DEFAULT_IQR_MULTIPLIER: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f32,
    pub median: f32,
    pub q3: f32,
}

fn sorted(values: &[f32]) -> Vec<f32> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn median_of_sorted(sorted: &[f32]) -> f32 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let mid = n / 2;
            if n % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
    }
}

/// median returns the middle value of the input, or the mean of the two
/// central values for even lengths. Empty input yields 0.
pub fn median(values: &[f32]) -> f32 {
    median_of_sorted(&sorted(values))
}

/// quartiles computes Q1, median and Q3 with the rank based split:
/// Q1 is the median of `sorted[..n/2]`, Q3 the median of `sorted[ceil(n/2)..]`.
/// No interpolation between ranks.
pub fn quartiles(values: &[f32]) -> Quartiles {
    if values.is_empty() {
        return Quartiles { q1: 0.0, median: 0.0, q3: 0.0 };
    }

    let sorted = sorted(values);
    let n = sorted.len();
    let lower_half = &sorted[..n / 2];
    let upper_half = &sorted[(n + 1) / 2..];

    Quartiles {
        q1: median_of_sorted(lower_half),
        median: median_of_sorted(&sorted),
        q3: median_of_sorted(upper_half),
    }
}

/// remove_outliers_iqr keeps the values inside `[Q1 - k*IQR, Q3 + k*IQR]`.
///
/// Fewer than four values, or a zero IQR, return the input unchanged.
///
/// # Arguments
/// * `values` - &[f32]
/// * `multiplier` - the fence multiplier `k`
///
/// # Returns
/// * `Vec<f32>` in input order
pub fn remove_outliers_iqr(values: &[f32], multiplier: f32) -> Vec<f32> {
    if values.len() < 4 {
        return values.to_vec();
    }

    let Quartiles { q1, q3, .. } = quartiles(values);
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return values.to_vec();
    }

    let lower_bound = q1 - multiplier * iqr;
    let upper_bound = q3 + multiplier * iqr;

    values
        .iter()
        .copied()
        .filter(|v| *v >= lower_bound && *v <= upper_bound)
        .collect()
}

/// median_with_iqr is the median after IQR outlier removal. This is the
/// reducer used to stabilize each landmark coordinate.
pub fn median_with_iqr(values: &[f32], multiplier: f32) -> f32 {
    match values.len() {
        0 => 0.0,
        1 => values[0],
        _ => {
            let filtered = remove_outliers_iqr(values, multiplier);
            if filtered.is_empty() {
                return median(values);
            }
            median(&filtered)
        }
    }
}

pub fn distance_2d(a: &NormalizedLandmark, b: &NormalizedLandmark) -> f32 {
    (Vector2::new(b.x, b.y) - Vector2::new(a.x, a.y)).norm()
}

pub fn distance_3d(a: &NormalizedLandmark, b: &NormalizedLandmark) -> f32 {
    (Vector3::new(b.x, b.y, b.z) - Vector3::new(a.x, a.y, a.z)).norm()
}

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population standard deviation (divides by N).
pub fn standard_deviation(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let squared_diffs: Vec<f32> = values.iter().map(|v| (v - avg).powi(2)).collect();
    mean(&squared_diffs).sqrt()
}

/// calculate_variability_confidence maps spread to a 0..=100 score:
/// `max(0, 100 - 1000 * stddev / expected_range)`, rounded.
///
/// This is a hand tuned decay, not a confidence interval. A standard deviation
/// of 10% of the expected range already drives the score to 0.
pub fn calculate_variability_confidence(values: &[f32], expected_range: f32) -> u8 {
    if values.len() < 2 {
        return 100;
    }
    let normalized_std_dev = standard_deviation(values) / expected_range;
    let confidence = (100.0 - normalized_std_dev * 1000.0).max(0.0);
    if confidence.is_nan() {
        return 0;
    }
    confidence.round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use crate::utils::coordinate::NormalizedLandmark;
    use crate::utils::statistics::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[7.5]), 7.5);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn test_quartiles_rank_based() {
        // odd length: the middle element belongs to neither half
        let q = quartiles(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(q, Quartiles { q1: 2.0, median: 4.0, q3: 6.0 });

        let q = quartiles(&[8.0, 1.0, 4.0, 2.0, 6.0, 3.0, 7.0, 5.0]);
        assert_eq!(q, Quartiles { q1: 2.5, median: 4.5, q3: 6.5 });

        assert_eq!(quartiles(&[]), Quartiles { q1: 0.0, median: 0.0, q3: 0.0 });
    }

    #[test]
    fn test_remove_outliers_small_input_is_identity() {
        let values = [100.0, 1.0, -50.0];
        assert_eq!(remove_outliers_iqr(&values, DEFAULT_IQR_MULTIPLIER), values.to_vec());
    }

    #[test]
    fn test_remove_outliers_zero_iqr_keeps_everything() {
        let values = [2.0, 2.0, 2.0, 2.0, 2.0, 90.0];
        assert_eq!(remove_outliers_iqr(&values, DEFAULT_IQR_MULTIPLIER), values.to_vec());
    }

    #[test]
    fn test_remove_outliers_drops_far_values() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 100.0];
        // Q1 = 2.5, Q3 = 6.5, IQR = 4 -> fences [-3.5, 12.5]
        let filtered = remove_outliers_iqr(&values, DEFAULT_IQR_MULTIPLIER);
        assert_eq!(filtered, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_remove_outliers_bounds_are_inclusive() {
        // Q1 = 2, Q3 = 4, IQR = 2 -> fences with k = 1 are [0, 6]
        let values = [0.0, 2.0, 3.0, 3.0, 4.0, 6.0];
        assert_eq!(remove_outliers_iqr(&values, 1.0), values.to_vec());

        let values = [-0.5, 2.0, 3.0, 3.0, 4.0, 6.0];
        assert_eq!(remove_outliers_iqr(&values, 1.0), vec![2.0, 3.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_median_with_iqr() {
        assert_eq!(median_with_iqr(&[], DEFAULT_IQR_MULTIPLIER), 0.0);
        assert_eq!(median_with_iqr(&[0.3], DEFAULT_IQR_MULTIPLIER), 0.3);
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 100.0];
        assert_eq!(median_with_iqr(&values, DEFAULT_IQR_MULTIPLIER), 4.0);
    }

    #[test]
    fn test_median_with_iqr_is_stable_under_duplication() {
        let value = 0.437_21_f32;
        let values = vec![value; 25];
        assert_eq!(median_with_iqr(&values, DEFAULT_IQR_MULTIPLIER), value);
    }

    #[test]
    fn test_distances() {
        let origin = NormalizedLandmark::new(0.0, 0.0, 0.0);
        assert_eq!(distance_2d(&origin, &NormalizedLandmark::new(3.0, 4.0, 9.0)), 5.0);
        assert_eq!(distance_3d(&origin, &NormalizedLandmark::new(1.0, 2.0, 2.0)), 3.0);
    }

    #[test]
    fn test_mean_and_population_std() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(standard_deviation(&[5.0]), 0.0);
        assert_eq!(standard_deviation(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
    }

    #[test]
    fn test_variability_confidence() {
        assert_eq!(calculate_variability_confidence(&[62.0], 30.0), 100);
        assert_eq!(calculate_variability_confidence(&[62.0, 62.0, 62.0], 30.0), 100);
        // std = 1, range = 100 -> 100 - 10 = 90
        assert_eq!(calculate_variability_confidence(&[1.0, 3.0], 100.0), 90);
        // spread above 10% of range saturates at 0
        assert_eq!(calculate_variability_confidence(&[0.0, 40.0], 100.0), 0);
    }
}
