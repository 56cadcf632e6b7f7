//! Percentile clipping and rescaling of intensity data to 8 bits.

use ndarray::ArrayD;

/// Percentile of `sorted` using linear interpolation between closest ranks.
///
/// `sorted` must be non-empty and ascending.
fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// The `p_low`-th and `p_high`-th percentiles of the non-NaN elements.
///
/// `None` when there are no such elements.
pub fn percentile_bounds(arr: &ArrayD<f64>, p_low: f64, p_high: f64) -> Option<(f64, f64)> {
    let mut sorted: Vec<f64> = arr.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable_by(f64::total_cmp);
    Some((
        percentile_of_sorted(&sorted, p_low),
        percentile_of_sorted(&sorted, p_high),
    ))
}

/// Clip `arr` to its `[p_low, p_high]` percentile range and rescale to `[0, 255]`.
///
/// Values are truncated toward zero when converted to `u8`. A flat input
/// rescales with a denominator of 1 and maps to all zeros. NaN elements map
/// to 0, and an input with no finite percentiles maps to all zeros.
pub fn normalize_to_u8(arr: &ArrayD<f64>, p_low: f64, p_high: f64) -> ArrayD<u8> {
    let Some((lo, hi)) = percentile_bounds(arr, p_low, p_high) else {
        return ArrayD::zeros(arr.raw_dim());
    };

    // f64::max/min return the other operand for NaN, so NaN clips to `lo`
    let clipped = arr.mapv(|v| v.max(lo).min(hi));
    let min = clipped.iter().copied().fold(f64::INFINITY, f64::min);
    let max = clipped.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let denom = if max != min && (max - min).is_finite() {
        max - min
    } else {
        1.0
    };

    // `as u8` saturates and maps NaN to 0
    clipped.mapv(|v| ((v - min) / denom * 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2, IxDyn};

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_of_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_of_sorted(&sorted, 50.0), 3.0);
        assert_eq!(percentile_of_sorted(&sorted, 100.0), 5.0);
        // rank 0.2 * 4 = 0.8 -> 1 + 0.8
        assert!((percentile_of_sorted(&sorted, 20.0) - 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_bounds_unsorted_input() {
        let arr = arr1(&[10.0, 0.0, 5.0]).into_dyn();
        assert_eq!(percentile_bounds(&arr, 0.0, 100.0), Some((0.0, 10.0)));
        assert_eq!(percentile_bounds(&ArrayD::<f64>::zeros(IxDyn(&[0])), 20.0, 80.0), None);
    }

    #[test]
    fn test_constant_input_maps_to_zero() {
        let arr = Array2::from_elem((8, 8), 1234.5).into_dyn();
        let out = normalize_to_u8(&arr, 20.0, 80.0);
        assert_eq!(out.shape(), &[8, 8]);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_full_range_rescale() {
        let arr = arr1(&[0.0, 50.0, 100.0]).into_dyn();
        let out = normalize_to_u8(&arr, 0.0, 100.0);
        // 50 / 100 * 255 = 127.5 truncates to 127
        assert_eq!(out.as_slice().unwrap(), &[0, 127, 255]);
    }

    #[test]
    fn test_outliers_are_clipped() {
        let mut values: Vec<f64> = (0..=100).map(f64::from).collect();
        values[0] = -1.0e9;
        values[100] = 1.0e9;
        let arr = ArrayD::from_shape_vec(IxDyn(&[101]), values).unwrap();

        let out = normalize_to_u8(&arr, 20.0, 80.0);
        // everything at or below the 20th percentile is 0, at or above the 80th is 255
        assert_eq!(out[[0]], 0);
        assert_eq!(out[[20]], 0);
        assert_eq!(out[[80]], 255);
        assert_eq!(out[[100]], 255);
        assert!(out[[50]] > 100 && out[[50]] < 155);
    }

    #[test]
    fn test_output_in_range_and_same_shape() {
        let arr = ArrayD::from_shape_fn(IxDyn(&[5, 7, 3]), |idx| {
            (idx[0] * 31 + idx[1] * 7 + idx[2]) as f64 * -3.25
        });
        for (p_low, p_high) in [(0.0, 100.0), (20.0, 80.0), (1.0, 2.0), (49.0, 51.0)] {
            let out = normalize_to_u8(&arr, p_low, p_high);
            assert_eq!(out.shape(), arr.shape());
            let max = out.iter().copied().max().unwrap();
            let min = out.iter().copied().min().unwrap();
            assert_eq!(min, 0);
            assert_eq!(max, 255);
        }
    }

    #[test]
    fn test_nan_values_do_not_poison_bounds() {
        let mut values: Vec<f64> = (0..100).map(f64::from).collect();
        for v in values.iter_mut().skip(70) {
            *v = f64::NAN;
        }
        let arr = ArrayD::from_shape_vec(IxDyn(&[10, 10]), values).unwrap();

        let (lo, hi) = percentile_bounds(&arr, 20.0, 80.0).unwrap();
        assert!(lo.is_finite() && hi.is_finite());
        assert!(lo < hi);

        let out = normalize_to_u8(&arr, 20.0, 80.0);
        assert_eq!(out.shape(), &[10, 10]);
        assert_eq!(out[[0, 0]], 0);
        assert_eq!(out[[6, 9]], 255);
        // NaN pixels clip to the low bound
        assert_eq!(out[[9, 9]], 0);
    }

    #[test]
    fn test_all_nan_maps_to_zero() {
        let arr = ArrayD::from_elem(IxDyn(&[4, 4]), f64::NAN);
        assert_eq!(percentile_bounds(&arr, 20.0, 80.0), None);
        let out = normalize_to_u8(&arr, 20.0, 80.0);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_infinite_values_stay_in_range() {
        let arr = arr1(&[f64::NEG_INFINITY, 1.0, 2.0, f64::INFINITY]).into_dyn();
        let out = normalize_to_u8(&arr, 0.0, 100.0);
        assert_eq!(out.shape(), &[4]);
    }

    #[test]
    fn test_empty_input() {
        let arr = ArrayD::<f64>::zeros(IxDyn(&[0, 4]));
        let out = normalize_to_u8(&arr, 20.0, 80.0);
        assert_eq!(out.shape(), &[0, 4]);
    }
}
