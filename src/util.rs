//! Array and math helpers shared across the crate.

use rand::seq::SliceRandom;
use rand::Rng;

pub fn calc_sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn calc_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    calc_sum(values) / values.len() as f64
}

pub fn calc_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn calc_minimum(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn calc_maximum(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// First index in a non-decreasing array whose value is `>= target`, or
/// `sorted.len()` when every value is below the target.
pub fn binary_search(sorted: &[f64], target: f64) -> usize {
    let mut low = 0;
    let mut high = sorted.len();
    while low < high {
        let mid = (low + high) / 2;
        if sorted[mid] >= target {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    low
}

/// Approximation of `exp(x)` by eight-fold squaring of `1 + x / 256`.
///
/// Clamps to 0 below -256, where the base would turn negative.
pub fn fast_exp(x: f64) -> f64 {
    if x < -256.0 {
        return 0.0;
    }
    let mut y = 1.0 + x / 256.0;
    y *= y;
    y *= y;
    y *= y;
    y *= y;
    y *= y;
    y *= y;
    y *= y;
    y *= y;
    y
}

/// `base` raised to an integer exponent by repeated squaring.
pub fn fast_pow(base: f64, exponent: i32) -> f64 {
    if exponent < 0 {
        return 1.0 / fast_pow(base, -exponent);
    }
    let mut result = 1.0;
    let mut base = base;
    let mut exponent = exponent;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result *= base;
        }
        base *= base;
        exponent >>= 1;
    }
    result
}

pub fn random_permutation<R: Rng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(rng);
    permutation
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_calc_median() {
        assert_relative_eq!(calc_median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(calc_median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_relative_eq!(calc_median(&[5.0]), 5.0);
    }

    #[test]
    fn test_calc_extremes() {
        let values = [2.0, -1.0, 7.5, 0.0];
        assert_relative_eq!(calc_minimum(&values), -1.0);
        assert_relative_eq!(calc_maximum(&values), 7.5);
        assert_relative_eq!(calc_sum(&values), 8.5);
        assert_relative_eq!(calc_average(&values), 2.125);
    }

    #[test]
    fn test_binary_search_first_at_least() {
        let cumulative = [0.0, 0.0, 1.5, 2.5, 2.5, 4.0];
        assert_eq!(binary_search(&cumulative, 0.0), 0);
        assert_eq!(binary_search(&cumulative, 1.0), 2);
        assert_eq!(binary_search(&cumulative, 2.5), 3);
        assert_eq!(binary_search(&cumulative, 3.9), 5);
        assert_eq!(binary_search(&cumulative, 5.0), 6);
    }

    #[test]
    fn test_fast_exp_tracks_exp() {
        for &x in &[-10.0, -1.0, -0.1, 0.0, 0.1, 1.0, 5.0] {
            let relative_error = (fast_exp(x) - f64::exp(x)).abs() / f64::exp(x);
            assert!(relative_error < 0.05, "x = {x}: error {relative_error}");
        }
        assert_eq!(fast_exp(-300.0), 0.0);
    }

    #[test]
    fn test_fast_pow() {
        assert_relative_eq!(fast_pow(2.0, 10), 1024.0);
        assert_relative_eq!(fast_pow(3.0, 0), 1.0);
        assert_relative_eq!(fast_pow(2.0, -2), 0.25);
        assert_relative_eq!(fast_pow(1.5, 3), 3.375);
    }

    #[test]
    fn test_random_permutation_is_permutation() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut permutation = random_permutation(100, &mut rng);
        permutation.sort_unstable();
        assert_eq!(permutation, (0..100).collect::<Vec<_>>());
    }
}
