//! Normal distribution helpers.
//!
//! Rejection sampling loops only terminate quickly when the accepted region
//! carries enough probability mass. These helpers let callers estimate that
//! mass up front and reject pathological parameters before drawing.

use std::f64::consts::SQRT_2;

/// Cumulative distribution function of `Normal(mean, std)` at `x`.
///
/// A zero standard deviation is treated as a point mass at `mean`.
pub fn normal_cdf(x: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return if x >= mean { 1.0 } else { 0.0 };
    }
    0.5 * libm::erfc(-(x - mean) / (std * SQRT_2))
}

/// Survival function `P(X > x)` of `Normal(mean, std)`
pub fn normal_sf(x: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return if x < mean { 1.0 } else { 0.0 };
    }
    0.5 * libm::erfc((x - mean) / (std * SQRT_2))
}

/// Probability that a draw from `Normal(mean, std)` lands in `[lower, upper]`
pub fn interval_probability(mean: f64, std: f64, lower: f64, upper: f64) -> f64 {
    if upper < lower {
        return 0.0;
    }
    if std == 0.0 {
        return if (lower..=upper).contains(&mean) { 1.0 } else { 0.0 };
    }
    let mass = if lower >= mean {
        normal_sf(lower, mean, std) - normal_sf(upper, mean, std)
    } else {
        normal_cdf(upper, mean, std) - normal_cdf(lower, mean, std)
    };
    mass.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdf_and_sf_are_complementary() {
        for x in [-3.0, -0.5, 0.0, 0.7, 2.5] {
            let total = normal_cdf(x, 0.2, 1.3) + normal_sf(x, 0.2, 1.3);
            assert!((total - 1.0).abs() < 1e-12);
        }
        // One sigma above the mean
        assert!((normal_cdf(1.0, 0.0, 1.0) - 0.841_344_75).abs() < 1e-7);
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0, 0.0, 1.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96, 0.0, 1.0) - 0.975).abs() < 1e-3);
        assert_eq!(normal_cdf(0.9, 1.0, 0.0), 0.0);
        assert_eq!(normal_cdf(1.0, 1.0, 0.0), 1.0);
    }

    #[test]
    fn test_normal_sf_keeps_tail_precision() {
        assert!((normal_sf(0.0, 0.0, 1.0) - 0.5).abs() < 1e-7);
        let tail = normal_sf(6.0, 0.0, 1.0);
        assert!(tail > 5e-10 && tail < 2e-9);
        assert_eq!(normal_sf(2.0, 1.0, 0.0), 0.0);
        assert_eq!(normal_sf(0.5, 1.0, 0.0), 1.0);
    }

    #[test]
    fn test_interval_probability() {
        // One sigma either side of the mean
        let p = interval_probability(0.5, 0.25, 0.25, 0.75);
        assert!((p - 0.6827).abs() < 1e-3);

        assert_eq!(interval_probability(0.5, 0.0, 0.1, 1.0), 1.0);
        assert_eq!(interval_probability(1.5, 0.0, 0.1, 1.0), 0.0);
        assert_eq!(interval_probability(0.5, 0.25, 1.0, 0.1), 0.0);

        // Far tail carries almost no mass
        assert!(interval_probability(0.0, 1.0, 10.0, 11.0) < 1e-12);
        assert!(interval_probability(0.0, 1.0, 6.0, 7.0) > 5e-10);
    }
}
