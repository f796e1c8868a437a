//! Normal-approximation statistics for Bernoulli trials

/// Expected successes and failures each need to reach this before the
/// normal approximation is trusted
pub const MIN_EXPECTED_COUNT: f64 = 5.0;

/// Standard normal CDF (Abramowitz-Stegun 7.1.26, |error| < 1.5e-7)
pub fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Inverse standard normal CDF (Acklam's rational approximation)
///
/// `p` must lie strictly inside (0, 1).
pub fn normal_quantile(p: f64) -> f64 {
    let a = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239e0,
    ];
    let b = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    let c = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838e0,
        -2.549732539343734e0,
        4.374664141464968e0,
        2.938163982698783e0,
    ];
    let d = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996e0,
        3.754408661907416e0,
    ];

    let p_low = 0.02425;
    let p_high = 1.0 - p_low;

    if p < p_low {
        let q = (-2.0 * p.ln()).sqrt();
        (((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
            / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
    } else if p <= p_high {
        let q = p - 0.5;
        let r = q * q;
        (((((a[0] * r + a[1]) * r + a[2]) * r + a[3]) * r + a[4]) * r + a[5]) * q
            / (((((b[0] * r + b[1]) * r + b[2]) * r + b[3]) * r + b[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
            / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
    }
}

/// Two-sided critical value for a confidence level in (0, 1)
pub fn critical_z(confidence: f64) -> f64 {
    normal_quantile(1.0 - (1.0 - confidence) / 2.0)
}

/// Fewest trials for which the normal approximation around `expected` holds
pub fn min_trials(expected: f64) -> u64 {
    let tail = expected.min(1.0 - expected);
    if tail <= 0.0 {
        1
    } else {
        (MIN_EXPECTED_COUNT / tail).ceil() as u64
    }
}

/// Acceptance interval for the observed rate of `trials` Bernoulli draws
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcceptanceInterval {
    pub expected: f64,
    pub half_width: f64,
}

impl AcceptanceInterval {
    /// Normal interval with continuity correction `1 / (2n)`
    pub fn new(expected: f64, trials: u64, confidence: f64) -> Self {
        let n = trials.max(1) as f64;
        let std_err = (expected * (1.0 - expected) / n).sqrt();
        Self {
            expected,
            half_width: critical_z(confidence) * std_err + 0.5 / n,
        }
    }

    pub fn lower(&self) -> f64 {
        (self.expected - self.half_width).max(0.0)
    }

    pub fn upper(&self) -> f64 {
        (self.expected + self.half_width).min(1.0)
    }

    pub fn contains(&self, rate: f64) -> bool {
        (rate - self.expected).abs() <= self.half_width
    }
}

/// Smallest confidence level whose interval still accepts `rate`
///
/// 0 means the rate sits on the expectation; values near 1 mean only a
/// very wide interval would accept it.
pub fn confidence_needed(expected: f64, rate: f64, trials: u64) -> f64 {
    let n = trials.max(1) as f64;
    let deviation = ((rate - expected).abs() - 0.5 / n).max(0.0);
    let std_err = (expected * (1.0 - expected) / n).sqrt();
    if deviation == 0.0 {
        return 0.0;
    }
    if std_err == 0.0 {
        return 1.0;
    }
    (2.0 * normal_cdf(deviation / std_err) - 1.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.959964) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(-1.0) - 0.158655).abs() < 1e-6);
        assert!((critical_z(0.95) - 1.959964).abs() < 1e-5);
        assert!((critical_z(0.99) - 2.575829).abs() < 1e-5);
    }

    #[test]
    fn test_quantile_inverts_cdf() {
        for &p in &[0.001, 0.01, 0.1, 0.3, 0.5, 0.8, 0.975, 0.999] {
            assert!((normal_cdf(normal_quantile(p)) - p).abs() < 1e-6, "p = {p}");
        }
    }

    #[test]
    fn test_min_trials() {
        assert_eq!(min_trials(0.5), 10);
        assert_eq!(min_trials(0.95), 100);
        assert_eq!(min_trials(1.0), 1);
    }

    #[test]
    fn test_interval_and_needed_confidence_agree() {
        let interval = AcceptanceInterval::new(0.5, 100, 0.95);
        assert!(interval.contains(0.55));
        assert!(!interval.contains(1.0));
        assert!(interval.lower() > 0.38 && interval.upper() < 0.62);

        assert!(confidence_needed(0.5, 0.55, 100) < 0.95);
        assert!(confidence_needed(0.5, 1.0, 100) > 0.95);
        assert_eq!(confidence_needed(0.5, 0.5, 100), 0.0);
        assert_eq!(confidence_needed(1.0, 0.9, 100), 1.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_interval_narrows_with_trials(expected in 0.01f64..0.99, n in 10u64..5_000) {
            let small = AcceptanceInterval::new(expected, n, 0.95);
            let large = AcceptanceInterval::new(expected, n * 4, 0.95);
            proptest::prop_assert!(large.half_width < small.half_width);
            proptest::prop_assert!(small.contains(expected));
        }

        #[test]
        fn prop_needed_confidence_agrees_with_interval(
            expected in 0.05f64..0.95,
            successes in 0u64..=400,
        ) {
            let rate = successes as f64 / 400.0;
            let needed = confidence_needed(expected, rate, 400);
            proptest::prop_assert!((0.0..=1.0).contains(&needed));
            if needed < 0.9 {
                proptest::prop_assert!(AcceptanceInterval::new(expected, 400, 0.95).contains(rate));
            }
        }
    }
}

