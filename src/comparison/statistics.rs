// Statistical primitives for run comparison
//
// Descriptive statistics, the Student t-distribution (two-sided tail
// probability and critical value) and the two tests the comparison tree
// reports:
// - one-sample t-test: is the newest repeat consistent with the previous ones?
// - Welch's t-test: do two comparison keys differ?
//
// The t-distribution is evaluated through the regularized incomplete beta
// function: for `df` degrees of freedom, `P(|T| > t) = I_x(df/2, 1/2)` with
// `x = df / (df + t^2)`.

use std::collections::HashMap;
use tracing::debug;

/// Outcome of a t-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    /// t-statistic
    pub statistic: f64,

    /// Two-sided p-value, never NaN
    pub p_value: f64,

    /// Degrees of freedom
    pub df: f64,
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (`ddof = 0`)
pub fn population_stddev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sample standard deviation (`ddof = 1`); NaN for fewer than two values
pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Natural log of the gamma function (Lanczos, g = 7)
pub fn ln_gamma(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }

    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }

    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Regularized incomplete beta function `I_x(a, b)`
pub fn incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // the continued fraction converges fast only below the mean
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

/// Lentz evaluation of the incomplete beta continued fraction
#[allow(clippy::many_single_char_names)]
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Two-sided tail probability `P(|T| >= |t|)` of Student's t with `df` degrees of freedom
///
/// # Example
/// ```
/// use phasestats::comparison::statistics::student_t_two_sided_p;
///
/// assert_eq!(student_t_two_sided_p(0.0, 4.0), 1.0);
/// // df = 1 is the Cauchy distribution: P(|T| >= 1) = 0.5
/// assert!((student_t_two_sided_p(1.0, 1.0) - 0.5).abs() < 1e-9);
/// ```
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    incomplete_beta(df / (df + t * t), df / 2.0, 0.5)
}

/// Two-sided critical value: the `t` with `P(|T| >= t) = 1 - confidence`
///
/// Solved by bisection on [`student_t_two_sided_p`], which is strictly
/// decreasing in `t`.
pub fn student_t_critical(confidence: f64, df: f64) -> f64 {
    if !(confidence > 0.0 && confidence < 1.0) || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    let alpha = 1.0 - confidence;

    let mut lo = 0.0;
    let mut hi = 1.0;
    while student_t_two_sided_p(hi, df) > alpha {
        lo = hi;
        hi *= 2.0;
        if hi > 1e12 {
            return f64::INFINITY;
        }
    }

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_two_sided_p(mid, df) > alpha {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 * hi.max(1.0) {
            break;
        }
    }

    0.5 * (lo + hi)
}

/// Memoized two-sided critical t-values keyed by sample size
///
/// Owned by one comparison build; nothing is shared between requests.
#[derive(Debug, Clone)]
pub struct TCriticalCache {
    confidence: f64,
    values: HashMap<usize, f64>,
}

impl TCriticalCache {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            values: HashMap::new(),
        }
    }

    /// Critical value for `n` samples (`n - 1` degrees of freedom); `None` for `n < 2`
    pub fn get(&mut self, n: usize) -> Option<f64> {
        if n < 2 {
            return None;
        }
        let confidence = self.confidence;
        Some(
            *self
                .values
                .entry(n)
                .or_insert_with(|| student_t_critical(confidence, (n - 1) as f64)),
        )
    }

    /// Number of memoized sample sizes
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One-sample t-test of `sample` against a hypothesized mean
///
/// Returns `None` when the test is undefined (fewer than two values, or
/// zero variance with the sample mean equal to `population_mean`).
///
/// # Example
/// ```
/// use phasestats::comparison::statistics::one_sample_ttest;
///
/// let outcome = one_sample_ttest(&[10.0, 12.0], 11.0).unwrap();
/// assert_eq!(outcome.statistic, 0.0);
/// assert_eq!(outcome.p_value, 1.0);
/// ```
pub fn one_sample_ttest(sample: &[f64], population_mean: f64) -> Option<TestOutcome> {
    if sample.len() < 2 {
        return None;
    }

    let n = sample.len() as f64;
    let df = n - 1.0;
    let diff = mean(sample) - population_mean;
    let standard_error = sample_stddev(sample) / n.sqrt();

    let statistic = if standard_error == 0.0 {
        if diff == 0.0 {
            return None;
        }
        diff.signum() * f64::INFINITY
    } else {
        diff / standard_error
    };

    let p_value = student_t_two_sided_p(statistic, df);
    if p_value.is_nan() {
        return None;
    }

    Some(TestOutcome {
        statistic,
        p_value,
        df,
    })
}

/// Welch's unequal-variance two-sample t-test
///
/// The statistic and the Welch-Satterthwaite degrees of freedom are computed
/// in double precision, so samples with a large common offset (energy
/// counters in the 1e9 mJ range) keep their small differences. Returns
/// `None` when either sample has fewer than two values, or when both
/// samples are constant with equal means.
///
/// # Example
/// ```
/// use phasestats::comparison::statistics::welch_ttest;
///
/// let outcome = welch_ttest(&[10.0, 11.0, 12.0], &[20.0, 22.0, 24.0]).unwrap();
/// assert!(outcome.statistic < 0.0);
/// assert!(outcome.p_value < 0.01);
/// ```
pub fn welch_ttest(a: &[f64], b: &[f64]) -> Option<TestOutcome> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }

    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let var_a = sample_stddev(a).powi(2) / n_a;
    let var_b = sample_stddev(b).powi(2) / n_b;
    let standard_error_sq = var_a + var_b;
    let diff = mean(a) - mean(b);

    let (statistic, df) = if standard_error_sq == 0.0 {
        if diff == 0.0 {
            return None;
        }
        // both samples constant: any difference is exact
        (diff.signum() * f64::INFINITY, n_a + n_b - 2.0)
    } else {
        let df = standard_error_sq.powi(2)
            / (var_a.powi(2) / (n_a - 1.0) + var_b.powi(2) / (n_b - 1.0));
        (diff / standard_error_sq.sqrt(), df)
    };

    let p_value = student_t_two_sided_p(statistic, df);
    if p_value.is_nan() {
        debug!(statistic, df, "Welch t-test undefined");
        return None;
    }

    Some(TestOutcome {
        statistic,
        p_value,
        df,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_population_vs_sample_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_stddev(&values), 2.0);
        assert!(close(sample_stddev(&values), 2.138_089_935, 1e-9));
        assert!(sample_stddev(&[1.0]).is_nan());
    }

    #[test]
    fn test_ln_gamma_known_values() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24.0_f64.ln(), 1e-12));
        assert!(close(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), 1e-12));
    }

    #[test]
    fn test_incomplete_beta_symmetry() {
        let a = 2.5;
        let b = 0.5;
        for x in [0.1, 0.3, 0.5, 0.7, 0.9] {
            let lhs = incomplete_beta(x, a, b);
            let rhs = 1.0 - incomplete_beta(1.0 - x, b, a);
            assert!(close(lhs, rhs, 1e-12));
        }
    }

    #[test]
    fn test_critical_values_match_tables() {
        // two-sided 95%
        assert!(close(student_t_critical(0.95, 1.0), 12.706_204_736, 1e-6));
        assert!(close(student_t_critical(0.95, 2.0), 4.302_652_730, 1e-6));
        assert!(close(student_t_critical(0.95, 4.0), 2.776_445_105, 1e-6));
        assert!(close(student_t_critical(0.95, 30.0), 2.042_272_456, 1e-6));
        // two-sided 99%
        assert!(close(student_t_critical(0.99, 10.0), 3.169_272_673, 1e-6));
    }

    #[test]
    fn test_critical_value_invalid_input() {
        assert!(student_t_critical(0.95, 0.0).is_nan());
        assert!(student_t_critical(1.5, 3.0).is_nan());
    }

    #[test]
    fn test_cache_memoizes_by_sample_size() {
        let mut cache = TCriticalCache::new(0.95);
        assert_eq!(cache.get(1), None);
        let first = cache.get(3).unwrap();
        let second = cache.get(3).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        cache.get(5);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_one_sample_known_p_value() {
        // mean 2.5, s = 1.2910, se = 0.6455, t = 2.3238, df = 3 -> p = 0.1027
        let outcome = one_sample_ttest(&[1.0, 2.0, 3.0, 4.0], 1.0).unwrap();
        assert!(close(outcome.statistic, 2.323_790_008, 1e-6));
        assert!(close(outcome.p_value, 0.102_728, 1e-5));
        assert_eq!(outcome.df, 3.0);
    }

    #[test]
    fn test_one_sample_degenerate_inputs() {
        assert!(one_sample_ttest(&[5.0], 5.0).is_none());
        // zero variance, equal mean: undefined
        assert!(one_sample_ttest(&[5.0, 5.0, 5.0], 5.0).is_none());
        // zero variance, different mean: infinitely significant
        let outcome = one_sample_ttest(&[5.0, 5.0], 6.0).unwrap();
        assert_eq!(outcome.p_value, 0.0);
    }

    #[test]
    fn test_welch_detects_clear_difference() {
        let outcome = welch_ttest(&[5.0, 6.0, 7.0], &[50.0, 60.0, 70.0]).unwrap();
        assert!(outcome.p_value < 0.05);
    }

    #[test]
    fn test_welch_requires_two_values_per_side() {
        assert!(welch_ttest(&[5.0], &[50.0, 60.0]).is_none());
    }

    #[test]
    fn test_welch_large_common_offset() {
        // single precision would collapse both samples onto the same values
        let a = [1e9 + 1.0, 1e9 + 2.0, 1e9 + 3.0];
        let b = [1e9 + 101.0, 1e9 + 102.0, 1e9 + 103.0];
        let outcome = welch_ttest(&a, &b).unwrap();
        assert!(close(outcome.statistic, -122.474_487_139, 1e-6));
        assert!(close(outcome.df, 4.0, 1e-9));
        assert!(close(outcome.p_value, 2.665_481_9e-8, 1e-12));
    }

    #[test]
    fn test_welch_is_shift_invariant() {
        let a = [12.0, 15.0, 11.0, 14.0];
        let b = [18.0, 16.0, 21.0];
        let base = welch_ttest(&a, &b).unwrap();

        let shift = |v: &[f64]| v.iter().map(|x| x + 5e8).collect::<Vec<_>>();
        let shifted = welch_ttest(&shift(&a), &shift(&b)).unwrap();
        assert!(close(base.statistic, shifted.statistic, 1e-6));
        assert!(close(base.df, shifted.df, 1e-6));
        assert!(close(base.p_value, shifted.p_value, 1e-6));
    }

    #[test]
    fn test_welch_t_of_two_with_32_degrees_of_freedom() {
        // equal variances and sizes: df = 2 * (17 - 1)
        let a: Vec<f64> = (-8..=8).map(f64::from).collect();
        let b: Vec<f64> = a.iter().map(|v| v + 2.0 * 3.0_f64.sqrt()).collect();
        let outcome = welch_ttest(&b, &a).unwrap();
        assert!(close(outcome.statistic, 2.0, 1e-9));
        assert!(close(outcome.df, 32.0, 1e-9));
        assert!(close(outcome.p_value, 0.054_048_185, 1e-7));
        assert!(close(student_t_two_sided_p(2.0, 32.0), 0.054_048_185, 1e-7));
    }

    #[test]
    fn test_welch_known_unequal_variances() {
        let outcome = welch_ttest(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
        assert!(close(outcome.statistic, -2.251_436_323, 1e-6));
        assert!(close(outcome.df, 5.520_787_746, 1e-6));
        assert!(close(outcome.p_value, 0.069_133_593, 1e-6));
    }

    #[test]
    fn test_welch_constant_samples() {
        assert!(welch_ttest(&[3.0, 3.0], &[3.0, 3.0, 3.0]).is_none());
        let outcome = welch_ttest(&[3.0, 3.0], &[4.0, 4.0]).unwrap();
        assert_eq!(outcome.p_value, 0.0);
        assert_eq!(outcome.statistic, f64::NEG_INFINITY);
    }
}
