//! Binomial and interval helpers.

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// Binomial coefficient C(n, k) as a float.
pub fn comb(n: u64, k: u64) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Probability of exactly `k` successes in `n` Bernoulli(`p`) trials.
pub fn binom_pmf(k: u64, n: u64, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    comb(n, k) * p.powi(k as i32) * (1.0 - p).powi((n - k) as i32)
}

/// Variance of a rate estimate `p` from `n` trials, Wilson form.
///
/// `z²·(p(1−p)/N + z²/(4N²)) / (1 + z²/N)²`. Returns 0 for `n == 0`.
pub fn wilson_var(p: f64, n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let z2 = Z_95 * Z_95;
    z2 * (p * (1.0 - p) / n + z2 / (4.0 * n * n)) / (1.0 + z2 / n).powi(2)
}

/// Variance of a rate estimate `p` from `n` trials, Wald form.
pub fn wald_var(p: f64, n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    p * (1.0 - p) / n as f64
}

/// Wilson score interval for `successes` out of `trials`.
pub fn wilson_ci(successes: u64, trials: u64, z: f64) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 1.0);
    }

    let n = trials as f64;
    let p = successes as f64 / n;
    let z2 = z * z;

    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let spread = z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt() / denom;

    ((center - spread).max(0.0), (center + spread).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb() {
        assert_eq!(comb(5, 0), 1.0);
        assert_eq!(comb(5, 2), 10.0);
        assert_eq!(comb(5, 5), 1.0);
        assert_eq!(comb(3, 4), 0.0);
        assert!((comb(40, 20) - 137_846_528_820.0).abs() < 1.0);
    }

    #[test]
    fn test_binom_pmf_edges() {
        assert_eq!(binom_pmf(0, 4, 0.0), 1.0);
        assert_eq!(binom_pmf(1, 4, 0.0), 0.0);
        assert_eq!(binom_pmf(4, 4, 1.0), 1.0);
        assert!((binom_pmf(1, 2, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_wilson_var_shrinks_with_n() {
        let small = wilson_var(0.1, 10);
        let large = wilson_var(0.1, 10_000);
        assert!(small > large);
        assert!(large > 0.0);
        // Non-zero even at p = 0, unlike the Wald form.
        assert!(wilson_var(0.0, 100) > 0.0);
        assert_eq!(wald_var(0.0, 100), 0.0);
        assert_eq!(wilson_var(0.5, 0), 0.0);
    }

    #[test]
    fn test_wilson_var_closed_form() {
        // z² (3/64 + z²/64) / (1 + z²/4)² with z = 1.96
        assert!((wilson_var(0.75, 4) - 0.106_856_380_700_239_76).abs() < 1e-15);
        assert_eq!(wilson_var(0.75, 4), wilson_var(0.25, 4));
    }

    #[test]
    fn test_wilson_ci_contains_rate() {
        let (lo, hi) = wilson_ci(30, 100, Z_95);
        assert!(lo < 0.3 && 0.3 < hi);
        assert_eq!(wilson_ci(0, 0, Z_95), (0.0, 1.0));
    }
}
