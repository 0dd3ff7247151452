//! Scalar special functions used by the built-in likelihoods.

use std::f64::consts::PI;

/// Lanczos approximation of `ln Γ(x)` for positive `x`.
///
/// Accurate to roughly 1e-13 over the range the Poisson models need
/// (factorials of observed counts).
pub fn ln_gamma(x: f64) -> f64 {
    // g = 7, n = 9 coefficient set
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = COEFFS[0];
    for (i, &c) in COEFFS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

/// Log probability mass of a Poisson distribution: `k ln μ − μ − ln Γ(k+1)`.
///
/// `k` is accepted as a float and evaluated through the gamma-function
/// continuation (as in scipy's `poisson.logpmf`), so likelihoods built on
/// truncated or clamped counts stay well-defined. Negative `k` is outside
/// the support. The degenerate rate `μ = 0` puts all mass on `k = 0`.
pub fn poisson_logpmf(k: f64, mu: f64) -> f64 {
    if k < 0.0 || mu < 0.0 {
        return f64::NEG_INFINITY;
    }
    if mu == 0.0 {
        return if k == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    k * mu.ln() - mu - ln_gamma(k + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ln_gamma_matches_factorials() {
        // Γ(n + 1) = n!
        assert_abs_diff_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(2.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(3.0), 2f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(6.0), 120f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(11.0), 3_628_800f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn ln_gamma_half_integer() {
        // Γ(1/2) = √π
        assert_abs_diff_eq!(ln_gamma(0.5), PI.sqrt().ln(), epsilon = 1e-12);
    }

    #[test]
    fn poisson_logpmf_reference_values() {
        // ln(3^2 e^-3 / 2!)
        let expected = 9f64.ln() - 3.0 - 2f64.ln();
        assert_abs_diff_eq!(poisson_logpmf(2.0, 3.0), expected, epsilon = 1e-12);
        // pmf at k = 0 is e^-mu
        assert_abs_diff_eq!(poisson_logpmf(0.0, 4.0), -4.0, epsilon = 1e-12);
    }

    #[test]
    fn poisson_logpmf_outside_support() {
        assert_eq!(poisson_logpmf(0.0, 0.0), 0.0);
        assert_eq!(poisson_logpmf(3.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(poisson_logpmf(1.0, -1.0), f64::NEG_INFINITY);
        assert_eq!(poisson_logpmf(-1.0, 3.0), f64::NEG_INFINITY);
    }
}
