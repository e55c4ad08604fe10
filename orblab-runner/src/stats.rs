//! Statistical primitives for the validation gates.
//!
//! Implemented from first principles:
//! - Lanczos approximation for ln(Gamma)
//! - Regularized incomplete beta function (Lentz continued fraction)
//! - Student's t-distribution CDF
//! - Two-sided one-sample t-test (H0: mean = 0)
//! - Seeded IID bootstrap confidence interval for the mean
//!
//! Caveat: per-trade R values are neither normal nor independent, so the
//! p-values are screening scores, not literal false-positive rates. The
//! bootstrap interval is the sturdier of the two gates and both must agree
//! before a candidate passes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ─── Math primitives ─────────────────────────────────────────────────

/// Lanczos approximation for ln(Gamma(x)), g=7, n=9.
fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        // Reflection: Gamma(x) * Gamma(1-x) = pi / sin(pi*x)
        let log_pi = std::f64::consts::PI.ln();
        let sin_val = (std::f64::consts::PI * x).sin();
        if sin_val.abs() < 1e-300 {
            return f64::INFINITY;
        }
        return log_pi - sin_val.abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }

    let t = x + G + 0.5;
    let log_sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt().ln();

    log_sqrt_2pi + (t.ln() * (x + 0.5)) - t + sum.ln()
}

/// Regularized incomplete beta function I_x(a, b) via the Lentz algorithm.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NAN;
    }
    if x == 0.0 {
        return 0.0;
    }
    if x == 1.0 {
        return 1.0;
    }

    // Symmetry relation for better convergence.
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(b, a, 1.0 - x);
    }

    let ln_prefix = a * x.ln() + b * (1.0 - x).ln() - ln_gamma(a) - ln_gamma(b) + ln_gamma(a + b)
        - a.ln();
    let prefix = ln_prefix.exp();

    let max_iter = 200;
    let epsilon = 1e-14;
    let tiny = 1e-30;

    let mut c = 1.0_f64;
    let mut d = 1.0 - (a + b) * x / (a + 1.0);
    if d.abs() < tiny {
        d = tiny;
    }
    d = 1.0 / d;
    let mut f = d;

    for m in 1..=max_iter {
        let m_f64 = m as f64;

        let numerator_even =
            m_f64 * (b - m_f64) * x / ((a + 2.0 * m_f64 - 1.0) * (a + 2.0 * m_f64));

        d = 1.0 + numerator_even * d;
        if d.abs() < tiny {
            d = tiny;
        }
        c = 1.0 + numerator_even / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        f *= c * d;

        let numerator_odd = -((a + m_f64) * (a + b + m_f64) * x)
            / ((a + 2.0 * m_f64) * (a + 2.0 * m_f64 + 1.0));

        d = 1.0 + numerator_odd * d;
        if d.abs() < tiny {
            d = tiny;
        }
        c = 1.0 + numerator_odd / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let delta = c * d;
        f *= delta;

        if (delta - 1.0).abs() < epsilon {
            break;
        }
    }

    prefix * f
}

/// Student's t-distribution CDF: P(T <= t) for df degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 {
        return f64::NAN;
    }
    if t == 0.0 {
        return 0.5;
    }

    let x = df / (df + t * t);
    let ib = regularized_incomplete_beta(df / 2.0, 0.5, x);

    if t > 0.0 {
        1.0 - 0.5 * ib
    } else {
        0.5 * ib
    }
}

// ─── One-sample t-test ───────────────────────────────────────────────

/// Result of a two-sided one-sample t-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    pub t_statistic: f64,
    /// Two-sided p-value: P(|T| >= |t|) under H0: mean = 0.
    pub p_value: f64,
    pub df: f64,
    pub mean: f64,
}

/// Two-sided one-sample t-test against a zero mean.
///
/// Returns `None` with fewer than 2 values. A degenerate sample (zero
/// variance) gets p = 0.0 for a nonzero mean and p = 1.0 otherwise.
pub fn mean_t_test(values: &[f64]) -> Option<TTest> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let mean = values.iter().sum::<f64>() / n_f;
    let variance = values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n_f - 1.0);
    let std_err = (variance / n_f).sqrt();
    let df = n_f - 1.0;

    if std_err < 1e-15 {
        return Some(TTest {
            t_statistic: if mean == 0.0 { 0.0 } else { f64::INFINITY },
            p_value: if mean == 0.0 { 1.0 } else { 0.0 },
            df,
            mean,
        });
    }

    let t_stat = mean / std_err;
    let p_value = 2.0 * (1.0 - t_cdf(t_stat.abs(), df));

    Some(TTest {
        t_statistic: t_stat,
        p_value,
        df,
        mean,
    })
}

// ─── Bootstrap CI ────────────────────────────────────────────────────

/// Bootstrap confidence interval for a sample mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapCi {
    pub lower: f64,
    pub upper: f64,
    pub mean: f64,
    pub n_resamples: usize,
}

impl BootstrapCi {
    /// Whether the interval sits strictly above zero.
    pub fn excludes_zero_from_below(&self) -> bool {
        self.lower > 0.0
    }
}

/// Seeded IID bootstrap CI for the mean at the given confidence level.
///
/// Returns `None` with fewer than 2 values. Deterministic for a fixed seed.
pub fn bootstrap_mean_ci(
    values: &[f64],
    n_resamples: usize,
    confidence: f64,
    seed: u64,
) -> Option<BootstrapCi> {
    let n = values.len();
    if n < 2 || n_resamples == 0 || !(0.0..1.0).contains(&confidence) {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut means = Vec::with_capacity(n_resamples);
    for _ in 0..n_resamples {
        let mut sum = 0.0;
        for _ in 0..n {
            sum += values[rng.gen_range(0..n)];
        }
        means.push(sum / n as f64);
    }
    means.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let tail = (1.0 - confidence) / 2.0 * 100.0;
    Some(BootstrapCi {
        lower: percentile_sorted(&means, tail),
        upper: percentile_sorted(&means, 100.0 - tail),
        mean: values.iter().sum::<f64>() / n as f64,
        n_resamples,
    })
}

/// Percentile of a sorted slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
