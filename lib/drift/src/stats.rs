//! Two-sample statistics used to compare a column between snapshots.
//!
//! Everything here works in `f64` and is free of external numeric crates:
//! the distributions needed (Kolmogorov and chi-square tails) have short,
//! well-known series expansions.

use std::collections::BTreeMap;
use std::f64::consts::PI;

const EPS: f64 = 1e-14;
const FPMIN: f64 = 1e-300;
const MAX_ITER: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sample Kolmogorov-Smirnov test with the asymptotic p-value
pub fn ks_2samp(a: &[f64], b: &[f64]) -> TestResult {
    if a.is_empty() || b.is_empty() {
        return TestResult {
            statistic: 0.0,
            p_value: 1.0,
        };
    }
    let a = sorted(a);
    let b = sorted(b);
    let (n, m) = (a.len() as f64, b.len() as f64);

    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }

    let en = (n * m / (n + m)).sqrt();
    TestResult {
        statistic: d,
        p_value: kolmogorov_sf((en + 0.12 + 0.11 / en) * d),
    }
}

/// Survival function of the Kolmogorov distribution
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let p = if lambda < 1.18 {
        let y = (-PI * PI / (8.0 * lambda * lambda)).exp();
        let cdf = (2.0 * PI).sqrt() / lambda * (y + y.powi(9) + y.powi(25) + y.powi(49));
        1.0 - cdf
    } else {
        let x = (-2.0 * lambda * lambda).exp();
        2.0 * (x - x.powi(4) + x.powi(9) - x.powi(16))
    };
    p.clamp(0.0, 1.0)
}

/// Chi-square test of homogeneity on the 2 × k table of category counts.
///
/// Categories are the union of both samples; a single category carries no
/// information and yields p = 1.
pub fn chi_square_homogeneity<'a, A, B>(a: A, b: B) -> TestResult
where
    A: IntoIterator<Item = &'a str>,
    B: IntoIterator<Item = &'a str>,
{
    let table = contingency(a, b);
    let n_a: f64 = table.values().map(|c| c.0).sum();
    let n_b: f64 = table.values().map(|c| c.1).sum();
    let total = n_a + n_b;

    if table.len() < 2 || n_a == 0.0 || n_b == 0.0 {
        return TestResult {
            statistic: 0.0,
            p_value: 1.0,
        };
    }

    let statistic: f64 = table
        .values()
        .map(|&(ca, cb)| {
            let col = ca + cb;
            let ea = n_a * col / total;
            let eb = n_b * col / total;
            (ca - ea).powi(2) / ea + (cb - eb).powi(2) / eb
        })
        .sum();
    let df = (table.len() - 1) as f64;

    TestResult {
        statistic,
        p_value: chi_square_sf(statistic, df),
    }
}

/// P(X > x) for a chi-square variable with `df` degrees of freedom
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    gamma_q(df / 2.0, x / 2.0)
}

/// Earth mover's distance between two one-dimensional samples
pub fn wasserstein_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = sorted(a);
    let b = sorted(b);
    let mut all: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    all.sort_by(f64::total_cmp);

    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut distance = 0.0;
    for w in all.windows(2) {
        let x = w[0];
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        distance += (i as f64 / n - j as f64 / m).abs() * (w[1] - x);
    }
    distance
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Jensen-Shannon distance (natural log) between two category frequency profiles
pub fn jensen_shannon_distance<'a, A, B>(a: A, b: B) -> f64
where
    A: IntoIterator<Item = &'a str>,
    B: IntoIterator<Item = &'a str>,
{
    let table = contingency(a, b);
    let n_a: f64 = table.values().map(|c| c.0).sum();
    let n_b: f64 = table.values().map(|c| c.1).sum();
    if n_a == 0.0 || n_b == 0.0 {
        return 0.0;
    }

    let divergence: f64 = table
        .values()
        .map(|&(ca, cb)| {
            let p = ca / n_a;
            let q = cb / n_b;
            let m = (p + q) / 2.0;
            0.5 * kl_term(p, m) + 0.5 * kl_term(q, m)
        })
        .sum();
    divergence.max(0.0).sqrt()
}

fn kl_term(p: f64, m: f64) -> f64 {
    if p > 0.0 {
        p * (p / m).ln()
    } else {
        0.0
    }
}

fn contingency<'a, A, B>(a: A, b: B) -> BTreeMap<&'a str, (f64, f64)>
where
    A: IntoIterator<Item = &'a str>,
    B: IntoIterator<Item = &'a str>,
{
    let mut table: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for v in a {
        table.entry(v).or_default().0 += 1.0;
    }
    for v in b {
        table.entry(v).or_default().1 += 1.0;
    }
    table
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut values = values.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

/// Upper regularized incomplete gamma function Q(a, x)
fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 || a <= 0.0 {
        return 1.0;
    }
    let q = if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    };
    q.clamp(0.0, 1.0)
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut term = 1.0 / a;
    let mut sum = term;
    for _ in 0..MAX_ITER {
        ap += 1.0;
        term *= x / ap;
        sum += term;
        if term.abs() < sum.abs() * EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

// modified Lentz
fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITER {
        let i = i as f64;
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Lanczos approximation of ln Γ(x) for x > 0
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
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

    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEF[1..]
        .iter()
        .enumerate()
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}
