//! Statistical characterization of a river site.
//!
//! The usual chain is: gauge discharge → exceedance probability (the
//! flow-duration curve) → velocity via a fitted discharge/velocity curve →
//! power via a fitted velocity/power curve with cut-in and cut-out → energy.
//!
//! The slice-based functions are the primitives; the `*_series` wrappers
//! carry a `TimeSeries` index through each step.

use std::ops::Index;

use faer::Mat;
use faer::linalg::solvers::SolveLstsq;

use crate::model::{GRAVITY, SeriesError, TimeSeries};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    Empty,
    /// NaN or infinite sample at the given position.
    NonFinite(usize),
    /// Discharge below zero at the given position.
    NegativeDischarge(usize),
    LengthMismatch { x: usize, y: usize },
    /// Not enough distinct points to fit a polynomial of this degree.
    Underdetermined { degree: usize, points: usize },
    InvalidCutRange { cut_in: f64, cut_out: f64 },
    InvalidParameter { name: &'static str, value: f64 },
    Series(SeriesError),
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceError::Empty => write!(f, "Input series is empty"),
            ResourceError::NonFinite(i) => write!(f, "Non-finite value at position {}", i),
            ResourceError::NegativeDischarge(i) => {
                write!(f, "Negative discharge at position {}", i)
            }
            ResourceError::LengthMismatch { x, y } => {
                write!(f, "x has {} samples but y has {}", x, y)
            }
            ResourceError::Underdetermined { degree, points } => write!(
                f,
                "Cannot fit a degree {} polynomial to {} distinct points",
                degree, points
            ),
            ResourceError::InvalidCutRange { cut_in, cut_out } => {
                write!(f, "Cut-in speed {} exceeds cut-out speed {}", cut_in, cut_out)
            }
            ResourceError::InvalidParameter { name, value } => {
                write!(f, "Invalid {}: {}", name, value)
            }
            ResourceError::Series(e) => write!(f, "Series error: {}", e),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<SeriesError> for ResourceError {
    fn from(e: SeriesError) -> Self {
        ResourceError::Series(e)
    }
}

fn check_finite(values: &[f64]) -> Result<(), ResourceError> {
    if values.is_empty() {
        return Err(ResourceError::Empty);
    }
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(ResourceError::NonFinite(i)),
        None => Ok(()),
    }
}

fn check_discharge(discharge: &[f64]) -> Result<(), ResourceError> {
    check_finite(discharge)?;
    match discharge.iter().position(|&q| q < 0.0) {
        Some(i) => Err(ResourceError::NegativeDischarge(i)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Polynomial
// ---------------------------------------------------------------------------

/// Polynomial with coefficients in ascending power: `p[k]` multiplies `x^k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Horner evaluation.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }
}

impl Index<usize> for Polynomial {
    type Output = f64;

    fn index(&self, power: usize) -> &f64 {
        &self.coefficients[power]
    }
}

// ---------------------------------------------------------------------------
// Hydraulics
// ---------------------------------------------------------------------------

/// Froude number `v / sqrt(g h)` for depth-averaged velocity `v` (m/s)
/// and hydraulic depth `h` (m), using standard gravity.
pub fn froude_number(velocity: f64, depth: f64) -> Result<f64, ResourceError> {
    froude_number_with_gravity(velocity, depth, GRAVITY)
}

pub fn froude_number_with_gravity(velocity: f64, depth: f64, g: f64) -> Result<f64, ResourceError> {
    if !(depth.is_finite() && depth > 0.0) {
        return Err(ResourceError::InvalidParameter { name: "depth", value: depth });
    }
    if !(g.is_finite() && g > 0.0) {
        return Err(ResourceError::InvalidParameter { name: "gravity", value: g });
    }
    if !velocity.is_finite() {
        return Err(ResourceError::NonFinite(0));
    }
    Ok(velocity / (g * depth).sqrt())
}

// ---------------------------------------------------------------------------
// Flow duration
// ---------------------------------------------------------------------------

/// Exceedance probability (%) of each discharge sample.
///
/// `F = 100 · rank / (N + 1)` with samples ranked from largest to smallest
/// and ties sharing the largest rank of their group, so the rank of `q` is
/// the number of samples `>= q`.
pub fn exceedance_probability(discharge: &[f64]) -> Result<Vec<f64>, ResourceError> {
    check_discharge(discharge)?;

    let mut sorted = discharge.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let denom = (n + 1) as f64;

    Ok(discharge
        .iter()
        .map(|&q| {
            let below = sorted.partition_point(|&s| s < q);
            100.0 * (n - below) as f64 / denom
        })
        .collect())
}

pub fn exceedance_probability_series(discharge: &TimeSeries) -> Result<TimeSeries, ResourceError> {
    let f = exceedance_probability(&discharge.values)?;
    Ok(discharge.with_values("F", f)?)
}

// ---------------------------------------------------------------------------
// Curve fitting
// ---------------------------------------------------------------------------

/// Least-squares polynomial fit of degree `degree`.
///
/// Returns the polynomial and the coefficient of determination
/// `r² = Σ(ŷ − ȳ)² / Σ(y − ȳ)²`. A constant `y` that is fitted exactly
/// reports `r² = 1`.
pub fn polynomial_fit(x: &[f64], y: &[f64], degree: usize) -> Result<(Polynomial, f64), ResourceError> {
    check_finite(x)?;
    check_finite(y)?;
    if x.len() != y.len() {
        return Err(ResourceError::LengthMismatch { x: x.len(), y: y.len() });
    }

    let coefficients = least_squares(x, y, degree)?;
    let poly = Polynomial::new(coefficients);

    let n = y.len() as f64;
    let y_bar = y.iter().sum::<f64>() / n;
    let mut ss_reg = 0.0;
    let mut ss_tot = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let y_hat = poly.evaluate(xi);
        ss_reg += (y_hat - y_bar).powi(2);
        ss_tot += (yi - y_bar).powi(2);
    }
    let r2 = if ss_tot == 0.0 { 1.0 } else { ss_reg / ss_tot };

    Ok((poly, r2))
}

/// Least-squares solution of the Vandermonde system through a QR
/// factorization of the design matrix.
fn least_squares(x: &[f64], y: &[f64], degree: usize) -> Result<Vec<f64>, ResourceError> {
    let rows = x.len();
    let cols = degree + 1;

    // A Vandermonde matrix has full column rank iff there are at least
    // `cols` distinct abscissae
    let mut distinct = x.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    if distinct.len() < cols {
        return Err(ResourceError::Underdetermined { degree, points: distinct.len() });
    }

    // Design matrix A[i, j] = x_i^j
    let a = Mat::<f64>::from_fn(rows, cols, |i, j| x[i].powi(j as i32));
    let b = Mat::<f64>::from_fn(rows, 1, |i, _| y[i]);

    let qr = a.as_ref().qr();
    let solution = qr.solve_lstsq(&b);

    let coefficients: Vec<f64> = (0..cols).map(|j| solution[(j, 0)]).collect();
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(ResourceError::Underdetermined { degree, points: distinct.len() });
    }
    Ok(coefficients)
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Velocity from discharge through a fitted discharge/velocity curve.
pub fn discharge_to_velocity(discharge: &[f64], curve: &Polynomial) -> Result<Vec<f64>, ResourceError> {
    check_discharge(discharge)?;
    Ok(discharge.iter().map(|&q| curve.evaluate(q)).collect())
}

pub fn discharge_to_velocity_series(
    discharge: &TimeSeries,
    curve: &Polynomial,
) -> Result<TimeSeries, ResourceError> {
    let v = discharge_to_velocity(&discharge.values, curve)?;
    Ok(discharge.with_values("V", v)?)
}

/// Power from velocity through a fitted velocity/power curve. Power is zero
/// below `cut_in` and above `cut_out`; both limits are inclusive of the
/// operating range.
pub fn velocity_to_power(
    velocity: &[f64],
    curve: &Polynomial,
    cut_in: f64,
    cut_out: f64,
) -> Result<Vec<f64>, ResourceError> {
    check_finite(velocity)?;
    if !(cut_in.is_finite() && cut_out.is_finite()) || cut_in > cut_out {
        return Err(ResourceError::InvalidCutRange { cut_in, cut_out });
    }

    Ok(velocity
        .iter()
        .map(|&v| {
            if v < cut_in || v > cut_out {
                0.0
            } else {
                curve.evaluate(v)
            }
        })
        .collect())
}

pub fn velocity_to_power_series(
    velocity: &TimeSeries,
    curve: &Polynomial,
    cut_in: f64,
    cut_out: f64,
) -> Result<TimeSeries, ResourceError> {
    let p = velocity_to_power(&velocity.values, curve, cut_in, cut_out)?;
    Ok(velocity.with_values("P", p)?)
}

/// Energy produced over `seconds`, taken as mean power times duration.
/// Units follow the inputs (W and s give J).
pub fn energy_produced(power: &[f64], seconds: f64) -> Result<f64, ResourceError> {
    check_finite(power)?;
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(ResourceError::InvalidParameter { name: "seconds", value: seconds });
    }
    let mean = power.iter().sum::<f64>() / power.len() as f64;
    Ok(mean * seconds)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    fn times(k: f64, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| k * v).collect()
    }

    #[test]
    fn test_froude_number() {
        let fr = froude_number(2.0, 5.0).unwrap();
        assert!((fr - 0.286).abs() < 0.0005, "got {}", fr);
    }

    #[test]
    fn test_froude_number_rejects_dry_bed() {
        assert!(froude_number(1.0, 0.0).is_err());
    }

    #[test]
    fn test_exceedance_probability_bounds() {
        // Distinct values rank 1..N, so with N = 9 the extremes are
        // 100·1/10 and 100·9/10.
        let f = exceedance_probability(&arange(9)).unwrap();
        let min = f.iter().copied().fold(f64::INFINITY, f64::min);
        let max = f.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 10.0);
        assert_eq!(max, 90.0);
        // Largest discharge is the least often exceeded
        assert_eq!(f[8], 10.0);
        assert_eq!(f[0], 90.0);
    }

    #[test]
    fn test_exceedance_probability_ties_take_max_rank() {
        let f = exceedance_probability(&[5.0, 1.0, 5.0, 3.0]).unwrap();
        // Both 5s share rank 2 of 4
        assert_eq!(f, vec![40.0, 80.0, 40.0, 60.0]);
    }

    #[test]
    fn test_exceedance_probability_rejects_negative() {
        assert_eq!(
            exceedance_probability(&[1.0, -2.0]).unwrap_err(),
            ResourceError::NegativeDischarge(1)
        );
        assert_eq!(exceedance_probability(&[]).unwrap_err(), ResourceError::Empty);
    }

    #[test]
    fn test_polynomial_fit_identity_line() {
        let x = arange(8);
        let (p, r2) = polynomial_fit(&x, &x, 1).unwrap();
        assert!(p[0].abs() < 0.005, "intercept should be 0, got {}", p[0]);
        assert!((p[1] - 1.0).abs() < 0.005, "slope should be 1, got {}", p[1]);
        assert!((r2 - 1.0).abs() < 0.005, "r² should be 1, got {}", r2);
    }

    #[test]
    fn test_polynomial_fit_recovers_quadratic() {
        let x = arange(10);
        let y: Vec<f64> = x.iter().map(|v| 2.0 - 0.5 * v + 0.25 * v * v).collect();
        let (p, r2) = polynomial_fit(&x, &y, 2).unwrap();
        assert_eq!(p.degree(), 2);
        for (actual, expected) in p.coefficients.iter().zip([2.0, -0.5, 0.25]) {
            assert!((actual - expected).abs() < 1e-9, "{:?}", p.coefficients);
        }
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_polynomial_fit_noisy_r2_below_one() {
        let x = arange(6);
        let y = [0.0, 1.3, 1.7, 3.4, 3.6, 5.2];
        let (_, r2) = polynomial_fit(&x, &y, 1).unwrap();
        assert!(r2 > 0.9 && r2 < 1.0, "got {}", r2);
    }

    #[test]
    fn test_polynomial_fit_underdetermined() {
        assert!(matches!(
            polynomial_fit(&[1.0, 2.0], &[1.0, 2.0], 2),
            Err(ResourceError::Underdetermined { .. })
        ));
        assert!(matches!(
            polynomial_fit(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0], 1),
            Err(ResourceError::Underdetermined { .. })
        ));
    }

    #[test]
    fn test_polynomial_fit_gauge_scale_discharge() {
        // Rating-curve shaped data at cubic-feet-per-second magnitudes
        let q: Vec<f64> = (0..25).map(|i| 200.0 + 150.0 * i as f64).collect();
        let v: Vec<f64> = q.iter().map(|q| 0.1 + 2e-5 * q + 3e-10 * q * q).collect();
        let (p, r2) = polynomial_fit(&q, &v, 2).unwrap();
        for (actual, expected) in p.coefficients.iter().zip([0.1, 2e-5, 3e-10]) {
            assert!(
                ((actual - expected) / expected).abs() < 1e-4,
                "{:?}",
                p.coefficients
            );
        }
        for (qi, vi) in q.iter().zip(&v) {
            assert!((p.evaluate(*qi) - vi).abs() < 1e-9);
        }
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_polynomial_fit_constant_y_reports_perfect_fit() {
        let x = arange(5);
        let (p, r2) = polynomial_fit(&x, &[2.5; 5], 1).unwrap();
        assert!((p[0] - 2.5).abs() < 1e-12, "{:?}", p.coefficients);
        assert!(p[1].abs() < 1e-12, "{:?}", p.coefficients);
        assert_eq!(r2, 1.0);
    }

    #[test]
    fn test_nan_input_is_rejected() {
        assert_eq!(
            exceedance_probability(&[1.0, f64::NAN, 3.0]).unwrap_err(),
            ResourceError::NonFinite(1)
        );
        assert_eq!(
            polynomial_fit(&[0.0, 1.0, 2.0], &[0.0, f64::NAN, 2.0], 1).unwrap_err(),
            ResourceError::NonFinite(1)
        );
        assert_eq!(
            polynomial_fit(&[f64::INFINITY, 1.0, 2.0], &[0.0, 1.0, 2.0], 1).unwrap_err(),
            ResourceError::NonFinite(0)
        );
        let p = Polynomial::new(vec![0.0, 1.0]);
        assert_eq!(
            velocity_to_power(&[1.0, 2.0, f64::NAN], &p, 0.0, 5.0).unwrap_err(),
            ResourceError::NonFinite(2)
        );
    }

    #[test]
    fn test_discharge_to_velocity() {
        let q = arange(9);
        let (p, _) = polynomial_fit(&q, &times(10.0, &q), 1).unwrap();
        let v = discharge_to_velocity(&q, &p).unwrap();
        let residual: f64 = q.iter().zip(&v).map(|(q, v)| 10.0 * q - v).sum();
        assert!(residual.abs() < 0.005, "residual {}", residual);
    }

    #[test]
    fn test_velocity_to_power_cut_in_and_out() {
        let q = arange(9);
        let (dv, _) = polynomial_fit(&q, &times(10.0, &q), 1).unwrap();
        let v = discharge_to_velocity(&q, &dv).unwrap();
        let (vp, _) = polynomial_fit(&q, &times(10.0, &q), 1).unwrap();

        // Exclude one bin at either end of the velocity range
        let cut_in = v[1];
        let cut_out = v[v.len() - 2];
        let p = velocity_to_power(&v, &vp, cut_in, cut_out).unwrap();

        assert!(p[0].abs() < 0.005);
        assert!(p[p.len() - 1].abs() < 0.005);
        let middle: f64 = (1..p.len() - 1).map(|i| p[i] - 10.0 * v[i]).sum();
        assert!(middle.abs() < 0.005, "middle residual {}", middle);
    }

    #[test]
    fn test_velocity_to_power_rejects_inverted_cut_range() {
        let p = Polynomial::new(vec![0.0, 1.0]);
        assert!(matches!(
            velocity_to_power(&[1.0], &p, 2.0, 1.0),
            Err(ResourceError::InvalidCutRange { .. })
        ));
    }

    #[test]
    fn test_energy_produced_constant_power() {
        let ep = energy_produced(&[1.0; 10], 1.0).unwrap();
        assert!((ep - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_energy_produced_is_mean_times_duration() {
        // Symmetric spread around 5 W
        let power: Vec<f64> = (0..700).map(|i| 5.0 + ((i % 7) as f64 - 3.0) * 0.4).collect();
        let ep = energy_produced(&power, 3600.0).unwrap();
        assert!((ep - 5.0 * 3600.0).abs() < 1.0, "got {}", ep);
    }

    #[test]
    fn test_energy_produced_rejects_zero_duration() {
        assert!(energy_produced(&[1.0], 0.0).is_err());
    }
}
