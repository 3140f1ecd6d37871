//! Turbine capture geometry and non-dimensional performance metrics.
//!
//! Geometry helpers return `(equivalent_diameter, capture_area)` so that
//! circular, ducted, rectangular and multi-rotor devices can be compared
//! on the same basis. Lengths are in metres, areas in m².

use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceError {
    /// A length, area or density that must be strictly positive was not.
    NonPositive { name: &'static str, value: f64 },
    /// Two paired series differ in length.
    LengthMismatch { left: usize, right: usize },
    /// An inflow speed of zero makes the ratio undefined.
    ZeroInflow(usize),
    Empty(&'static str),
}

impl std::fmt::Display for PerformanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformanceError::NonPositive { name, value } => {
                write!(f, "{} must be positive and finite, got {}", name, value)
            }
            PerformanceError::LengthMismatch { left, right } => {
                write!(f, "Series lengths differ: {} vs {}", left, right)
            }
            PerformanceError::ZeroInflow(i) => write!(f, "Inflow speed is zero at position {}", i),
            PerformanceError::Empty(name) => write!(f, "{} is empty", name),
        }
    }
}

impl std::error::Error for PerformanceError {}

fn positive(name: &'static str, value: f64) -> Result<f64, PerformanceError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PerformanceError::NonPositive { name, value })
    }
}

// ---------------------------------------------------------------------------
// Capture geometry
// ---------------------------------------------------------------------------

/// Equivalent diameter and capture area of a circular rotor.
///
/// The area is the swept disc, `π d² / 4`, so a set of rotors sums to the
/// same total as `multiple_circular`.
pub fn circular(diameter: f64) -> Result<(f64, f64), PerformanceError> {
    let d = positive("diameter", diameter)?;
    Ok((d, PI * d * d / 4.0))
}

/// Equivalent diameter and capture area of a ducted rotor, measured at
/// the duct.
pub fn ducted(duct_diameter: f64) -> Result<(f64, f64), PerformanceError> {
    circular(duct_diameter)
}

/// Equivalent diameter and capture area of a rectangular (e.g. cross-flow)
/// turbine. The equivalent diameter is that of a circle of equal area.
pub fn rectangular(height: f64, width: f64) -> Result<(f64, f64), PerformanceError> {
    let area = positive("height", height)? * positive("width", width)?;
    Ok(((4.0 * area / PI).sqrt(), area))
}

/// Equivalent diameter and total capture area of a device made of several
/// circular rotors.
pub fn multiple_circular(diameters: &[f64]) -> Result<(f64, f64), PerformanceError> {
    if diameters.is_empty() {
        return Err(PerformanceError::Empty("diameters"));
    }
    let mut sum_sq = 0.0;
    for &d in diameters {
        let d = positive("diameter", d)?;
        sum_sq += d * d;
    }
    Ok((sum_sq.sqrt(), PI * sum_sq / 4.0))
}

// ---------------------------------------------------------------------------
// Performance metrics
// ---------------------------------------------------------------------------

/// Tip speed ratio `π D n / U` for rotor speeds `n` in revolutions per
/// second and inflow speeds `U` in m/s.
pub fn tip_speed_ratio(
    rotor_speed: &[f64],
    rotor_diameter: f64,
    inflow_speed: &[f64],
) -> Result<Vec<f64>, PerformanceError> {
    let d = positive("rotor_diameter", rotor_diameter)?;
    if rotor_speed.len() != inflow_speed.len() {
        return Err(PerformanceError::LengthMismatch {
            left: rotor_speed.len(),
            right: inflow_speed.len(),
        });
    }

    rotor_speed
        .iter()
        .zip(inflow_speed)
        .enumerate()
        .map(|(i, (&n, &u))| {
            if u == 0.0 {
                Err(PerformanceError::ZeroInflow(i))
            } else {
                Ok(PI * d * n / u)
            }
        })
        .collect()
}

/// Power coefficient `P / (½ ρ A U³)`. Power in W, inflow in m/s, capture
/// area in m², density in kg/m³.
pub fn power_coefficient(
    power: &[f64],
    inflow_speed: &[f64],
    capture_area: f64,
    rho: f64,
) -> Result<Vec<f64>, PerformanceError> {
    let area = positive("capture_area", capture_area)?;
    let rho = positive("rho", rho)?;
    if power.len() != inflow_speed.len() {
        return Err(PerformanceError::LengthMismatch {
            left: power.len(),
            right: inflow_speed.len(),
        });
    }

    power
        .iter()
        .zip(inflow_speed)
        .enumerate()
        .map(|(i, (&p, &u))| {
            if u == 0.0 {
                Err(PerformanceError::ZeroInflow(i))
            } else {
                Ok(p / (0.5 * rho * area * u.powi(3)))
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {} ± {}, got {}",
            expected,
            tol,
            actual
        );
    }

    #[test]
    fn test_circular() {
        let (eq, area) = circular(1.0).unwrap();
        assert_eq!(eq, 1.0);
        assert_close(area, PI / 4.0, 1e-12);
    }

    #[test]
    fn test_ducted_matches_circular() {
        assert_eq!(ducted(2.5).unwrap(), circular(2.5).unwrap());
    }

    #[test]
    fn test_rectangular() {
        let (eq, area) = rectangular(2.0, 3.0).unwrap();
        assert_close(eq, 2.76, 0.005);
        assert_close(area, 6.0, 1e-12);
    }

    #[test]
    fn test_multiple_circular() {
        let (eq, area) = multiple_circular(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_close(eq, 5.48, 0.005);
        assert_close(area, 23.56, 0.005);
    }

    #[test]
    fn test_circular_areas_sum_to_multiple_circular() {
        let diameters = [1.0, 2.0, 3.0, 4.0];
        let total: f64 = diameters.iter().map(|&d| circular(d).unwrap().1).sum();
        assert_close(total, multiple_circular(&diameters).unwrap().1, 1e-12);
        // Swept disc of a 2 m rotor is π m², not 16 π m²
        assert_close(circular(2.0).unwrap().1, PI, 1e-12);
    }

    #[test]
    fn test_geometry_rejects_non_positive() {
        assert!(circular(0.0).is_err());
        assert!(rectangular(-1.0, 2.0).is_err());
        assert!(multiple_circular(&[]).is_err());
        assert!(multiple_circular(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_tip_speed_ratio() {
        // GE 1.5 rotor, rotor speeds given in rpm
        let rotor_speed: Vec<f64> = [15.0, 16.0, 17.0, 18.0].iter().map(|rpm| rpm / 60.0).collect();
        let tsr = tip_speed_ratio(&rotor_speed, 77.0, &[13.0; 4]).unwrap();
        for (actual, expected) in tsr.iter().zip([4.7, 5.0, 5.3, 5.6]) {
            assert_close(*actual, expected, 0.05);
        }
    }

    #[test]
    fn test_tip_speed_ratio_zero_inflow() {
        let err = tip_speed_ratio(&[1.0, 1.0], 10.0, &[2.0, 0.0]).unwrap_err();
        assert_eq!(err, PerformanceError::ZeroInflow(1));
    }

    #[test]
    fn test_power_coefficient() {
        // Power performance report of a wind turbine (kW)
        let inflow = [4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0];
        let power_kw = [59.0, 304.0, 742.0, 1200.0, 1400.0, 1482.0, 1497.0, 1497.0, 1511.0];
        let power: Vec<f64> = power_kw.iter().map(|p| p * 1000.0).collect();
        let expected = [0.320, 0.493, 0.508, 0.421, 0.284, 0.189, 0.128, 0.090, 0.066];

        let cp = power_coefficient(&power, &inflow, 4656.63, 1.225).unwrap();
        for (actual, expected) in cp.iter().zip(expected) {
            assert_close(*actual, expected, 0.005);
        }
    }

    #[test]
    fn test_power_coefficient_length_mismatch() {
        let err = power_coefficient(&[1.0], &[1.0, 2.0], 1.0, 1025.0).unwrap_err();
        assert_eq!(err, PerformanceError::LengthMismatch { left: 1, right: 2 });
    }
}
