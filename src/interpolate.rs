//! Scattered-point interpolation in three dimensions.
//!
//! Model output lives on an unstructured mesh stacked in sigma layers, so
//! sampling it at arbitrary points needs interpolation from scattered data.
//! This uses inverse-distance weighting over the nearest samples.

/// Number of nearest samples that contribute to each estimate.
pub const NEIGHBOURS: usize = 8;

/// Distance below which a target is treated as coincident with a sample.
const COINCIDENT: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationError {
    NoSamples,
    LengthMismatch { points: usize, values: usize },
}

impl std::fmt::Display for InterpolationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpolationError::NoSamples => write!(f, "No samples to interpolate from"),
            InterpolationError::LengthMismatch { points, values } => {
                write!(f, "{} sample points but {} values", points, values)
            }
        }
    }
}

impl std::error::Error for InterpolationError {}

/// Interpolates `values` known at `sources` onto each of `targets`.
///
/// Non-finite sample values are ignored. A target with no finite sample
/// around it gets `NaN`.
pub fn scatter_interpolate(
    sources: &[[f64; 3]],
    values: &[f64],
    targets: &[[f64; 3]],
) -> Result<Vec<f64>, InterpolationError> {
    if sources.len() != values.len() {
        return Err(InterpolationError::LengthMismatch {
            points: sources.len(),
            values: values.len(),
        });
    }
    let samples: Vec<([f64; 3], f64)> = sources
        .iter()
        .copied()
        .zip(values.iter().copied())
        .filter(|(_, v)| v.is_finite())
        .collect();
    if samples.is_empty() {
        return Err(InterpolationError::NoSamples);
    }

    Ok(targets.iter().map(|t| idw(&samples, t)).collect())
}

fn distance_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn idw(samples: &[([f64; 3], f64)], target: &[f64; 3]) -> f64 {
    let mut nearest: Vec<(f64, f64)> = samples
        .iter()
        .map(|(p, v)| (distance_sq(p, target), *v))
        .collect();
    let k = NEIGHBOURS.min(nearest.len());
    if k < nearest.len() {
        nearest.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
        nearest.truncate(k);
    }

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (d2, v) in nearest {
        if d2 <= COINCIDENT * COINCIDENT {
            return v;
        }
        // power 2
        let w = 1.0 / d2;
        weighted += w * v;
        total += w;
    }
    if total > 0.0 { weighted / total } else { f64::NAN }
}
