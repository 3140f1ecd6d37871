//! Plots of river resource series.
//!
//! Each function renders one chart to an SVG file. Duration curves put
//! exceedance probability on the x axis; relation plots scatter the samples
//! and can overlay the fitted polynomial.

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::config::PlotConfig;
use crate::model::TimeSeries;
use crate::resource::Polynomial;

const CAPTION_FONT: (&str, u32) = ("sans-serif", 24);
const LABEL_FONT: (&str, u32) = ("sans-serif", 14);
const CURVE_SAMPLES: usize = 200;
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const FIT_COLOR: RGBColor = RGBColor(214, 39, 40);

#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsError {
    EmptyData(&'static str),
    LengthMismatch { x: usize, y: usize },
    /// A log axis was requested but no sample is positive.
    NoPositiveValues,
    Drawing(String),
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphicsError::EmptyData(what) => write!(f, "Nothing to plot: {} is empty", what),
            GraphicsError::LengthMismatch { x, y } => {
                write!(f, "Cannot pair {} x values with {} y values", x, y)
            }
            GraphicsError::NoPositiveValues => write!(f, "Log axis needs positive values"),
            GraphicsError::Drawing(msg) => write!(f, "Drawing failed: {}", msg),
        }
    }
}

impl std::error::Error for GraphicsError {}

impl<E> From<DrawingAreaErrorKind<E>> for GraphicsError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        GraphicsError::Drawing(e.to_string())
    }
}

/// Axis range with 5% padding, or a fixed pad for a flat range. Non-finite
/// values are ignored; with none left there is no range.
pub fn padded_range(values: &[f64]) -> Result<Range<f64>, GraphicsError> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return Err(GraphicsError::EmptyData("axis values"));
    }
    let span = max - min;
    let pad = if span < 1e-9 { 0.5 } else { span * 0.05 };
    Ok((min - pad)..(max + pad))
}

fn pair(x: &[f64], y: &[f64], what: &'static str) -> Result<Vec<(f64, f64)>, GraphicsError> {
    if x.is_empty() || y.is_empty() {
        return Err(GraphicsError::EmptyData(what));
    }
    if x.len() != y.len() {
        return Err(GraphicsError::LengthMismatch { x: x.len(), y: y.len() });
    }
    Ok(x.iter()
        .copied()
        .zip(y.iter().copied())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect())
}

fn canvas<'a>(path: &'a Path, config: &PlotConfig) -> Result<DrawingArea<SVGBackend<'a>, Shift>, GraphicsError> {
    let root = SVGBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE)?;
    Ok(root)
}

// ---------------------------------------------------------------------------
// Duration curves
// ---------------------------------------------------------------------------

fn duration_curve(
    values: &[f64],
    exceedance: &[f64],
    y_desc: &str,
    title: &str,
    log_y: bool,
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    let mut points: Vec<(f64, f64)> = pair(exceedance, values, "duration curve")?;
    if points.is_empty() {
        return Err(GraphicsError::EmptyData("finite samples"));
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let root = canvas(path, config)?;
    let mut builder = ChartBuilder::on(&root);
    builder
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70);

    if log_y {
        points.retain(|&(_, v)| v > 0.0);
        if points.is_empty() {
            return Err(GraphicsError::NoPositiveValues);
        }
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let min = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if max > min { (min * 0.9, max * 1.1) } else { (min * 0.5, min * 2.0) };

        let mut chart = builder.build_cartesian_2d(0f64..100f64, (lo..hi).log_scale())?;
        chart
            .configure_mesh()
            .x_desc("Exceedance Probability (%)")
            .y_desc(y_desc)
            .label_style(LABEL_FONT)
            .draw()?;
        chart.draw_series(LineSeries::new(points, LINE_COLOR.stroke_width(2)))?;
    } else {
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let mut chart = builder.build_cartesian_2d(0f64..100f64, padded_range(&ys)?)?;
        chart
            .configure_mesh()
            .x_desc("Exceedance Probability (%)")
            .y_desc(y_desc)
            .label_style(LABEL_FONT)
            .draw()?;
        chart.draw_series(LineSeries::new(points, LINE_COLOR.stroke_width(2)))?;
    }

    root.present()?;
    Ok(())
}

/// Flow duration curve: discharge on a log axis against exceedance (%).
pub fn plot_flow_duration_curve(
    discharge: &[f64],
    exceedance: &[f64],
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    duration_curve(
        discharge,
        exceedance,
        "Discharge (m³/s)",
        "Flow Duration Curve",
        true,
        path,
        config,
    )
}

/// Power duration curve: power against the exceedance (%) of its discharge.
pub fn plot_power_duration_curve(
    power: &[f64],
    exceedance: &[f64],
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    duration_curve(power, exceedance, "Power (W)", "Power Duration Curve", false, path, config)
}

/// Velocity duration curve: velocity against the exceedance (%) of its
/// discharge.
pub fn plot_velocity_duration_curve(
    velocity: &[f64],
    exceedance: &[f64],
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    duration_curve(
        velocity,
        exceedance,
        "Velocity (m/s)",
        "Velocity Duration Curve",
        false,
        path,
        config,
    )
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

pub fn plot_discharge_timeseries(
    discharge: &TimeSeries,
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    let points: Vec<_> = discharge
        .points()
        .into_iter()
        .filter(|(_, v)| v.is_finite())
        .collect();
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first.0, last.0),
        _ => return Err(GraphicsError::EmptyData("discharge")),
    };
    let end = if last > first { last } else { first + chrono::Duration::hours(1) };
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&discharge.name, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(first..end, padded_range(&ys)?)?;

    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc("Discharge (m³/s)")
        .x_labels(6)
        .x_label_formatter(&|t| t.format("%Y-%m-%d").to_string())
        .label_style(LABEL_FONT)
        .draw()?;
    chart.draw_series(LineSeries::new(points, LINE_COLOR.stroke_width(1)))?;

    root.present()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

fn scatter_with_fit(
    x: &[f64],
    y: &[f64],
    curve: Option<&Polynomial>,
    x_desc: &str,
    y_desc: &str,
    title: &str,
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    let points = pair(x, y, "relation samples")?;
    if points.is_empty() {
        return Err(GraphicsError::EmptyData("finite samples"));
    }
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let x_range = padded_range(&xs)?;

    let fitted: Vec<(f64, f64)> = match curve {
        Some(p) => {
            let step = (x_range.end - x_range.start) / (CURVE_SAMPLES - 1) as f64;
            (0..CURVE_SAMPLES)
                .map(|i| {
                    let xi = x_range.start + step * i as f64;
                    (xi, p.evaluate(xi))
                })
                .collect()
        }
        None => Vec::new(),
    };
    let ys: Vec<f64> = points.iter().chain(&fitted).map(|p| p.1).collect();

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, padded_range(&ys)?)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .label_style(LABEL_FONT)
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|&(a, b)| Circle::new((a, b), 3, LINE_COLOR.filled())),
    )?;
    if !fitted.is_empty() {
        chart.draw_series(LineSeries::new(fitted, FIT_COLOR.stroke_width(2)))?;
    }

    root.present()?;
    Ok(())
}

/// Discharge against velocity, with the fitted rating curve if given.
pub fn plot_discharge_vs_velocity(
    discharge: &[f64],
    velocity: &[f64],
    curve: Option<&Polynomial>,
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    scatter_with_fit(
        discharge,
        velocity,
        curve,
        "Discharge (m³/s)",
        "Velocity (m/s)",
        "Discharge vs Velocity",
        path,
        config,
    )
}

/// Velocity against power, with the fitted power curve if given.
pub fn plot_velocity_vs_power(
    velocity: &[f64],
    power: &[f64],
    curve: Option<&Polynomial>,
    path: &Path,
    config: &PlotConfig,
) -> Result<(), GraphicsError> {
    scatter_with_fit(
        velocity,
        power,
        curve,
        "Velocity (m/s)",
        "Power (W)",
        "Velocity vs Power",
        path,
        config,
    )
}
