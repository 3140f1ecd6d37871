//! End-to-end resource assessment on a saved gauge record
//!
//! Tests verify:
//! 1. Discharge → exceedance probability on real-shaped data
//! 2. Discharge → velocity → power through fitted curves
//! 3. Every plot helper writes an SVG file
//!
//! Run with: cargo test --test resource_pipeline

use std::path::{Path, PathBuf};

use river_energy::config::PlotConfig;
use river_energy::graphics;
use river_energy::io::usgs;
use river_energy::model::TimeSeries;
use river_energy::resource::{self, Polynomial};

fn daily_discharge() -> TimeSeries {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("USGS_08313000_Jan2019_daily.json");
    let table = usgs::read_usgs_file(path).expect("saved DV response should parse");
    let cfs = table
        .column("Discharge, cubic feet per second")
        .expect("discharge column");
    // cfs → m³/s
    let cms = cfs.values.iter().map(|q| q * 0.0283168).collect();
    cfs.with_values("Discharge", cms).unwrap()
}

/// Rating curves loosely shaped like a shallow sand-bed reach
fn curves() -> (Polynomial, Polynomial) {
    let q: Vec<f64> = (0..20).map(|i| 5.0 + i as f64).collect();
    let v: Vec<f64> = q.iter().map(|q| 0.2 + 0.08 * q).collect();
    let (dv, _) = resource::polynomial_fit(&q, &v, 1).unwrap();

    let speeds: Vec<f64> = (0..20).map(|i| 0.5 + 0.1 * i as f64).collect();
    let power: Vec<f64> = speeds.iter().map(|s| 400.0 * s * s * s).collect();
    let (vp, r2) = resource::polynomial_fit(&speeds, &power, 3).unwrap();
    assert!((r2 - 1.0).abs() < 1e-9);
    (dv, vp)
}

fn assert_svg(path: &Path) {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("{} was not written: {}", path.display(), e));
    assert!(text.contains("<svg"), "{} is not an SVG document", path.display());
}

#[test]
fn test_exceedance_of_gauge_record() {
    let q = daily_discharge();
    let f = resource::exceedance_probability_series(&q).unwrap();
    assert_eq!(f.index, q.index);

    let n = q.len() as f64;
    for value in &f.values {
        assert!(*value >= 100.0 / (n + 1.0) - 1e-9 && *value <= 100.0 * n / (n + 1.0) + 1e-9);
    }

    // The largest flow is exceeded least often
    let max_pos = q
        .values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    let min_f = f.values.iter().copied().fold(f64::INFINITY, f64::min);
    assert_eq!(f.values[max_pos], min_f);
}

#[test]
fn test_discharge_to_energy_chain() {
    let q = daily_discharge();
    let (dv, vp) = curves();

    let v = resource::discharge_to_velocity_series(&q, &dv).unwrap();
    assert_eq!(v.len(), q.len());
    for (qi, vi) in q.values.iter().zip(&v.values) {
        assert!((vi - (0.2 + 0.08 * qi)).abs() < 1e-9);
    }

    let v_min = v.values.iter().copied().fold(f64::INFINITY, f64::min);
    let v_max = v.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let cut_in = v_min + 0.25 * (v_max - v_min);
    let p = resource::velocity_to_power_series(&v, &vp, cut_in, v_max).unwrap();

    for (vi, pi) in v.values.iter().zip(&p.values) {
        if *vi < cut_in {
            assert_eq!(*pi, 0.0);
        } else {
            assert!((pi - 400.0 * vi.powi(3)).abs() < 1e-6 * pi.abs().max(1.0));
        }
    }

    let one_day = 86_400.0;
    let energy = resource::energy_produced(&p.values, one_day * p.len() as f64).unwrap();
    let summed: f64 = p.values.iter().map(|w| w * one_day).sum();
    assert!((energy - summed).abs() < 1e-6 * summed);
}

#[test]
fn test_plots_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlotConfig::default();

    let q = daily_discharge();
    let (dv, vp) = curves();
    let f = resource::exceedance_probability(&q.values).unwrap();
    let v = resource::discharge_to_velocity(&q.values, &dv).unwrap();
    let p = resource::velocity_to_power(&v, &vp, 0.0, f64::MAX).unwrap();

    let flow = dir.path().join("river_plot_flow_duration_curve.svg");
    graphics::plot_flow_duration_curve(&q.values, &f, &flow, &config).unwrap();
    assert_svg(&flow);

    let power = dir.path().join("river_plot_power_duration_curve.svg");
    graphics::plot_power_duration_curve(&p, &f, &power, &config).unwrap();
    assert_svg(&power);

    let velocity = dir.path().join("river_plot_velocity_duration_curve.svg");
    graphics::plot_velocity_duration_curve(&v, &f, &velocity, &config).unwrap();
    assert_svg(&velocity);

    let series = dir.path().join("river_plot_discharge_timeseries.svg");
    graphics::plot_discharge_timeseries(&q, &series, &config).unwrap();
    assert_svg(&series);

    let qv = dir.path().join("river_plot_discharge_vs_velocity.svg");
    graphics::plot_discharge_vs_velocity(&q.values, &v, Some(&dv), &qv, &config).unwrap();
    assert_svg(&qv);

    let vp_path = dir.path().join("river_plot_velocity_vs_power.svg");
    graphics::plot_velocity_vs_power(&v, &p, None, &vp_path, &config).unwrap();
    assert_svg(&vp_path);
}

#[test]
fn test_flow_duration_rejects_all_zero_flow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dry.svg");
    let err = graphics::plot_flow_duration_curve(&[0.0, 0.0], &[33.3, 66.7], &path, &PlotConfig::default())
        .unwrap_err();
    assert_eq!(err, graphics::GraphicsError::NoPositiveValues);
}
