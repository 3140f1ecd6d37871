//! River energy resource assessment.
//!
//! Turbine geometry and performance formulas, flow-duration statistics,
//! discharge → velocity → power transforms, duration-curve plots, and
//! readers for USGS gauge data and Delft3D-FM model output.
//!
//! Modules:
//! - `model`: shared series types
//! - `performance`: capture geometry, tip speed ratio, power coefficient
//! - `resource`: exceedance probability, curve fits, energy
//! - `graphics`: SVG plots of derived series
//! - `interpolate`: scattered 3D interpolation
//! - `io`: USGS NWIS and Delft3D adapters
//! - `config`, `logging`: settings and run logs

pub mod config;
pub mod graphics;
pub mod interpolate;
pub mod io;
pub mod logging;
pub mod model;
pub mod performance;
pub mod resource;
