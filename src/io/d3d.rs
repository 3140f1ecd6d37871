//! Delft3D-FM map output.
//!
//! Map files store 3D fields on an unstructured mesh of flow elements
//! stacked in sigma layers, e.g. `ucx(time, nFlowElem, laydim)`. Layer
//! centre variables use the `laydim` dimension and `LayCoord_cc` for their
//! sigma coordinate; interface variables (`turkin1`, `ww1`) use `wdim` and
//! `LayCoord_w`. Horizontal positions are named by the variable's
//! `coordinates` attribute, e.g. `"FlowElem_xcc FlowElem_ycc"`.
//!
//! All functions work through the [`ModelOutput`] trait. [`MemoryOutput`]
//! is always available; with the `netcdf` feature a `netcdf::File` is a
//! `ModelOutput` too.
//!
//! ```rust,ignore
//! let data = river_energy::io::d3d::open("turbineTest_map.nc")?;
//! let layer = get_layer_data(&data, "ucx", 2, -1)?;
//! ```

use std::collections::BTreeMap;

use crate::interpolate::{InterpolationError, scatter_interpolate};
use crate::logging::{self, DataSource};

/// Variable holding the still-water depth per flow element.
pub const WATER_DEPTH: &str = "waterdepth";
pub const TIME: &str = "time";
pub const LAYER_CENTRES: &str = "LayCoord_cc";
pub const LAYER_INTERFACES: &str = "LayCoord_w";

/// Variables combined by [`turbulent_intensity`].
pub const TURBULENCE_VARIABLES: [&str; 4] = ["turkin1", "ucx", "ucy", "ucz"];

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum D3dError {
    MissingVariable(String),
    /// The variable lacks a usable `coordinates` attribute.
    MissingCoordinates(String),
    UnexpectedShape { variable: String, expected: usize, found: Vec<usize> },
    TimeIndexOutOfRange { index: i64, steps: usize },
    LayerOutOfRange { layer: usize, layers: usize },
    /// The last dimension is neither `laydim` nor `wdim`.
    UnsupportedLayout { variable: String, dimension: String },
    InvalidPoints(String),
    LengthMismatch { expected: usize, found: usize },
    Interpolation(InterpolationError),
    NetCdf(String),
}

impl std::fmt::Display for D3dError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            D3dError::MissingVariable(name) => write!(f, "Missing variable: {}", name),
            D3dError::MissingCoordinates(name) => {
                write!(f, "Variable {} has no x/y coordinates attribute", name)
            }
            D3dError::UnexpectedShape { variable, expected, found } => write!(
                f,
                "Variable {} should have {} dimensions, has shape {:?}",
                variable, expected, found
            ),
            D3dError::TimeIndexOutOfRange { index, steps } => {
                write!(f, "Time index {} out of range for {} time steps", index, steps)
            }
            D3dError::LayerOutOfRange { layer, layers } => {
                write!(f, "Layer {} out of range for {} layers", layer, layers)
            }
            D3dError::UnsupportedLayout { variable, dimension } => write!(
                f,
                "Variable {} has vertical dimension {:?}, expected laydim or wdim",
                variable, dimension
            ),
            D3dError::InvalidPoints(msg) => write!(f, "Invalid points: {}", msg),
            D3dError::LengthMismatch { expected, found } => {
                write!(f, "Expected {} values, found {}", expected, found)
            }
            D3dError::Interpolation(e) => write!(f, "Interpolation failed: {}", e),
            D3dError::NetCdf(msg) => write!(f, "NetCDF error: {}", msg),
        }
    }
}

impl std::error::Error for D3dError {}

impl From<InterpolationError> for D3dError {
    fn from(e: InterpolationError) -> Self {
        D3dError::Interpolation(e)
    }
}

// ============================================================================
// Data access
// ============================================================================

/// A variable read in full: its dimensions in order, the names from its
/// `coordinates` attribute, and its values flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dimensions: Vec<(String, usize)>,
    pub coordinates: Vec<String>,
    pub values: Vec<f64>,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        dimensions: Vec<(&str, usize)>,
        values: Vec<f64>,
    ) -> Result<Self, D3dError> {
        let expected: usize = dimensions.iter().map(|(_, len)| len).product();
        if expected != values.len() {
            return Err(D3dError::LengthMismatch { expected, found: values.len() });
        }
        Ok(Self {
            name: name.into(),
            dimensions: dimensions.into_iter().map(|(d, len)| (d.to_string(), len)).collect(),
            coordinates: Vec::new(),
            values,
        })
    }

    /// Sets the `coordinates` attribute from its space-separated form.
    pub fn with_coordinates(mut self, coordinates: &str) -> Self {
        self.coordinates = coordinates.split_whitespace().map(String::from).collect();
        self
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(|(_, len)| *len).collect()
    }

    fn expect_rank(&self, rank: usize) -> Result<(), D3dError> {
        if self.dimensions.len() == rank {
            Ok(())
        } else {
            Err(D3dError::UnexpectedShape {
                variable: self.name.clone(),
                expected: rank,
                found: self.shape(),
            })
        }
    }
}

/// Source of model variables.
pub trait ModelOutput {
    fn read_variable(&self, name: &str) -> Result<Variable, D3dError>;

    fn variable_names(&self) -> Vec<String>;
}

/// Model output held in memory, keyed by variable name.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    variables: BTreeMap<String, Variable>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }
}

impl ModelOutput for MemoryOutput {
    fn read_variable(&self, name: &str) -> Result<Variable, D3dError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| D3dError::MissingVariable(name.to_string()))
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }
}

#[cfg(feature = "netcdf")]
impl From<netcdf::Error> for D3dError {
    fn from(e: netcdf::Error) -> Self {
        D3dError::NetCdf(e.to_string())
    }
}

/// Opens a Delft3D-FM map file.
#[cfg(feature = "netcdf")]
pub fn open(path: impl AsRef<std::path::Path>) -> Result<netcdf::File, D3dError> {
    Ok(netcdf::open(path)?)
}

#[cfg(feature = "netcdf")]
impl ModelOutput for netcdf::File {
    fn read_variable(&self, name: &str) -> Result<Variable, D3dError> {
        let var = self
            .variable(name)
            .ok_or_else(|| D3dError::MissingVariable(name.to_string()))?;

        let dimensions = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect();
        let coordinates = match var.attribute_value("coordinates").and_then(|r| r.ok()) {
            Some(netcdf::AttributeValue::Str(s)) => {
                s.split_whitespace().map(String::from).collect()
            }
            _ => Vec::new(),
        };
        let values: Vec<f64> = var.get_values(..)?;

        Ok(Variable {
            name: name.to_string(),
            dimensions,
            coordinates,
            values,
        })
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables().map(|v| v.name()).collect()
    }
}

// ============================================================================
// Layers
// ============================================================================

/// One variable on one layer at one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub v: Vec<f64>,
    pub time: f64,
}

/// Resolves a possibly negative (from the end) time index.
fn resolve_time(index: i64, steps: usize) -> Result<usize, D3dError> {
    let resolved = if index < 0 { steps as i64 + index } else { index };
    if resolved < 0 || resolved >= steps as i64 {
        return Err(D3dError::TimeIndexOutOfRange { index, steps });
    }
    Ok(resolved as usize)
}

/// Model time of every output step.
pub fn time_steps(data: &impl ModelOutput) -> Result<Vec<f64>, D3dError> {
    let time = data.read_variable(TIME)?;
    time.expect_rank(1)?;
    Ok(time.values)
}

fn horizontal_coordinates(
    data: &impl ModelOutput,
    var: &Variable,
    cells: usize,
) -> Result<(Vec<f64>, Vec<f64>), D3dError> {
    if var.coordinates.len() < 2 {
        return Err(D3dError::MissingCoordinates(var.name.clone()));
    }
    let x = data.read_variable(&var.coordinates[0])?.values;
    let y = data.read_variable(&var.coordinates[1])?.values;
    for axis in [&x, &y] {
        if axis.len() != cells {
            return Err(D3dError::LengthMismatch { expected: cells, found: axis.len() });
        }
    }
    Ok((x, y))
}

/// Values of a `(time, cells, layers)` variable at one time and layer.
fn layer_slice(var: &Variable, time: usize, layer: usize) -> Vec<f64> {
    let shape = var.shape();
    let (cells, layers) = (shape[1], shape[2]);
    let base = time * cells * layers;
    (0..cells).map(|cell| var.values[base + cell * layers + layer]).collect()
}

/// Reads `variable` on `layer_index` at `time_index` together with the
/// x/y position of each flow element. Negative time indices count from the
/// last output step.
pub fn get_layer_data(
    data: &impl ModelOutput,
    variable: &str,
    layer_index: usize,
    time_index: i64,
) -> Result<LayerData, D3dError> {
    let var = data.read_variable(variable)?;
    var.expect_rank(3)?;
    let shape = var.shape();
    let (steps, cells, layers) = (shape[0], shape[1], shape[2]);

    let t = resolve_time(time_index, steps)?;
    if layer_index >= layers {
        return Err(D3dError::LayerOutOfRange { layer: layer_index, layers });
    }

    let (x, y) = horizontal_coordinates(data, &var, cells)?;
    let times = time_steps(data)?;
    let time = *times
        .get(t)
        .ok_or(D3dError::TimeIndexOutOfRange { index: time_index, steps: times.len() })?;

    Ok(LayerData {
        x,
        y,
        v: layer_slice(&var, t, layer_index),
        time,
    })
}

// ============================================================================
// Points
// ============================================================================

/// One axis of the input to [`create_points`].
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinate {
    Point(f64),
    Array(Vec<f64>),
}

impl Coordinate {
    fn values(&self) -> &[f64] {
        match self {
            Coordinate::Point(v) => std::slice::from_ref(v),
            Coordinate::Array(values) => values,
        }
    }
}

impl From<f64> for Coordinate {
    fn from(v: f64) -> Self {
        Coordinate::Point(v)
    }
}

impl From<Vec<f64>> for Coordinate {
    fn from(values: Vec<f64>) -> Self {
        Coordinate::Array(values)
    }
}

/// Builds `[x, y, z]` points from up to two arrays and the remaining
/// scalars. Two arrays form a grid with the earlier axis varying fastest;
/// three scalars give a single point.
pub fn create_points(x: Coordinate, y: Coordinate, z: Coordinate) -> Result<Vec<[f64; 3]>, D3dError> {
    let axes = [&x, &y, &z];
    let arrays = axes.iter().filter(|c| matches!(c, Coordinate::Array(_))).count();
    if arrays == 3 {
        return Err(D3dError::InvalidPoints(
            "at most two of x, y and z may be arrays".to_string(),
        ));
    }
    if axes.iter().any(|c| c.values().is_empty()) {
        return Err(D3dError::InvalidPoints("empty coordinate array".to_string()));
    }

    let mut points = Vec::with_capacity(x.values().len() * y.values().len() * z.values().len());
    for &zk in z.values() {
        for &yj in y.values() {
            for &xi in x.values() {
                points.push([xi, yj, zk]);
            }
        }
    }
    Ok(points)
}

/// Element-wise Euclidean norm of three components.
pub fn unorm(x: &[f64], y: &[f64], z: &[f64]) -> Result<Vec<f64>, D3dError> {
    for other in [y, z] {
        if other.len() != x.len() {
            return Err(D3dError::LengthMismatch { expected: x.len(), found: other.len() });
        }
    }
    Ok(x.iter()
        .zip(y)
        .zip(z)
        .map(|((a, b), c)| (a * a + b * b + c * c).sqrt())
        .collect())
}

// ============================================================================
// All layers
// ============================================================================

/// A value of one variable placed in 3D. `z` is height above the bed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub value: f64,
}

impl DataPoint {
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Fraction of the water column below a sigma level. Accepts sigma counted
/// upward from the bed (0..1) or downward from the surface (-1..0).
fn height_fraction(sigma: f64) -> f64 {
    if sigma < 0.0 { 1.0 + sigma } else { sigma }
}

/// Every layer of `variable` at `time_index`, placed at
/// `z = sigma · waterdepth` over its flow element.
pub fn get_all_data_points(
    data: &impl ModelOutput,
    variable: &str,
    time_index: i64,
) -> Result<Vec<DataPoint>, D3dError> {
    let var = data.read_variable(variable)?;
    var.expect_rank(3)?;
    let shape = var.shape();
    let (steps, cells, layers) = (shape[0], shape[1], shape[2]);
    let t = resolve_time(time_index, steps)?;

    let vertical = &var.dimensions[2].0;
    let sigma_name = match vertical.as_str() {
        "laydim" => LAYER_CENTRES,
        "wdim" => LAYER_INTERFACES,
        other => {
            return Err(D3dError::UnsupportedLayout {
                variable: variable.to_string(),
                dimension: other.to_string(),
            });
        }
    };
    let sigma = data.read_variable(sigma_name)?.values;
    if sigma.len() != layers {
        return Err(D3dError::LengthMismatch { expected: layers, found: sigma.len() });
    }

    let depth_var = data.read_variable(WATER_DEPTH)?;
    depth_var.expect_rank(2)?;
    let depth_shape = depth_var.shape();
    if depth_shape[1] != cells {
        return Err(D3dError::LengthMismatch { expected: cells, found: depth_shape[1] });
    }
    let depth_t = resolve_time(time_index, depth_shape[0])?;
    let depth = &depth_var.values[depth_t * cells..(depth_t + 1) * cells];

    let (x, y) = horizontal_coordinates(data, &var, cells)?;

    let mut points = Vec::with_capacity(cells * layers);
    for (layer, &s) in sigma.iter().enumerate() {
        let fraction = height_fraction(s);
        let values = layer_slice(&var, t, layer);
        for cell in 0..cells {
            points.push(DataPoint {
                x: x[cell],
                y: y[cell],
                z: fraction * depth[cell],
                value: values[cell],
            });
        }
    }

    logging::debug(
        DataSource::D3d,
        Some(variable),
        &format!("{} points over {} layers at step {}", points.len(), layers, t),
    );
    Ok(points)
}

// ============================================================================
// Turbulence
// ============================================================================

/// Turbulence fields interpolated to one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurbulenceSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub turkin1: f64,
    pub ucx: f64,
    pub ucy: f64,
    pub ucz: f64,
    pub turbulent_intensity: f64,
}

/// Interpolates a variable at `time_index` onto `points`.
pub fn interpolate_variable(
    data: &impl ModelOutput,
    variable: &str,
    points: &[[f64; 3]],
    time_index: i64,
) -> Result<Vec<f64>, D3dError> {
    let all = get_all_data_points(data, variable, time_index)?;
    let sources: Vec<[f64; 3]> = all.iter().map(DataPoint::position).collect();
    let values: Vec<f64> = all.iter().map(|p| p.value).collect();
    Ok(scatter_interpolate(&sources, &values, points)?)
}

/// Turbulent intensity `sqrt(2/3 · k) / |u|` at each point, where `k` is
/// the turbulent kinetic energy `turkin1` and `u = (ucx, ucy, ucz)`.
/// Points where the flow is still get `NaN`.
pub fn turbulent_intensity(
    data: &impl ModelOutput,
    points: &[[f64; 3]],
    time_index: i64,
) -> Result<Vec<TurbulenceSample>, D3dError> {
    if points.is_empty() {
        return Err(D3dError::InvalidPoints("no points given".to_string()));
    }

    let mut fields = Vec::with_capacity(TURBULENCE_VARIABLES.len());
    for name in TURBULENCE_VARIABLES {
        fields.push(interpolate_variable(data, name, points, time_index)?);
    }
    let (turkin1, ucx, ucy, ucz) = (&fields[0], &fields[1], &fields[2], &fields[3]);
    let u_mag = unorm(ucx, ucy, ucz)?;

    Ok(points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let ti = if u_mag[i] > 0.0 {
                (2.0 / 3.0 * turkin1[i]).sqrt() / u_mag[i]
            } else {
                f64::NAN
            };
            TurbulenceSample {
                x: p[0],
                y: p[1],
                z: p[2],
                turkin1: turkin1[i],
                ucx: ucx[i],
                ucy: ucy[i],
                ucz: ucz[i],
                turbulent_intensity: ti,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
