//! Core data types shared by the resource, graphics and I/O modules.
//!
//! Everything here is a transient value passed between pure functions.
//! There is no I/O in this module.

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// USGS parameter code for discharge (streamflow), in cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

/// USGS parameter code for gage height (stage), in feet.
pub const PARAM_STAGE: &str = "00065";

/// Standard gravity in m/s².
pub const GRAVITY: f64 = 9.80665;

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// A named numeric series on a non-decreasing UTC time index.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub index: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    /// Builds a series, rejecting mismatched lengths and an index that
    /// goes backwards in time.
    pub fn new(
        name: impl Into<String>,
        index: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if index.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                index: index.len(),
                values: values.len(),
            });
        }
        if let Some(pos) = index.windows(2).position(|w| w[1] < w[0]) {
            return Err(SeriesError::NonMonotonicIndex(pos + 1));
        }
        Ok(Self {
            name: name.into(),
            index,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same index, new name and values. Used by the transforms that map
    /// one series onto another (discharge → velocity → power).
    pub fn with_values(&self, name: impl Into<String>, values: Vec<f64>) -> Result<Self, SeriesError> {
        Self::new(name, self.index.clone(), values)
    }

    /// `(timestamp, value)` pairs, ready for plotting.
    pub fn points(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.index.iter().copied().zip(self.values.iter().copied()).collect()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesError {
    LengthMismatch { index: usize, values: usize },
    /// Position of the first timestamp that is earlier than its predecessor.
    NonMonotonicIndex(usize),
}

impl std::fmt::Display for SeriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesError::LengthMismatch { index, values } => {
                write!(f, "Index has {} entries but {} values were given", index, values)
            }
            SeriesError::NonMonotonicIndex(pos) => {
                write!(f, "Time index decreases at position {}", pos)
            }
        }
    }
}

impl std::error::Error for SeriesError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
