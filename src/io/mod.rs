//! Adapters for external data sources.
//!
//! Submodules:
//! - `usgs`: NWIS daily and instantaneous values, from saved JSON or HTTP.
//! - `d3d`: Delft3D-FM map output (layered unstructured mesh).

pub mod d3d;
pub mod usgs;
