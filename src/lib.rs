//! NDVI tooling for Landsat scenes.
//!
//! - [`ndvi`]: single-date NDVI and masked two-date NDVI difference
//! - [`grid`]: extents and the common pixel grid of an aligned stack
//! - [`cube`]: GeoTIFF directories stacked along time, exported to CSV/NetCDF
//!
//! With the `gdal` feature (on by default) the crate also reads, aligns and
//! writes rasters, see [`pipeline`].

pub mod config;
pub mod cube;
pub mod error;
pub mod grid;
pub mod ndvi;

#[cfg(feature = "gdal")]
pub mod align;
#[cfg(feature = "gdal")]
pub mod io;
#[cfg(feature = "gdal")]
pub mod pipeline;

pub use config::{AlignConfig, CubeConfig, DiffConfig, NdviConfig, Resampling, SceneFiles};
pub use error::{Error, Result};
pub use ndvi::{
    masked_ndvi, ndvi, ndvi_difference, BandTriple, DifferenceSummary, NdviDifference, NdviParams,
    NonFinitePolicy, NODATA,
};
