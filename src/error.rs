//! Error types for NDVI processing

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{band} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        band: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("input rasters do not overlap")]
    EmptyIntersection,

    #[error("no input rasters given")]
    NoInputs,

    #[error("rotated geotransforms are not supported: {0:?}")]
    RotatedGrid([f64; 6]),

    #[error("invalid pixel size ({0}, {1})")]
    InvalidPixelSize(f64, f64),

    #[error("no GeoTIFF files found in {}", .0.display())]
    NoRasters(PathBuf),

    #[error("cannot read a YYYYMM date from {}", .file.display())]
    InvalidFileTime { file: PathBuf },

    #[error("pixel ({x}, {y}) outside {width}x{height} grid")]
    PixelOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("warping {} failed", .0.display())]
    Warp(PathBuf),

    #[error("cube run writes no output, give a NetCDF or CSV path")]
    NoCubeOutputs,

    #[error("built without {0} support")]
    FeatureDisabled(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
