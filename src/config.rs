//! Run configuration for the processing pipelines.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ndvi::NdviParams;

/// Resampling used when warping bands onto the common grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
}

/// Red, NIR and QA files of one Landsat acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFiles {
    pub red: PathBuf,
    pub nir: PathBuf,
    pub qa: PathBuf,
}

impl SceneFiles {
    pub fn new(red: impl Into<PathBuf>, nir: impl Into<PathBuf>, qa: impl Into<PathBuf>) -> Self {
        Self {
            red: red.into(),
            nir: nir.into(),
            qa: qa.into(),
        }
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.red, &self.nir, &self.qa]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignConfig {
    /// Target `(dx, dy)` in georeferenced units.
    pub pixel_size: (f64, f64),
    /// Applied to reflectance bands; QA bands always use nearest neighbour.
    pub resampling: Resampling,
    /// Where to keep the aligned rasters as GeoTIFF, if anywhere.
    pub aligned_dir: Option<PathBuf>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            pixel_size: (120.0, -120.0),
            resampling: Resampling::Nearest,
            aligned_dir: None,
        }
    }
}

/// Two-date NDVI difference run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffConfig {
    pub t1: SceneFiles,
    pub t2: SceneFiles,
    pub output: PathBuf,
    pub align: AlignConfig,
    pub params: NdviParams,
}

impl DiffConfig {
    pub fn new(t1: SceneFiles, t2: SceneFiles, output: impl Into<PathBuf>) -> Self {
        Self {
            t1,
            t2,
            output: output.into(),
            align: AlignConfig::default(),
            params: NdviParams::default(),
        }
    }
}

/// Single-date NDVI run. Without a QA file every pixel is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct NdviConfig {
    pub red: PathBuf,
    pub nir: PathBuf,
    pub qa: Option<PathBuf>,
    pub output: PathBuf,
    pub params: NdviParams,
}

/// GeoTIFF directory to time cube conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeConfig {
    pub directory: PathBuf,
    pub netcdf: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    /// `(x, y)` pixel whose time series goes to the CSV.
    pub pixel: (usize, usize),
}

impl CubeConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            netcdf: None,
            csv: None,
            pixel: (200, 200),
        }
    }

    /// Reject runs that would load the cube and then write nothing.
    pub fn validate(&self) -> Result<()> {
        if self.netcdf.is_none() && self.csv.is_none() {
            return Err(Error::NoCubeOutputs);
        }
        if self.netcdf.is_some() && !cfg!(feature = "netcdf") {
            return Err(Error::FeatureDisabled("NetCDF"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_paths_in_band_order() {
        let scene = SceneFiles::new("B4.tif", "B5.tif", "QA.tif");
        assert_eq!(
            scene.paths(),
            [Path::new("B4.tif"), Path::new("B5.tif"), Path::new("QA.tif")]
        );
    }

    #[test]
    fn test_cube_without_outputs_rejected() {
        let config = CubeConfig::new("data");
        assert!(matches!(config.validate(), Err(Error::NoCubeOutputs)));

        let config = CubeConfig {
            csv: Some("AET.csv".into()),
            ..CubeConfig::new("data")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    #[cfg(not(feature = "netcdf"))]
    fn test_netcdf_output_needs_feature() {
        let config = CubeConfig {
            netcdf: Some("AET.nc".into()),
            csv: Some("AET.csv".into()),
            ..CubeConfig::new("data")
        };
        assert!(matches!(
            config.validate(),
            Err(Error::FeatureDisabled("NetCDF"))
        ));
    }

    #[test]
    #[cfg(feature = "netcdf")]
    fn test_netcdf_output_accepted() {
        let config = CubeConfig {
            netcdf: Some("AET.nc".into()),
            ..CubeConfig::new("data")
        };
        assert!(config.validate().is_ok());
    }
}
