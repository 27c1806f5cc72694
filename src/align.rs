//! Warp a raster stack onto one shared pixel grid.
//!
//! The grid covers the intersection of all inputs at the configured pixel
//! size. Warping itself is done by `GDALReprojectImage` into in-memory
//! datasets.

use std::fs;
use std::path::{Path, PathBuf};
use std::ptr;

use gdal::raster::GdalType;
use gdal::{Dataset, DriverManager};
use gdal_sys::{CPLErr, GDALResampleAlg};
use log::{debug, info};
use ndarray::Array2;

use crate::config::{AlignConfig, Resampling};
use crate::error::{Error, Result};
use crate::grid::{intersect_all, Extent, GridSpec};
use crate::io::{band_to_array, Georef, RasterInfo};

/// One raster to align, with the resampling suited to its content.
#[derive(Debug, Clone, Copy)]
pub struct AlignInput<'a> {
    pub path: &'a Path,
    pub name: &'static str,
    pub resampling: Resampling,
}

impl<'a> AlignInput<'a> {
    pub fn reflectance(path: &'a Path, name: &'static str, resampling: Resampling) -> Self {
        Self {
            path,
            name,
            resampling,
        }
    }

    /// Bit-coded bands must never be interpolated.
    pub fn quality(path: &'a Path, name: &'static str) -> Self {
        Self {
            path,
            name,
            resampling: Resampling::Nearest,
        }
    }
}

pub struct AlignedRaster {
    pub name: &'static str,
    pub source: PathBuf,
    pub dataset: Dataset,
}

pub struct AlignedStack {
    pub grid: GridSpec,
    pub projection: String,
    pub rasters: Vec<AlignedRaster>,
}

impl AlignedStack {
    pub fn georef(&self) -> Georef {
        Georef {
            projection: self.projection.clone(),
            geo_transform: self.grid.geo_transform,
        }
    }

    pub fn read<T: GdalType + Copy>(&self, index: usize) -> Result<Array2<T>> {
        let raster = &self.rasters[index];
        debug!(
            "Reading aligned {} (from {})",
            raster.name,
            raster.source.display()
        );
        band_to_array(&raster.dataset, 1)
    }
}

fn resample_alg(resampling: Resampling) -> GDALResampleAlg::Type {
    match resampling {
        Resampling::Nearest => GDALResampleAlg::GRA_NearestNeighbour,
        Resampling::Bilinear => GDALResampleAlg::GRA_Bilinear,
        Resampling::Cubic => GDALResampleAlg::GRA_Cubic,
    }
}

/// Grid covering the overlap of every source at `pixel_size`.
pub fn target_grid(sources: &[RasterInfo], pixel_size: (f64, f64)) -> Result<GridSpec> {
    let extents = sources
        .iter()
        .map(|info| Extent::from_geo_transform(&info.georef.geo_transform, info.width, info.height))
        .collect::<Result<Vec<_>>>()?;
    let overlap = intersect_all(&extents)?;
    debug!("Intersection extent: {:?}", overlap);
    GridSpec::from_extent(&overlap, pixel_size)
}

fn warp_into(
    source: &Dataset,
    grid: &GridSpec,
    projection: &str,
    input: &AlignInput,
) -> Result<Dataset> {
    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut aligned = driver.create_with_band_type::<f64, _>(
        "",
        grid.width,
        grid.height,
        1,
    )?;
    if !projection.is_empty() {
        aligned.set_projection(projection)?;
    }
    aligned.set_geo_transform(&grid.geo_transform)?;

    if let Some(nodata) = source.rasterband(1)?.no_data_value() {
        aligned.rasterband(1)?.set_no_data_value(Some(nodata))?;
    }

    let rv = unsafe {
        gdal_sys::GDALReprojectImage(
            source.c_dataset(),
            ptr::null(),
            aligned.c_dataset(),
            ptr::null(),
            resample_alg(input.resampling),
            0.0,
            0.0,
            None,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if rv != CPLErr::CE_None {
        return Err(Error::Warp(input.path.to_path_buf()));
    }
    Ok(aligned)
}

/// Align every input onto the intersection grid of the stack.
pub fn align_stack(inputs: &[AlignInput], config: &AlignConfig) -> Result<AlignedStack> {
    info!("Aligning {} rasters...", inputs.len());

    let sources = inputs
        .iter()
        .map(|input| Dataset::open(input.path))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let infos = sources
        .iter()
        .map(RasterInfo::from_dataset)
        .collect::<Result<Vec<_>>>()?;

    let grid = target_grid(&infos, config.pixel_size)?;
    let projection = infos
        .first()
        .map(|info| info.georef.projection.clone())
        .unwrap_or_default();
    info!("Common grid: {}x{}", grid.width, grid.height);

    if let Some(dir) = &config.aligned_dir {
        fs::create_dir_all(dir)?;
    }
    let gtiff = DriverManager::get_driver_by_name("GTiff")?;

    let mut rasters = Vec::with_capacity(inputs.len());
    for (input, source) in inputs.iter().zip(&sources) {
        debug!("Warping {} ({:?})", input.path.display(), input.resampling);
        let dataset = warp_into(source, &grid, &projection, input)?;

        if let Some(dir) = &config.aligned_dir {
            let path = dir.join(format!("aligned_{}.tif", input.name));
            dataset.create_copy(&gtiff, &path, &Default::default())?;
            debug!("Saved {}", path.display());
        }

        rasters.push(AlignedRaster {
            name: input.name,
            source: input.path.to_path_buf(),
            dataset,
        });
    }

    Ok(AlignedStack {
        grid,
        projection,
        rasters,
    })
}
