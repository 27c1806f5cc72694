//! GDAL-backed raster reading and GeoTIFF writing.

use std::path::Path;

use gdal::cpl::CslStringListEntry;
use gdal::raster::{Buffer, GdalType, RasterCreationOptions};
use gdal::{Dataset, DriverManager};
use log::{debug, info};
use ndarray::Array2;

use crate::error::Result;
use crate::grid::{GeoTransform, GridSpec};

const GTIFF_OPTIONS: [(&str, &str); 3] = [
    ("COMPRESS", "DEFLATE"),
    ("TILED", "YES"),
    ("NUM_THREADS", "ALL_CPUS"),
];

/// Projection and geotransform to stamp on an output raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Georef {
    pub projection: String,
    pub geo_transform: GeoTransform,
}

impl Georef {
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        Ok(Self {
            projection: dataset.projection(),
            geo_transform: dataset.geo_transform()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub nodata: Option<f64>,
    pub georef: Georef,
}

impl RasterInfo {
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let (width, height) = dataset.raster_size();
        Ok(Self {
            width,
            height,
            bands: dataset.raster_count() as usize,
            nodata: dataset.rasterband(1)?.no_data_value(),
            georef: Georef::from_dataset(dataset)?,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_dataset(&Dataset::open(path)?)
    }

    pub fn grid(&self) -> GridSpec {
        GridSpec {
            geo_transform: self.georef.geo_transform,
            width: self.width,
            height: self.height,
        }
    }
}

/// Read a whole band into a `(rows, cols)` array. Band indices start at 1.
pub fn band_to_array<T: GdalType + Copy>(dataset: &Dataset, index: isize) -> Result<Array2<T>> {
    let band = dataset.rasterband(index as usize)?;
    let (width, height) = band.size();
    let buffer = band.read_as::<T>((0, 0), (width, height), (width, height), None)?;
    Ok(Array2::from_shape_vec((height, width), buffer.into_shape_and_vec().1)?)
}

pub fn read_band<T: GdalType + Copy>(path: &Path, index: isize) -> Result<Array2<T>> {
    debug!("Reading band {} of {}", index, path.display());
    let dataset = Dataset::open(path)?;
    band_to_array(&dataset, index)
}

/// Write a single-band Float32 GeoTIFF with `nodata` set on the band.
pub fn write_raster(
    array: &Array2<f32>,
    nodata: f32,
    georef: &Georef,
    output: &Path,
) -> Result<()> {
    let (height, width) = array.dim();
    info!("Writing {}x{} raster to {}", width, height, output.display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut out_ds = driver.create_with_band_type_with_options::<f32, _>(
        output,
        width,
        height,
        1,
        &GTIFF_OPTIONS
            .iter()
            .copied()
            .map(CslStringListEntry::from)
            .collect::<RasterCreationOptions>(),
    )?;

    if !georef.projection.is_empty() {
        out_ds.set_projection(&georef.projection)?;
    }
    out_ds.set_geo_transform(&georef.geo_transform)?;

    let mut out_band = out_ds.rasterband(1)?;
    out_band.set_no_data_value(Some(nodata as f64))?;

    let mut band_data = Buffer::new((width, height), array.iter().copied().collect());
    out_band.write((0, 0), (width, height), &mut band_data)?;

    out_ds.flush_cache()?;
    Ok(())
}
