//! End-to-end runs: read, compute, write.

use std::time::Instant;

use gdal::Dataset;
use log::{info, warn};
use ndarray::Array2;

use crate::align::{align_stack, AlignInput};
use crate::config::{CubeConfig, DiffConfig, NdviConfig};
use crate::cube::{load_cube, write_series_csv, RasterCube};
use crate::error::Result;
use crate::io::{read_band, write_raster, Georef};
use crate::ndvi::{masked_ndvi, ndvi, ndvi_difference, BandTriple, DifferenceSummary};

/// Compute NDVI for one acquisition and save it with the red band's georeferencing.
pub fn calculate_and_save_ndvi(config: &NdviConfig) -> Result<()> {
    let start = Instant::now();

    info!("Opening datasets...");
    let red_ds = Dataset::open(&config.red)?;
    let georef = Georef::from_dataset(&red_ds)?;
    let (width, height) = red_ds.raster_size();
    info!("Image size: {}x{}", width, height);
    drop(red_ds);

    info!("Reading bands...");
    let (red, nir) = rayon::join(
        || read_band::<f32>(&config.red, 1),
        || read_band::<f32>(&config.nir, 1),
    );
    let (red, nir) = (red?, nir?);

    info!("Calculating NDVI...");
    let result = match &config.qa {
        Some(qa_path) => {
            let qa = read_band::<u16>(qa_path, 1)?;
            masked_ndvi(red.view(), nir.view(), qa.view(), &config.params)?
        }
        None => ndvi(red.view(), nir.view(), &config.params)?,
    };

    let non_finite = result.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        warn!("{} pixels have a zero NIR + red sum", non_finite);
    }

    write_raster(&result, config.params.nodata, &georef, &config.output)?;
    info!(
        "NDVI calculation complete in {:.3}s",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Align both acquisitions, difference their NDVI and save the result.
pub fn calculate_ndvi_difference(config: &DiffConfig) -> Result<DifferenceSummary> {
    let start = Instant::now();
    let resampling = config.align.resampling;

    let scenes = [
        (&config.t1, ["red_t1", "nir_t1", "qa_t1"]),
        (&config.t2, ["red_t2", "nir_t2", "qa_t2"]),
    ];
    let mut inputs = Vec::with_capacity(6);
    for (scene, [red_name, nir_name, qa_name]) in scenes {
        let [red, nir, qa] = scene.paths();
        inputs.push(AlignInput::reflectance(red, red_name, resampling));
        inputs.push(AlignInput::reflectance(nir, nir_name, resampling));
        inputs.push(AlignInput::quality(qa, qa_name));
    }
    let stack = align_stack(&inputs, &config.align)?;

    info!("Reading aligned bands...");
    let red1: Array2<f32> = stack.read(0)?;
    let nir1: Array2<f32> = stack.read(1)?;
    let qa1: Array2<u16> = stack.read(2)?;
    let red2: Array2<f32> = stack.read(3)?;
    let nir2: Array2<f32> = stack.read(4)?;
    let qa2: Array2<u16> = stack.read(5)?;

    info!("Calculating NDVI difference...");
    let result = ndvi_difference(
        BandTriple::new(&red1, &nir1, &qa1),
        BandTriple::new(&red2, &nir2, &qa2),
        &config.params,
    )?;

    let summary = result.summary();
    info!("Difference: {}", summary);
    if summary.undefined > 0 {
        warn!(
            "{} valid pixels have no finite difference ({:?} policy)",
            summary.undefined, config.params.non_finite
        );
    }

    write_raster(&result.difference, result.nodata, &stack.georef(), &config.output)?;
    info!(
        "NDVI difference complete in {:.3}s",
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Stack a GeoTIFF directory along time and export the requested outputs.
pub fn geotiff_to_cube(config: &CubeConfig) -> Result<RasterCube> {
    let start = Instant::now();
    config.validate()?;

    let cube = load_cube(&config.directory)?;
    info!(
        "Cube spans {} time steps from {} to {}",
        cube.len(),
        cube.times.first().map(|t| t.to_string()).unwrap_or_default(),
        cube.times.last().map(|t| t.to_string()).unwrap_or_default()
    );

    if let Some(path) = &config.netcdf {
        write_cube_netcdf(&cube, path)?;
    }
    if let Some(path) = &config.csv {
        write_series_csv(&cube, config.pixel, path)?;
    }

    info!("Cube export complete in {:.3}s", start.elapsed().as_secs_f64());
    Ok(cube)
}

#[cfg(feature = "netcdf")]
fn write_cube_netcdf(cube: &RasterCube, path: &std::path::Path) -> Result<()> {
    crate::cube::write_netcdf(cube, path)
}

#[cfg(not(feature = "netcdf"))]
fn write_cube_netcdf(_cube: &RasterCube, _path: &std::path::Path) -> Result<()> {
    Err(crate::error::Error::FeatureDisabled("NetCDF"))
}
