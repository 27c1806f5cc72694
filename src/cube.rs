//! Time-indexed raster cubes built from a directory of GeoTIFFs.
//!
//! File names carry the acquisition month as their second `_`-separated
//! token, e.g. `AET_201801_tile.tif` for January 2018.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info};
use ndarray::{s, Array2, Array4};

use crate::error::{Error, Result};
use crate::grid::GridSpec;

/// Rasters stacked along time, indexed `(time, band, y, x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCube {
    pub times: Vec<NaiveDate>,
    pub data: Array4<f32>,
    pub grid: GridSpec,
    pub projection: String,
    pub nodata: Option<f64>,
}

/// One file's worth of bands.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeLayer {
    pub time: NaiveDate,
    pub bands: Vec<Array2<f32>>,
}

/// Acquisition month of a raster, as the first day of that month.
pub fn file_time(path: &Path) -> Result<NaiveDate> {
    let invalid = || Error::InvalidFileTime {
        file: path.to_path_buf(),
    };
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let token = stem.split('_').nth(1).ok_or_else(invalid)?;
    if token.len() != 6 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(&format!("{token}01"), "%Y%m%d").map_err(|_| invalid())
}

fn is_geotiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

/// GeoTIFF files directly inside `dir`, sorted by path.
pub fn discover_rasters(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_geotiff(&path) {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(Error::NoRasters(dir.to_path_buf()));
    }
    paths.sort();
    debug!("Found {} rasters in {}", paths.len(), dir.display());
    Ok(paths)
}

impl RasterCube {
    /// Stack layers in ascending time order. Every layer needs the same band
    /// count and a `grid`-shaped array per band.
    pub fn from_layers(
        mut layers: Vec<CubeLayer>,
        grid: GridSpec,
        projection: String,
        nodata: Option<f64>,
    ) -> Result<Self> {
        layers.sort_by_key(|layer| layer.time);
        let bands = layers.first().map_or(0, |layer| layer.bands.len());
        let (height, width) = grid.shape();

        let mut data = Array4::<f32>::zeros((layers.len(), bands, height, width));
        for (t, layer) in layers.iter().enumerate() {
            if layer.bands.len() != bands {
                return Err(Error::ShapeMismatch {
                    band: "band count",
                    expected: (bands, 1),
                    found: (layer.bands.len(), 1),
                });
            }
            for (b, band) in layer.bands.iter().enumerate() {
                if band.dim() != (height, width) {
                    return Err(Error::ShapeMismatch {
                        band: "cube layer",
                        expected: (height, width),
                        found: band.dim(),
                    });
                }
                data.slice_mut(s![t, b, .., ..]).assign(band);
            }
        }

        Ok(Self {
            times: layers.into_iter().map(|layer| layer.time).collect(),
            data,
            grid,
            projection,
            nodata,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn band_count(&self) -> usize {
        self.data.dim().1
    }

    /// Values at column `x`, row `y` as a `(time, band)` array.
    pub fn pixel_series(&self, x: usize, y: usize) -> Result<Array2<f32>> {
        let (_, _, height, width) = self.data.dim();
        if x >= width || y >= height {
            return Err(Error::PixelOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        Ok(self.data.slice(s![.., .., y, x]).to_owned())
    }
}

/// Write the time series of one pixel as `time,band_1,...,band_n`.
pub fn write_series_csv(cube: &RasterCube, pixel: (usize, usize), path: &Path) -> Result<()> {
    let series = cube.pixel_series(pixel.0, pixel.1)?;
    info!(
        "Writing time series of pixel ({}, {}) to {}",
        pixel.0,
        pixel.1,
        path.display()
    );

    let mut wtr = csv::Writer::from_path(path)?;
    let header = std::iter::once("time".to_string())
        .chain((1..=cube.band_count()).map(|b| format!("band_{b}")));
    wtr.write_record(header)?;

    for (time, row) in cube.times.iter().zip(series.rows()) {
        let record = std::iter::once(time.format("%Y-%m-%d").to_string())
            .chain(row.iter().map(|v| v.to_string()));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read every GeoTIFF in `dir` into a cube.
#[cfg(feature = "gdal")]
pub fn load_cube(dir: &Path) -> Result<RasterCube> {
    use gdal::Dataset;
    use rayon::prelude::*;

    use crate::io::{band_to_array, RasterInfo};

    let paths = discover_rasters(dir)?;
    let times = paths.iter().map(|p| file_time(p)).collect::<Result<Vec<_>>>()?;

    let info = RasterInfo::from_path(&paths[0])?;
    info!(
        "Loading {} rasters of {}x{} with {} band(s)",
        paths.len(),
        info.width,
        info.height,
        info.bands
    );

    let layers = paths
        .par_iter()
        .zip(times)
        .map(|(path, time)| -> Result<CubeLayer> {
            let dataset = Dataset::open(path)?;
            let bands = (1..=dataset.raster_count())
                .map(|index| band_to_array::<f32>(&dataset, index as isize))
                .collect::<Result<Vec<_>>>()?;
            Ok(CubeLayer { time, bands })
        })
        .collect::<Result<Vec<_>>>()?;

    RasterCube::from_layers(layers, info.grid(), info.georef.projection, info.nodata)
}

/// Write the cube as NetCDF with `time`, `band`, `y` and `x` coordinates.
#[cfg(feature = "netcdf")]
pub fn write_netcdf(cube: &RasterCube, path: &Path) -> Result<()> {
    let (nt, nb, ny, nx) = cube.data.dim();
    info!("Writing {}x{}x{}x{} cube to {}", nt, nb, ny, nx, path.display());

    let mut file = netcdf::create(path)?;
    file.add_dimension("time", nt)?;
    file.add_dimension("band", nb)?;
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;

    let epoch = NaiveDate::default();
    let days = cube
        .times
        .iter()
        .map(|t| (*t - epoch).num_days() as i32)
        .collect::<Vec<_>>();
    let mut time = file.add_variable::<i32>("time", &["time"])?;
    time.put_attribute("units", "days since 1970-01-01")?;
    time.put_attribute("calendar", "proleptic_gregorian")?;
    time.put_values(&days, ..)?;

    let mut band = file.add_variable::<i32>("band", &["band"])?;
    band.put_values(&(1..=nb as i32).collect::<Vec<_>>(), ..)?;

    let mut y = file.add_variable::<f64>("y", &["y"])?;
    y.put_values(&cube.grid.pixel_centers_y(), ..)?;
    let mut x = file.add_variable::<f64>("x", &["x"])?;
    x.put_values(&cube.grid.pixel_centers_x(), ..)?;

    let mut data = file.add_variable::<f32>("data", &["time", "band", "y", "x"])?;
    if let Some(nodata) = cube.nodata {
        data.set_fill_value(nodata as f32)?;
    }
    if !cube.projection.is_empty() {
        data.put_attribute("crs_wkt", cube.projection.as_str())?;
    }
    data.put_values(&cube.data.iter().copied().collect::<Vec<_>>(), ..)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn grid(width: usize, height: usize) -> GridSpec {
        GridSpec {
            geo_transform: [0.0, 10.0, 0.0, 100.0, 0.0, -10.0],
            width,
            height,
        }
    }

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn test_file_time_from_second_token() {
        assert_eq!(file_time(Path::new("data/AET_201803.tif")).unwrap(), date(2018, 3));
        assert_eq!(file_time(Path::new("AET_199912_v2.tif")).unwrap(), date(1999, 12));
    }

    #[test]
    fn test_file_time_rejects_bad_names() {
        for name in ["AET.tif", "AET_2018.tif", "AET_201813.tif", "AET_20180a.tif"] {
            assert!(
                matches!(file_time(Path::new(name)), Err(Error::InvalidFileTime { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_201802.tif", "a_201801.TIF", "c_201803.tiff", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.tif")).unwrap();

        let found = discover_rasters(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a_201801.TIF", "b_201802.tif", "c_201803.tiff"]);
    }

    #[test]
    fn test_discover_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover_rasters(dir.path()), Err(Error::NoRasters(_))));
    }

    #[test]
    fn test_cube_orders_layers_by_time() {
        let layers = vec![
            CubeLayer {
                time: date(2018, 2),
                bands: vec![array![[2.0f32, 2.5], [2.0, 2.0]]],
            },
            CubeLayer {
                time: date(2018, 1),
                bands: vec![array![[1.0f32, 1.5], [1.0, 1.0]]],
            },
        ];
        let cube = RasterCube::from_layers(layers, grid(2, 2), String::new(), None).unwrap();

        assert_eq!(cube.len(), 2);
        assert_eq!(cube.times, vec![date(2018, 1), date(2018, 2)]);
        assert_eq!(cube.pixel_series(1, 0).unwrap(), array![[1.5f32], [2.5]]);
    }

    #[test]
    fn test_cube_rejects_mismatched_layer() {
        let layers = vec![CubeLayer {
            time: date(2018, 1),
            bands: vec![Array2::zeros((3, 2))],
        }];
        assert!(matches!(
            RasterCube::from_layers(layers, grid(2, 2), String::new(), None),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_pixel_out_of_bounds() {
        let cube = RasterCube::from_layers(Vec::new(), grid(2, 2), String::new(), None).unwrap();
        assert!(cube.is_empty());
        assert!(matches!(
            cube.pixel_series(2, 0),
            Err(Error::PixelOutOfBounds { x: 2, y: 0, .. })
        ));
    }

    #[test]
    fn test_series_csv_layout() {
        let layers = vec![
            CubeLayer {
                time: date(2018, 1),
                bands: vec![array![[1.0f32]], array![[10.0f32]]],
            },
            CubeLayer {
                time: date(2018, 2),
                bands: vec![array![[2.5f32]], array![[20.0f32]]],
            },
        ];
        let cube = RasterCube::from_layers(layers, grid(1, 1), String::new(), None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");

        write_series_csv(&cube, (0, 0), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "time,band_1,band_2\n2018-01-01,1,10\n2018-02-01,2.5,20\n"
        );
    }

    #[test]
    #[cfg(feature = "netcdf")]
    fn test_netcdf_layout() {
        let layers = vec![
            CubeLayer {
                time: date(2018, 2),
                bands: vec![array![[2.0f32, 2.5], [2.0, -9999.0]]],
            },
            CubeLayer {
                time: date(2018, 1),
                bands: vec![array![[1.0f32, 1.5], [1.0, 1.0]]],
            },
        ];
        let cube =
            RasterCube::from_layers(layers, grid(2, 2), String::new(), Some(-9999.0)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AET.nc");

        write_netcdf(&cube, &path).unwrap();

        let file = netcdf::open(&path).unwrap();
        for (name, len) in [("time", 2), ("band", 1), ("y", 2), ("x", 2)] {
            assert_eq!(file.dimension(name).unwrap().len(), len, "{name}");
        }

        let time = file.variable("time").unwrap();
        assert_eq!(time.get_values::<i32, _>(..).unwrap(), vec![17532, 17563]);

        let xs = file.variable("x").unwrap().get_values::<f64, _>(..).unwrap();
        let ys = file.variable("y").unwrap().get_values::<f64, _>(..).unwrap();
        assert_eq!(xs, vec![5.0, 15.0]);
        assert_eq!(ys, vec![95.0, 85.0]);

        let data = file.variable("data").unwrap();
        assert_eq!(data.fill_value::<f32>().unwrap(), Some(-9999.0));
        let values = data.get_values::<f32, _>(..).unwrap();
        assert_eq!(values, vec![1.0, 1.5, 1.0, 1.0, 2.0, 2.5, 2.0, -9999.0]);
    }
}
