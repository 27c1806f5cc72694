//! North-up raster grid geometry.

use log::debug;

use crate::error::{Error, Result};

/// GDAL affine geotransform `[x0, dx, rx, y0, ry, dy]`.
pub type GeoTransform = [f64; 6];

/// Axis-aligned bounding box in georeferenced units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn from_geo_transform(gt: &GeoTransform, width: usize, height: usize) -> Result<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(Error::RotatedGrid(*gt));
        }
        let x1 = gt[0] + gt[1] * width as f64;
        let y1 = gt[3] + gt[5] * height as f64;
        Ok(Self {
            min_x: gt[0].min(x1),
            max_x: gt[0].max(x1),
            min_y: gt[3].min(y1),
            max_y: gt[3].max(y1),
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Overlap of two extents; `None` when they only touch or are disjoint.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let out = Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        (out.min_x < out.max_x && out.min_y < out.max_y).then_some(out)
    }
}

/// Common overlap of every extent.
pub fn intersect_all(extents: &[Extent]) -> Result<Extent> {
    let (first, rest) = extents.split_first().ok_or(Error::NoInputs)?;
    rest.iter()
        .try_fold(*first, |acc, e| acc.intersection(e))
        .ok_or(Error::EmptyIntersection)
}

/// Pixel grid shared by an aligned raster stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub geo_transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    /// Grid covering `extent` with `pixel_size = (dx, dy)`; `dy` is normally negative.
    ///
    /// The grid is anchored on the upper-left corner of the extent. Sizes are
    /// rounded to the nearest whole pixel and never drop below one.
    pub fn from_extent(extent: &Extent, pixel_size: (f64, f64)) -> Result<Self> {
        let (dx, dy) = pixel_size;
        if dx == 0.0 || dy == 0.0 || !dx.is_finite() || !dy.is_finite() {
            return Err(Error::InvalidPixelSize(dx, dy));
        }

        let width = ((extent.width() / dx.abs()).round() as usize).max(1);
        let height = ((extent.height() / dy.abs()).round() as usize).max(1);
        let origin_x = if dx > 0.0 { extent.min_x } else { extent.max_x };
        let origin_y = if dy < 0.0 { extent.max_y } else { extent.min_y };

        let grid = Self {
            geo_transform: [origin_x, dx, 0.0, origin_y, 0.0, dy],
            width,
            height,
        };
        debug!("Target grid {}x{} at {:?}", width, height, grid.geo_transform);
        Ok(grid)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// X coordinate of each column centre.
    pub fn pixel_centers_x(&self) -> Vec<f64> {
        let gt = &self.geo_transform;
        (0..self.width)
            .map(|col| gt[0] + gt[1] * (col as f64 + 0.5))
            .collect()
    }

    /// Y coordinate of each row centre.
    pub fn pixel_centers_y(&self) -> Vec<f64> {
        let gt = &self.geo_transform;
        (0..self.height)
            .map(|row| gt[3] + gt[5] * (row as f64 + 0.5))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn landsat_like(x0: f64, y0: f64, size: usize) -> Extent {
        Extent::from_geo_transform(&[x0, 30.0, 0.0, y0, 0.0, -30.0], size, size).unwrap()
    }

    #[test]
    fn test_extent_from_north_up_transform() {
        let e = landsat_like(1000.0, 5000.0, 10);
        assert_eq!(e.min_x, 1000.0);
        assert_eq!(e.max_x, 1300.0);
        assert_eq!(e.min_y, 4700.0);
        assert_eq!(e.max_y, 5000.0);
    }

    #[test]
    fn test_rotated_transform_rejected() {
        let err = Extent::from_geo_transform(&[0.0, 30.0, 1.0, 0.0, 0.0, -30.0], 4, 4);
        assert!(matches!(err, Err(Error::RotatedGrid(_))));
    }

    #[test]
    fn test_intersection_of_overlapping_scenes() {
        let a = landsat_like(0.0, 3000.0, 100);
        let b = landsat_like(600.0, 2400.0, 100);
        let c = intersect_all(&[a, b]).unwrap();
        assert_eq!(c.min_x, 600.0);
        assert_eq!(c.max_x, 3000.0);
        assert_eq!(c.min_y, 0.0);
        assert_eq!(c.max_y, 2400.0);
    }

    #[test]
    fn test_disjoint_and_empty_inputs() {
        let a = landsat_like(0.0, 300.0, 10);
        let b = landsat_like(300.0, 300.0, 10);
        assert!(matches!(intersect_all(&[a, b]), Err(Error::EmptyIntersection)));
        assert!(matches!(intersect_all(&[]), Err(Error::NoInputs)));
    }

    #[test]
    fn test_grid_from_extent_at_120m() {
        let extent = Extent {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1230.0,
            max_y: 600.0,
        };
        let grid = GridSpec::from_extent(&extent, (120.0, -120.0)).unwrap();
        assert_eq!(grid.width, 10);
        assert_eq!(grid.height, 5);
        assert_eq!(grid.shape(), (5, 10));
        assert_eq!(grid.geo_transform, [0.0, 120.0, 0.0, 600.0, 0.0, -120.0]);

        let xs = grid.pixel_centers_x();
        let ys = grid.pixel_centers_y();
        assert_relative_eq!(xs[0], 60.0);
        assert_relative_eq!(ys[0], 540.0);
        assert_relative_eq!(ys[4], 60.0);
    }

    #[test]
    fn test_zero_pixel_size_rejected() {
        let extent = landsat_like(0.0, 300.0, 10);
        assert!(matches!(
            GridSpec::from_extent(&extent, (0.0, -120.0)),
            Err(Error::InvalidPixelSize(_, _))
        ));
    }
}
