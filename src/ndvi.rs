//! NDVI and two-date NDVI difference over aligned band grids.
//!
//! All functions here are pure array transforms. Alignment, reading and
//! writing happen elsewhere; inputs are expected to share one pixel grid and
//! any shape disagreement is reported as [`Error::ShapeMismatch`].

use std::fmt;

use itertools::izip;
use ndarray::{Array2, ArrayView2, Zip};
use num_traits::{AsPrimitive, PrimInt};

use crate::error::{Error, Result};

/// Sentinel written where no NDVI value is defined.
pub const NODATA: f32 = -9999.0;

/// What to do with NaN/inf produced by `nir + red == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonFinitePolicy {
    /// Keep the IEEE result in the output.
    #[default]
    Propagate,
    /// Replace non-finite results with the NODATA sentinel.
    ForceNodata,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NdviParams {
    pub nodata: f32,
    pub non_finite: NonFinitePolicy,
}

impl Default for NdviParams {
    fn default() -> Self {
        Self {
            nodata: NODATA,
            non_finite: NonFinitePolicy::default(),
        }
    }
}

impl NdviParams {
    #[inline]
    fn finish(&self, value: f32) -> f32 {
        match self.non_finite {
            NonFinitePolicy::ForceNodata if !value.is_finite() => self.nodata,
            _ => value,
        }
    }
}

/// Red, near-infrared and QA grids of one acquisition.
#[derive(Debug, Clone, Copy)]
pub struct BandTriple<'a, R, Q> {
    pub red: ArrayView2<'a, R>,
    pub nir: ArrayView2<'a, R>,
    pub qa: ArrayView2<'a, Q>,
}

impl<'a, R, Q> BandTriple<'a, R, Q> {
    pub fn new(red: &'a Array2<R>, nir: &'a Array2<R>, qa: &'a Array2<Q>) -> Self {
        Self {
            red: red.view(),
            nir: nir.view(),
            qa: qa.view(),
        }
    }
}

/// Single conversion point from band samples to floating point.
#[inline]
fn to_f32<T: AsPrimitive<f32>>(sample: T) -> f32 {
    sample.as_()
}

#[inline]
fn normalized_difference(red: f32, nir: f32) -> f32 {
    (nir - red) / (nir + red)
}

/// QA value `1` marks a pixel as unusable.
#[inline]
pub fn is_flagged<Q: PrimInt>(qa: Q) -> bool {
    qa == Q::one()
}

fn check_shape(band: &'static str, expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            band,
            expected,
            found,
        })
    }
}

/// Unmasked NDVI, `(nir - red) / (nir + red)` at every pixel.
pub fn ndvi<R, N>(
    red: ArrayView2<R>,
    nir: ArrayView2<N>,
    params: &NdviParams,
) -> Result<Array2<f32>>
where
    R: AsPrimitive<f32>,
    N: AsPrimitive<f32>,
{
    check_shape("nir", red.dim(), nir.dim())?;

    let mut out = Array2::<f32>::zeros(red.dim());
    for (value, &r, &n) in izip!(out.iter_mut(), red.iter(), nir.iter()) {
        *value = params.finish(normalized_difference(to_f32(r), to_f32(n)));
    }
    Ok(out)
}

/// NDVI with the NODATA sentinel written wherever `qa == 1`.
pub fn masked_ndvi<R, Q>(
    red: ArrayView2<R>,
    nir: ArrayView2<R>,
    qa: ArrayView2<Q>,
    params: &NdviParams,
) -> Result<Array2<f32>>
where
    R: AsPrimitive<f32>,
    Q: PrimInt,
{
    check_shape("qa", red.dim(), qa.dim())?;

    let mut out = ndvi(red, nir, params)?;
    for (value, &q) in izip!(out.iter_mut(), qa.iter()) {
        if is_flagged(q) {
            *value = params.nodata;
        }
    }
    Ok(out)
}

/// `true` where neither date flags the pixel.
pub fn validity_mask<Q: PrimInt>(qa1: ArrayView2<Q>, qa2: ArrayView2<Q>) -> Result<Array2<bool>> {
    check_shape("qa", qa1.dim(), qa2.dim())?;
    Ok(Zip::from(qa1)
        .and(qa2)
        .map_collect(|&a, &b| !is_flagged(a) && !is_flagged(b)))
}

/// NDVI of the pixels selected by `valid`, in row-major mask order.
pub fn restricted_ndvi<R>(
    red: ArrayView2<R>,
    nir: ArrayView2<R>,
    valid: ArrayView2<bool>,
) -> Result<Vec<f32>>
where
    R: AsPrimitive<f32>,
{
    check_shape("red", valid.dim(), red.dim())?;
    check_shape("nir", valid.dim(), nir.dim())?;

    Ok(izip!(valid.iter(), red.iter(), nir.iter())
        .filter(|(v, _, _)| **v)
        .map(|(_, &r, &n)| normalized_difference(to_f32(r), to_f32(n)))
        .collect())
}

/// Result of [`ndvi_difference`].
#[derive(Debug, Clone, PartialEq)]
pub struct NdviDifference {
    /// `ndvi(t1) - ndvi(t2)` at valid pixels, NODATA elsewhere.
    pub difference: Array2<f32>,
    /// Pixels usable at both dates.
    pub valid: Array2<bool>,
    /// Valid pixels whose difference is finite.
    pub defined: Array2<bool>,
    pub nodata: f32,
}

/// NDVI change between two acquisitions on the same pixel grid.
///
/// Pixels flagged in either QA grid receive `params.nodata`. Every other pixel
/// holds `ndvi(t1) - ndvi(t2)`. A zero `nir + red` at a valid pixel yields a
/// non-finite difference unless `params.non_finite` is
/// [`NonFinitePolicy::ForceNodata`].
pub fn ndvi_difference<R, Q>(
    t1: BandTriple<'_, R, Q>,
    t2: BandTriple<'_, R, Q>,
    params: &NdviParams,
) -> Result<NdviDifference>
where
    R: AsPrimitive<f32>,
    Q: PrimInt,
{
    let shape = t1.red.dim();
    for (band, found) in [
        ("t1 nir", t1.nir.dim()),
        ("t1 qa", t1.qa.dim()),
        ("t2 red", t2.red.dim()),
        ("t2 nir", t2.nir.dim()),
        ("t2 qa", t2.qa.dim()),
    ] {
        check_shape(band, shape, found)?;
    }

    let valid = validity_mask(t1.qa, t2.qa)?;
    let ndvi1 = restricted_ndvi(t1.red, t1.nir, valid.view())?;
    let ndvi2 = restricted_ndvi(t2.red, t2.nir, valid.view())?;

    let mut difference = Array2::from_elem(shape, params.nodata);
    let mut defined = Array2::from_elem(shape, false);
    let targets = izip!(difference.iter_mut(), defined.iter_mut(), valid.iter())
        .filter_map(|(value, def, &v)| v.then_some((value, def)));
    for ((value, def), (a, b)) in targets.zip(ndvi1.iter().zip(&ndvi2)) {
        let raw = a - b;
        *def = raw.is_finite();
        *value = params.finish(raw);
    }

    Ok(NdviDifference {
        difference,
        valid,
        defined,
        nodata: params.nodata,
    })
}

/// Pixel counts and value range of a difference grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DifferenceSummary {
    pub total: usize,
    pub valid: usize,
    pub masked: usize,
    /// Valid pixels left without a finite difference (NaN, inf or forced to NODATA).
    /// A finite difference that happens to equal NODATA still counts as defined.
    pub undefined: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f64>,
}

impl NdviDifference {
    pub fn summary(&self) -> DifferenceSummary {
        let mut summary = DifferenceSummary {
            total: self.difference.len(),
            ..Default::default()
        };
        let mut sum = 0.0f64;
        let mut defined = 0usize;

        for (&value, &valid, &is_defined) in
            izip!(self.difference.iter(), self.valid.iter(), self.defined.iter())
        {
            if !valid {
                summary.masked += 1;
                continue;
            }
            summary.valid += 1;
            if !is_defined {
                summary.undefined += 1;
                continue;
            }
            defined += 1;
            sum += value as f64;
            summary.min = Some(summary.min.map_or(value, |m| m.min(value)));
            summary.max = Some(summary.max.map_or(value, |m| m.max(value)));
        }

        if defined > 0 {
            summary.mean = Some(sum / defined as f64);
        }
        summary
    }
}

impl fmt::Display for DifferenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pixels, {} valid, {} masked, {} undefined",
            self.total, self.valid, self.masked, self.undefined
        )?;
        if let (Some(min), Some(max), Some(mean)) = (self.min, self.max, self.mean) {
            write!(f, ", range [{:.4}, {:.4}], mean {:.4}", min, max, mean)?;
        }
        Ok(())
    }
}
