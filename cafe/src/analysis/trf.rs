//! TRF1 blob quantification.
//!
//! TRF1 foci are segmented once, by Otsu on the TRF channel, and every
//! intensity variant is measured over that single label map:
//!
//! - **raw**: the TRF channel itself
//! - **pre**: `trf / (chromatin + 1)`, normalized per pixel before aggregation
//! - **post**: raw statistics divided by the chromatin statistics of the same
//!   blob, normalized after aggregation

use std::collections::HashSet;

use log::{debug, warn};
use ndarray::{Array2, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::config::TrfParams;
use crate::error::{CafeError, Result};
use crate::image_proc::image::{channel, ensure_same_shape};
use crate::image_proc::label::{label, LabelMap};
use crate::image_proc::regionprops::{
    normalize_records, regionprops, DivisionPolicy, NormalizedRecord, RegionRecord,
};
use crate::image_proc::thresholding::{threshold, validate_image, ThresholdMethod};

/// Mean, total and max intensity of one blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intensities {
    pub mean: f64,
    pub total: f64,
    pub max: f64,
}

impl From<&RegionRecord> for Intensities {
    fn from(record: &RegionRecord) -> Self {
        Self {
            mean: record.mean_intensity,
            total: record.total_intensity,
            max: record.max_intensity,
        }
    }
}

/// Normalized blob intensities; `None` where a denominator was zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub mean: Option<f64>,
    pub total: Option<f64>,
    pub max: Option<f64>,
}

impl Ratios {
    const UNDEFINED: Ratios = Ratios {
        mean: None,
        total: None,
        max: None,
    };
}

impl From<Intensities> for Ratios {
    fn from(intensities: Intensities) -> Self {
        Self {
            mean: Some(intensities.mean),
            total: Some(intensities.total),
            max: Some(intensities.max),
        }
    }
}

impl From<&NormalizedRecord> for Ratios {
    fn from(record: &NormalizedRecord) -> Self {
        Self {
            mean: record.mean_intensity,
            total: record.total_intensity,
            max: record.max_intensity,
        }
    }
}

/// Measurements of one TRF1 focus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrfBlob {
    pub label: u32,
    /// Size in pixels
    pub area: usize,
    pub eccentricity: f64,
    pub centroid: (f64, f64),
    pub raw: Intensities,
    pub pre: Ratios,
    pub post: Ratios,
}

/// Resolve the chromatin channel of an image with `available` channels.
fn chromatin_channel(params: &TrfParams, available: usize) -> Result<usize> {
    match params.chromatin_channel {
        Some(index) => Ok(index),
        None if available > 1 => Ok(available - 1),
        None => Err(CafeError::InvalidInput(format!(
            "no chromatin channel in an image with {available} channel(s)"
        ))),
    }
}

/// Per-pixel `trf / (chromatin + 1)` over the foci of `label_map`.
///
/// Pixels outside every focus are left at 0. Foci holding a pixel whose
/// chromatin value is -1 are returned in the set under
/// [`DivisionPolicy::Sentinel`] and fail the call under
/// [`DivisionPolicy::Strict`]. Chromatin is expected to be non-negative.
fn pre_normalized(
    trf: ArrayView2<f64>,
    chromatin: ArrayView2<f64>,
    label_map: &LabelMap,
    policy: DivisionPolicy,
) -> Result<(Array2<f64>, HashSet<u32>)> {
    ensure_same_shape(trf.dim(), chromatin.dim(), "chromatin channel")?;
    ensure_same_shape(trf.dim(), label_map.dim(), "label map")?;

    let mut pre = Array2::zeros(trf.dim());
    let mut undefined = HashSet::new();
    for ((row, col), &l) in label_map.labels.indexed_iter() {
        if l == 0 {
            continue;
        }
        let denominator = chromatin[[row, col]] + 1.0;
        if denominator == 0.0 {
            if policy == DivisionPolicy::Strict {
                return Err(CafeError::DivideByZero {
                    context: format!("focus {l}: chromatin value of -1 at ({row}, {col})"),
                });
            }
            undefined.insert(l);
            continue;
        }
        pre[[row, col]] = trf[[row, col]] / denominator;
    }
    Ok((pre, undefined))
}

/// Segment TRF1 foci and measure raw, pre- and post-normalized intensities.
///
/// # Arguments
///
/// * `image` - Multichannel image, channels on the last axis. Two channels
///   are enough: without an explicit `chromatin_channel` the last channel
///   holds chromatin
/// * `params` - Channel indices, blob connectivity and the zero-denominator
///   policy for both normalizations
///
/// # Returns
///
/// One [`TrfBlob`] per connected foreground component, in label order
///
/// # Errors
///
/// * `InvalidInput` - a channel index is out of range, or a channel is empty
///   or non-finite
/// * `DivideByZero` - a zero denominator inside a focus under
///   [`DivisionPolicy::Strict`]
pub fn trf_quantify(image: ArrayView3<'_, f64>, params: &TrfParams) -> Result<Vec<TrfBlob>> {
    let trf = channel(image, params.trf_channel)?;
    let chromatin = channel(image, chromatin_channel(params, image.dim().2)?)?;
    validate_image(chromatin)?;

    let foci = threshold(trf, &ThresholdMethod::default())?;
    let label_map = label(foci.view(), params.connectivity);
    debug!("Found {} TRF1 foci", label_map.count);

    let raw = regionprops(&label_map, trf)?;
    let (pre_image, undefined) =
        pre_normalized(trf, chromatin, &label_map, params.division_policy)?;
    let pre = regionprops(&label_map, pre_image.view())?;
    let chromatin_stats = regionprops(&label_map, chromatin)?;
    let post = normalize_records(&raw, &chromatin_stats, params.division_policy)?;

    if !undefined.is_empty() {
        warn!(
            "{} foci contain chromatin values of -1; pre-normalized values left empty",
            undefined.len()
        );
    }
    let unresolved = post.iter().filter(|p| p.mean_intensity.is_none()).count();
    if unresolved > 0 {
        warn!("{unresolved} foci have no chromatin signal; post-normalized values left empty");
    }

    Ok(raw
        .iter()
        .zip(pre.iter())
        .zip(post.iter())
        .map(|((r, p), n)| TrfBlob {
            label: r.label,
            area: r.area,
            eccentricity: r.eccentricity,
            centroid: r.centroid,
            raw: r.into(),
            pre: if undefined.contains(&p.label) {
                Ratios::UNDEFINED
            } else {
                Intensities::from(p).into()
            },
            post: n.into(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::label::Connectivity;
    use approx::assert_relative_eq;
    use ndarray::{Array3, Axis};

    fn blob_image() -> Array3<f64> {
        let mut image = Array3::zeros((12, 12, 3));
        for r in 4..7 {
            for c in 4..7 {
                image[[r, c, 0]] = 90.0;
                image[[r, c, 2]] = 2.0;
            }
        }
        image[[5, 5, 0]] = 180.0;
        image
    }

    #[test]
    fn test_single_blob_on_zero_background() {
        let mut image = Array3::zeros((12, 12, 3));
        for r in 4..7 {
            for c in 4..7 {
                image[[r, c, 0]] = 255.0;
            }
        }
        let blobs = trf_quantify(image.view(), &TrfParams::default()).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 9);
        assert_eq!(blobs[0].label, 1);
        // No chromatin signal: post ratios are undefined under the default policy
        assert_eq!(blobs[0].post.mean, None);
        assert_relative_eq!(blobs[0].pre.mean.unwrap(), 255.0);
    }

    #[test]
    fn test_two_channel_image_uses_last_channel_for_chromatin() {
        let mut image = Array3::zeros((10, 10, 2));
        for r in 3..6 {
            for c in 3..6 {
                image[[r, c, 0]] = 120.0;
                image[[r, c, 1]] = 3.0;
            }
        }
        let blobs = trf_quantify(image.view(), &TrfParams::default()).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 9);
        assert_relative_eq!(blobs[0].pre.mean.unwrap(), 30.0);
        assert_relative_eq!(blobs[0].post.mean.unwrap(), 40.0);

        // An explicit index still has to exist
        let params = TrfParams {
            chromatin_channel: Some(2),
            ..TrfParams::default()
        };
        assert!(matches!(
            trf_quantify(image.view(), &params),
            Err(CafeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_intensity_variants() {
        let blobs = trf_quantify(blob_image().view(), &TrfParams::default()).unwrap();
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];

        assert_relative_eq!(blob.raw.total, 8.0 * 90.0 + 180.0);
        assert_relative_eq!(blob.raw.mean, 100.0);
        assert_relative_eq!(blob.raw.max, 180.0);

        assert_relative_eq!(blob.pre.mean.unwrap(), 100.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(blob.pre.max.unwrap(), 60.0);

        assert_relative_eq!(blob.post.mean.unwrap(), 50.0);
        assert_relative_eq!(blob.post.total.unwrap(), 900.0 / 18.0);
        assert_relative_eq!(blob.post.max.unwrap(), 90.0);

        assert_relative_eq!(blob.eccentricity, 0.0, epsilon = 1e-12);
        assert_eq!(blob.centroid, (5.0, 5.0));
    }

    #[test]
    fn test_chromatin_of_minus_one_outside_foci_is_ignored() {
        let mut image = blob_image();
        image[[0, 0, 2]] = -1.0;
        let params = TrfParams {
            division_policy: DivisionPolicy::Strict,
            ..TrfParams::default()
        };
        let blobs = trf_quantify(image.view(), &params).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_relative_eq!(blobs[0].pre.mean.unwrap(), 100.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_chromatin_of_minus_one_inside_focus_follows_policy() {
        let mut image = blob_image();
        image[[4, 4, 2]] = -1.0;

        let blobs = trf_quantify(image.view(), &TrfParams::default()).unwrap();
        assert_eq!(blobs[0].pre, Ratios::UNDEFINED);
        assert_relative_eq!(blobs[0].raw.mean, 100.0);

        let params = TrfParams {
            division_policy: DivisionPolicy::Strict,
            ..TrfParams::default()
        };
        assert!(matches!(
            trf_quantify(image.view(), &params),
            Err(CafeError::DivideByZero { .. })
        ));
    }

    #[test]
    fn test_strict_policy_fails_without_chromatin() {
        let mut image = blob_image();
        image.index_axis_mut(Axis(2), 2).fill(0.0);
        let params = TrfParams {
            division_policy: DivisionPolicy::Strict,
            ..TrfParams::default()
        };
        assert!(matches!(
            trf_quantify(image.view(), &params),
            Err(CafeError::DivideByZero { .. })
        ));
    }

    #[test]
    fn test_connectivity_changes_blob_count() {
        let mut image = Array3::zeros((6, 6, 3));
        image[[1, 1, 0]] = 100.0;
        image[[2, 2, 0]] = 100.0;
        image.index_axis_mut(Axis(2), 2).fill(1.0);

        let four = trf_quantify(image.view(), &TrfParams::default()).unwrap();
        assert_eq!(four.len(), 2);

        let params = TrfParams {
            connectivity: Connectivity::Eight,
            ..TrfParams::default()
        };
        let eight = trf_quantify(image.view(), &params).unwrap();
        assert_eq!(eight.len(), 1);
        assert_eq!(eight[0].area, 2);
    }

    #[test]
    fn test_missing_channel() {
        let image = Array3::zeros((4, 4, 1));
        assert!(matches!(
            trf_quantify(image.view(), &TrfParams::default()),
            Err(CafeError::InvalidInput(_))
        ));
    }
}
