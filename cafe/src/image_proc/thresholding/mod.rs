//! Image thresholding algorithms for fluorescence segmentation
//!
//! This module turns a single fluorescence channel into a binary mask. Three
//! strategies are available:
//!
//! - **Otsu**: one global threshold maximizing between-class variance over a
//!   256-bin histogram, optionally shifted by an offset and scaled by a factor.
//!   Used for bright, sparse signals such as centromere spots and TRF1 foci.
//! - **Adaptive**: a per-pixel threshold from a local mean or Gaussian-weighted
//!   mean, compensating for uneven illumination of chromatin and telomeres.
//! - **Fixed**: a caller-supplied cutoff, bypassing any computation.
//!
//! All strategies compare strictly: a pixel is foreground when it is greater
//! than its threshold.

use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{CafeError, Result};
use crate::image_proc::filter::{gaussian_filter, uniform_filter};

/// Number of histogram bins used by Otsu's method.
pub const OTSU_BINS: usize = 256;

/// Local statistic used by adaptive thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveMethod {
    /// Unweighted mean over a square block.
    Mean,
    /// Gaussian-weighted mean with `sigma = (block_size - 1) / 6`.
    #[default]
    Gaussian,
}

/// How the threshold of a channel is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Global Otsu threshold, adjusted as `(otsu - offset) * factor`.
    Otsu { offset: f64, factor: f64 },
    /// Local threshold over an odd `block_size` neighbourhood, lowered by `offset`.
    Adaptive {
        block_size: usize,
        method: AdaptiveMethod,
        offset: f64,
    },
    /// Explicit threshold value.
    Fixed(f64),
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        ThresholdMethod::Otsu {
            offset: 0.0,
            factor: 1.0,
        }
    }
}

/// Reject images the thresholder cannot work with.
pub(crate) fn validate_image(image: ArrayView2<f64>) -> Result<()> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(CafeError::InvalidInput(format!(
            "image must be non-empty, got shape ({rows}, {cols})"
        )));
    }
    if image.iter().any(|v| !v.is_finite()) {
        return Err(CafeError::InvalidInput(
            "image contains non-finite samples".to_string(),
        ));
    }
    Ok(())
}

/// Calculate Otsu's threshold for a grayscale image
///
/// The histogram spans `[min, max]` of the image with [`OTSU_BINS`] equal bins.
/// For every split between bins the between-class variance is evaluated and
/// the center of the last background bin of the best split is returned. Ties
/// resolve to the lowest split.
///
/// # Arguments
///
/// * `image` - Input grayscale image
///
/// # Returns
///
/// The threshold in image units. A constant image returns its value.
///
/// # Errors
///
/// `InvalidInput` if the image is empty or contains NaN/inf.
pub fn otsu_threshold(image: ArrayView2<f64>) -> Result<f64> {
    validate_image(image)?;

    let min_val = image.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_val = image.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    // Handle edge case of flat image
    if max_val == min_val {
        return Ok(min_val);
    }

    let bin_width = (max_val - min_val) / OTSU_BINS as f64;
    let mut histogram = vec![0u64; OTSU_BINS];
    for &pixel in image.iter() {
        let bin = ((pixel - min_val) / bin_width) as usize;
        histogram[bin.min(OTSU_BINS - 1)] += 1;
    }

    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min_val + (i as f64 + 0.5) * bin_width)
        .collect();

    let total_pixels = image.len() as f64;
    let total_sum: f64 = histogram
        .iter()
        .zip(&centers)
        .map(|(&count, &center)| count as f64 * center)
        .sum();

    let mut cum_weight = 0.0;
    let mut cum_sum = 0.0;
    let mut best_bin = 0;
    let mut max_variance = f64::NEG_INFINITY;

    for t in 0..OTSU_BINS - 1 {
        cum_weight += histogram[t] as f64;
        cum_sum += histogram[t] as f64 * centers[t];

        let w_fg = total_pixels - cum_weight;
        if cum_weight == 0.0 || w_fg == 0.0 {
            continue;
        }

        let mean_bg = cum_sum / cum_weight;
        let mean_fg = (total_sum - cum_sum) / w_fg;
        let variance = cum_weight * w_fg * (mean_bg - mean_fg).powi(2);

        if variance > max_variance {
            max_variance = variance;
            best_bin = t;
        }
    }

    Ok(centers[best_bin])
}

/// Apply thresholding to an image and return a binary mask
///
/// A pixel is `true` when it is strictly greater than `threshold`.
pub fn apply_threshold(image: ArrayView2<f64>, threshold: f64) -> Array2<bool> {
    image.mapv(|v| v > threshold)
}

/// Compute the per-pixel local threshold surface (before any offset).
///
/// # Errors
///
/// `ParameterOutOfRange` unless `block_size` is odd and at least 3.
pub fn local_threshold(
    image: ArrayView2<f64>,
    block_size: usize,
    method: AdaptiveMethod,
) -> Result<Array2<f64>> {
    validate_image(image)?;
    if block_size < 3 || block_size % 2 == 0 {
        return Err(CafeError::out_of_range(
            "block_size",
            block_size as f64,
            "must be an odd number of at least 3",
        ));
    }

    Ok(match method {
        AdaptiveMethod::Mean => uniform_filter(image, block_size),
        AdaptiveMethod::Gaussian => gaussian_filter(image, (block_size as f64 - 1.0) / 6.0),
    })
}

/// Threshold a grayscale channel into a binary mask.
///
/// # Arguments
///
/// * `image` - Input grayscale channel
/// * `method` - Threshold strategy and its parameters
///
/// # Returns
///
/// Mask of pixels above their (global or local) threshold
pub fn threshold(image: ArrayView2<f64>, method: &ThresholdMethod) -> Result<Array2<bool>> {
    validate_image(image)?;

    match *method {
        ThresholdMethod::Fixed(value) => {
            debug!("Using provided threshold: {value:.6}");
            Ok(apply_threshold(image, value))
        }
        ThresholdMethod::Otsu { offset, factor } => {
            let otsu = otsu_threshold(image)?;
            let adjusted = (otsu - offset) * factor;
            debug!("Otsu's threshold: {otsu:.6}, adjusted: {adjusted:.6}");
            Ok(apply_threshold(image, adjusted))
        }
        ThresholdMethod::Adaptive {
            block_size,
            method,
            offset,
        } => {
            let local = local_threshold(image, block_size, method)?;
            debug!("Adaptive threshold: block {block_size}, {method:?}, offset {offset}");
            let mut mask = Array2::from_elem(image.dim(), false);
            Zip::from(&mut mask)
                .and(image)
                .and(&local)
                .for_each(|m, &v, &t| *m = v > t - offset);
            Ok(mask)
        }
    }
}

/// Interpret a numeric 0/1 array as a mask.
///
/// # Errors
///
/// `InvalidInput` if any sample is neither 0 nor 1.
pub fn mask_from_values(values: ArrayView2<f64>) -> Result<Array2<bool>> {
    if let Some(bad) = values.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(CafeError::InvalidInput(format!(
            "mask values must be 0 or 1, found {bad}"
        )));
    }
    Ok(values.mapv(|v| v == 1.0))
}

/// Cast a mask to 0.0/1.0 samples.
pub fn mask_to_values(mask: ArrayView2<bool>) -> Array2<f64> {
    mask.mapv(|m| if m { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn two_spot_image() -> Array2<f64> {
        let mut image = Array2::zeros((20, 20));
        for i in 2..5 {
            for j in 2..5 {
                image[[i, j]] = 0.9;
            }
        }
        for i in 15..18 {
            for j in 15..18 {
                image[[i, j]] = 0.8;
            }
        }
        image
    }

    #[test]
    fn test_otsu_threshold_bimodal() {
        let mut image = Array2::zeros((20, 10));
        for (i, v) in image.iter_mut().enumerate() {
            *v = if i < 100 {
                0.1 + 0.2 * (i as f64 / 100.0)
            } else {
                0.7 + 0.2 * ((i - 100) as f64 / 100.0)
            };
        }
        let t = otsu_threshold(image.view()).unwrap();
        assert!(t > 0.29 && t < 0.7, "threshold {t} should split the clusters");
    }

    #[test]
    fn test_otsu_threshold_constant() {
        let image = Array2::from_elem((4, 4), 5.0);
        assert_eq!(otsu_threshold(image.view()).unwrap(), 5.0);
        let mask = threshold(image.view(), &ThresholdMethod::default()).unwrap();
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_otsu_separates_spots_from_zero_background() {
        let image = two_spot_image();
        let mask = threshold(image.view(), &ThresholdMethod::default()).unwrap();
        assert_eq!(mask.iter().filter(|&&m| m).count(), 18);
        assert!(mask[[3, 3]]);
        assert!(mask[[16, 16]]);
        assert!(!mask[[10, 10]]);
    }

    #[test]
    fn test_otsu_offset_and_factor() {
        let image = two_spot_image();
        let otsu = otsu_threshold(image.view()).unwrap();
        // Raising the cutoff above the dimmer spot keeps only the brighter one
        let method = ThresholdMethod::Otsu {
            offset: otsu - 0.85,
            factor: 1.0,
        };
        let mask = threshold(image.view(), &method).unwrap();
        assert_eq!(mask.iter().filter(|&&m| m).count(), 9);
        assert!(mask[[3, 3]]);
        assert!(!mask[[16, 16]]);

        let method = ThresholdMethod::Otsu {
            offset: 0.0,
            factor: 1000.0,
        };
        let mask = threshold(image.view(), &method).unwrap();
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_apply_threshold() {
        let image = arr2(&[[0.1, 0.9], [0.8, 0.2]]);
        let mask = apply_threshold(image.view(), 0.5);
        assert_eq!(mask, arr2(&[[false, true], [true, false]]));
        // Strict comparison
        let mask = apply_threshold(image.view(), 0.9);
        assert!(!mask[[0, 1]]);
    }

    #[test]
    fn test_fixed_threshold_skips_computation() {
        let image = two_spot_image();
        let mask = threshold(image.view(), &ThresholdMethod::Fixed(0.85)).unwrap();
        assert_eq!(mask.iter().filter(|&&m| m).count(), 9);
    }

    #[test]
    fn test_empty_image_is_invalid() {
        let image = Array2::<f64>::zeros((0, 5));
        assert!(matches!(
            threshold(image.view(), &ThresholdMethod::default()),
            Err(CafeError::InvalidInput(_))
        ));
        assert!(matches!(
            otsu_threshold(image.view()),
            Err(CafeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_finite_image_is_invalid() {
        let mut image = Array2::zeros((3, 3));
        image[[1, 1]] = f64::NAN;
        assert!(matches!(
            threshold(image.view(), &ThresholdMethod::Fixed(0.0)),
            Err(CafeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_adaptive_threshold_handles_illumination_gradient() {
        // Bright ramp from left to right with small spots riding on it
        let mut image = Array2::from_shape_fn((30, 60), |(_, c)| c as f64 * 2.0);
        image[[10, 5]] += 40.0;
        image[[20, 55]] += 40.0;

        // A global threshold only finds the right half of the ramp
        let global = threshold(image.view(), &ThresholdMethod::default()).unwrap();
        assert!(!global[[10, 5]]);

        let method = ThresholdMethod::Adaptive {
            block_size: 9,
            method: AdaptiveMethod::Mean,
            offset: -10.0,
        };
        let mask = threshold(image.view(), &method).unwrap();
        assert!(mask[[10, 5]]);
        assert!(mask[[20, 55]]);
        assert!(!mask[[15, 30]]);
    }

    #[test]
    fn test_adaptive_offset_lowers_threshold() {
        let image = Array2::from_elem((8, 8), 10.0);
        let strict = ThresholdMethod::Adaptive {
            block_size: 3,
            method: AdaptiveMethod::Gaussian,
            offset: -0.5,
        };
        assert!(threshold(image.view(), &strict)
            .unwrap()
            .iter()
            .all(|&m| !m));

        let lenient = ThresholdMethod::Adaptive {
            block_size: 3,
            method: AdaptiveMethod::Gaussian,
            offset: 1.0,
        };
        assert!(threshold(image.view(), &lenient)
            .unwrap()
            .iter()
            .all(|&m| m));
    }

    #[test]
    fn test_adaptive_block_size_validation() {
        let image = Array2::zeros((5, 5));
        for block_size in [0, 1, 4] {
            let result = local_threshold(image.view(), block_size, AdaptiveMethod::Mean);
            assert!(matches!(
                result,
                Err(CafeError::ParameterOutOfRange { name: "block_size", .. })
            ));
        }
    }

    #[test]
    fn test_local_threshold_constant_image() {
        let image = Array2::from_elem((6, 6), 3.0);
        let local = local_threshold(image.view(), 5, AdaptiveMethod::Gaussian).unwrap();
        for &v in local.iter() {
            assert_relative_eq!(v, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rethresholding_a_mask_is_idempotent() {
        let image = two_spot_image();
        let mask = threshold(image.view(), &ThresholdMethod::default()).unwrap();
        let values = mask_to_values(mask.view());
        let again = threshold(values.view(), &ThresholdMethod::default()).unwrap();
        assert_eq!(mask, again);

        let empty = Array2::from_elem((4, 4), false);
        let values = mask_to_values(empty.view());
        let again = threshold(values.view(), &ThresholdMethod::default()).unwrap();
        assert_eq!(empty, again);
    }

    #[test]
    fn test_mask_from_values() {
        let values = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        let mask = mask_from_values(values.view()).unwrap();
        assert_eq!(mask, arr2(&[[false, true], [true, false]]));

        let values = arr2(&[[0.0, 0.5]]);
        assert!(matches!(
            mask_from_values(values.view()),
            Err(CafeError::InvalidInput(_))
        ));
    }
}
