//! Centromere-adjacent versus general chromatin intensity comparison.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2, ArrayView3, Zip};

use crate::config::{
    CentromereParams, ChannelAssignment, ChromatinParams, ComparisonParams, OutputMode,
};
use crate::error::{CafeError, Result};
use crate::image_proc::image::{channel, ensure_same_shape};
use crate::image_proc::label::Connectivity;
use crate::image_proc::morphology::{dilate, open, remove_small};
use crate::image_proc::regionprops::masked_values;
use crate::image_proc::thresholding::{threshold, ThresholdMethod};

/// Result of [`centromere_vs_chromatin`].
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// `mean(centromere samples) - mean(chromatin samples)`
    MeanDifference(f64),
    /// Target-channel samples under each region, in raster order
    Samples {
        centromere: Vec<f64>,
        chromatin: Vec<f64>,
    },
}

/// Pixels near labelled centromeres.
///
/// Thresholds the centromere channel (the explicit `threshold` when given,
/// Otsu adjusted by `offset`/`factor` otherwise) and dilates the spots by
/// `dilation_radius`.
pub fn centromere_neighbourhood(
    channel: ArrayView2<f64>,
    params: &CentromereParams,
) -> Result<Array2<bool>> {
    let method = match params.threshold {
        Some(value) => ThresholdMethod::Fixed(value),
        None => ThresholdMethod::Otsu {
            offset: params.offset,
            factor: params.factor,
        },
    };
    let spots = threshold(channel, &method)?;
    Ok(dilate(spots.view(), params.dilation_radius))
}

/// Chromatin mask: adaptive threshold, opening, then a size filter.
pub fn chromatin_region(
    channel: ArrayView2<f64>,
    params: &ChromatinParams,
) -> Result<Array2<bool>> {
    let method = ThresholdMethod::Adaptive {
        block_size: params.background_diameter,
        method: params.adaptive_method,
        offset: params.offset,
    };
    let raw = threshold(channel, &method)?;
    let opened = open(raw.view(), params.opening_radius, params.opening_iterations)?;
    remove_small(opened.view(), params.size_filter, Connectivity::Four)
}

fn mean(values: &[f64], region: &str) -> Result<f64> {
    if values.is_empty() {
        return Err(CafeError::DivideByZero {
            context: format!("mean over an empty {region} region"),
        });
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn normalized_by_max(target: ArrayView2<f64>) -> Result<Array2<f64>> {
    let max = target.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if max == 0.0 {
        return Err(CafeError::DivideByZero {
            context: "target channel maximum is zero".to_string(),
        });
    }
    Ok(target.mapv(|v| v / max))
}

/// Compare target-channel intensity near centromeres against the rest of
/// the chromatin.
///
/// # Arguments
///
/// * `image` - Multichannel image, channels on the last axis
/// * `channels` - Which channel holds centromeres, target protein and chromatin
/// * `params` - Segmentation parameters and output selection
///
/// # Returns
///
/// Either the mean difference or both sample sequences, per `params.output`.
/// The chromatin region excludes every centromere pixel, so the two sample
/// sets never share a pixel.
///
/// # Errors
///
/// * `InvalidInput` - a channel index is out of range or the image is empty
/// * `ParameterOutOfRange` - a segmentation parameter is invalid
/// * `DivideByZero` - normalizing a target channel whose maximum is zero, or
///   taking the mean of an empty region
pub fn centromere_vs_chromatin(
    image: ArrayView3<'_, f64>,
    channels: &ChannelAssignment,
    params: &ComparisonParams,
) -> Result<Comparison> {
    let centro_channel = channel(image, channels.centromere)?;
    let target_channel = channel(image, channels.target)?;
    let chrom_channel = channel(image, channels.chromatin)?;

    let centro = centromere_neighbourhood(centro_channel, &params.centromere)?;
    let mut chromatin = chromatin_region(chrom_channel, &params.chromatin)?;
    ensure_same_shape(centro.dim(), chromatin.dim(), "chromatin mask")?;
    Zip::from(&mut chromatin)
        .and(&centro)
        .for_each(|c, &near| *c = *c && !near);

    let target = if params.normalize {
        normalized_by_max(target_channel)?
    } else {
        target_channel.to_owned()
    };

    let centromere_samples = masked_values(target.view(), centro.view())?;
    let chromatin_samples = masked_values(target.view(), chromatin.view())?;
    debug!(
        "Centromere region: {} px, chromatin region: {} px",
        centromere_samples.len(),
        chromatin_samples.len()
    );

    match params.output {
        OutputMode::MeanDifference => {
            let diff =
                mean(&centromere_samples, "centromere")? - mean(&chromatin_samples, "chromatin")?;
            Ok(Comparison::MeanDifference(diff))
        }
        OutputMode::Samples => {
            if centromere_samples.is_empty() || chromatin_samples.is_empty() {
                warn!("Comparison has an empty region");
            }
            Ok(Comparison::Samples {
                centromere: centromere_samples,
                chromatin: chromatin_samples,
            })
        }
    }
}
