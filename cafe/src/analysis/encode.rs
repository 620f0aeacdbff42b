//! Centromere/telomere overlap encoding and its display rendering.
//!
//! The encoded map packs two masks into one byte per pixel:
//!
//! | value | meaning          |
//! |-------|------------------|
//! | 0     | background       |
//! | 1     | telomere only    |
//! | 2     | centromere only  |
//! | 3     | both             |

use log::debug;
use ndarray::{Array2, ArrayView2, ArrayView3, Zip};

use crate::config::{ChannelAssignment, EncodeParams};
use crate::error::{CafeError, Result};
use crate::image_proc::image::{channel, ensure_same_shape};
use crate::image_proc::label::Connectivity;
use crate::image_proc::morphology::{dilate, open, remove_small};
use crate::image_proc::thresholding::{threshold, AdaptiveMethod, ThresholdMethod};

/// Overlay brightness step per encoded level, as a fraction of alpha.
const LEVEL_STEP: f64 = 0.42;

/// Pack two masks as `2 * centromere + telomere`.
pub fn encode_masks(
    centromere: ArrayView2<bool>,
    telomere: ArrayView2<bool>,
) -> Result<Array2<u8>> {
    ensure_same_shape(centromere.dim(), telomere.dim(), "telomere mask")?;
    let mut encoded = Array2::zeros(centromere.dim());
    Zip::from(&mut encoded)
        .and(centromere)
        .and(telomere)
        .for_each(|e, &c, &t| *e = 2 * c as u8 + t as u8);
    Ok(encoded)
}

/// Segment centromeres and telomeres independently and encode the overlap.
///
/// # Arguments
///
/// * `centro_channel` - Centromere stain; Otsu threshold adjusted by
///   `centro_offset`/`centro_factor`, size filtered by `centro_min_size`,
///   dilated by `centro_radius`
/// * `telo_channel` - Telomere stain; Gaussian adaptive threshold over
///   `telo_adapt_block` lowered by `telo_offset`, opened once with a disk of
///   `telo_open_radius`
/// * `params` - Segmentation parameters
///
/// # Returns
///
/// Encoded `u8` map, see the module documentation
pub fn encode_centro_telomeres(
    centro_channel: ArrayView2<f64>,
    telo_channel: ArrayView2<f64>,
    params: &EncodeParams,
) -> Result<Array2<u8>> {
    ensure_same_shape(centro_channel.dim(), telo_channel.dim(), "telomere channel")?;

    let centro = threshold(
        centro_channel,
        &ThresholdMethod::Otsu {
            offset: params.centro_offset,
            factor: params.centro_factor,
        },
    )?;
    let centro = remove_small(centro.view(), params.centro_min_size, Connectivity::Four)?;
    let centro = dilate(centro.view(), params.centro_radius);

    let telo = threshold(
        telo_channel,
        &ThresholdMethod::Adaptive {
            block_size: params.telo_adapt_block,
            method: AdaptiveMethod::Gaussian,
            offset: params.telo_offset,
        },
    )?;
    let telo = open(telo.view(), params.telo_open_radius, 1)?;

    let encoded = encode_masks(centro.view(), telo.view())?;
    debug!(
        "Encoded overlay: {} centromere px, {} telomere px, {} overlap px",
        encoded.iter().filter(|&&v| v >= 2).count(),
        encoded.iter().filter(|&&v| v % 2 == 1).count(),
        encoded.iter().filter(|&&v| v == 3).count()
    );
    Ok(encoded)
}

/// [`encode_centro_telomeres`] on a multichannel image.
///
/// The telomere stain is read from the `target` channel.
pub fn encode_centro_telomeres_multichannel(
    image: ArrayView3<'_, f64>,
    channels: &ChannelAssignment,
    params: &EncodeParams,
) -> Result<Array2<u8>> {
    let centro = channel(image, channels.centromere)?;
    let telo = channel(image, channels.target)?;
    encode_centro_telomeres(centro, telo, params)
}

/// Map an encoded overlay to display intensities.
///
/// Every labelled pixel gets `alpha`, plus `floor(alpha * 0.42)` per encoded
/// level, so the four classes stay visually distinct. Values saturate at 255.
///
/// # Errors
///
/// `ParameterOutOfRange` when `alpha` exceeds 100.
pub fn render_overlay(encoded: ArrayView2<u8>, alpha: u8) -> Result<Array2<u8>> {
    if alpha > 100 {
        return Err(CafeError::out_of_range(
            "alpha",
            alpha as f64,
            "must be at most 100",
        ));
    }
    let step = (alpha as f64 * LEVEL_STEP).floor() as u8;
    Ok(encoded.mapv(|v| {
        let base = if v > 0 { alpha } else { 0 };
        base.saturating_add(step.saturating_mul(v))
    }))
}
