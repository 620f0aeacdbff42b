//! Bridges between `image` crate buffers and `ndarray` arrays.
//!
//! Micrographs are handled as `Array3<f64>` with shape `(height, width, 3)`
//! holding the raw RGB intensities; 8-bit and 16-bit files both load without
//! rescaling so thresholds stay in the units of the acquisition.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Primitive, Rgb};
use log::debug;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use num_traits::ToPrimitive;

use crate::error::{CafeError, Result};

/// Number of channels in a multichannel micrograph.
pub const CHANNELS: usize = 3;

/// Fail with `InvalidInput` unless two 2D shapes agree.
pub(crate) fn ensure_same_shape(
    expected: (usize, usize),
    actual: (usize, usize),
    what: &str,
) -> Result<()> {
    if expected != actual {
        return Err(CafeError::InvalidInput(format!(
            "{what} has shape {actual:?}, expected {expected:?}"
        )));
    }
    Ok(())
}

fn rgb_to_array3<S>(rgb: &ImageBuffer<Rgb<S>, Vec<S>>) -> Array3<f64>
where
    S: Primitive + ToPrimitive,
    Rgb<S>: Pixel<Subpixel = S>,
{
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, CHANNELS), |(y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c].to_f64().unwrap_or(0.0)
    })
}

/// Convert a decoded image into a `(height, width, 3)` intensity array.
///
/// Grayscale inputs are replicated into all three channels. Sample values are
/// kept as stored: an 8-bit pixel of 200 becomes 200.0, not 51400.0.
pub fn dynamic_image_to_array3(img: &DynamicImage) -> Array3<f64> {
    match img {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => rgb_to_array3(&img.to_rgb16()),
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            rgb_to_array3(&img.to_rgb32f())
        }
        _ => rgb_to_array3(&img.to_rgb8()),
    }
}

/// Load a micrograph from disk as a `(height, width, 3)` intensity array.
pub fn load_rgb(path: &Path) -> Result<Array3<f64>> {
    let img = image::open(path)?;
    let array = dynamic_image_to_array3(&img);
    debug!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );
    Ok(array)
}

/// View one channel of a multichannel image.
///
/// # Errors
///
/// `InvalidInput` when the image is not `(h, w, c)` with `channel < c`.
pub fn channel(image: ArrayView3<'_, f64>, channel: usize) -> Result<ArrayView2<'_, f64>> {
    let available = image.dim().2;
    if channel >= available {
        return Err(CafeError::InvalidInput(format!(
            "channel {channel} requested from an image with {available} channels"
        )));
    }
    Ok(image.index_axis_move(Axis(2), channel))
}

/// Converts an ndarray Array2<u8> to an image::GrayImage
///
/// Array indices `[y, x]` map to pixel coordinates `(x, y)`, so an array of
/// shape `(height, width)` becomes an image of `width x height`.
pub fn array2_to_gray_image(arr: ArrayView2<u8>) -> GrayImage {
    let (height, width) = arr.dim();
    let mut img = GrayImage::new(width as u32, height as u32);

    for ((y, x), &value) in arr.indexed_iter() {
        img.put_pixel(x as u32, y as u32, Luma([value]));
    }

    img
}

/// Write an 8-bit single-channel array as a PNG (or any format implied by
/// the extension).
pub fn save_gray(arr: &Array2<u8>, path: &Path) -> Result<()> {
    array2_to_gray_image(arr.view()).save(path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}
