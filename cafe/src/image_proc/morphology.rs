//! Binary morphology with disk-shaped structuring elements.
//!
//! Dilation grows true regions, erosion shrinks them, and opening (erosion
//! followed by dilation) removes specks and thin protrusions while leaving
//! solid regions in place. [`remove_small`] drops whole connected components
//! below a pixel count.
//!
//! Border handling follows the usual binary-morphology convention: pixels
//! outside the image are background for dilation and foreground for erosion,
//! so regions touching the frame are not eaten away from the edge.

use log::debug;
use ndarray::{Array2, ArrayView2};

use crate::error::{CafeError, Result};
use crate::image_proc::label::{label, Connectivity};

/// Disk-shaped binary footprint parameterizing dilation and erosion.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuringElement {
    radius: usize,
    footprint: Array2<bool>,
    offsets: Vec<(isize, isize)>,
}

impl StructuringElement {
    /// Disk of the given radius: `dy² + dx² <= radius²` on a `(2r+1)²` grid.
    ///
    /// A radius of 0 is the single center pixel.
    pub fn disk(radius: usize) -> Self {
        let r = radius as isize;
        let side = 2 * radius + 1;
        let footprint = Array2::from_shape_fn((side, side), |(i, j)| {
            let dy = i as isize - r;
            let dx = j as isize - r;
            dy * dy + dx * dx <= r * r
        });
        let offsets = footprint
            .indexed_iter()
            .filter(|&(_, &inside)| inside)
            .map(|((i, j), _)| (i as isize - r, j as isize - r))
            .collect();

        Self {
            radius,
            footprint,
            offsets,
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn footprint(&self) -> ArrayView2<'_, bool> {
        self.footprint.view()
    }

    /// (row, col) offsets of the footprint pixels relative to its center.
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

fn shifted(
    row: usize,
    col: usize,
    offset: (isize, isize),
    dim: (usize, usize),
) -> Option<(usize, usize)> {
    let r = row as isize + offset.0;
    let c = col as isize + offset.1;
    if r >= 0 && c >= 0 && (r as usize) < dim.0 && (c as usize) < dim.1 {
        Some((r as usize, c as usize))
    } else {
        None
    }
}

/// Dilate a mask with an explicit structuring element.
pub fn dilate_with(mask: ArrayView2<bool>, element: &StructuringElement) -> Array2<bool> {
    let dim = mask.dim();
    let mut dilated = Array2::from_elem(dim, false);

    for ((row, col), _) in mask.indexed_iter().filter(|&(_, &m)| m) {
        for &offset in element.offsets() {
            if let Some(idx) = shifted(row, col, offset, dim) {
                dilated[idx] = true;
            }
        }
    }

    dilated
}

/// Erode a mask with an explicit structuring element.
pub fn erode_with(mask: ArrayView2<bool>, element: &StructuringElement) -> Array2<bool> {
    let dim = mask.dim();
    let mut eroded = Array2::from_elem(dim, false);

    for ((row, col), _) in mask.indexed_iter().filter(|&(_, &m)| m) {
        eroded[[row, col]] = element
            .offsets()
            .iter()
            .all(|&offset| shifted(row, col, offset, dim).map_or(true, |idx| mask[idx]));
    }

    eroded
}

/// Grow true regions by a disk of `radius` pixels.
///
/// The result is always a superset of the input; `radius == 0` returns a copy.
pub fn dilate(mask: ArrayView2<bool>, radius: usize) -> Array2<bool> {
    dilate_with(mask, &StructuringElement::disk(radius))
}

/// Shrink true regions by a disk of `radius` pixels.
pub fn erode(mask: ArrayView2<bool>, radius: usize) -> Array2<bool> {
    erode_with(mask, &StructuringElement::disk(radius))
}

/// Binary opening: `iterations` erosions followed by `iterations` dilations.
///
/// # Arguments
///
/// * `mask` - Input mask
/// * `radius` - Disk radius of the structuring element (at least 1)
/// * `iterations` - Number of erosion and dilation passes (at least 1)
///
/// # Errors
///
/// `ParameterOutOfRange` when `radius` or `iterations` is zero.
pub fn open(mask: ArrayView2<bool>, radius: usize, iterations: usize) -> Result<Array2<bool>> {
    if radius == 0 {
        return Err(CafeError::out_of_range(
            "opening_radius",
            0.0,
            "must be at least 1",
        ));
    }
    if iterations == 0 {
        return Err(CafeError::out_of_range(
            "opening_iterations",
            0.0,
            "must be at least 1",
        ));
    }

    let element = StructuringElement::disk(radius);
    let mut result = mask.to_owned();
    for _ in 0..iterations {
        result = erode_with(result.view(), &element);
    }
    for _ in 0..iterations {
        result = dilate_with(result.view(), &element);
    }
    Ok(result)
}

/// Remove connected true-components with fewer than `min_size` pixels.
///
/// # Errors
///
/// `ParameterOutOfRange` when `min_size` is zero.
pub fn remove_small(
    mask: ArrayView2<bool>,
    min_size: usize,
    connectivity: Connectivity,
) -> Result<Array2<bool>> {
    if min_size == 0 {
        return Err(CafeError::out_of_range(
            "min_size",
            0.0,
            "must be at least 1",
        ));
    }

    let labeled = label(mask, connectivity);
    let sizes = labeled.sizes();
    let keep: Vec<bool> = sizes.iter().map(|&size| size >= min_size).collect();

    let removed = keep.iter().skip(1).filter(|&&k| !k).count();
    debug!(
        "Size filter (min {min_size} px): removed {removed} of {} components",
        labeled.count
    );

    Ok(labeled.labels.mapv(|l| l != 0 && keep[l as usize]))
}
