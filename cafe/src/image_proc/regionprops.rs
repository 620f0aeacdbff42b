//! Per-region intensity and shape statistics.
//!
//! [`regionprops`] summarizes every labeled component of a [`LabelMap`] over
//! one intensity channel. [`normalize_records`] divides the intensity
//! properties of one record set by those of another set measured on a
//! different channel with the same label map. Records are paired by label,
//! never by position, so reordering either set cannot mismatch regions.
//!
//! A zero denominator never turns into NaN or infinity: depending on the
//! [`DivisionPolicy`] it becomes `None` or a `DivideByZero` error.

use std::collections::HashMap;

use log::warn;
use ndarray::{ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{CafeError, Result};
use crate::image_proc::image::ensure_same_shape;
use crate::image_proc::label::LabelMap;

/// Inclusive pixel bounds of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl BoundingBox {
    /// Degenerate box around a single pixel.
    pub fn at(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            min_col: col,
            max_row: row,
            max_col: col,
        }
    }

    pub fn expand_to_include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }
}

/// Statistics of one labeled component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Label in the source [`LabelMap`]
    pub label: u32,
    /// Pixel count
    pub area: usize,
    pub mean_intensity: f64,
    pub total_intensity: f64,
    pub max_intensity: f64,
    /// 0 for a circle (or a single pixel), approaching 1 for elongated regions
    pub eccentricity: f64,
    /// (row, col) center of the region's pixel coordinates
    pub centroid: (f64, f64),
    pub bbox: BoundingBox,
}

/// Ratios of intensity properties between two record sets sharing labels.
///
/// `None` marks a zero denominator under [`DivisionPolicy::Sentinel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub label: u32,
    pub area: usize,
    pub mean_intensity: Option<f64>,
    pub total_intensity: Option<f64>,
    pub max_intensity: Option<f64>,
}

/// What a ratio with a zero denominator evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisionPolicy {
    /// The ratio is `None`.
    #[default]
    Sentinel,
    /// The whole computation fails with `DivideByZero`.
    Strict,
}

#[derive(Debug, Clone)]
struct Accumulator {
    area: usize,
    total: f64,
    max: f64,
    row_sum: f64,
    col_sum: f64,
    bbox: BoundingBox,
}

/// Eccentricity of the ellipse with the same second central moments.
fn eccentricity(mu_rr: f64, mu_cc: f64, mu_rc: f64) -> f64 {
    let half_sum = (mu_rr + mu_cc) / 2.0;
    let root = (((mu_rr - mu_cc) / 2.0).powi(2) + mu_rc * mu_rc).sqrt();
    let major = half_sum + root;
    let minor = half_sum - root;
    if major <= 0.0 {
        return 0.0;
    }
    (1.0 - (minor / major).clamp(0.0, 1.0)).sqrt()
}

/// Measure every labeled region over an intensity channel.
///
/// # Arguments
///
/// * `label_map` - Components to measure
/// * `intensity` - Channel sampled for mean/total/max intensity
///
/// # Returns
///
/// One [`RegionRecord`] per label, in ascending label order. Labels with no
/// pixels (possible only in hand-built maps) are skipped.
///
/// # Errors
///
/// `InvalidInput` when the channel and the label map differ in shape.
pub fn regionprops(
    label_map: &LabelMap,
    intensity: ArrayView2<f64>,
) -> Result<Vec<RegionRecord>> {
    ensure_same_shape(label_map.dim(), intensity.dim(), "intensity image")?;

    let mut acc: Vec<Option<Accumulator>> = vec![None; label_map.count as usize + 1];

    for ((row, col), &l) in label_map.labels.indexed_iter() {
        if l == 0 {
            continue;
        }
        let value = intensity[[row, col]];
        let entry = acc
            .get_mut(l as usize)
            .ok_or_else(|| {
                CafeError::InvalidInput(format!(
                    "label {l} exceeds label count {}",
                    label_map.count
                ))
            })?
            .get_or_insert_with(|| Accumulator {
                area: 0,
                total: 0.0,
                max: f64::NEG_INFINITY,
                row_sum: 0.0,
                col_sum: 0.0,
                bbox: BoundingBox::at(row, col),
            });
        entry.area += 1;
        entry.total += value;
        entry.max = entry.max.max(value);
        entry.row_sum += row as f64;
        entry.col_sum += col as f64;
        entry.bbox.expand_to_include(row, col);
    }

    let centroids: Vec<(f64, f64)> = acc
        .iter()
        .map(|a| match a {
            Some(a) => (a.row_sum / a.area as f64, a.col_sum / a.area as f64),
            None => (0.0, 0.0),
        })
        .collect();

    // Second pass for central moments around each centroid
    let mut moments = vec![(0.0f64, 0.0f64, 0.0f64); acc.len()];
    for ((row, col), &l) in label_map.labels.indexed_iter() {
        if l == 0 {
            continue;
        }
        let (cr, cc) = centroids[l as usize];
        let dr = row as f64 - cr;
        let dc = col as f64 - cc;
        let m = &mut moments[l as usize];
        m.0 += dr * dr;
        m.1 += dc * dc;
        m.2 += dr * dc;
    }

    let records = acc
        .into_iter()
        .enumerate()
        .filter_map(|(l, a)| a.map(|a| (l, a)))
        .map(|(l, a)| {
            let n = a.area as f64;
            let (mrr, mcc, mrc) = moments[l];
            RegionRecord {
                label: l as u32,
                area: a.area,
                mean_intensity: a.total / n,
                total_intensity: a.total,
                max_intensity: a.max,
                eccentricity: eccentricity(mrr / n, mcc / n, mrc / n),
                centroid: centroids[l],
                bbox: a.bbox,
            }
        })
        .collect();

    Ok(records)
}

fn ratio(
    numerator: f64,
    denominator: f64,
    label: u32,
    property: &str,
    policy: DivisionPolicy,
) -> Result<Option<f64>> {
    if denominator != 0.0 {
        return Ok(Some(numerator / denominator));
    }
    match policy {
        DivisionPolicy::Sentinel => {
            warn!("Region {label}: {property} denominator is zero, ratio left undefined");
            Ok(None)
        }
        DivisionPolicy::Strict => Err(CafeError::DivideByZero {
            context: format!("region {label}: {property} of the denominator is zero"),
        }),
    }
}

/// Divide intensity properties of `numerators` by those of `denominators`.
///
/// Records are matched on `label`. The output follows the order of
/// `numerators`.
///
/// # Errors
///
/// * `InvalidInput` - a numerator label has no denominator record
/// * `DivideByZero` - a zero denominator under [`DivisionPolicy::Strict`]
pub fn normalize_records(
    numerators: &[RegionRecord],
    denominators: &[RegionRecord],
    policy: DivisionPolicy,
) -> Result<Vec<NormalizedRecord>> {
    let by_label: HashMap<u32, &RegionRecord> =
        denominators.iter().map(|r| (r.label, r)).collect();

    numerators
        .iter()
        .map(|num| {
            let den = by_label.get(&num.label).ok_or_else(|| {
                CafeError::InvalidInput(format!(
                    "no denominator record for region {}",
                    num.label
                ))
            })?;
            Ok(NormalizedRecord {
                label: num.label,
                area: num.area,
                mean_intensity: ratio(
                    num.mean_intensity,
                    den.mean_intensity,
                    num.label,
                    "mean intensity",
                    policy,
                )?,
                total_intensity: ratio(
                    num.total_intensity,
                    den.total_intensity,
                    num.label,
                    "total intensity",
                    policy,
                )?,
                max_intensity: ratio(
                    num.max_intensity,
                    den.max_intensity,
                    num.label,
                    "max intensity",
                    policy,
                )?,
            })
        })
        .collect()
}

/// Intensity samples under a mask, in raster order.
pub fn masked_values(image: ArrayView2<f64>, mask: ArrayView2<bool>) -> Result<Vec<f64>> {
    ensure_same_shape(image.dim(), mask.dim(), "mask")?;
    let mut values = Vec::new();
    Zip::from(image).and(mask).for_each(|&v, &m| {
        if m {
            values.push(v);
        }
    });
    Ok(values)
}
