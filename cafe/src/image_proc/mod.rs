//! Image processing primitives for fluorescence segmentation
//!
//! Thresholding, binary morphology, connected-component labeling and
//! per-region statistics over `ndarray` images, plus the bridge to the
//! `image` crate used for file I/O.

pub mod filter;
pub mod image;
pub mod label;
pub mod morphology;
pub mod regionprops;
pub mod thresholding;

// Re-export key functionality for easier access
pub use label::{label, Connectivity, LabelMap};
pub use morphology::{dilate, erode, open, remove_small, StructuringElement};
pub use regionprops::{
    masked_values, normalize_records, regionprops, BoundingBox, DivisionPolicy, NormalizedRecord,
    RegionRecord,
};
pub use thresholding::{apply_threshold, otsu_threshold, threshold, AdaptiveMethod, ThresholdMethod};
