//! Named analyses composed from the image-processing primitives.
//!
//! Each entry point takes raw image arrays plus one parameter struct from
//! [`crate::config`] and returns masks, encoded maps or per-blob records.

pub mod centromere;
pub mod encode;
pub mod trf;

pub use centromere::{
    centromere_neighbourhood, centromere_vs_chromatin, chromatin_region, Comparison,
};
pub use encode::{
    encode_centro_telomeres, encode_centro_telomeres_multichannel, encode_masks, render_overlay,
};
pub use trf::{trf_quantify, Intensities, Ratios, TrfBlob};
