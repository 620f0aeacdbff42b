//! CAFE: centromere-associated fluorescence estimator
//!
//! Segments fluorescence micrographs and measures how a protein of interest
//! is distributed near centromeres and telomeres relative to bulk chromatin.
//!
//! - [`image_proc`]: thresholding, morphology, labeling, region statistics
//! - [`analysis`]: the named analyses built on those primitives
//! - [`config`]: one parameter struct per analysis, loadable from JSON
//! - [`shared_args`]: command line arguments shared by the `cafe` binary

pub mod analysis;
pub mod config;
pub mod error;
pub mod image_proc;
pub mod shared_args;

pub use analysis::{
    centromere_neighbourhood, centromere_vs_chromatin, chromatin_region, encode_centro_telomeres,
    encode_centro_telomeres_multichannel, encode_masks, render_overlay, trf_quantify, Comparison,
    TrfBlob,
};
pub use config::{
    AnalysisConfig, CentromereParams, ChannelAssignment, ChromatinParams, ComparisonParams,
    EncodeParams, OutputMode, TrfParams,
};
pub use error::{CafeError, Result};
