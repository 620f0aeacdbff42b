//! Parameter types for the analysis pipelines.
//!
//! Every orchestrator in [`crate::analysis`] takes exactly one of these
//! structs. All of them deserialize with `#[serde(default)]`, so a JSON file
//! only has to name the values it changes.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::image_proc::label::Connectivity;
use crate::image_proc::regionprops::DivisionPolicy;
use crate::image_proc::thresholding::AdaptiveMethod;

/// Neighbourhood of thresholded centromere spots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentromereParams {
    /// Disk radius, in pixels, grown around each detected spot
    pub dilation_radius: usize,
    /// Explicit threshold; when unset the Otsu threshold is used
    pub threshold: Option<f64>,
    /// Subtracted from the Otsu threshold
    pub offset: f64,
    /// Multiplies the offset Otsu threshold
    pub factor: f64,
}

impl Default for CentromereParams {
    fn default() -> Self {
        Self {
            dilation_radius: 3,
            threshold: None,
            offset: 0.0,
            factor: 1.0,
        }
    }
}

/// Chromatin segmentation by adaptive threshold and cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromatinParams {
    /// Adaptive threshold block size (odd, at least 3)
    pub background_diameter: usize,
    pub adaptive_method: AdaptiveMethod,
    /// Subtracted from the local threshold
    pub offset: f64,
    pub opening_radius: usize,
    pub opening_iterations: usize,
    /// Components smaller than this many pixels are discarded
    pub size_filter: usize,
}

impl Default for ChromatinParams {
    fn default() -> Self {
        Self {
            background_diameter: 51,
            adaptive_method: AdaptiveMethod::Gaussian,
            offset: 0.0,
            opening_radius: 2,
            opening_iterations: 1,
            size_filter: 64,
        }
    }
}

/// Which channel of a multichannel image carries which stain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelAssignment {
    pub centromere: usize,
    /// Protein of interest (also the telomere channel for overlays)
    pub target: usize,
    pub chromatin: usize,
}

impl Default for ChannelAssignment {
    fn default() -> Self {
        Self {
            centromere: 0,
            target: 1,
            chromatin: 2,
        }
    }
}

/// Shape of a centromere-versus-chromatin result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Difference of the two region means
    MeanDifference,
    /// Both raw sample sequences
    #[default]
    Samples,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonParams {
    pub centromere: CentromereParams,
    pub chromatin: ChromatinParams,
    /// Divide the target channel by its maximum before sampling
    pub normalize: bool,
    pub output: OutputMode,
}

/// Centromere/telomere overlay encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeParams {
    pub centro_offset: f64,
    pub centro_factor: f64,
    pub centro_min_size: usize,
    pub centro_radius: usize,
    pub telo_offset: f64,
    /// Adaptive block size for the telomere threshold (odd, at least 3)
    pub telo_adapt_block: usize,
    pub telo_open_radius: usize,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            centro_offset: 0.0,
            centro_factor: 1.0,
            centro_min_size: 14,
            centro_radius: 10,
            telo_offset: 0.0,
            telo_adapt_block: 49,
            telo_open_radius: 4,
        }
    }
}

/// TRF1 blob quantification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrfParams {
    pub trf_channel: usize,
    /// Chromatin channel; the last channel of the image when unset
    pub chromatin_channel: Option<usize>,
    pub connectivity: Connectivity,
    pub division_policy: DivisionPolicy,
}

impl Default for TrfParams {
    fn default() -> Self {
        Self {
            trf_channel: 0,
            chromatin_channel: None,
            connectivity: Connectivity::Four,
            division_policy: DivisionPolicy::Sentinel,
        }
    }
}

/// All pipeline parameters in one document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub channels: ChannelAssignment,
    pub comparison: ComparisonParams,
    pub encode: EncodeParams,
    pub trf: TrfParams,
}

impl AnalysisConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        debug!("Loaded analysis config from {}", path.display());
        Ok(config)
    }

    /// Save as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CafeError;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.comparison.centromere.dilation_radius, 3);
        assert_eq!(config.comparison.output, OutputMode::Samples);
        assert_eq!(config.encode.telo_adapt_block % 2, 1);
        assert_eq!(config.trf.division_policy, DivisionPolicy::Sentinel);
        assert_eq!(config.channels.target, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "comparison": { "normalize": true, "output": "mean_difference" },
            "trf": { "connectivity": "eight", "division_policy": "strict" }
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert!(config.comparison.normalize);
        assert_eq!(config.comparison.output, OutputMode::MeanDifference);
        assert_eq!(config.comparison.chromatin, ChromatinParams::default());
        assert_eq!(config.trf.connectivity, Connectivity::Eight);
        assert_eq!(config.trf.division_policy, DivisionPolicy::Strict);
        assert_eq!(config.trf.trf_channel, 0);
        assert_eq!(config.trf.chromatin_channel, None);
        assert_eq!(config.encode, EncodeParams::default());

        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "trf": { "chromatin_channel": 1 } }"#).unwrap();
        assert_eq!(config.trf.chromatin_channel, Some(1));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cafe.json");

        let mut config = AnalysisConfig::default();
        config.comparison.centromere.threshold = Some(120.0);
        config.encode.telo_offset = -4.5;
        config.save_to_file(&path).unwrap();

        let loaded = AnalysisConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AnalysisConfig::load_from_file(&path),
            Err(CafeError::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::load_from_file(&dir.path().join("missing.json")),
            Err(CafeError::Io(_))
        ));
    }
}
