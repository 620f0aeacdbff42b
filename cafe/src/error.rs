//! Error type shared by the segmentation pipeline and its file-facing helpers.

use thiserror::Error;

/// Errors raised by the pipeline.
///
/// The first three variants come from the numeric core. The remaining ones
/// are only produced by the image bridge, configuration loading and CSV
/// export used by the command line tool.
#[derive(Error, Debug)]
pub enum CafeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Parameter `{name}` = {value} is out of range: {reason}")]
    ParameterOutOfRange {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("Division by zero: {context}")]
    DivideByZero { context: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CafeError {
    pub(crate) fn out_of_range(name: &'static str, value: f64, reason: &'static str) -> Self {
        CafeError::ParameterOutOfRange {
            name,
            value,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, CafeError>;
