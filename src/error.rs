use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store is missing or could not be read
    #[error("reference data unavailable at {}: {reason}", path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("reference data is empty")]
    NoData,

    #[error("insufficient data: {available} points available, at least {required} required")]
    InsufficientData { required: usize, available: usize },

    /// Every predictor value in the training set is identical, so no slope exists
    #[error("degenerate fit: all {points} predictor values are equal")]
    DegenerateFit { points: usize },

    #[error("no fiber category produced a usable model")]
    NoModelAvailable,

    #[error("fiber composition invalid: {reason}")]
    CompositionInvalid { reason: String },

    #[error("invalid entry field `{field}`: {reason}")]
    InvalidEntry { field: &'static str, reason: String },

    #[error("body color required for the joint strategy")]
    MissingBodyColor,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}
