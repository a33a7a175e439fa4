use thiserror::Error;

use crate::validate::Violation;

/// Setup mistakes. These are raised wherever they are detected and are never
/// treated as a non-match or silently ignored.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Pattern should define hostname but found {pattern}")]
    MissingHostname { pattern: String },

    #[error("Invalid glob \"{pattern}\": {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Image config \"{field}\" {reason}")]
    InvalidSizes { field: &'static str, reason: String },

    #[error("Image config uses loader \"custom\" but no custom loader function was provided")]
    MissingCustomLoader,

    #[error("Failed to parse image config: {0}")]
    Parse(String),
}

/// Errors that stop an image from rendering.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    /// A fatal prop combination, identifying the props and the `src`.
    #[error("{0}")]
    InvalidProps(Violation),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
