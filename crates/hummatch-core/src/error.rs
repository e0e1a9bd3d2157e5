//! Error taxonomy for the matching engine
//!
//! "No melody found" is not an error: comparators return a score of 0.0
//! for it. Only undecodable audio and bad configuration surface here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    /// Audio could not be opened, parsed or resampled
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Unknown variant id, inconsistent parameters or an unusable worker pool
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MatchError {
    pub fn decode(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        MatchError::Decode {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }
}
