// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error type for the segmentation query engine.
///
/// Cache misses are deliberately not represented here: a miss is an
/// `Option::None` at the cache boundary, never an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// Malformed formula, mismatched metadata count, invalid range
    /// configuration, or a rejected option value. Fatal to the caller.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The change-detection model could not be constructed. Fatal at
    /// driver construction time, never at query time.
    #[error("change model unavailable: {0}")]
    ModelUnavailable(String),

    /// The change-detection model rejected or failed the fit.
    #[error("model fit failed: {0}")]
    Fit(String),

    /// File I/O failure outside the cache read path.
    #[error("i/o error: {0}")]
    Io(String),
}

impl QueryError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::Fit(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}
