// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared types and contracts for per-pixel time-series segmentation
//! queries: the error type, stack/pixel data model, segment records, the
//! change-model adapter contract, and the typed configuration surface.

pub mod config;
pub mod error;
pub mod model;
pub mod record;
pub mod stack;

pub use config::{OptionKind, OptionSpec, OptionValue, QueryConfig};
pub use error::QueryError;
pub use model::{ChangeModel, FitOutcome, ModelConfig, Screening};
pub use record::{validate_records, SegmentRecord, NO_BREAK};
pub use stack::{ImageStack, PixelSeries};
