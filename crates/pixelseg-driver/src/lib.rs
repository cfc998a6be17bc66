// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! Per-pixel segmentation query driver: clear-observation filtering,
//! metadata enrichment, the two-tier result cache, saved-result loading,
//! prediction-curve and break reconstruction, and the driver that
//! orchestrates them against an injected change-detection model.

pub mod breaks;
pub mod cache;
pub mod driver;
pub mod filter;
pub mod metadata;
pub mod predict;
pub mod saved;

pub use breaks::break_points;
pub use cache::ResultCache;
pub use driver::PixelQueryDriver;
pub use filter::{broadcast_range, clear_mask};
pub use metadata::{discover_metadata, enrich, Covariates};
pub use predict::prediction_curves;
pub use saved::{load_saved_results, saved_result_path, SavedResults};
