// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{QueryError, SegmentRecord};
use ndarray::ArrayView2;

/// Pre-fit noise screening procedure used by the change model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Screening {
    /// Iteratively reweighted robust regression with residual criterion.
    RobustRegression { crit: f64 },
    /// Local-weighted smoothing with residual criterion.
    Lowess { crit: f64 },
}

/// Configuration bundle handed to the change model at fit time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// Minimum run of consistent observations before declaring stability.
    pub consecutive: usize,
    /// Change-detection threshold in scaled residual units.
    pub threshold: f64,
    /// Minimum observation count per fitted segment.
    pub min_obs: usize,
    /// Optional floor applied to per-band RMSE during testing.
    pub min_rmse: Option<f64>,
    /// Indices of response bands used for change testing.
    pub test_indices: Vec<usize>,
    pub screening: Screening,
    /// Discard observations judged noise instead of only down-weighting.
    pub remove_noise: bool,
    /// Recompute RMSE per segment instead of using the global estimate.
    pub dynamic_rmse: bool,
    /// Ordered design-matrix column names; coefficient rows follow this order.
    pub columns: Vec<String>,
}

/// Output of one change-model fit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitOutcome {
    /// Ordered segment records (reverse-chronological when the input rows
    /// were reversed).
    pub record: Vec<SegmentRecord>,
    /// Parallel sequence produced under robust screening, when requested.
    pub robust_record: Option<Vec<SegmentRecord>>,
    /// Trend-column values of the observations the screen kept in the fit;
    /// used to flag multitemporally screened observations afterwards.
    pub kept_trend: Vec<f64>,
}

/// External change-detection model contract.
///
/// `x` rows and `y` columns are the clear observations in caller order:
/// reversed input yields reversed-direction segments. The fit is a
/// blocking call with no cancellation.
pub trait ChangeModel {
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        config: &ModelConfig,
    ) -> Result<FitOutcome, QueryError>;

    /// Post-hoc commission test at significance `alpha`; may merge, split,
    /// or adjust the given records.
    fn commission_test(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        config: &ModelConfig,
        records: &[SegmentRecord],
        alpha: f64,
    ) -> Result<Vec<SegmentRecord>, QueryError>;
}
