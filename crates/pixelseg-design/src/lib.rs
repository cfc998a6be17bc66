// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Regression formula parsing and design-matrix evaluation for the
//! segmentation query engine: intercept/trend/harmonic/categorical terms
//! over ordinal dates, plus the categorical-stripped reduced basis used
//! for continuous-curve reconstruction.

pub mod formula;
pub mod matrix;

pub use formula::{Formula, Term};
pub use matrix::{
    build_design_matrix, non_categorical_columns, CovariateSet, DesignMatrix,
    CATEGORICAL_PREFIX, HARMONIC_PERIOD_DAYS,
};
