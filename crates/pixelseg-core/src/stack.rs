// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::QueryError;
use ndarray::Array2;
use std::path::PathBuf;

/// Calendar-ordered image stack metadata supplied by the external
/// discovery collaborator.
///
/// The stack carries no raster data; per-pixel responses arrive
/// separately as [`PixelSeries`] values.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageStack {
    image_names: Vec<String>,
    image_dirs: Vec<PathBuf>,
    ord_dates: Vec<i64>,
    n_band: usize,
}

impl ImageStack {
    /// Constructs a validated stack.
    ///
    /// `ord_dates` are proleptic-Gregorian ordinal day counts (day 1 is
    /// 0001-01-01) in chronological order. The mask band defaults to the
    /// last response band; configuration may move it.
    pub fn new(
        image_names: Vec<String>,
        image_dirs: Vec<PathBuf>,
        ord_dates: Vec<i64>,
        n_band: usize,
    ) -> Result<Self, QueryError> {
        if image_names.is_empty() {
            return Err(QueryError::configuration("image stack must not be empty"));
        }
        if image_dirs.len() != image_names.len() {
            return Err(QueryError::configuration(format!(
                "image directory count mismatch: got {}, expected {}",
                image_dirs.len(),
                image_names.len()
            )));
        }
        if ord_dates.len() != image_names.len() {
            return Err(QueryError::configuration(format!(
                "date count mismatch: got {}, expected {}",
                ord_dates.len(),
                image_names.len()
            )));
        }
        if n_band < 2 {
            return Err(QueryError::configuration(format!(
                "stack needs at least one spectral band plus the mask band; got n_band={n_band}"
            )));
        }
        if ord_dates.windows(2).any(|w| w[0] > w[1]) {
            return Err(QueryError::configuration(
                "ordinal dates must be in chronological order",
            ));
        }

        Ok(Self {
            image_names,
            image_dirs,
            ord_dates,
            n_band,
        })
    }

    /// Number of images (observations) in the stack.
    pub fn len(&self) -> usize {
        self.image_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_names.is_empty()
    }

    pub fn image_names(&self) -> &[String] {
        &self.image_names
    }

    pub fn image_dirs(&self) -> &[PathBuf] {
        &self.image_dirs
    }

    pub fn ord_dates(&self) -> &[i64] {
        &self.ord_dates
    }

    pub fn n_band(&self) -> usize {
        self.n_band
    }

    /// Default index of the mask band row in a response matrix.
    pub fn mask_band(&self) -> usize {
        self.n_band - 1
    }
}

/// Raw response data for one pixel: a (bands x observations) matrix plus
/// the pixel's column/row address in the stack grid.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelSeries {
    data: Array2<f64>,
    px: usize,
    py: usize,
}

impl PixelSeries {
    pub fn new(data: Array2<f64>, px: usize, py: usize) -> Result<Self, QueryError> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(QueryError::configuration(format!(
                "pixel series must be non-empty; got shape ({}, {})",
                data.nrows(),
                data.ncols()
            )));
        }
        Ok(Self { data, px, py })
    }

    /// Response matrix, bands x observations. The last row is the mask band.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn px(&self) -> usize {
        self.px
    }

    pub fn py(&self) -> usize {
        self.py
    }

    pub fn n_band(&self) -> usize {
        self.data.nrows()
    }

    pub fn length(&self) -> usize {
        self.data.ncols()
    }
}
