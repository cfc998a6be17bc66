// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::{Array2, ArrayView2};
use pixelseg_core::{
    ChangeModel, FitOutcome, ImageStack, ModelConfig, PixelSeries, QueryConfig, QueryError,
    SegmentRecord,
};
use std::path::PathBuf;

/// Ordinary least squares via the normal equations with partial pivoting.
/// Small column counts only; returns `None` for singular systems.
pub fn least_squares(x: ArrayView2<'_, f64>, y: &[f64]) -> Option<Vec<f64>> {
    let n = x.nrows();
    let k = x.ncols();
    if y.len() != n || n < k || k == 0 {
        return None;
    }

    let mut a = vec![vec![0.0; k]; k];
    let mut b = vec![0.0; k];
    for i in 0..n {
        for c in 0..k {
            b[c] += x[[i, c]] * y[i];
            for d in 0..k {
                a[c][d] += x[[i, c]] * x[[i, d]];
            }
        }
    }

    for col in 0..k {
        let pivot = (col..k).max_by(|&p, &q| {
            a[p][col]
                .abs()
                .partial_cmp(&a[q][col].abs())
                .expect("normal matrix entries should be finite")
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..k {
            let factor = a[row][col] / a[col][col];
            for d in col..k {
                a[row][d] -= factor * a[col][d];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut beta = vec![0.0; k];
    for col in (0..k).rev() {
        let mut acc = b[col];
        for d in col + 1..k {
            acc -= a[col][d] * beta[d];
        }
        beta[col] = acc / a[col][col];
    }
    Some(beta)
}

/// Fits a single segment by least squares over the full clear range; no
/// break detection, no robust sequence.
pub struct LeastSquaresModel;

impl ChangeModel for LeastSquaresModel {
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        config: &ModelConfig,
    ) -> Result<FitOutcome, QueryError> {
        let trend = config
            .columns
            .iter()
            .position(|c| c == "x")
            .ok_or_else(|| QueryError::fit("design carries no trend column"))?;

        let mut coef = Array2::zeros((config.columns.len(), y.nrows()));
        for b in 0..y.nrows() {
            let beta = least_squares(x, &y.row(b).to_vec())
                .ok_or_else(|| QueryError::fit("singular normal equations"))?;
            for (c, &value) in beta.iter().enumerate() {
                coef[[c, b]] = value;
            }
        }

        let record = SegmentRecord {
            start: x[[0, trend]] as i64,
            end: x[[x.nrows() - 1, trend]] as i64,
            break_day: 0,
            coef,
            rmse: vec![0.0; y.nrows()],
            px: 0,
            py: 0,
        };
        Ok(FitOutcome {
            record: vec![record],
            robust_record: None,
            kept_trend: x.column(trend).to_vec(),
        })
    }

    fn commission_test(
        &self,
        _x: ArrayView2<'_, f64>,
        _y: ArrayView2<'_, f64>,
        _config: &ModelConfig,
        records: &[SegmentRecord],
        _alpha: f64,
    ) -> Result<Vec<SegmentRecord>, QueryError> {
        Ok(records.to_vec())
    }
}

pub fn stack(dates: &[i64], n_band: usize) -> ImageStack {
    let names = (0..dates.len())
        .map(|i| format!("LT5012034_{i:04}"))
        .collect();
    let dirs = (0..dates.len())
        .map(|i| PathBuf::from(format!("/nonexistent/scene{i}")))
        .collect();
    ImageStack::new(names, dirs, dates.to_vec(), n_band).expect("stack should be valid")
}

/// A configuration with wide-open valid ranges and no metadata discovery,
/// so synthetic observations always pass the clear mask.
pub fn config(design: &str) -> QueryConfig {
    QueryConfig {
        design: design.to_string(),
        mask_values: vec![255.0],
        min_values: vec![-1.0e6],
        max_values: vec![1.0e6],
        test_indices: vec![0],
        metadata_file_pattern: None,
        ..QueryConfig::default()
    }
}

/// Builds a pixel series of exact linear trends, one `(intercept, slope)`
/// pair per spectral band, plus an all-clear mask row.
pub fn trend_series(dates: &[i64], lines: &[(f64, f64)], px: usize, py: usize) -> PixelSeries {
    let mut data = Array2::zeros((lines.len() + 1, dates.len()));
    for (b, &(intercept, slope)) in lines.iter().enumerate() {
        for (i, &d) in dates.iter().enumerate() {
            data[[b, i]] = intercept + slope * d as f64;
        }
    }
    PixelSeries::new(data, px, py).expect("series should be valid")
}
