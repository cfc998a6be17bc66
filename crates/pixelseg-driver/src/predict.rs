// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use ndarray::Array1;
use pixelseg_core::{QueryError, SegmentRecord};
use pixelseg_design::{build_design_matrix, non_categorical_columns, CovariateSet, Formula};
use tracing::warn;

/// Converts a proleptic-Gregorian ordinal day count to a calendar date.
pub(crate) fn ordinal_to_date(ordinal: i64) -> Option<NaiveDate> {
    i32::try_from(ordinal)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Reconstructs continuous prediction curves for one band from fitted
/// segment records.
///
/// Records are processed in sequence order until one no longer models the
/// requested band. With `user_dates`, each record predicts only at the
/// supplied dates inside its span (inclusive); otherwise an integer date
/// sequence from `start` towards `end` (exclusive) is generated, stepping
/// backwards when the record was fitted in reverse. Coefficients are
/// selected at the non-categorical column indices and dotted against the
/// categorical-stripped reduced basis.
pub fn prediction_curves(
    records: &[SegmentRecord],
    formula: &Formula,
    columns: &[String],
    band: usize,
    user_dates: Option<&[i64]>,
) -> Result<Vec<(Vec<NaiveDate>, Vec<f64>)>, QueryError> {
    let reduced = formula.without_categorical();
    let coef_columns = non_categorical_columns(columns);

    let mut curves = Vec::new();
    for record in records {
        if band >= record.coef.ncols() {
            // Later records are assumed not to model this band either.
            break;
        }

        let xs: Vec<i64> = match user_dates {
            Some(user) => {
                let (lo, hi) = record.span();
                let inside: Vec<i64> = user
                    .iter()
                    .copied()
                    .filter(|&d| d >= lo && d <= hi)
                    .collect();
                if inside.is_empty() {
                    continue;
                }
                inside
            }
            None => {
                if record.end < record.start {
                    (record.end + 1..=record.start).rev().collect()
                } else {
                    (record.start..record.end).collect()
                }
            }
        };

        if coef_columns.iter().any(|&c| c >= record.coef.nrows()) {
            warn!(
                coef_rows = record.coef.nrows(),
                "segment coefficients do not cover the design columns; skipping record"
            );
            continue;
        }

        let basis = build_design_matrix(&reduced, &xs, &CovariateSet::empty())?;
        if basis.columns.len() != coef_columns.len() {
            warn!(
                basis = basis.columns.len(),
                selected = coef_columns.len(),
                "reduced basis does not align with the stored column mapping; skipping record"
            );
            continue;
        }

        let coef: Array1<f64> = coef_columns
            .iter()
            .map(|&c| record.coef[[c, band]])
            .collect();
        let values = basis.matrix.dot(&coef);

        let mut dates = Vec::with_capacity(xs.len());
        for &x in &xs {
            match ordinal_to_date(x) {
                Some(date) => dates.push(date),
                None => {
                    warn!(ordinal = x, "segment date outside the calendar range");
                    dates.clear();
                    break;
                }
            }
        }
        if dates.len() != xs.len() && !xs.is_empty() {
            continue;
        }

        curves.push((dates, values.to_vec()));
    }

    Ok(curves)
}
