// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::predict::ordinal_to_date;
use chrono::NaiveDate;
use ndarray::ArrayView2;
use pixelseg_core::SegmentRecord;

/// Extracts detected break dates and the raw observed value at each break
/// for one band.
///
/// The break date is located by linear search in the full, unfiltered
/// observation date sequence; records with the zero sentinel or a date
/// not present in the sequence are silently skipped. Linear search is
/// fine for single-pixel interactive use.
pub fn break_points(
    records: &[SegmentRecord],
    dates: &[i64],
    data: ArrayView2<'_, f64>,
    band: usize,
) -> (Vec<NaiveDate>, Vec<f64>) {
    let mut break_dates = Vec::new();
    let mut break_values = Vec::new();

    for record in records {
        if !record.has_break() {
            continue;
        }
        let Some(index) = dates.iter().position(|&d| d == record.break_day) else {
            continue;
        };
        if index >= data.ncols() || band >= data.nrows() {
            continue;
        }
        let Some(date) = ordinal_to_date(record.break_day) else {
            continue;
        };
        break_dates.push(date);
        break_values.push(data[[band, index]]);
    }

    (break_dates, break_values)
}
