// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::ArrayView2;
use pixelseg_core::QueryError;

/// Broadcasts a per-band range array to the non-mask band count.
///
/// A single value applies to every non-mask band; otherwise the array
/// must already have one entry per non-mask band.
pub fn broadcast_range(values: &[f64], n_band: usize) -> Result<Vec<f64>, QueryError> {
    if n_band < 2 {
        return Err(QueryError::configuration(format!(
            "range broadcast needs at least one non-mask band; got n_band={n_band}"
        )));
    }
    let expected = n_band - 1;
    match values.len() {
        1 => Ok(vec![values[0]; expected]),
        len if len == expected => Ok(values.to_vec()),
        len => Err(QueryError::configuration(format!(
            "min/max array length must be 1 or {expected}; got {len}"
        ))),
    }
}

/// Builds the clear-observation mask for a response matrix.
///
/// `clear[i]` holds when the mask-band value at `i` is not excluded and
/// every non-mask band at `i` lies within its `[min, max]` range. The
/// min/max entries follow band order with the mask row skipped.
pub fn clear_mask(
    y: ArrayView2<'_, f64>,
    mask_band: usize,
    mask_values: &[f64],
    min_values: &[f64],
    max_values: &[f64],
) -> Result<Vec<bool>, QueryError> {
    let n_band = y.nrows();
    if n_band < 2 {
        return Err(QueryError::configuration(format!(
            "response matrix needs at least one spectral band plus the mask band; got {n_band}"
        )));
    }
    if mask_band >= n_band {
        return Err(QueryError::configuration(format!(
            "mask band {mask_band} out of range for {n_band} bands"
        )));
    }
    let expected = n_band - 1;
    if min_values.len() != expected || max_values.len() != expected {
        return Err(QueryError::configuration(format!(
            "min/max array length must be {expected}; got min={}, max={}",
            min_values.len(),
            max_values.len()
        )));
    }

    let mask_row = y.row(mask_band);
    let bands: Vec<usize> = (0..n_band).filter(|&b| b != mask_band).collect();
    let mut clear = Vec::with_capacity(y.ncols());
    for i in 0..y.ncols() {
        let mask_ok = !mask_values.contains(&mask_row[i]);
        let in_range = bands.iter().enumerate().all(|(r, &b)| {
            let value = y[[b, i]];
            value >= min_values[r] && value <= max_values[r]
        });
        clear.push(mask_ok && in_range);
    }
    Ok(clear)
}
