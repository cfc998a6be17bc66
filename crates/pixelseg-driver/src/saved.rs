// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{s, Array, Dimension, Ix1, Ix2, Ix3};
use ndarray_npy::{NpzReader, ReadableElement};
use pixelseg_core::SegmentRecord;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Previously saved segmentation output for one stack row, filtered to a
/// single pixel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SavedResults {
    pub records: Vec<SegmentRecord>,
    /// Formula the saved run was fitted with, when recorded.
    pub design: Option<String>,
    /// Ordered column names of the saved coefficients, when recorded.
    pub columns: Option<Vec<String>>,
}

/// Path of the saved-result container for one stack row: the `*` of the
/// pattern is replaced by the row number.
pub fn saved_result_path(folder: &Path, pattern: &str, py: usize) -> PathBuf {
    folder.join(format!("{}.npz", pattern.replace('*', &py.to_string())))
}

/// Loads saved records for `(px, py)` from an external model run.
///
/// The container holds parallel arrays `px`, `py`, `start`, `end`,
/// `break` (i64), `rmse` (records x bands) and `coef`
/// (records x columns x bands), plus optional UTF-8 `design` and JSON
/// `columns` entries. Any missing file, missing key, or inconsistent
/// record count is logged and yields empty results, never an error.
pub fn load_saved_results(folder: &Path, pattern: &str, px: usize, py: usize) -> SavedResults {
    let path = saved_result_path(folder, pattern, py);
    info!(path = %path.display(), "attempting to open saved results");

    if !path.is_file() {
        info!(py, "no saved result for this row");
        return SavedResults::default();
    }
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not open saved result");
            return SavedResults::default();
        }
    };
    let mut npz = match NpzReader::new(file) {
        Ok(npz) => npz,
        Err(err) => {
            warn!(path = %path.display(), %err, "saved result is not a readable npz");
            return SavedResults::default();
        }
    };

    let (Some(rec_px), Some(rec_py), Some(start), Some(end), Some(break_day)) = (
        read_array::<i64, Ix1>(&mut npz, "px"),
        read_array::<i64, Ix1>(&mut npz, "py"),
        read_array::<i64, Ix1>(&mut npz, "start"),
        read_array::<i64, Ix1>(&mut npz, "end"),
        read_array::<i64, Ix1>(&mut npz, "break"),
    ) else {
        warn!(path = %path.display(), "saved result is missing record arrays");
        return SavedResults::default();
    };
    let (Some(rmse), Some(coef)) = (
        read_array::<f64, Ix2>(&mut npz, "rmse"),
        read_array::<f64, Ix3>(&mut npz, "coef"),
    ) else {
        warn!(path = %path.display(), "saved result is missing rmse/coef arrays");
        return SavedResults::default();
    };

    let n = rec_px.len();
    if [rec_py.len(), start.len(), end.len(), break_day.len()]
        .iter()
        .any(|&len| len != n)
        || rmse.nrows() != n
        || coef.shape()[0] != n
    {
        warn!(path = %path.display(), "saved result arrays disagree on record count");
        return SavedResults::default();
    }

    let mut records = Vec::new();
    for i in 0..n {
        if rec_px[i] != px as i64 || rec_py[i] != py as i64 {
            continue;
        }
        records.push(SegmentRecord {
            start: start[i],
            end: end[i],
            break_day: break_day[i],
            coef: coef.slice(s![i, .., ..]).to_owned(),
            rmse: rmse.row(i).to_vec(),
            px,
            py,
        });
    }
    if records.is_empty() {
        info!(px, py, "no saved result for this pixel");
    }

    let design = read_array::<u8, Ix1>(&mut npz, "design")
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok());
    let columns = read_array::<u8, Ix1>(&mut npz, "columns")
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok());

    SavedResults {
        records,
        design,
        columns,
    }
}

/// np.savez stores keys with an `.npy` suffix; accept both spellings.
fn read_array<T, D>(npz: &mut NpzReader<File>, name: &str) -> Option<Array<T, D>>
where
    T: ReadableElement,
    D: Dimension,
{
    match npz.by_name(&format!("{name}.npy")) {
        Ok(array) => Some(array),
        Err(_) => npz.by_name(name).ok(),
    }
}
