// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use ndarray::{s, Array2, Array3};
use ndarray_npy::{NpzReader, ReadNpyExt};
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Array key of the line-wide cache container.
const LINE_CACHE_KEY: &str = "Y";

/// Why a cache tier failed to produce data. Logged for observability;
/// callers only ever see a uniform miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MissReason {
    Absent,
    Unreadable,
    ShapeMismatch,
}

/// Two-tier read-only lookup of previously computed pixel data.
///
/// Tier one is a pixel-exact `.npy` file shaped (bands, length); tier two
/// is a line-wide `.npz` container shaped (bands, length, columns). Both
/// are written by an external collaborator; this side never writes.
#[derive(Clone, Debug)]
pub struct ResultCache {
    folder: PathBuf,
}

impl ResultCache {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn pixel_path(&self, px: usize, py: usize) -> PathBuf {
        self.folder.join(format!("pixel_r{py}_c{px}.npy"))
    }

    pub fn line_path(&self, py: usize, length: usize, n_band: usize) -> PathBuf {
        self.folder
            .join(format!("line_r{py}_n{length}_b{n_band}.npy.npz"))
    }

    /// Attempts the pixel tier, then the line tier. Every failure mode —
    /// absent file, unreadable content, stale shape — is logged and
    /// reported as a miss; read errors never propagate.
    pub fn retrieve(
        &self,
        px: usize,
        py: usize,
        n_band: usize,
        length: usize,
    ) -> Option<Array2<f64>> {
        match self.retrieve_pixel(px, py, n_band, length) {
            Ok(data) => {
                debug!(px, py, "read from single pixel cache");
                return Some(data);
            }
            Err(reason) => self.log_miss("pixel", px, py, reason),
        }

        match self.retrieve_line(px, py, n_band, length) {
            Ok(data) => {
                debug!(px, py, "read from entire line cache");
                Some(data)
            }
            Err(reason) => {
                self.log_miss("line", px, py, reason);
                None
            }
        }
    }

    fn retrieve_pixel(
        &self,
        px: usize,
        py: usize,
        n_band: usize,
        length: usize,
    ) -> Result<Array2<f64>, MissReason> {
        let path = self.pixel_path(px, py);
        if !path.is_file() {
            return Err(MissReason::Absent);
        }
        let file = File::open(&path).map_err(|_| MissReason::Unreadable)?;
        let data = Array2::<f64>::read_npy(file).map_err(|_| MissReason::Unreadable)?;
        if data.shape() != [n_band, length] {
            return Err(MissReason::ShapeMismatch);
        }
        Ok(data)
    }

    fn retrieve_line(
        &self,
        px: usize,
        py: usize,
        n_band: usize,
        length: usize,
    ) -> Result<Array2<f64>, MissReason> {
        let path = self.line_path(py, length, n_band);
        if !path.is_file() {
            return Err(MissReason::Absent);
        }
        let file = File::open(&path).map_err(|_| MissReason::Unreadable)?;
        let mut npz = NpzReader::new(file).map_err(|_| MissReason::Unreadable)?;
        // np.savez stores the key with an .npy suffix; accept both.
        let data: Array3<f64> = match npz.by_name(&format!("{LINE_CACHE_KEY}.npy")) {
            Ok(data) => data,
            Err(_) => npz
                .by_name(LINE_CACHE_KEY)
                .map_err(|_| MissReason::Unreadable)?,
        };

        if data.shape()[0] != n_band || data.shape()[1] != length {
            return Err(MissReason::ShapeMismatch);
        }
        if px >= data.shape()[2] {
            return Err(MissReason::ShapeMismatch);
        }
        Ok(data.slice(s![.., .., px]).to_owned())
    }

    fn log_miss(&self, tier: &str, px: usize, py: usize, reason: MissReason) {
        match reason {
            MissReason::Absent => debug!(tier, px, py, "cache file absent"),
            MissReason::Unreadable => {
                warn!(tier, px, py, folder = %self.folder.display(), "could not read cache file");
            }
            MissReason::ShapeMismatch => {
                warn!(tier, px, py, "cached data may be out of date");
            }
        }
    }
}
