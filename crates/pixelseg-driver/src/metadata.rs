// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use glob::Pattern;
use pixelseg_core::{ImageStack, QueryError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const CLOUD_COVER_KEY: &str = "CLOUD_COVER";
const SENSOR_WIDTH: usize = 3;
const PATH_RANGE: std::ops::Range<usize> = 3..6;
const ROW_RANGE: std::ops::Range<usize> = 6..9;

/// Per-observation covariates derived from image identifiers and optional
/// metadata files.
#[derive(Clone, Debug, PartialEq)]
pub struct Covariates {
    /// ACCA cloud fraction per image; 0 when no metadata was found.
    pub cloud_cover: Vec<f64>,
    /// Fixed-width sensor code prefix of the identifier.
    pub sensor: Vec<String>,
    /// Path/row code derived from the identifier.
    pub pathrow: Vec<String>,
    /// Multitemporal-noise-screen flag per observation (1 = screened).
    pub multitemp_screened: Vec<u8>,
}

/// Finds per-image metadata files by glob pattern, one directory per image.
///
/// The discovered count must equal the image count or be zero; any other
/// count is a configuration error. This runs as an explicit step after
/// external stack discovery.
pub fn discover_metadata(stack: &ImageStack, pattern: &str) -> Result<Vec<PathBuf>, QueryError> {
    let pattern = Pattern::new(pattern).map_err(|err| {
        QueryError::configuration(format!("invalid metadata file pattern {pattern:?}: {err}"))
    })?;

    let mut found = Vec::new();
    for dir in stack.image_dirs() {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), %err, "could not list image directory");
                continue;
            }
        };
        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| pattern.matches(name))
            })
            .collect();
        matches.sort_unstable();
        found.extend(matches);
    }

    if found.is_empty() {
        warn!(pattern = %pattern, "no image metadata found");
        return Ok(found);
    }
    if found.len() != stack.len() {
        return Err(QueryError::configuration(format!(
            "inconsistent metadata file count: {} images vs {} metadata files",
            stack.len(),
            found.len()
        )));
    }
    Ok(found)
}

/// Derives covariates from image identifiers and discovered metadata files.
pub fn enrich(stack: &ImageStack, metadata: &[PathBuf]) -> Covariates {
    let n = stack.len();

    let mut cloud_cover = vec![0.0; n];
    if !metadata.is_empty() {
        for (i, path) in metadata.iter().enumerate().take(n) {
            match parse_cloud_cover(path) {
                Some(fraction) => cloud_cover[i] = fraction,
                None => {
                    warn!(path = %path.display(), "metadata file has no parsable CLOUD_COVER");
                }
            }
        }
    }

    // Byte ranges with an empty fallback, so identifiers that do not
    // follow the fixed-width layout degrade uniformly.
    let sensor = stack
        .image_names()
        .iter()
        .map(|name| name.get(..SENSOR_WIDTH).unwrap_or_default().to_string())
        .collect();
    let pathrow = stack
        .image_names()
        .iter()
        .map(|name| {
            match (name.get(PATH_RANGE), name.get(ROW_RANGE)) {
                (Some(path), Some(row)) => format!("p{path}r{row}"),
                _ => String::new(),
            }
        })
        .collect();

    // Start everything as screened, then force index 0 to the opposite
    // flag so both values stay representable downstream. Display
    // convention, not a screening outcome; real flags are rewritten after
    // each fit.
    let mut multitemp_screened = vec![1_u8; n];
    if n > 0 {
        multitemp_screened[0] = 0;
    }

    Covariates {
        cloud_cover,
        sensor,
        pathrow,
        multitemp_screened,
    }
}

/// Reads a `CLOUD_COVER = <value>` line from a metadata file.
fn parse_cloud_cover(path: &Path) -> Option<f64> {
    let contents = fs::read_to_string(path).ok()?;
    contents.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != CLOUD_COVER_KEY {
            return None;
        }
        value.trim().parse().ok()
    })
}
