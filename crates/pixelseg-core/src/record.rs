// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::QueryError;
use ndarray::Array2;

/// Sentinel break value meaning "no structural change detected".
pub const NO_BREAK: i64 = 0;

/// One fitted piecewise-regression interval.
///
/// `coef` is columns x bands, where columns follow the design-matrix
/// column order the record was fitted with; coefficients are meaningless
/// without that column-name mapping. Under normal processing `start`
/// precedes `end`; in reverse mode `start` is the chronologically later
/// date.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentRecord {
    pub start: i64,
    pub end: i64,
    pub break_day: i64,
    pub coef: Array2<f64>,
    pub rmse: Vec<f64>,
    pub px: usize,
    pub py: usize,
}

impl SegmentRecord {
    pub fn has_break(&self) -> bool {
        self.break_day != NO_BREAK
    }

    /// Chronological (earlier, later) bounds regardless of fit direction.
    pub fn span(&self) -> (i64, i64) {
        if self.end < self.start {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        }
    }

    pub fn n_bands(&self) -> usize {
        self.coef.ncols()
    }
}

/// Checks that a record sequence is consistently directed, non-overlapping,
/// and contained in the observation span.
pub fn validate_records(records: &[SegmentRecord], span: (i64, i64)) -> Result<(), QueryError> {
    let (first, last) = span;
    for record in records {
        let (lo, hi) = record.span();
        if lo < first || hi > last {
            return Err(QueryError::configuration(format!(
                "segment [{lo}, {hi}] exceeds observation span [{first}, {last}]"
            )));
        }
    }
    for pair in records.windows(2) {
        let (_, prev_hi) = pair[0].span();
        let (next_lo, _) = pair[1].span();
        let reversed = pair[0].end < pair[0].start;
        let overlaps = if reversed {
            pair[1].span().1 > pair[0].span().0
        } else {
            next_lo < prev_hi
        };
        if overlaps {
            return Err(QueryError::configuration(format!(
                "segments overlap: [{}, {}] then [{}, {}]",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_records, SegmentRecord, NO_BREAK};
    use ndarray::Array2;

    fn record(start: i64, end: i64, break_day: i64) -> SegmentRecord {
        SegmentRecord {
            start,
            end,
            break_day,
            coef: Array2::zeros((2, 3)),
            rmse: vec![0.0; 3],
            px: 0,
            py: 0,
        }
    }

    #[test]
    fn zero_break_is_the_no_break_sentinel() {
        assert!(!record(100, 400, NO_BREAK).has_break());
        assert!(record(100, 400, 300).has_break());
    }

    #[test]
    fn span_normalizes_reverse_direction() {
        assert_eq!(record(100, 400, 0).span(), (100, 400));
        assert_eq!(record(400, 100, 0).span(), (100, 400));
    }

    #[test]
    fn validate_accepts_ordered_disjoint_segments() {
        let records = vec![record(100, 200, 200), record(200, 400, 0)];
        validate_records(&records, (100, 400)).expect("ordered segments should pass");
    }

    #[test]
    fn validate_rejects_segments_outside_the_span() {
        let records = vec![record(50, 200, 0)];
        let err = validate_records(&records, (100, 400)).expect_err("out of span must fail");
        assert!(err.to_string().contains("exceeds observation span"));
    }

    #[test]
    fn validate_rejects_overlap_in_both_directions() {
        let forward = vec![record(100, 250, 0), record(200, 400, 0)];
        assert!(validate_records(&forward, (100, 400)).is_err());

        let reversed = vec![record(400, 250, 0), record(300, 100, 0)];
        assert!(validate_records(&reversed, (100, 400)).is_err());
    }

    #[test]
    fn validate_accepts_reverse_mode_sequences() {
        let reversed = vec![record(400, 250, 0), record(250, 100, 0)];
        validate_records(&reversed, (100, 400)).expect("reverse sequence should pass");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn records_round_trip_through_json() {
        let record = record(100, 400, 300);
        let json = serde_json::to_string(&record).expect("record should serialize");
        let back: SegmentRecord = serde_json::from_str(&json).expect("record should deserialize");
        assert_eq!(back, record);
    }
}
