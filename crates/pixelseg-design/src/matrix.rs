// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{Formula, Term};
use ndarray::Array2;
use pixelseg_core::QueryError;
use std::f64::consts::PI;

/// Period of the annual harmonic terms, in days.
pub const HARMONIC_PERIOD_DAYS: f64 = 365.25;

/// Prefix marking treatment-coded categorical dummy columns. Columns with
/// this prefix are excluded from continuous-curve prediction.
pub const CATEGORICAL_PREFIX: &str = "C(";

/// Named categorical covariate arrays resolvable from a formula.
#[derive(Clone, Copy, Debug, Default)]
pub struct CovariateSet<'a> {
    pub sensor: &'a [String],
    pub pathrow: &'a [String],
}

impl<'a> CovariateSet<'a> {
    /// An empty set, usable for formulas without categorical terms.
    pub fn empty() -> Self {
        Self::default()
    }

    fn resolve(&self, name: &str) -> Option<&'a [String]> {
        match name {
            "sensor" => Some(self.sensor),
            "pr" => Some(self.pathrow),
            _ => None,
        }
    }
}

/// A design matrix (observations x terms) with its ordered column names.
///
/// The name-to-index mapping travels with any coefficients fitted against
/// the matrix; coefficients are meaningless without it.
#[derive(Clone, Debug, PartialEq)]
pub struct DesignMatrix {
    pub matrix: Array2<f64>,
    pub columns: Vec<String>,
}

impl DesignMatrix {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

/// Indices of columns usable for continuous prediction: everything except
/// categorical dummy encodings.
pub fn non_categorical_columns(columns: &[String]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.starts_with(CATEGORICAL_PREFIX))
        .map(|(index, _)| index)
        .collect()
}

/// Evaluates `formula` at the given ordinal dates and covariates.
pub fn build_design_matrix(
    formula: &Formula,
    dates: &[i64],
    covariates: &CovariateSet<'_>,
) -> Result<DesignMatrix, QueryError> {
    let n = dates.len();
    let mut columns: Vec<String> = Vec::new();
    let mut data: Vec<Vec<f64>> = Vec::new();

    if formula.intercept() {
        columns.push("Intercept".to_string());
        data.push(vec![1.0; n]);
    }

    for term in formula.terms() {
        match term {
            Term::Trend => {
                columns.push("x".to_string());
                data.push(dates.iter().map(|&d| d as f64).collect());
            }
            Term::Harmonic { k } => {
                let w = 2.0 * PI * f64::from(*k) / HARMONIC_PERIOD_DAYS;
                columns.push(format!("harm(x, {k})[cos]"));
                data.push(dates.iter().map(|&d| (w * d as f64).cos()).collect());
                columns.push(format!("harm(x, {k})[sin]"));
                data.push(dates.iter().map(|&d| (w * d as f64).sin()).collect());
            }
            Term::Categorical { name } => {
                let values = covariates.resolve(name).ok_or_else(|| {
                    QueryError::configuration(format!("unresolved covariate name {name:?}"))
                })?;
                if values.len() != n {
                    return Err(QueryError::configuration(format!(
                        "covariate {name:?} has {} values, expected {n}",
                        values.len()
                    )));
                }
                let mut levels: Vec<&String> = values.iter().collect();
                levels.sort_unstable();
                levels.dedup();
                // Treatment coding: the first sorted level is the reference.
                for level in levels.iter().skip(1) {
                    columns.push(format!("C({name})[T.{level}]"));
                    data.push(
                        values
                            .iter()
                            .map(|v| if v == *level { 1.0 } else { 0.0 })
                            .collect(),
                    );
                }
            }
        }
    }

    let mut matrix = Array2::zeros((n, columns.len()));
    for (j, column) in data.iter().enumerate() {
        for (i, &value) in column.iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }

    Ok(DesignMatrix { matrix, columns })
}

#[cfg(test)]
mod tests {
    use super::{build_design_matrix, non_categorical_columns, CovariateSet, HARMONIC_PERIOD_DAYS};
    use crate::Formula;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn intercept_and_trend_columns() {
        let formula = Formula::parse("1 + x").expect("formula should parse");
        let design = build_design_matrix(&formula, &[100, 200, 300], &CovariateSet::empty())
            .expect("design should build");

        assert_eq!(design.columns, vec!["Intercept", "x"]);
        assert_eq!(design.matrix.shape(), &[3, 2]);
        assert_eq!(design.matrix.column(0).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(design.matrix.column(1).to_vec(), vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn harmonic_pair_matches_the_annual_period() {
        let formula = Formula::parse("0 + harm(x, 1)").expect("formula should parse");
        let dates = [0, 365, 36525];
        let design = build_design_matrix(&formula, &dates, &CovariateSet::empty())
            .expect("design should build");

        assert_eq!(design.columns, vec!["harm(x, 1)[cos]", "harm(x, 1)[sin]"]);
        let w = 2.0 * PI / HARMONIC_PERIOD_DAYS;
        for (i, &d) in dates.iter().enumerate() {
            assert_abs_diff_eq!(design.matrix[[i, 0]], (w * d as f64).cos(), epsilon = 1e-12);
            assert_abs_diff_eq!(design.matrix[[i, 1]], (w * d as f64).sin(), epsilon = 1e-12);
        }
        // 100 full periods land back on cos=1, sin=0.
        assert_abs_diff_eq!(design.matrix[[2, 0]], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(design.matrix[[2, 1]], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn categorical_dummies_use_treatment_coding() {
        let formula = Formula::parse("1 + C(sensor)").expect("formula should parse");
        let sensor = strings(&["LT5", "LE7", "LT5", "LC8"]);
        let covariates = CovariateSet {
            sensor: &sensor,
            pathrow: &[],
        };
        let design = build_design_matrix(&formula, &[100, 200, 300, 400], &covariates)
            .expect("design should build");

        // Sorted levels: LC8 (reference), LE7, LT5.
        assert_eq!(
            design.columns,
            vec!["Intercept", "C(sensor)[T.LE7]", "C(sensor)[T.LT5]"]
        );
        assert_eq!(design.matrix.column(1).to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(design.matrix.column(2).to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn single_level_categorical_adds_no_columns() {
        let formula = Formula::parse("1 + C(pr)").expect("formula should parse");
        let pathrow = strings(&["p012r034", "p012r034"]);
        let covariates = CovariateSet {
            sensor: &[],
            pathrow: &pathrow,
        };
        let design = build_design_matrix(&formula, &[100, 200], &covariates)
            .expect("design should build");
        assert_eq!(design.columns, vec!["Intercept"]);
    }

    #[test]
    fn unresolved_covariate_name_fails() {
        let formula = Formula::parse("1 + C(orbit)").expect("formula should parse");
        let err = build_design_matrix(&formula, &[100], &CovariateSet::empty())
            .expect_err("unresolved covariate must fail");
        assert!(err.to_string().contains("unresolved covariate"));
    }

    #[test]
    fn covariate_length_mismatch_fails() {
        let formula = Formula::parse("1 + C(sensor)").expect("formula should parse");
        let sensor = strings(&["LT5"]);
        let covariates = CovariateSet {
            sensor: &sensor,
            pathrow: &[],
        };
        let err = build_design_matrix(&formula, &[100, 200], &covariates)
            .expect_err("length mismatch must fail");
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn non_categorical_columns_exclude_dummy_encodings() {
        let columns = vec![
            "Intercept".to_string(),
            "x".to_string(),
            "C(sensor)[T.LE7]".to_string(),
            "harm(x, 1)[cos]".to_string(),
            "harm(x, 1)[sin]".to_string(),
            "C(pr)[T.p013r035]".to_string(),
        ];
        assert_eq!(non_categorical_columns(&columns), vec![0, 1, 3, 4]);
    }

    #[test]
    fn reduced_basis_columns_align_with_non_categorical_indices() {
        let formula = Formula::parse("1 + x + harm(x, 1) + C(sensor)").expect("should parse");
        let sensor = strings(&["LT5", "LE7", "LT5"]);
        let covariates = CovariateSet {
            sensor: &sensor,
            pathrow: &[],
        };
        let dates = [100, 200, 300];
        let full = build_design_matrix(&formula, &dates, &covariates).expect("full should build");
        let reduced =
            build_design_matrix(&formula.without_categorical(), &dates, &CovariateSet::empty())
                .expect("reduced should build");

        let kept = non_categorical_columns(&full.columns);
        assert_eq!(kept.len(), reduced.columns.len());
        for (reduced_j, &full_j) in kept.iter().enumerate() {
            assert_eq!(reduced.columns[reduced_j], full.columns[full_j]);
        }
    }
}
