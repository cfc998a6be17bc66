// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{ModelConfig, QueryError, Screening};
use std::path::PathBuf;

const DEFAULT_CONSECUTIVE: usize = 5;
const DEFAULT_MIN_OBS: usize = 16;
const DEFAULT_THRESHOLD: f64 = 3.0;
const DEFAULT_MIN_RMSE: f64 = 100.0;
const DEFAULT_SCREEN_CRIT: f64 = 400.0;
const DEFAULT_COMMIT_ALPHA: f64 = 0.01;
const DEFAULT_DESIGN: &str = "1 + x + harm(x, 1)";
const DEFAULT_RESULTS_PATTERN: &str = "yatsm_r*";
const DEFAULT_METADATA_PATTERN: &str = "L*MTL.txt";

/// Declared type of a configuration option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Float,
    Text,
    IntList,
    FloatList,
}

/// A value offered to [`QueryConfig::set_option`].
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<usize>),
    FloatList(Vec<f64>),
}

impl OptionValue {
    fn kind(&self) -> OptionKind {
        match self {
            Self::Bool(_) => OptionKind::Bool,
            Self::Int(_) => OptionKind::Int,
            Self::Float(_) => OptionKind::Float,
            Self::Text(_) => OptionKind::Text,
            Self::IntList(_) => OptionKind::IntList,
            Self::FloatList(_) => OptionKind::FloatList,
        }
    }
}

/// One entry of the typed option table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
}

const OPTION_SPECS: &[OptionSpec] = &[
    OptionSpec { name: "calculate_live", kind: OptionKind::Bool },
    OptionSpec { name: "consecutive", kind: OptionKind::Int },
    OptionSpec { name: "min_obs", kind: OptionKind::Int },
    OptionSpec { name: "threshold", kind: OptionKind::Float },
    OptionSpec { name: "enable_min_rmse", kind: OptionKind::Bool },
    OptionSpec { name: "min_rmse", kind: OptionKind::Float },
    OptionSpec { name: "design", kind: OptionKind::Text },
    OptionSpec { name: "reverse", kind: OptionKind::Bool },
    OptionSpec { name: "screen_lowess", kind: OptionKind::Bool },
    OptionSpec { name: "screen_crit", kind: OptionKind::Float },
    OptionSpec { name: "remove_noise", kind: OptionKind::Bool },
    OptionSpec { name: "dynamic_rmse", kind: OptionKind::Bool },
    OptionSpec { name: "test_indices", kind: OptionKind::IntList },
    OptionSpec { name: "robust_results", kind: OptionKind::Bool },
    OptionSpec { name: "commit_test", kind: OptionKind::Bool },
    OptionSpec { name: "commit_alpha", kind: OptionKind::Float },
    OptionSpec { name: "mask_band", kind: OptionKind::Int },
    OptionSpec { name: "mask_values", kind: OptionKind::FloatList },
    OptionSpec { name: "min_values", kind: OptionKind::FloatList },
    OptionSpec { name: "max_values", kind: OptionKind::FloatList },
    OptionSpec { name: "metadata_file_pattern", kind: OptionKind::Text },
    OptionSpec { name: "cache_folder", kind: OptionKind::Text },
    OptionSpec { name: "results_folder", kind: OptionKind::Text },
    OptionSpec { name: "results_pattern", kind: OptionKind::Text },
];

/// Full configuration surface of a pixel segmentation query.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct QueryConfig {
    /// Live recomputation vs. previously saved results.
    pub calculate_live: bool,
    pub consecutive: usize,
    pub min_obs: usize,
    pub threshold: f64,
    pub enable_min_rmse: bool,
    pub min_rmse: f64,
    /// Regression formula over the free date variable `x`.
    pub design: String,
    /// Fit against time running backwards.
    pub reverse: bool,
    /// LOWESS screening instead of robust regression.
    pub screen_lowess: bool,
    pub screen_crit: f64,
    pub remove_noise: bool,
    pub dynamic_rmse: bool,
    /// Response band indices used for change testing.
    pub test_indices: Vec<usize>,
    /// Select the robust record sequence instead of the default one.
    pub robust_results: bool,
    pub commit_test: bool,
    pub commit_alpha: f64,
    /// Index of the mask row in the response matrix; `None` means the
    /// last band.
    pub mask_band: Option<usize>,
    /// Mask-band values excluded as unclear observations.
    pub mask_values: Vec<f64>,
    /// Valid-range minimum per non-mask band; length 1 broadcasts.
    pub min_values: Vec<f64>,
    /// Valid-range maximum per non-mask band; length 1 broadcasts.
    pub max_values: Vec<f64>,
    pub metadata_file_pattern: Option<String>,
    pub cache_folder: Option<PathBuf>,
    pub results_folder: Option<PathBuf>,
    /// Saved-result filename pattern; `*` is replaced by the pixel row.
    pub results_pattern: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            calculate_live: true,
            consecutive: DEFAULT_CONSECUTIVE,
            min_obs: DEFAULT_MIN_OBS,
            threshold: DEFAULT_THRESHOLD,
            enable_min_rmse: true,
            min_rmse: DEFAULT_MIN_RMSE,
            design: DEFAULT_DESIGN.to_string(),
            reverse: false,
            screen_lowess: false,
            screen_crit: DEFAULT_SCREEN_CRIT,
            remove_noise: true,
            dynamic_rmse: false,
            test_indices: vec![2, 3, 4, 5],
            robust_results: false,
            commit_test: false,
            commit_alpha: DEFAULT_COMMIT_ALPHA,
            mask_band: None,
            mask_values: vec![2.0, 3.0, 4.0, 255.0],
            min_values: vec![0.0],
            max_values: vec![10_000.0],
            metadata_file_pattern: Some(DEFAULT_METADATA_PATTERN.to_string()),
            cache_folder: None,
            results_folder: None,
            results_pattern: DEFAULT_RESULTS_PATTERN.to_string(),
        }
    }
}

impl QueryConfig {
    /// The enumerated option table: every settable option with its
    /// declared type.
    pub fn option_specs() -> &'static [OptionSpec] {
        OPTION_SPECS
    }

    /// Sets one named option, validating the name and declared type at
    /// the boundary. Unknown names and type mismatches fail instead of
    /// being dropped.
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> Result<(), QueryError> {
        let spec = OPTION_SPECS
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| QueryError::configuration(format!("unknown option: {name}")))?;
        if value.kind() != spec.kind {
            return Err(QueryError::configuration(format!(
                "option {name} expects {:?}, got {:?}",
                spec.kind,
                value.kind()
            )));
        }

        match (name, value) {
            ("calculate_live", OptionValue::Bool(v)) => self.calculate_live = v,
            ("consecutive", OptionValue::Int(v)) => self.consecutive = to_count(name, v)?,
            ("min_obs", OptionValue::Int(v)) => self.min_obs = to_count(name, v)?,
            ("threshold", OptionValue::Float(v)) => self.threshold = v,
            ("enable_min_rmse", OptionValue::Bool(v)) => self.enable_min_rmse = v,
            ("min_rmse", OptionValue::Float(v)) => self.min_rmse = v,
            ("design", OptionValue::Text(v)) => self.design = v,
            ("reverse", OptionValue::Bool(v)) => self.reverse = v,
            ("screen_lowess", OptionValue::Bool(v)) => self.screen_lowess = v,
            ("screen_crit", OptionValue::Float(v)) => self.screen_crit = v,
            ("remove_noise", OptionValue::Bool(v)) => self.remove_noise = v,
            ("dynamic_rmse", OptionValue::Bool(v)) => self.dynamic_rmse = v,
            ("test_indices", OptionValue::IntList(v)) => self.test_indices = v,
            ("robust_results", OptionValue::Bool(v)) => self.robust_results = v,
            ("commit_test", OptionValue::Bool(v)) => self.commit_test = v,
            ("commit_alpha", OptionValue::Float(v)) => self.commit_alpha = v,
            ("mask_band", OptionValue::Int(v)) => self.mask_band = Some(to_count(name, v)?),
            ("mask_values", OptionValue::FloatList(v)) => self.mask_values = v,
            ("min_values", OptionValue::FloatList(v)) => self.min_values = v,
            ("max_values", OptionValue::FloatList(v)) => self.max_values = v,
            ("metadata_file_pattern", OptionValue::Text(v)) => {
                self.metadata_file_pattern = if v.is_empty() { None } else { Some(v) };
            }
            ("cache_folder", OptionValue::Text(v)) => {
                self.cache_folder = if v.is_empty() { None } else { Some(v.into()) };
            }
            ("results_folder", OptionValue::Text(v)) => {
                self.results_folder = if v.is_empty() { None } else { Some(v.into()) };
            }
            ("results_pattern", OptionValue::Text(v)) => self.results_pattern = v,
            _ => unreachable!("option table and setter arms must stay in sync"),
        }

        self.validate()
    }

    /// Validates the full configuration.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.consecutive == 0 {
            return Err(QueryError::configuration("consecutive must be >= 1"));
        }
        if self.min_obs == 0 {
            return Err(QueryError::configuration("min_obs must be >= 1"));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(QueryError::configuration(format!(
                "threshold must be finite and > 0; got {}",
                self.threshold
            )));
        }
        if !self.min_rmse.is_finite() || self.min_rmse < 0.0 {
            return Err(QueryError::configuration(format!(
                "min_rmse must be finite and >= 0; got {}",
                self.min_rmse
            )));
        }
        if !self.screen_crit.is_finite() || self.screen_crit <= 0.0 {
            return Err(QueryError::configuration(format!(
                "screen_crit must be finite and > 0; got {}",
                self.screen_crit
            )));
        }
        if !(self.commit_alpha > 0.0 && self.commit_alpha < 1.0) {
            return Err(QueryError::configuration(format!(
                "commit_alpha must lie in (0, 1); got {}",
                self.commit_alpha
            )));
        }
        if self.design.trim().is_empty() {
            return Err(QueryError::configuration("design formula must not be empty"));
        }
        if !self.results_pattern.contains('*') {
            return Err(QueryError::configuration(format!(
                "results_pattern must contain a `*` row placeholder; got {:?}",
                self.results_pattern
            )));
        }
        if self.min_values.is_empty() || self.max_values.is_empty() {
            return Err(QueryError::configuration(
                "min_values and max_values must not be empty",
            ));
        }
        Ok(())
    }

    /// Screening mode derived from `screen_lowess` and `screen_crit`.
    pub fn screening(&self) -> Screening {
        if self.screen_lowess {
            Screening::Lowess {
                crit: self.screen_crit,
            }
        } else {
            Screening::RobustRegression {
                crit: self.screen_crit,
            }
        }
    }

    /// Builds the model configuration bundle for a fit over the given
    /// design-matrix columns.
    pub fn model_config(&self, columns: Vec<String>) -> ModelConfig {
        ModelConfig {
            consecutive: self.consecutive,
            threshold: self.threshold,
            min_obs: self.min_obs,
            min_rmse: self.enable_min_rmse.then_some(self.min_rmse),
            test_indices: self.test_indices.clone(),
            screening: self.screening(),
            remove_noise: self.remove_noise,
            dynamic_rmse: self.dynamic_rmse,
            columns,
        }
    }
}

fn to_count(name: &str, value: i64) -> Result<usize, QueryError> {
    usize::try_from(value)
        .map_err(|_| QueryError::configuration(format!("option {name} must be >= 0; got {value}")))
}

#[cfg(test)]
mod tests {
    use super::{OptionKind, OptionValue, QueryConfig};
    use crate::Screening;

    #[test]
    fn defaults_validate() {
        QueryConfig::default()
            .validate()
            .expect("defaults should be valid");
    }

    #[test]
    fn option_table_covers_every_option_once() {
        let specs = QueryConfig::option_specs();
        let mut names: Vec<_> = specs.iter().map(|spec| spec.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), specs.len());
        assert!(specs.iter().any(|spec| spec.name == "min_rmse"));
    }

    #[test]
    fn set_option_updates_matching_types() {
        let mut config = QueryConfig::default();
        config
            .set_option("consecutive", OptionValue::Int(8))
            .expect("int option should set");
        config
            .set_option("reverse", OptionValue::Bool(true))
            .expect("bool option should set");
        config
            .set_option("design", OptionValue::Text("1 + x".to_string()))
            .expect("text option should set");
        config
            .set_option("test_indices", OptionValue::IntList(vec![0, 1]))
            .expect("int list option should set");
        config
            .set_option("mask_band", OptionValue::Int(0))
            .expect("mask band option should set");
        assert_eq!(config.consecutive, 8);
        assert!(config.reverse);
        assert_eq!(config.design, "1 + x");
        assert_eq!(config.test_indices, vec![0, 1]);
        assert_eq!(config.mask_band, Some(0));
    }

    #[test]
    fn set_option_rejects_unknown_names() {
        let mut config = QueryConfig::default();
        let err = config
            .set_option("frequency", OptionValue::Int(1))
            .expect_err("unknown option must fail");
        assert!(err.to_string().contains("unknown option"));
    }

    #[test]
    fn set_option_rejects_type_mismatches() {
        let mut config = QueryConfig::default();
        let err = config
            .set_option("threshold", OptionValue::Bool(true))
            .expect_err("type mismatch must fail");
        assert!(err.to_string().contains("expects Float"));
        assert_eq!(config.threshold, 3.0);
    }

    #[test]
    fn min_rmse_accepts_a_float_into_the_optional_slot() {
        let mut config = QueryConfig::default();
        config
            .set_option("min_rmse", OptionValue::Float(50.0))
            .expect("min_rmse float should set");
        assert_eq!(config.min_rmse, 50.0);

        config.enable_min_rmse = false;
        let model_config = config.model_config(vec!["Intercept".to_string()]);
        assert_eq!(model_config.min_rmse, None);

        config.enable_min_rmse = true;
        let model_config = config.model_config(vec!["Intercept".to_string()]);
        assert_eq!(model_config.min_rmse, Some(50.0));
    }

    #[test]
    fn set_option_rejects_values_that_fail_validation() {
        let mut config = QueryConfig::default();
        let err = config
            .set_option("commit_alpha", OptionValue::Float(1.5))
            .expect_err("alpha outside (0,1) must fail");
        assert!(err.to_string().contains("commit_alpha"));

        let err = config
            .set_option("consecutive", OptionValue::Int(-1))
            .expect_err("negative count must fail");
        assert!(err.to_string().contains("must be >= 0"));
    }

    #[test]
    fn screening_mode_tracks_the_lowess_flag() {
        let mut config = QueryConfig::default();
        assert_eq!(
            config.screening(),
            Screening::RobustRegression { crit: 400.0 }
        );
        config.screen_lowess = true;
        assert_eq!(config.screening(), Screening::Lowess { crit: 400.0 });
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_round_trips_through_json() {
        let config = QueryConfig::default();
        let json = serde_json::to_string(&config).expect("config should serialize");
        let back: QueryConfig = serde_json::from_str(&json).expect("config should deserialize");
        assert_eq!(back, config);
    }

    #[test]
    fn option_kinds_match_field_types() {
        for spec in QueryConfig::option_specs() {
            let mut config = QueryConfig::default();
            let value = match spec.kind {
                OptionKind::Bool => OptionValue::Bool(true),
                OptionKind::Int => OptionValue::Int(4),
                OptionKind::Float => OptionValue::Float(0.5),
                OptionKind::Text => OptionValue::Text("1 + x*".to_string()),
                OptionKind::IntList => OptionValue::IntList(vec![0]),
                OptionKind::FloatList => OptionValue::FloatList(vec![1.0]),
            };
            config
                .set_option(spec.name, value)
                .unwrap_or_else(|err| panic!("option {} should accept its kind: {err}", spec.name));
        }
    }
}
