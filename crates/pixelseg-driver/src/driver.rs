// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

use crate::breaks::break_points;
use crate::cache::ResultCache;
use crate::filter::{broadcast_range, clear_mask};
use crate::metadata::{discover_metadata, enrich, Covariates};
use crate::predict::prediction_curves;
use crate::saved::load_saved_results;
use chrono::NaiveDate;
use ndarray::{s, Array2, Axis};
use pixelseg_core::{
    validate_records, ChangeModel, FitOutcome, ImageStack, OptionSpec, OptionValue, PixelSeries,
    QueryConfig, QueryError, SegmentRecord,
};
use pixelseg_design::{build_design_matrix, CovariateSet, DesignMatrix, Formula};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the most recent query left behind. Later queries overwrite
/// it wholesale; callers serialize access per driver instance.
struct QueryState {
    series: PixelSeries,
    records: Vec<SegmentRecord>,
    formula: Formula,
    columns: Vec<String>,
}

/// Per-pixel segmentation query driver.
///
/// Owns the injected change model, the stack-wide design matrix and
/// covariates, and the last query's records. All derived state (broadcast
/// ranges, formula, design matrix, cache handle) is rebuilt whenever an
/// option changes, so a failed option set leaves the driver untouched.
pub struct PixelQueryDriver {
    model: Arc<dyn ChangeModel>,
    stack: ImageStack,
    config: QueryConfig,
    covariates: Covariates,
    formula: Formula,
    design: DesignMatrix,
    min_values: Vec<f64>,
    max_values: Vec<f64>,
    cache: Option<ResultCache>,
    last: Option<QueryState>,
}

impl std::fmt::Debug for PixelQueryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelQueryDriver").finish_non_exhaustive()
    }
}

impl PixelQueryDriver {
    /// Builds a driver over an externally discovered stack.
    ///
    /// A missing change model is fatal here, never at query time. Metadata
    /// discovery and enrichment run as an explicit step; the configured
    /// formula is validated by building the stack-wide design matrix.
    pub fn new(
        model: Option<Arc<dyn ChangeModel>>,
        stack: ImageStack,
        config: QueryConfig,
    ) -> Result<Self, QueryError> {
        let model = model.ok_or_else(|| {
            QueryError::model_unavailable("no change-detection model was injected")
        })?;
        config.validate()?;

        let (covariates, formula, design, min_values, max_values, cache) =
            derive_state(&stack, &config)?;

        Ok(Self {
            model,
            stack,
            config,
            covariates,
            formula,
            design,
            min_values,
            max_values,
            cache,
            last: None,
        })
    }

    /// The enumerated option table.
    pub fn option_specs() -> &'static [OptionSpec] {
        QueryConfig::option_specs()
    }

    /// Sets one named option and rebuilds the derived state.
    ///
    /// The change commits only if both the typed option table and the
    /// rebuild accept it; otherwise the driver keeps its previous
    /// configuration.
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> Result<(), QueryError> {
        let mut next = self.config.clone();
        next.set_option(name, value)?;
        let (covariates, formula, design, min_values, max_values, cache) =
            derive_state(&self.stack, &next)?;

        self.config = next;
        self.covariates = covariates;
        self.formula = formula;
        self.design = design;
        self.min_values = min_values;
        self.max_values = max_values;
        self.cache = cache;
        Ok(())
    }

    /// Runs one query for the given pixel, replacing any previous result.
    ///
    /// Live mode filters, optionally reverses, and fits; saved mode loads
    /// previously computed records (empty on absence). The returned slice
    /// is the record sequence the driver will interpret from now on.
    pub fn retrieve_result(
        &mut self,
        series: PixelSeries,
    ) -> Result<&[SegmentRecord], QueryError> {
        if series.n_band() != self.stack.n_band() || series.length() != self.stack.len() {
            return Err(QueryError::configuration(format!(
                "pixel series shape ({}, {}) does not match the stack ({}, {})",
                series.n_band(),
                series.length(),
                self.stack.n_band(),
                self.stack.len()
            )));
        }

        let state = if self.config.calculate_live {
            debug!(px = series.px(), py = series.py(), "recomputing live");
            self.fit_live(series)?
        } else {
            debug!(px = series.px(), py = series.py(), "reading saved results");
            self.load_saved(series)
        };
        Ok(&self.last.insert(state).records)
    }

    /// Looks the pixel's raw data up in the two-tier result cache. `None`
    /// sends the caller back to its own data source.
    pub fn retrieve_from_cache(&self, px: usize, py: usize) -> Option<Array2<f64>> {
        self.cache
            .as_ref()?
            .retrieve(px, py, self.stack.n_band(), self.stack.len())
    }

    /// Continuous prediction curves for one band over the held records.
    /// Empty before the first query.
    pub fn prediction(
        &self,
        band: usize,
        user_dates: Option<&[i64]>,
    ) -> Result<Vec<(Vec<NaiveDate>, Vec<f64>)>, QueryError> {
        let Some(state) = &self.last else {
            return Ok(Vec::new());
        };
        prediction_curves(&state.records, &state.formula, &state.columns, band, user_dates)
    }

    /// Break dates and raw observed values for one band over the held
    /// records. Empty before the first query.
    pub fn breaks(&self, band: usize) -> (Vec<NaiveDate>, Vec<f64>) {
        match &self.last {
            Some(state) => break_points(
                &state.records,
                self.stack.ord_dates(),
                state.series.data().view(),
                band,
            ),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Records of the most recent query.
    pub fn result(&self) -> &[SegmentRecord] {
        self.last
            .as_ref()
            .map(|state| state.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn covariates(&self) -> &Covariates {
        &self.covariates
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Ordered column names of the stack-wide design matrix.
    pub fn design_columns(&self) -> &[String] {
        &self.design.columns
    }

    fn fit_live(&mut self, series: PixelSeries) -> Result<QueryState, QueryError> {
        let mask_band = self
            .config
            .mask_band
            .unwrap_or_else(|| self.stack.mask_band());
        let clear = clear_mask(
            series.data().view(),
            mask_band,
            &self.config.mask_values,
            &self.min_values,
            &self.max_values,
        )?;
        let clear_idx: Vec<usize> = clear
            .iter()
            .enumerate()
            .filter(|(_, &keep)| keep)
            .map(|(i, _)| i)
            .collect();
        if clear_idx.is_empty() {
            return Err(QueryError::fit("no clear observations to fit"));
        }
        debug!(
            clear = clear_idx.len(),
            total = series.length(),
            "filtered to clear observations"
        );

        let spectral: Vec<usize> = (0..self.stack.n_band())
            .filter(|&b| b != mask_band)
            .collect();
        let mut x = self.design.matrix.select(Axis(0), &clear_idx);
        let mut y = series
            .data()
            .select(Axis(0), &spectral)
            .select(Axis(1), &clear_idx);
        if self.config.reverse {
            x = x.slice(s![..;-1, ..]).to_owned();
            y = y.slice(s![.., ..;-1]).to_owned();
        }

        let model_config = self.config.model_config(self.design.columns.clone());
        let FitOutcome {
            record,
            robust_record,
            kept_trend,
        } = self.model.fit(x.view(), y.view(), &model_config)?;

        // Robust selection overrides the commission-tested default, as in
        // the original processing order.
        let mut records = if self.config.robust_results {
            match robust_record {
                Some(robust) => robust,
                None => {
                    warn!("robust records requested but unavailable; using the default sequence");
                    record
                }
            }
        } else if self.config.commit_test {
            self.model.commission_test(
                x.view(),
                y.view(),
                &model_config,
                &record,
                self.config.commit_alpha,
            )?
        } else {
            record
        };

        for record in &mut records {
            record.px = series.px();
            record.py = series.py();
        }

        let dates = self.stack.ord_dates();
        let span = (dates[0], dates[dates.len() - 1]);
        validate_records(&records, span)
            .map_err(|err| QueryError::fit(format!("model produced inconsistent records: {err}")))?;
        info!(
            px = series.px(),
            py = series.py(),
            segments = records.len(),
            "fit complete"
        );

        self.update_multitemp_flags(&clear_idx, &kept_trend);

        Ok(QueryState {
            series,
            records,
            formula: self.formula.clone(),
            columns: self.design.columns.clone(),
        })
    }

    /// Rewrites the screened-observation flags from the trend values the
    /// model kept. Observations the clear mask removed stay flagged.
    fn update_multitemp_flags(&mut self, clear_idx: &[usize], kept_trend: &[f64]) {
        let Some(trend) = self.design.column_index("x") else {
            return;
        };
        let mut flags = vec![1_u8; self.stack.len()];
        for &i in clear_idx {
            if kept_trend.contains(&self.design.matrix[[i, trend]]) {
                flags[i] = 0;
            }
        }
        self.covariates.multitemp_screened = flags;
    }

    fn load_saved(&self, series: PixelSeries) -> QueryState {
        let empty = |series| QueryState {
            series,
            records: Vec::new(),
            formula: self.formula.clone(),
            columns: self.design.columns.clone(),
        };
        let Some(folder) = &self.config.results_folder else {
            warn!("no results folder configured; returning empty saved results");
            return empty(series);
        };

        let saved = load_saved_results(
            folder,
            &self.config.results_pattern,
            series.px(),
            series.py(),
        );
        // Saved runs may have used a different design; adopt it so the
        // coefficients stay interpretable.
        let formula = match saved.design.as_deref().map(Formula::parse) {
            Some(Ok(formula)) => formula,
            Some(Err(err)) => {
                warn!(%err, "saved design formula does not parse; keeping the configured one");
                self.formula.clone()
            }
            None => self.formula.clone(),
        };
        let columns = saved
            .columns
            .unwrap_or_else(|| self.design.columns.clone());

        QueryState {
            series,
            records: saved.records,
            formula,
            columns,
        }
    }
}

type DerivedState = (
    Covariates,
    Formula,
    DesignMatrix,
    Vec<f64>,
    Vec<f64>,
    Option<ResultCache>,
);

fn derive_state(stack: &ImageStack, config: &QueryConfig) -> Result<DerivedState, QueryError> {
    if let Some(mask_band) = config.mask_band {
        if mask_band >= stack.n_band() {
            return Err(QueryError::configuration(format!(
                "mask_band {mask_band} out of range for {} bands",
                stack.n_band()
            )));
        }
    }

    let metadata = match &config.metadata_file_pattern {
        Some(pattern) => discover_metadata(stack, pattern)?,
        None => Vec::new(),
    };
    let covariates = enrich(stack, &metadata);

    let formula = Formula::parse(&config.design)?;
    let design = build_design_matrix(
        &formula,
        stack.ord_dates(),
        &CovariateSet {
            sensor: &covariates.sensor,
            pathrow: &covariates.pathrow,
        },
    )?;

    let min_values = broadcast_range(&config.min_values, stack.n_band())?;
    let max_values = broadcast_range(&config.max_values, stack.n_band())?;
    let cache = config
        .cache_folder
        .as_ref()
        .map(|folder| ResultCache::new(folder.clone()));

    Ok((covariates, formula, design, min_values, max_values, cache))
}
