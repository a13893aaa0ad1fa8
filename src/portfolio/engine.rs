//! # Drop-Risk Engine
//!
//! $$
//! \mathbf{w}^\* = \arg\min_{\mathbf{w}} \ \text{logdrop}(V_\mathbf{w};\ h, H)
//! $$
//!
//! High-level orchestration: resolves the evaluation window against the
//! store's shared domain, fits one spline per asset (once per window, never
//! per optimizer iteration), and runs the basin-hopping search.

use tracing::info;

use crate::error::Error;
use crate::error::Result;
use crate::series::SeriesStore;
use crate::DAY;

use super::optimizer::basin_hopping;
use super::optimizer::basin_hopping_par;
use super::optimizer::BasinHoppingConfig;
use super::risk::LogDrop;
use super::types::DropMode;
use super::types::OptimizeResult;
use super::types::WeightVector;
use super::value::ValueFunction;

/// Runtime configuration for [`DropRiskEngine`].
#[derive(Clone, Debug)]
pub struct DropRiskConfig {
  /// Asset whose weight is derived as the allocation remainder, never
  /// searched directly.
  pub base_asset: String,
  /// Future-sample resolution of the risk metric.
  pub steps: usize,
  /// Minimum holding duration in seconds.
  pub hold_time: f64,
  /// Maximum look-ahead in seconds.
  pub sell_horizon: f64,
  /// Drop aggregation mode.
  pub mode: DropMode,
  /// Explicit evaluation window `[start, stop)` in epoch seconds; when
  /// absent the window is derived from the store domain and [`Self::days`].
  pub window: Option<(f64, f64)>,
  /// Length in days of the derived evaluation window, which ends one sell
  /// horizon before the store's domain maximum.
  pub days: f64,
  /// Box-constraint upper bound applied to every searched weight.
  pub upper_bound: f64,
  /// Allocation budget; the base weight is `total - sum(searched)`.
  pub total: f64,
  /// Outer-loop search parameters.
  pub basin: BasinHoppingConfig,
  /// Parallel restart workers; values above 1 trade reproducibility for
  /// wall-clock time.
  pub workers: usize,
}

impl Default for DropRiskConfig {
  fn default() -> Self {
    Self {
      base_asset: String::new(),
      steps: 1000,
      hold_time: 3.0 * DAY,
      sell_horizon: 14.0 * DAY,
      mode: DropMode::Frequency,
      window: None,
      days: 100.0,
      upper_bound: 1.0,
      total: 1.0,
      basin: BasinHoppingConfig::default(),
      workers: 1,
    }
  }
}

/// Single entry-point engine for the drop-risk pipeline.
#[derive(Clone, Debug)]
pub struct DropRiskEngine {
  config: DropRiskConfig,
}

impl DropRiskEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: DropRiskConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &DropRiskConfig {
    &self.config
  }

  /// Resolve the evaluation window against the store's shared domain.
  ///
  /// Without an explicit window this mirrors the canonical run: `days` of
  /// history ending one sell horizon before the newest shared sample, so the
  /// metric always has a full look-ahead band.
  pub fn window(&self, store: &SeriesStore) -> Result<(f64, f64)> {
    let (dmin, dmax) = store.domain()?;

    let (start, stop) = match self.config.window {
      Some(w) => w,
      None => {
        let stop = dmax as f64 - self.config.sell_horizon;
        (stop - self.config.days * DAY, stop)
      }
    };

    if start < dmin as f64 || stop > dmax as f64 {
      return Err(Error::DataInsufficient(format!(
        "evaluation window [{start}, {stop}) exceeds the shared domain [{dmin}, {dmax}]"
      )));
    }

    Ok((start, stop))
  }

  /// Search for the weight vector minimizing the logdrop metric.
  pub fn optimize(&self, store: &SeriesStore) -> Result<OptimizeResult> {
    let (start, stop) = self.window(store)?;
    let (f, metric) = self.prepare(store, start, stop)?;

    let names: Vec<String> = store
      .assets()
      .filter(|a| *a != self.config.base_asset)
      .map(str::to_string)
      .collect();
    let upper = vec![self.config.upper_bound; names.len()];

    info!(
      assets = names.len() + 1,
      base = %self.config.base_asset,
      start,
      stop,
      "optimizing drop risk"
    );

    if self.config.workers > 1 {
      basin_hopping_par(
        &f,
        &metric,
        start,
        stop,
        &names,
        &self.config.base_asset,
        &upper,
        self.config.total,
        &self.config.basin,
        self.config.workers,
      )
    } else {
      basin_hopping(
        &f,
        &metric,
        start,
        stop,
        &names,
        &self.config.base_asset,
        &upper,
        self.config.total,
        &self.config.basin,
      )
    }
  }

  /// Evaluate the logdrop metric for one fixed weight vector.
  pub fn risk(&self, store: &SeriesStore, weights: &WeightVector) -> Result<f64> {
    let (start, stop) = self.window(store)?;
    let (f, metric) = self.prepare_with(store, start, stop, weights.clone())?;
    metric.risk(&f, start, stop, None)
  }

  fn prepare(&self, store: &SeriesStore, start: f64, stop: f64) -> Result<(ValueFunction, LogDrop)> {
    let baseline = WeightVector::equal_split(store.assets(), self.config.total);
    self.prepare_with(store, start, stop, baseline)
  }

  fn prepare_with(
    &self,
    store: &SeriesStore,
    start: f64,
    stop: f64,
    baseline: WeightVector,
  ) -> Result<(ValueFunction, LogDrop)> {
    if store.get(&self.config.base_asset).is_none() {
      return Err(Error::InvalidConfig(format!(
        "base asset {:?} is not in the store",
        self.config.base_asset
      )));
    }

    let f = ValueFunction::build(store, baseline, start, stop)?;
    let metric = LogDrop::new(
      self.config.steps,
      self.config.hold_time,
      self.config.sell_horizon,
      self.config.mode,
    );

    Ok((f, metric))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::series::TimeSeries;

  fn daily_store(assets: &[(&str, &[f64])]) -> SeriesStore {
    let mut store = SeriesStore::new();
    for (name, prices) in assets {
      let samples: Vec<(i64, f64)> = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| (i as i64 * DAY as i64, p))
        .collect();
      store.insert(*name, TimeSeries::new(&samples).unwrap());
    }
    store
  }

  fn test_config() -> DropRiskConfig {
    DropRiskConfig {
      base_asset: "base".to_string(),
      steps: 40,
      hold_time: DAY,
      sell_horizon: 5.0 * DAY,
      days: 20.0,
      basin: BasinHoppingConfig {
        max_iters: 10,
        temperature: 1.0,
        step_size: 0.3,
        stall_limit: 10,
        local_iters: 60,
        seed: Some(5),
      },
      ..DropRiskConfig::default()
    }
  }

  #[test]
  fn derived_window_ends_one_horizon_early() {
    let store = daily_store(&[("base", &[1.0; 40]), ("xxx", &[2.0; 40])]);
    let engine = DropRiskEngine::new(test_config());

    let (start, stop) = engine.window(&store).unwrap();
    assert_eq!(stop, 39.0 * DAY - 5.0 * DAY);
    assert_eq!(start, stop - 20.0 * DAY);
  }

  #[test]
  fn window_exceeding_domain_is_insufficient() {
    let store = daily_store(&[("base", &[1.0; 10]), ("xxx", &[2.0; 10])]);
    let engine = DropRiskEngine::new(test_config());

    assert!(matches!(
      engine.window(&store),
      Err(Error::DataInsufficient(_))
    ));
  }

  #[test]
  fn missing_base_asset_is_invalid_config() {
    let store = daily_store(&[("aaa", &[1.0; 40]), ("bbb", &[2.0; 40])]);
    let engine = DropRiskEngine::new(test_config());

    assert!(matches!(
      engine.optimize(&store),
      Err(Error::InvalidConfig(_))
    ));
  }

  #[test]
  fn flat_market_optimizes_to_zero_risk() {
    let store = daily_store(&[("base", &[1.0; 40]), ("xxx", &[2.0; 40])]);
    let engine = DropRiskEngine::new(test_config());

    let res = engine.optimize(&store).unwrap();
    assert_eq!(res.risk, 0.0);
    assert!(res.weights.get("base").unwrap() >= 0.0);
    let w = res.weights.get("xxx").unwrap();
    assert!((0.0..=1.0).contains(&w));
  }

  #[test]
  fn engine_runs_are_reproducible_with_fixed_seed() {
    let rising: Vec<f64> = (0..40).map(|i| 1.0 + 0.02 * i as f64).collect();
    let wavy: Vec<f64> = (0..40)
      .map(|i| 2.0 + (i as f64 * 0.9).sin() * 0.3)
      .collect();
    let store = daily_store(&[("base", &rising), ("xxx", &wavy)]);
    let engine = DropRiskEngine::new(test_config());

    let a = engine.optimize(&store).unwrap();
    let b = engine.optimize(&store).unwrap();
    assert_eq!(a.risk.to_bits(), b.risk.to_bits());
    assert_eq!(a.weights, b.weights);
  }

  #[test]
  fn fixed_weight_risk_matches_metric_contract() {
    let store = daily_store(&[("base", &[1.0; 40]), ("xxx", &[2.0; 40])]);
    let engine = DropRiskEngine::new(test_config());

    let mut weights = WeightVector::new();
    weights.set("base", 0.3);
    weights.set("xxx", 0.7);
    assert_eq!(engine.risk(&store, &weights).unwrap(), 0.0);
  }
}
