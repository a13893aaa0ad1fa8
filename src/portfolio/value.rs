//! # Portfolio Value Function
//!
//! $$
//! V(t) = \sum_{a} |w_a| \cdot S_a(t)
//! $$
//!
//! Composes one fitted price spline per asset with a baseline weight vector
//! into a single scalar function of time. Weights enter through their
//! absolute value: the optimizer may probe unconstrained search directions,
//! but the evaluated portfolio always represents a non-negative holding.
//! The box constraints remain the primary mechanism; the absolute value is a
//! safety net.

use std::collections::BTreeMap;

use ndarray::Array1;

use crate::error::Error;
use crate::error::Result;
use crate::interpolate::CubicSpline;
use crate::series::SeriesStore;

use super::types::WeightOverride;
use super::types::WeightVector;

/// Per-asset splines plus a baseline weight vector over a shared window.
///
/// Built once per evaluation window; read-only afterwards, so it can be
/// shared freely across parallel optimizer restarts.
#[derive(Clone, Debug)]
pub struct ValueFunction {
  assets: Vec<String>,
  baseline: WeightVector,
  splines: BTreeMap<String, CubicSpline>,
}

impl ValueFunction {
  /// Fit one spline per asset in `store` over `[start, stop)` and pair them
  /// with `baseline` weights.
  pub fn build(store: &SeriesStore, baseline: WeightVector, start: f64, stop: f64) -> Result<Self> {
    if store.is_empty() {
      return Err(Error::DataInsufficient("store holds no series".to_string()));
    }

    let mut splines = BTreeMap::new();
    for asset in store.assets() {
      let series = store.get(asset).unwrap();
      splines.insert(asset.to_string(), CubicSpline::fit(series, start, stop)?);
    }

    Ok(Self {
      assets: store.assets().map(str::to_string).collect(),
      baseline,
      splines,
    })
  }

  /// Asset identifiers in sorted order.
  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Baseline weights used when an asset is absent from the override.
  pub fn baseline(&self) -> &WeightVector {
    &self.baseline
  }

  /// Portfolio value at each time in `times`.
  ///
  /// The weight of each asset comes from `overrides` when present, else from
  /// the baseline (assets missing from both hold zero). Every requested time
  /// must lie inside every asset spline's valid domain; if not, the call
  /// fails with [`Error::DomainRange`].
  pub fn value(&self, times: &[f64], overrides: Option<&WeightOverride>) -> Result<Array1<f64>> {
    let mut out = Array1::zeros(times.len());

    for asset in &self.assets {
      let w = overrides
        .and_then(|o| o.get(asset))
        .or_else(|| self.baseline.get(asset))
        .unwrap_or(0.0)
        .abs();

      let prices = self.splines[asset].eval_many(times)?;
      out = out + prices * w;
    }

    Ok(out)
  }
}
