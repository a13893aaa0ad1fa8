//! # Price Time Series
//!
//! $$
//! \mathcal{T} = \{(t_i, p_i)\}_{i=0}^{n-1},\quad t_0 < t_1 < \dots < t_{n-1},\ p_i > 0
//! $$
//!
//! One immutable, strictly time-ordered `(epoch seconds, price)` sequence per
//! asset, plus the store keyed by asset identifier. The store's shared
//! domain window is the intersection of every asset's available time range,
//! so each asset has interpolation support everywhere the core queries.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::error::Result;

/// A strictly time-ordered sequence of positive price samples.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
  times: Vec<i64>,
  prices: Vec<f64>,
}

impl TimeSeries {
  /// Build a series from `(epoch seconds, price)` samples.
  ///
  /// Timestamps must be strictly increasing and prices strictly positive.
  pub fn new(samples: &[(i64, f64)]) -> Result<Self> {
    if samples.is_empty() {
      return Err(Error::InvalidSeries("empty sample sequence".to_string()));
    }

    let mut times = Vec::with_capacity(samples.len());
    let mut prices = Vec::with_capacity(samples.len());

    for &(t, p) in samples {
      if let Some(&prev) = times.last() {
        if t <= prev {
          return Err(Error::InvalidSeries(format!(
            "timestamps not strictly increasing at t={t} (previous {prev})"
          )));
        }
      }
      if !(p > 0.0) || !p.is_finite() {
        return Err(Error::InvalidSeries(format!(
          "non-positive or non-finite price {p} at t={t}"
        )));
      }
      times.push(t);
      prices.push(p);
    }

    Ok(Self { times, prices })
  }

  /// Build a series from `(epoch milliseconds, price)` samples.
  ///
  /// Acquisition layers commonly store millisecond timestamps; the core
  /// works in seconds.
  pub fn from_millis(samples: &[(i64, f64)]) -> Result<Self> {
    let converted: Vec<(i64, f64)> = samples.iter().map(|&(t, p)| (t / 1000, p)).collect();
    Self::new(&converted)
  }

  /// Number of samples.
  pub fn len(&self) -> usize {
    self.times.len()
  }

  pub fn is_empty(&self) -> bool {
    self.times.is_empty()
  }

  /// Sample timestamps in epoch seconds.
  pub fn times(&self) -> &[i64] {
    &self.times
  }

  /// Sample prices.
  pub fn prices(&self) -> &[f64] {
    &self.prices
  }

  /// Earliest sample time.
  pub fn min_time(&self) -> i64 {
    self.times[0]
  }

  /// Latest sample time.
  pub fn max_time(&self) -> i64 {
    self.times[self.times.len() - 1]
  }

  /// Mean spacing between consecutive samples, in seconds.
  pub fn mean_step(&self) -> f64 {
    if self.times.len() < 2 {
      return 0.0;
    }
    (self.max_time() - self.min_time()) as f64 / (self.times.len() - 1) as f64
  }

  /// Index range of samples with `lo <= t < hi`.
  pub(crate) fn window_indices(&self, lo: f64, hi: f64) -> (usize, usize) {
    let start = self.times.partition_point(|&t| (t as f64) < lo);
    let stop = self.times.partition_point(|&t| (t as f64) < hi);
    (start, stop)
  }
}

/// Read-only collection of per-asset time series.
///
/// Backed by a `BTreeMap` so asset iteration order is deterministic; the
/// optimizer's reproducibility guarantee depends on it.
#[derive(Clone, Debug, Default)]
pub struct SeriesStore {
  series: BTreeMap<String, TimeSeries>,
}

impl SeriesStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace the series for an asset.
  pub fn insert(&mut self, asset: impl Into<String>, series: TimeSeries) {
    self.series.insert(asset.into(), series);
  }

  pub fn get(&self, asset: &str) -> Option<&TimeSeries> {
    self.series.get(asset)
  }

  /// Asset identifiers in sorted order.
  pub fn assets(&self) -> impl Iterator<Item = &str> {
    self.series.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.series.len()
  }

  pub fn is_empty(&self) -> bool {
    self.series.is_empty()
  }

  /// Shared domain window `[start, stop]` in epoch seconds.
  ///
  /// Computed as the max of per-asset minimum times and the min of per-asset
  /// maximum times, so every asset has samples across the whole window.
  pub fn domain(&self) -> Result<(i64, i64)> {
    if self.series.is_empty() {
      return Err(Error::DataInsufficient("store holds no series".to_string()));
    }

    let mut lo = i64::MIN;
    let mut hi = i64::MAX;

    for (asset, series) in &self.series {
      lo = lo.max(series.min_time());
      hi = hi.min(series.max_time());
      if lo >= hi {
        return Err(Error::DataInsufficient(format!(
          "asset {asset} has no overlap with the shared domain window"
        )));
      }
    }

    Ok((lo, hi))
  }
}
