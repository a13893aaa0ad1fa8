//! # Portfolio Types
//!
//! $$
//! w : \text{asset} \mapsto \mathbb{R},\qquad w_{\text{base}} = 1 - \sum_{a \neq \text{base}} w_a
//! $$
//!
//! Weight containers and shared enums for the drop-risk pipeline. Both
//! containers are backed by `BTreeMap` so iteration order — and with it the
//! optimizer's output — is deterministic.

use std::collections::BTreeMap;

/// Dense asset → weight mapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightVector {
  weights: BTreeMap<String, f64>,
}

impl WeightVector {
  pub fn new() -> Self {
    Self::default()
  }

  /// Equal split of `total` across `assets`.
  pub fn equal_split<I, S>(assets: I, total: f64) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Vec<String> = assets.into_iter().map(Into::into).collect();
    let n = names.len().max(1);
    let w = total / n as f64;

    Self {
      weights: names.into_iter().map(|a| (a, w)).collect(),
    }
  }

  pub fn set(&mut self, asset: impl Into<String>, weight: f64) {
    self.weights.insert(asset.into(), weight);
  }

  pub fn get(&self, asset: &str) -> Option<f64> {
    self.weights.get(asset).copied()
  }

  /// Asset/weight pairs in sorted asset order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.weights.iter().map(|(a, &w)| (a.as_str(), w))
  }

  pub fn len(&self) -> usize {
    self.weights.len()
  }

  pub fn is_empty(&self) -> bool {
    self.weights.is_empty()
  }

  /// Sum of all weights.
  pub fn total(&self) -> f64 {
    self.weights.values().sum()
  }
}

impl FromIterator<(String, f64)> for WeightVector {
  fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
    Self {
      weights: iter.into_iter().collect(),
    }
  }
}

/// Sparse per-call weight override.
///
/// Assets present here shadow the baseline weight of a
/// [`ValueFunction`](super::ValueFunction); everything else falls back to
/// the baseline.
#[derive(Clone, Debug, Default)]
pub struct WeightOverride {
  overrides: BTreeMap<String, f64>,
}

impl WeightOverride {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, asset: impl Into<String>, weight: f64) {
    self.overrides.insert(asset.into(), weight);
  }

  pub fn get(&self, asset: &str) -> Option<f64> {
    self.overrides.get(asset).copied()
  }

  pub fn is_empty(&self) -> bool {
    self.overrides.is_empty()
  }
}

/// How per-anchor future log drops are aggregated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DropMode {
  /// Fraction of future comparisons that are log-price drops. Score in [0, 1].
  #[default]
  Frequency,
  /// Time-weighted sum of negative log returns; harsher, magnitude-aware.
  Magnitude,
}

impl DropMode {
  /// Parse a string into a [`DropMode`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "magnitude" | "mag" | "weighted" => Self::Magnitude,
      _ => Self::Frequency,
    }
  }
}

/// Output of a drop-risk optimization run.
#[derive(Clone, Debug)]
pub struct OptimizeResult {
  /// Final weights, including the derived base-asset weight.
  pub weights: WeightVector,
  /// Risk score of the final weights; smaller is better.
  pub risk: f64,
  /// Outer-loop iterations actually run.
  pub iterations: usize,
  /// Whether the run stopped on the no-improvement stall threshold.
  pub stalled: bool,
}
