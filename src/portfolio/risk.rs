//! # Logdrop Risk Metric
//!
//! $$
//! R = \frac{1}{|A|}\sum_{i \in A} \Pr\left[\log V(t_j) < \log V(t_i)\ \middle|\ h < t_j - t_i < H\right]
//! $$
//!
//! Windowed statistic of future log-price drops. For each anchor time the
//! metric looks at every later sampled time inside the
//! (hold time, sell horizon) band and measures how often — or, in magnitude
//! mode, how far — the portfolio's log value falls below the anchor. The
//! optimizer minimizes the per-anchor average.

use impl_new_derive::ImplNew;
use ndarray::Array1;

use crate::error::Error;
use crate::error::Result;

use super::types::DropMode;
use super::types::WeightOverride;
use super::value::ValueFunction;

/// Configuration of the windowed log-drop statistic.
#[derive(ImplNew, Clone, Debug)]
pub struct LogDrop {
  /// Number of equally spaced sample times across the evaluation window.
  pub steps: usize,
  /// Minimum holding duration in seconds; shorter look-aheads are ignored.
  pub hold_time: f64,
  /// Maximum look-ahead in seconds; later drops are irrelevant.
  pub sell_horizon: f64,
  /// Aggregation mode, fixed for the whole run.
  pub mode: DropMode,
}

impl LogDrop {
  /// Risk score of `f` over `[start, stop)` under optional weight overrides.
  ///
  /// Zero means no future log-price drop was observed anywhere in the
  /// window. Fails with [`Error::NoValidAnchor`] when the window is too
  /// short relative to hold time and sell horizon to produce a single valid
  /// comparison.
  pub fn risk(
    &self,
    f: &ValueFunction,
    start: f64,
    stop: f64,
    overrides: Option<&WeightOverride>,
  ) -> Result<f64> {
    if self.steps < 3 {
      return Err(Error::InvalidConfig(format!(
        "logdrop needs at least 3 sample steps, got {}",
        self.steps
      )));
    }
    if !(self.hold_time >= 0.0 && self.sell_horizon > self.hold_time) {
      return Err(Error::InvalidConfig(format!(
        "sell horizon {} must exceed hold time {}",
        self.sell_horizon, self.hold_time
      )));
    }

    // Half-open grid: stop itself is never evaluated, it sits at or past the
    // fitted upper knot.
    let dt = (stop - start) / self.steps as f64;
    let times: Vec<f64> = (0..self.steps).map(|i| start + i as f64 * dt).collect();

    let values = f.value(&times, overrides)?;
    let logs: Array1<f64> = values.mapv(f64::ln);
    let t_last = times[self.steps - 1];

    let mut drop = 0.0;
    let mut anchors = 0usize;

    for i in 0..self.steps - 1 {
      // No valid future window left for this or any later anchor.
      if t_last - times[i + 1] < self.sell_horizon {
        break;
      }

      let mut contribution = 0.0;
      let mut compared = 0usize;

      for j in i + 1..self.steps {
        let elapsed = times[j] - times[i];
        if elapsed <= self.hold_time {
          continue;
        }
        if elapsed >= self.sell_horizon {
          break;
        }

        compared += 1;
        let diff = logs[j] - logs[i];
        if diff < 0.0 {
          contribution += match self.mode {
            DropMode::Frequency => 1.0,
            DropMode::Magnitude => -diff * elapsed / self.sell_horizon,
          };
        }
      }

      if compared == 0 {
        continue;
      }

      drop += match self.mode {
        DropMode::Frequency => contribution / compared as f64,
        DropMode::Magnitude => contribution,
      };
      anchors += 1;
    }

    if anchors == 0 {
      return Err(Error::NoValidAnchor { steps: self.steps });
    }

    Ok(drop / anchors as f64)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::portfolio::types::WeightVector;
  use crate::series::SeriesStore;
  use crate::series::TimeSeries;
  use crate::DAY;

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

  fn value_fn(store: &SeriesStore, stop_days: f64) -> ValueFunction {
    let assets: Vec<&str> = store.assets().collect();
    let baseline = WeightVector::equal_split(assets, 1.0);
    ValueFunction::build(store, baseline, 0.0, stop_days * DAY).unwrap()
  }

  #[test]
  fn flat_prices_have_zero_risk() {
    // Two flat assets, 30 daily samples; flat prices never drop, so the
    // score is exactly zero for any weight split.
    let store = daily_store(&[("aaa", &[1.0; 30]), ("bbb", &[2.0; 30])]);
    let f = value_fn(&store, 29.0);
    let metric = LogDrop::new(30, DAY, 5.0 * DAY, DropMode::Frequency);

    let risk = metric.risk(&f, 0.0, 29.0 * DAY, None).unwrap();
    assert_eq!(risk, 0.0);

    let mut o = WeightOverride::new();
    o.set("aaa", 0.9);
    o.set("bbb", 0.1);
    let risk = metric.risk(&f, 0.0, 29.0 * DAY, Some(&o)).unwrap();
    assert_eq!(risk, 0.0);
  }

  #[test]
  fn non_decreasing_prices_have_zero_risk() {
    let rising: Vec<f64> = (0..30).map(|i| 1.0 + 0.05 * i as f64).collect();
    let store = daily_store(&[("aaa", &rising)]);
    let f = value_fn(&store, 29.0);
    let metric = LogDrop::new(29, 0.0, 5.0 * DAY, DropMode::Frequency);

    let risk = metric.risk(&f, 0.0, 29.0 * DAY, None).unwrap();
    assert_eq!(risk, 0.0);
  }

  #[test]
  fn halving_prices_have_maximal_risk() {
    // Price halves every day; every valid future comparison is a drop.
    let halving: Vec<f64> = (0..10).map(|i| 1.0 / f64::powi(2.0, i)).collect();
    let store = daily_store(&[("aaa", &halving)]);
    let f = value_fn(&store, 9.0);
    // steps = 9 over [0, 9d) puts every sampled time exactly on a knot.
    let metric = LogDrop::new(9, 0.0, 5.0 * DAY, DropMode::Frequency);

    let risk = metric.risk(&f, 0.0, 9.0 * DAY, None).unwrap();
    assert_relative_eq!(risk, 1.0, max_relative = 1e-12);
  }

  #[test]
  fn magnitude_mode_scores_drops_positive() {
    let halving: Vec<f64> = (0..10).map(|i| 1.0 / f64::powi(2.0, i)).collect();
    let store = daily_store(&[("aaa", &halving)]);
    let f = value_fn(&store, 9.0);
    let metric = LogDrop::new(9, 0.0, 5.0 * DAY, DropMode::Magnitude);

    let risk = metric.risk(&f, 0.0, 9.0 * DAY, None).unwrap();
    assert!(risk > 0.0);
  }

  #[test]
  fn hold_time_floor_excludes_short_holds() {
    // One sharp dip at day 1, recovered by day 2. With a 1.5-day hold floor
    // and daily anchors on knots, the dip at dt = 1 day is never compared.
    let mut prices = vec![1.0; 20];
    prices[1] = 0.5;
    let store = daily_store(&[("aaa", &prices)]);
    let f = value_fn(&store, 19.0);
    let metric = LogDrop::new(19, 1.5 * DAY, 5.0 * DAY, DropMode::Frequency);

    let risk = metric.risk(&f, 0.0, 19.0 * DAY, None).unwrap();
    assert_eq!(risk, 0.0);
  }

  #[test]
  fn too_short_window_has_no_valid_anchor() {
    let store = daily_store(&[("aaa", &[1.0; 30])]);
    let f = value_fn(&store, 29.0);
    let metric = LogDrop::new(10, DAY, 60.0 * DAY, DropMode::Frequency);

    assert!(matches!(
      metric.risk(&f, 0.0, 29.0 * DAY, None),
      Err(Error::NoValidAnchor { .. })
    ));
  }

  #[test]
  fn horizon_must_exceed_hold_time() {
    let store = daily_store(&[("aaa", &[1.0; 30])]);
    let f = value_fn(&store, 29.0);
    let metric = LogDrop::new(10, 5.0 * DAY, 2.0 * DAY, DropMode::Frequency);

    assert!(matches!(
      metric.risk(&f, 0.0, 29.0 * DAY, None),
      Err(Error::InvalidConfig(_))
    ));
  }
}
