//! # Basin-Hopping Weight Search
//!
//! $$
//! P(\text{accept}) = \min\left(1, e^{-\Delta R / T}\right)
//! $$
//!
//! Global search over the non-base asset weights: perturb the current
//! candidate, refine locally with Nelder-Mead under box constraints, then
//! accept or reject with a Metropolis rule. The base asset's weight is never
//! searched; it is derived as the allocation remainder, and candidates that
//! would make it negative are scored with a fixed penalty so the local
//! refinement stays total over the whole box.

use std::sync::Mutex;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use rayon::prelude::*;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;

use super::risk::LogDrop;
use super::types::OptimizeResult;
use super::types::WeightOverride;
use super::types::WeightVector;
use super::value::ValueFunction;

/// Score assigned to candidates outside the box or with a negative
/// base-asset remainder.
pub const PENALTY: f64 = 100.0;

/// Basin-hopping runtime parameters.
#[derive(Clone, Debug)]
pub struct BasinHoppingConfig {
  /// Outer-loop iteration budget.
  pub max_iters: usize,
  /// Metropolis temperature for accepting worsening moves.
  pub temperature: f64,
  /// Standard deviation of the Gaussian perturbation step.
  pub step_size: f64,
  /// Stop after this many consecutive iterations without improvement.
  pub stall_limit: usize,
  /// Iteration cap of each inner Nelder-Mead refinement.
  pub local_iters: u64,
  /// Seed for the perturbation/acceptance RNG; fixing it makes the
  /// single-threaded run bit-reproducible.
  pub seed: Option<u64>,
}

impl Default for BasinHoppingConfig {
  fn default() -> Self {
    Self {
      max_iters: 10_000,
      temperature: 100.0,
      step_size: 0.5,
      stall_limit: 250,
      local_iters: 200,
      seed: None,
    }
  }
}

/// Risk metric evaluated on the non-base weight vector.
struct DropCost<'a> {
  f: &'a ValueFunction,
  metric: &'a LogDrop,
  start: f64,
  stop: f64,
  names: &'a [String],
  base: &'a str,
  upper: &'a [f64],
  total: f64,
}

impl DropCost<'_> {
  fn overrides(&self, x: &[f64]) -> WeightOverride {
    let mut o = WeightOverride::new();
    for (name, &w) in self.names.iter().zip(x) {
      o.set(name.clone(), w);
    }
    o.set(self.base.to_string(), self.total - x.iter().sum::<f64>());
    o
  }

  fn score(&self, x: &[f64]) -> f64 {
    for (&w, &ub) in x.iter().zip(self.upper) {
      if !(0.0..=ub).contains(&w) {
        return PENALTY;
      }
    }
    if self.total - x.iter().sum::<f64>() < 0.0 {
      return PENALTY;
    }

    // The configuration was validated against the initial candidate before
    // the search started, so a failure here can only be a transient domain
    // mismatch; penalize instead of aborting the whole search.
    self
      .metric
      .risk(self.f, self.start, self.stop, Some(&self.overrides(x)))
      .unwrap_or(PENALTY)
  }
}

impl CostFunction for &DropCost<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    Ok(self.score(x))
  }
}

/// One bounded Nelder-Mead refinement around `x0`.
///
/// Non-convergence is not fatal: the best vertex seen is returned and the
/// outer loop treats it as an ordinary candidate.
fn local_refine(cost: &DropCost<'_>, x0: &[f64], max_iters: u64) -> (Vec<f64>, f64) {
  let n = x0.len();
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.to_vec());
  for i in 0..n {
    let mut point = x0.to_vec();
    point[i] = (point[i] + 0.1 * cost.upper[i].max(1e-3)).min(cost.upper[i]);
    if point[i] == x0[i] {
      point[i] -= 0.1 * cost.upper[i].max(1e-3);
    }
    simplex.push(point);
  }

  match NelderMead::new(simplex).with_sd_tolerance(1e-8) {
    Ok(solver) => match Executor::new(cost, solver)
      .configure(|state| state.max_iters(max_iters))
      .run()
    {
      Ok(res) => {
        let best = res.state.best_param.unwrap_or_else(|| x0.to_vec());
        let score = cost.score(&best);
        (best, score)
      }
      Err(_) => (x0.to_vec(), cost.score(x0)),
    },
    Err(_) => (x0.to_vec(), cost.score(x0)),
  }
}

/// Explicit basin-hopping state: the pieces that survive across iterations.
struct SearchState {
  current: Vec<f64>,
  current_risk: f64,
  best: Vec<f64>,
  best_risk: f64,
  stall: usize,
}

fn hop(cost: &DropCost<'_>, state: &mut SearchState, cfg: &BasinHoppingConfig, rng: &mut StdRng) {
  let step = Normal::new(0.0, cfg.step_size).unwrap_or_else(|_| Normal::new(0.0, 1.0).unwrap());

  let perturbed: Vec<f64> = state
    .current
    .iter()
    .zip(cost.upper)
    .map(|(&w, &ub)| (w + step.sample(rng)).clamp(0.0, ub))
    .collect();

  let (candidate, risk) = local_refine(cost, &perturbed, cfg.local_iters);

  let delta = risk - state.current_risk;
  let accept = delta <= 0.0 || rng.gen::<f64>() < (-delta / cfg.temperature).exp();
  if accept {
    state.current = candidate;
    state.current_risk = risk;
  }

  if state.current_risk < state.best_risk {
    state.best = state.current.clone();
    state.best_risk = state.current_risk;
    state.stall = 0;
    if state.best_risk < PENALTY {
      debug!(risk = state.best_risk, "accepted new best candidate");
    }
  } else {
    state.stall += 1;
  }
}

fn result_from(cost: &DropCost<'_>, best: &[f64], risk: f64, iterations: usize, stalled: bool) -> OptimizeResult {
  let mut weights = WeightVector::new();
  for (name, &w) in cost.names.iter().zip(best) {
    weights.set(name.clone(), w);
  }
  weights.set(cost.base.to_string(), cost.total - best.iter().sum::<f64>());

  OptimizeResult {
    weights,
    risk,
    iterations,
    stalled,
  }
}

/// Minimize the logdrop metric over non-base asset weights.
///
/// `upper` carries one box upper bound per entry of `names`; `total` is the
/// allocation budget the base asset's weight is derived from.
#[allow(clippy::too_many_arguments)]
pub fn basin_hopping(
  f: &ValueFunction,
  metric: &LogDrop,
  start: f64,
  stop: f64,
  names: &[String],
  base: &str,
  upper: &[f64],
  total: f64,
  cfg: &BasinHoppingConfig,
) -> Result<OptimizeResult> {
  if names.len() != upper.len() {
    return Err(Error::InvalidConfig(format!(
      "{} search assets but {} upper bounds",
      names.len(),
      upper.len()
    )));
  }

  let cost = DropCost {
    f,
    metric,
    start,
    stop,
    names,
    base,
    upper,
    total,
  };

  // Equal split over all assets, base included.
  let x0 = vec![total / (names.len() + 1) as f64; names.len()];

  // Surface configuration errors (bad window, no valid anchors) before the
  // search starts instead of silently scoring everything with the penalty.
  let init_risk = metric.risk(f, start, stop, Some(&cost.overrides(&x0)))?;

  if names.is_empty() {
    return Ok(result_from(&cost, &x0, init_risk, 0, false));
  }

  let mut rng = match cfg.seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_entropy(),
  };

  let (best, best_risk) = local_refine(&cost, &x0, cfg.local_iters);
  let mut state = SearchState {
    current: best.clone(),
    current_risk: best_risk,
    best,
    best_risk,
    stall: 0,
  };

  let mut iterations = 0;
  let mut stalled = false;

  for _ in 0..cfg.max_iters {
    iterations += 1;
    hop(&cost, &mut state, cfg, &mut rng);
    if state.stall >= cfg.stall_limit {
      stalled = true;
      break;
    }
  }

  debug!(
    risk = state.best_risk,
    iterations, stalled, "basin hopping finished"
  );

  Ok(result_from(&cost, &state.best, state.best_risk, iterations, stalled))
}

/// Parallel-restart variant of [`basin_hopping`].
///
/// Each worker runs an independent perturb/refine/accept chain over a share
/// of the iteration budget; improvements are merged into one locked
/// best-so-far. Not bit-reproducible across thread schedules, since worker
/// chains race for the shared best.
#[allow(clippy::too_many_arguments)]
pub fn basin_hopping_par(
  f: &ValueFunction,
  metric: &LogDrop,
  start: f64,
  stop: f64,
  names: &[String],
  base: &str,
  upper: &[f64],
  total: f64,
  cfg: &BasinHoppingConfig,
  workers: usize,
) -> Result<OptimizeResult> {
  if workers <= 1 {
    return basin_hopping(f, metric, start, stop, names, base, upper, total, cfg);
  }

  let cost = DropCost {
    f,
    metric,
    start,
    stop,
    names,
    base,
    upper,
    total,
  };

  let x0 = vec![total / (names.len() + 1) as f64; names.len()];
  let init_risk = metric.risk(f, start, stop, Some(&cost.overrides(&x0)))?;

  if names.is_empty() {
    return Ok(result_from(&cost, &x0, init_risk, 0, false));
  }

  let seed0 = cfg.seed.unwrap_or_else(|| rand::thread_rng().gen());
  let shared: Mutex<(Vec<f64>, f64)> = {
    let (best, best_risk) = local_refine(&cost, &x0, cfg.local_iters);
    Mutex::new((best, best_risk))
  };
  let per_worker = cfg.max_iters.div_ceil(workers);

  (0..workers).into_par_iter().for_each(|w| {
    let mut rng = StdRng::seed_from_u64(seed0.wrapping_add(w as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));

    let (current, current_risk) = {
      let guard = shared.lock().unwrap();
      (guard.0.clone(), guard.1)
    };
    let mut state = SearchState {
      best: current.clone(),
      best_risk: current_risk,
      current,
      current_risk,
      stall: 0,
    };

    for _ in 0..per_worker {
      hop(&cost, &mut state, cfg, &mut rng);
      if state.stall >= cfg.stall_limit {
        break;
      }
    }

    let mut guard = shared.lock().unwrap();
    if state.best_risk < guard.1 {
      guard.0 = state.best.clone();
      guard.1 = state.best_risk;
    }
  });

  let (best, best_risk) = shared.into_inner().unwrap();
  Ok(result_from(&cost, &best, best_risk, cfg.max_iters, false))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::portfolio::types::DropMode;
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

  fn falling_and_rising() -> (ValueFunction, LogDrop) {
    let rising: Vec<f64> = (0..30).map(|i| 1.0 + 0.05 * i as f64).collect();
    let falling: Vec<f64> = (0..30).map(|i| 2.0 * 0.93_f64.powi(i)).collect();
    let store = daily_store(&[("base", &rising), ("risky", &falling)]);

    let baseline = WeightVector::equal_split(["base", "risky"], 1.0);
    let f = ValueFunction::build(&store, baseline, 0.0, 29.0 * DAY).unwrap();
    let metric = LogDrop::new(29, 0.5 * DAY, 6.0 * DAY, DropMode::Frequency);
    (f, metric)
  }

  fn small_config(seed: u64) -> BasinHoppingConfig {
    BasinHoppingConfig {
      max_iters: 12,
      temperature: 1.0,
      step_size: 0.3,
      stall_limit: 12,
      local_iters: 80,
      seed: Some(seed),
    }
  }

  #[test]
  fn result_respects_bounds_and_base_remainder() {
    let (f, metric) = falling_and_rising();
    let names = vec!["risky".to_string()];
    let cfg = small_config(7);

    let res = basin_hopping(&f, &metric, 0.0, 29.0 * DAY, &names, "base", &[1.0], 1.0, &cfg).unwrap();

    let risky = res.weights.get("risky").unwrap();
    let base = res.weights.get("base").unwrap();
    assert!((0.0..=1.0).contains(&risky));
    assert!(base >= 0.0);
    assert!(res.risk < PENALTY);
  }

  #[test]
  fn fixed_seed_is_bit_reproducible() {
    let (f, metric) = falling_and_rising();
    let names = vec!["risky".to_string()];
    let cfg = small_config(42);

    let a = basin_hopping(&f, &metric, 0.0, 29.0 * DAY, &names, "base", &[1.0], 1.0, &cfg).unwrap();
    let b = basin_hopping(&f, &metric, 0.0, 29.0 * DAY, &names, "base", &[1.0], 1.0, &cfg).unwrap();

    assert_eq!(a.risk.to_bits(), b.risk.to_bits());
    assert_eq!(a.weights, b.weights);
  }

  #[test]
  fn optimizer_flees_the_falling_asset() {
    let (f, _) = falling_and_rising();
    // Magnitude mode gives the local refinement a smooth descent direction.
    let metric = LogDrop::new(29, 0.5 * DAY, 6.0 * DAY, DropMode::Magnitude);
    let names = vec!["risky".to_string()];
    let cfg = small_config(3);

    let res = basin_hopping(&f, &metric, 0.0, 29.0 * DAY, &names, "base", &[1.0], 1.0, &cfg).unwrap();

    // Holding mostly the rising base asset never drops; the optimizer must
    // leave the falling asset's zero-risk plateau with risk exactly 0.
    let initial = metric
      .risk(&f, 0.0, 29.0 * DAY, None)
      .unwrap();
    assert!(initial > 0.0);
    assert!(res.weights.get("risky").unwrap() < 0.5);
    assert_eq!(res.risk, 0.0);
  }

  #[test]
  fn no_search_assets_returns_base_only_portfolio() {
    let rising: Vec<f64> = (0..30).map(|i| 1.0 + 0.05 * i as f64).collect();
    let store = daily_store(&[("base", &rising)]);
    let baseline = WeightVector::equal_split(["base"], 1.0);
    let f = ValueFunction::build(&store, baseline, 0.0, 29.0 * DAY).unwrap();
    let metric = LogDrop::new(29, 0.0, 6.0 * DAY, DropMode::Frequency);

    let res = basin_hopping(&f, &metric, 0.0, 29.0 * DAY, &[], "base", &[], 1.0, &small_config(1))
      .unwrap();
    assert_eq!(res.weights.get("base"), Some(1.0));
    assert_eq!(res.risk, 0.0);
  }

  #[test]
  fn bad_metric_config_fails_before_search() {
    let (f, _) = falling_and_rising();
    let metric = LogDrop::new(10, DAY, 90.0 * DAY, DropMode::Frequency);
    let names = vec!["risky".to_string()];

    let err = basin_hopping(
      &f,
      &metric,
      0.0,
      29.0 * DAY,
      &names,
      "base",
      &[1.0],
      1.0,
      &small_config(1),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NoValidAnchor { .. }));
  }

  #[tracing_test::traced_test]
  #[test]
  fn logs_search_completion() {
    let (f, metric) = falling_and_rising();
    let names = vec!["risky".to_string()];

    basin_hopping(&f, &metric, 0.0, 29.0 * DAY, &names, "base", &[1.0], 1.0, &small_config(9))
      .unwrap();
    assert!(logs_contain("basin hopping finished"));
  }

  #[test]
  fn parallel_restarts_match_sequential_contract() {
    let (f, metric) = falling_and_rising();
    let names = vec!["risky".to_string()];
    let cfg = small_config(11);

    let res = basin_hopping_par(
      &f,
      &metric,
      0.0,
      29.0 * DAY,
      &names,
      "base",
      &[1.0],
      1.0,
      &cfg,
      2,
    )
    .unwrap();

    let risky = res.weights.get("risky").unwrap();
    assert!((0.0..=1.0).contains(&risky));
    assert!(res.weights.get("base").unwrap() >= 0.0);
    assert!(res.risk < PENALTY);
  }
}
