use anyhow::Result;
use ndarray::Array1;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Normal;

use logdrop_rs::portfolio::{BasinHoppingConfig, DropMode, DropRiskConfig, DropRiskEngine};
use logdrop_rs::series::{SeriesStore, TimeSeries};
use logdrop_rs::DAY;

/// Synthetic daily price history: a multiplicative random walk with drift.
fn synthetic_series(rng: &mut StdRng, days: usize, p0: f64, drift: f64, vol: f64) -> TimeSeries {
  let shocks = Array1::random_using(days - 1, Normal::new(drift, vol).unwrap(), rng);

  let mut samples = Vec::with_capacity(days);
  let mut price = p0;
  samples.push((0i64, price));
  for (i, z) in shocks.iter().enumerate() {
    price *= z.exp();
    samples.push(((i as i64 + 1) * DAY as i64, price));
  }

  TimeSeries::new(&samples).expect("synthetic samples are ordered and positive")
}

fn main() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(1);

  let mut store = SeriesStore::new();
  store.insert("ethereum", synthetic_series(&mut rng, 160, 300.0, 0.002, 0.04));
  store.insert("litecoin", synthetic_series(&mut rng, 160, 50.0, -0.001, 0.06));
  store.insert("dash", synthetic_series(&mut rng, 160, 200.0, 0.001, 0.05));
  store.insert("zcash", synthetic_series(&mut rng, 160, 100.0, -0.003, 0.08));

  let config = DropRiskConfig {
    base_asset: "ethereum".to_string(),
    steps: 400,
    hold_time: 3.0 * DAY,
    sell_horizon: 14.0 * DAY,
    mode: DropMode::Frequency,
    days: 100.0,
    basin: BasinHoppingConfig {
      max_iters: 200,
      stall_limit: 50,
      seed: Some(42),
      ..BasinHoppingConfig::default()
    },
    ..DropRiskConfig::default()
  };

  let engine = DropRiskEngine::new(config);
  let result = engine.optimize(&store)?;

  println!("Drop risk: {:.6}", result.risk);
  println!(
    "Iterations: {} (stalled: {})",
    result.iterations, result.stalled
  );
  println!("Weights:");
  for (asset, weight) in result.weights.iter() {
    println!("  {asset}: {weight:.4}");
  }

  Ok(())
}
