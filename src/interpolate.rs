//! # Cubic Price Interpolation
//!
//! $$
//! S_i(t) = a y_i + b y_{i+1} + \frac{h_i^2}{6}\left[(a^3-a)M_i + (b^3-b)M_{i+1}\right]
//! $$
//!
//! Natural cubic spline over the samples of one asset restricted to a
//! bounded, padded sub-window. The spline reproduces every knot exactly and
//! is C² between knots. Evaluation is only defined on the half-open knot
//! range; anything outside is a hard [`Error::DomainRange`] — extrapolated
//! prices would silently corrupt the risk metric downstream.

use ndarray::Array1;

use crate::error::Error;
use crate::error::Result;
use crate::series::TimeSeries;

/// Minimum number of knots for a cubic fit.
pub const MIN_SAMPLES: usize = 4;

/// Natural cubic spline fitted to a sub-window of one price series.
#[derive(Clone, Debug)]
pub struct CubicSpline {
  /// Knot times in epoch seconds.
  xs: Vec<f64>,
  /// Knot prices.
  ys: Vec<f64>,
  /// Second derivatives at the knots (natural boundary: zero at both ends).
  m2: Vec<f64>,
}

impl CubicSpline {
  /// Fit a spline to the samples of `series` inside `[start, stop)`, padded
  /// by half the series' mean sampling period on each side so windows that
  /// straddle sample edges keep support.
  pub fn fit(series: &TimeSeries, start: f64, stop: f64) -> Result<Self> {
    if !(start < stop) {
      return Err(Error::InvalidConfig(format!(
        "window start {start} must precede stop {stop}"
      )));
    }

    let pad = series.mean_step() / 2.0;
    let (i0, i1) = series.window_indices(start - pad, stop + pad);

    let n = i1 - i0;
    if n < MIN_SAMPLES {
      return Err(Error::DataInsufficient(format!(
        "cubic fit needs at least {MIN_SAMPLES} samples in the padded window, found {n}"
      )));
    }

    let xs: Vec<f64> = series.times()[i0..i1].iter().map(|&t| t as f64).collect();
    let ys: Vec<f64> = series.prices()[i0..i1].to_vec();
    let m2 = natural_second_derivatives(&xs, &ys);

    Ok(Self { xs, ys, m2 })
  }

  /// Half-open valid evaluation range `[first_knot, last_knot)`.
  pub fn domain(&self) -> (f64, f64) {
    (self.xs[0], self.xs[self.xs.len() - 1])
  }

  /// Evaluate the spline at `t`.
  ///
  /// `t` at or beyond the last knot (or before the first) is a
  /// [`Error::DomainRange`]; the spline never extrapolates.
  pub fn eval(&self, t: f64) -> Result<f64> {
    let (lo, hi) = self.domain();
    if !(t >= lo && t < hi) {
      return Err(Error::DomainRange { t, lo, hi });
    }

    // Segment index such that xs[k] <= t < xs[k + 1].
    let k = self.xs.partition_point(|&x| x <= t) - 1;
    let h = self.xs[k + 1] - self.xs[k];
    let a = (self.xs[k + 1] - t) / h;
    let b = (t - self.xs[k]) / h;

    Ok(
      a * self.ys[k]
        + b * self.ys[k + 1]
        + ((a.powi(3) - a) * self.m2[k] + (b.powi(3) - b) * self.m2[k + 1]) * h * h / 6.0,
    )
  }

  /// Evaluate the spline at each time in `ts`.
  pub fn eval_many(&self, ts: &[f64]) -> Result<Array1<f64>> {
    let mut out = Array1::zeros(ts.len());
    for (i, &t) in ts.iter().enumerate() {
      out[i] = self.eval(t)?;
    }
    Ok(out)
  }
}

/// Solve the natural-spline tridiagonal system for knot second derivatives.
fn natural_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
  let n = xs.len();
  let mut m2 = vec![0.0; n];

  // Thomas algorithm on the n-2 interior equations:
  // h_{i-1} M_{i-1} + 2(h_{i-1}+h_i) M_i + h_i M_{i+1} = rhs_i.
  let mut diag = vec![0.0; n];
  let mut rhs = vec![0.0; n];

  for i in 1..n - 1 {
    let h0 = xs[i] - xs[i - 1];
    let h1 = xs[i + 1] - xs[i];
    diag[i] = 2.0 * (h0 + h1);
    rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
  }

  for i in 2..n - 1 {
    let h0 = xs[i] - xs[i - 1];
    let w = h0 / diag[i - 1];
    diag[i] -= w * h0;
    rhs[i] -= w * rhs[i - 1];
  }

  for i in (1..n - 1).rev() {
    let h1 = xs[i + 1] - xs[i];
    m2[i] = (rhs[i] - h1 * m2[i + 1]) / diag[i];
  }

  m2
}
