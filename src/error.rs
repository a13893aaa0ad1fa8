//! # Errors
//!
//! $$
//! \text{Error}:\ \text{data} \cup \text{domain} \cup \text{configuration}
//! $$
//!
//! Typed error categories for the drop-risk pipeline. Candidate weight
//! vectors that imply a negative base-asset remainder are not represented
//! here: the optimizer scores them with a fixed penalty constant instead,
//! so the local search stays total over the whole box.

use std::fmt;

/// Fatal error categories surfaced by the core pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
  /// Fewer samples than an interpolant needs, or no shared domain window.
  DataInsufficient(String),
  /// A requested evaluation time falls outside a fitted interpolant's range.
  DomainRange { t: f64, lo: f64, hi: f64 },
  /// The risk metric's anchor loop produced zero valid future comparisons.
  NoValidAnchor { steps: usize },
  /// Malformed input series (unordered timestamps, non-positive prices).
  InvalidSeries(String),
  /// Inconsistent runtime configuration.
  InvalidConfig(String),
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::DataInsufficient(msg) => write!(f, "insufficient data: {msg}"),
      Error::DomainRange { t, lo, hi } => {
        write!(f, "evaluation time {t} outside fitted range [{lo}, {hi})")
      }
      Error::NoValidAnchor { steps } => write!(
        f,
        "no valid anchor comparisons over {steps} sampled times; widen the window or shrink hold time / sell horizon"
      ),
      Error::InvalidSeries(msg) => write!(f, "invalid series: {msg}"),
      Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
    }
  }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
