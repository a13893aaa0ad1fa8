//! # Drop-Risk Portfolio Optimization
//!
//! `logdrop-rs` estimates, from historical price series of several tradable
//! assets, a portfolio weighting that minimizes the probability (or extent)
//! of future log-price drops over a bounded holding window.
//!
//! ## Modules
//!
//! | Module          | Description                                                                      |
//! |-----------------|----------------------------------------------------------------------------------|
//! | [`series`]      | Immutable per-asset price time series and the shared domain window.              |
//! | [`interpolate`] | Natural cubic spline price interpolation over a bounded, padded sub-window.      |
//! | [`portfolio`]   | Portfolio value function, the logdrop risk metric and the basin-hopping optimizer.|
//! | [`error`]       | Typed error categories shared across the crate.                                  |
//!
//! ## Pipeline
//!
//! [`series::SeriesStore`] → [`interpolate::CubicSpline`] →
//! [`portfolio::ValueFunction`] → [`portfolio::LogDrop`] →
//! [`portfolio::basin_hopping`] → ([`portfolio::WeightVector`], risk).
//!
//! ## Example Usage
//!
//! ```rust
//! use logdrop_rs::portfolio::{DropRiskConfig, DropRiskEngine};
//! use logdrop_rs::series::{SeriesStore, TimeSeries};
//!
//! let mut store = SeriesStore::new();
//! store.insert("ethereum", TimeSeries::new(&samples)?);
//! let engine = DropRiskEngine::new(DropRiskConfig::default());
//! let result = engine.optimize(&store)?;
//! ```

pub mod error;
pub mod interpolate;
pub mod portfolio;
pub mod series;

pub use error::Error;
pub use error::Result;

/// Seconds per day.
pub const DAY: f64 = 86_400.0;
