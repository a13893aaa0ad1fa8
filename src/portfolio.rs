//! # Portfolio
//!
//! $$
//! \mathbf{w}^\* = \arg\min_{\mathbf{w}}\ \text{logdrop}\left(\sum_a |w_a| S_a(t)\right)
//! $$
//!
//! Portfolio value composition, the logdrop risk metric and the
//! basin-hopping weight search.

pub mod engine;
pub mod optimizer;
pub mod risk;
pub mod types;
pub mod value;

pub use engine::DropRiskConfig;
pub use engine::DropRiskEngine;
pub use optimizer::basin_hopping;
pub use optimizer::basin_hopping_par;
pub use optimizer::BasinHoppingConfig;
pub use optimizer::PENALTY;
pub use risk::LogDrop;
pub use types::DropMode;
pub use types::OptimizeResult;
pub use types::WeightOverride;
pub use types::WeightVector;
pub use value::ValueFunction;
