//! Classical image pre-filter applied before the model services
//!
//! Blends an edge map, a Gaussian-blurred copy and a bilateral-smoothed copy
//! of the input with fixed weights.

pub mod pipeline;
pub mod steps;

pub use pipeline::{PreFilter, PreFilterResult, StepTiming};
