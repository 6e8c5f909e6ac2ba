//! Individual pre-filter steps

pub mod bilateral;
pub mod blend;
pub mod edges;
pub mod gaussian;
