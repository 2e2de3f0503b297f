//! Ready-made molecule functions

pub mod barrier;

pub use barrier::{BarrierTouch, first_touch, synthetic_paths};
