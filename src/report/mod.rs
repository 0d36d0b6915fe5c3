//! Output rendering for the collected dataset.

pub mod generator;

pub use generator::*;
