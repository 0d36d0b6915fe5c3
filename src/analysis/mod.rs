//! Dataset assembly.
//!
//! Collects parsed rows from every decoded document into one dataset.

pub mod aggregator;

pub use aggregator::*;
