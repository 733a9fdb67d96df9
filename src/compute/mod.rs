//! Demand-driven evaluation.
pub mod engine;
pub mod error;

pub use error::ComputationError;
