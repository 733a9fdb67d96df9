//! Incremental evaluation of fire behavior equation trees.
//!
//! A [`Catalog`] declares variables and equations once. Each session
//! instantiates its own [`Tree`], reconfigures it from properties, and
//! either recomputes single values on demand or sweeps up to two input
//! ranges into a [`Table`].
pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod document;
pub mod model;
pub mod rx;
pub mod store;
pub mod sweep;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use compute::ComputationError;
pub use config::Properties;
pub use store::error::ConfigError;
pub use store::{Catalog, Tree};
pub use sweep::{SweepError, SweepOptions, Table};
pub use validation::InputError;
