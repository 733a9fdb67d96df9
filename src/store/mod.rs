//! The equation tree: variables, equations and the catalog they come from.
pub mod catalog;
pub mod equation;
pub mod error;
pub mod items;
pub mod registry;
pub mod types;
pub mod variable;

pub use catalog::{Catalog, ContinuousDef};
pub use registry::Tree;
pub use types::{EqId, ReleaseRange, UnitsSet, VarId};
