//! Range sweeps over up to two input variables.
pub mod error;
pub mod table;
mod trace;

pub use error::SweepError;
pub use table::{AxisValue, SweepMode, SweepOptions, Table};
