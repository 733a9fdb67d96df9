pub mod prescription;

pub use prescription::{RxBounds, RxVar, RxVarList};
