//! Input checks ahead of a sweep.
pub mod error;
pub mod validator;

pub use error::InputError;
pub use validator::{RangeCase, Validator};
