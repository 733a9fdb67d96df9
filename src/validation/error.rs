//! Recoverable user and data errors.
//!
//! Token-level variants carry the offending token with its offset and length
//! in the variable's store, so a caller can highlight the exact field.
use crate::analysis::tokens::{Span, TokenError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("'{token}' is not a number for '{variable}'")]
    InvalidNumber { variable: String, token: String, offset: usize, len: usize },
    #[error("{token} is outside [{min}, {max}] for '{variable}'")]
    OutOfRange { variable: String, token: String, offset: usize, len: usize, min: f64, max: f64 },
    #[error("'{token}' is not a valid choice for '{variable}'")]
    InvalidChoice { variable: String, token: String, offset: usize, len: usize },
    #[error("'{variable}' requires at least one value")]
    MissingValue { variable: String },
    #[error("'{variable}' has {tokens} values but its master '{master}' has {master_tokens}")]
    MasterMismatch { variable: String, master: String, tokens: usize, master_tokens: usize },
    #[error("At most two inputs may have multiple values, found {}: {}", .names.len(), .names.join(", "))]
    TooManyRangeVariables { names: Vec<String> },
    #[error("Units '{units}' are not valid for '{variable}': {reason}")]
    IncompatibleUnits { variable: String, units: String, reason: String },
    #[error("Unterminated quote at position {position} in '{variable}'")]
    UnclosedQuote { variable: String, position: usize },
    #[error("'{variable}' range runs from {from} down to {thru}")]
    InvertedRange { variable: String, from: f64, thru: f64 },
    #[error("Invalid prescription bound '{token}' for '{variable}'")]
    InvalidRxBound { variable: String, token: String },
    #[error("'{item}' is not an item of '{variable}'")]
    UnknownItem { variable: String, item: String },
    #[error("Unknown name '{0}'")]
    UnknownName(String),
    #[error("Record for '{variable}' does not describe a {expected} variable")]
    RecordKind { variable: String, expected: &'static str },
    #[error("Graph needs at least two points, got {0}")]
    GraphPoints(i64),
}

impl InputError {
    pub fn from_token(variable: &str, err: TokenError) -> Self {
        match err {
            TokenError::UnclosedQuote { position } => {
                InputError::UnclosedQuote { variable: variable.to_string(), position }
            }
        }
    }

    /// The offending token's location in the variable's store, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            InputError::InvalidNumber { offset, len, .. }
            | InputError::OutOfRange { offset, len, .. }
            | InputError::InvalidChoice { offset, len, .. } => Some(Span { offset: *offset, len: *len }),
            InputError::UnclosedQuote { position, .. } => Some(Span { offset: *position, len: 0 }),
            _ => None,
        }
    }

    /// Name of the variable the error is attached to, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            InputError::InvalidNumber { variable, .. }
            | InputError::OutOfRange { variable, .. }
            | InputError::InvalidChoice { variable, .. }
            | InputError::MissingValue { variable }
            | InputError::MasterMismatch { variable, .. }
            | InputError::IncompatibleUnits { variable, .. }
            | InputError::UnclosedQuote { variable, .. }
            | InputError::InvertedRange { variable, .. }
            | InputError::InvalidRxBound { variable, .. }
            | InputError::UnknownItem { variable, .. }
            | InputError::RecordKind { variable, .. } => Some(variable),
            _ => None,
        }
    }
}
