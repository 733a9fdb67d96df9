//! Internal consistency errors.
//!
//! These mean the static catalog or the domain rules are broken. Construction
//! stops at the first one; nothing here is caused by user input.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Equation '{equation}' references unknown variable '{variable}'")]
    UnresolvedVariable { equation: String, variable: String },
    #[error("Variable '{variable}' has more than {limit} consumer equations")]
    ConsumerOverflow { variable: String, limit: usize },
    #[error("Variable '{variable}' has more than {limit} producer equations")]
    ProducerOverflow { variable: String, limit: usize },
    #[error("Duplicate {what} name '{name}'")]
    DuplicateName { what: &'static str, name: String },
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Unknown equation '{0}'")]
    UnknownEquation(String),
    #[error("Unknown item list '{0}'")]
    UnknownItemList(String),
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),
    #[error("Property '{key}' is not a {expected}")]
    PropertyType { key: String, expected: &'static str },
    #[error("Variable '{variable}' is produced by both '{first}' and '{second}'")]
    ConflictingProducers { variable: String, first: String, second: String },
    #[error("Equation '{equation}' does not produce '{variable}'")]
    NotAProducer { equation: String, variable: String },
    #[error("Cycle detected in active equations involving '{0}'")]
    Cycle(String),
    #[error("Variable '{variable}' is not {expected}")]
    KindMismatch { variable: String, expected: &'static str },
    #[error("Unit '{unit}' of variable '{variable}' cannot be converted: {reason}")]
    BadUnits { variable: String, unit: String, reason: String },
}
