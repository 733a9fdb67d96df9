use crate::store::error::ConfigError;
use crate::validation::error::InputError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("Equation '{equation}' failed: {message}")]
    Equation { equation: String, message: String },
}

impl ComputationError {
    /// Convenience for equation bodies reporting a numeric failure.
    pub fn equation(equation: &str, message: impl Into<String>) -> Self {
        ComputationError::Equation { equation: equation.to_string(), message: message.into() }
    }
}
