use crate::compute::error::ComputationError;
use crate::store::error::ConfigError;
use crate::validation::error::InputError;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a sweep stops. Every variant leaves the tree usable.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("{} input error(s), first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Invalid(Vec<InputError>),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error("Sweep cancelled before row {row}, column {col}")]
    Cancelled { row: usize, col: usize },
    #[error("Sweep exceeded its time limit before row {row}, column {col}")]
    TimedOut { row: usize, col: usize },
    #[error("Cannot open '{}'", .path.display())]
    StreamOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot write sweep stream")]
    StreamWrite(#[source] std::io::Error),
}
