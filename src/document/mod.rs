//! Saved sessions.
pub mod records;

pub use records::{PrescriptionRecord, RecordOutcome, VariableRecord, Worksheet};
