//! Error types for the scanner data model.

use thiserror::Error;

/// Errors raised while converting between textual and typed tuning values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A tuning parameter name did not match any known value.
    #[error("Unknown {kind} value: '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    /// A polarisation letter outside of H/V/L/R.
    #[error("Invalid polarisation: '{0}'")]
    InvalidPolarisation(char),
}
