
use thiserror::Error;

use crate::construct::{FactVector, Prime};

#[derive(Error, Debug)]
pub enum SfiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No such attribute value: {category}={value}")]
    UnknownCriterion { category: String, value: String },
    #[error("Vector {vector} contains unrecognized factors (remainder {residual}), it was likely encoded against a different registry")]
    UnknownFactor { vector: FactVector, residual: FactVector },
    #[error("Invalid fact vector: {0}")]
    InvalidVector(String),
    #[error("Corrupt prime assignment: {0}")]
    CorruptAssignment(String),
    #[error("Empty query: at least one criterion is required")]
    EmptyQuery,
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl SfiError {
    /// Errors that signal a broken registry invariant rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptAssignment(_) | Self::Lock(_))
    }
    /// Errors caused by the caller's input, which are reported and never logged as failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCriterion { .. }
                | Self::UnknownFactor { .. }
                | Self::InvalidVector(_)
                | Self::EmptyQuery
                | Self::InvalidParameter(_)
        )
    }
    pub(crate) fn corrupt_prime(prime: Prime, detail: &str) -> Self {
        Self::CorruptAssignment(format!("prime {}: {}", prime, detail))
    }
}

pub type Result<T> = std::result::Result<T, SfiError>;

// Helper conversions
impl From<rusqlite::Error> for SfiError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for SfiError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for SfiError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
