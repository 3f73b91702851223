//! Error types for countdown event operations

use thiserror::Error;

/// Result type for countdown event operations
pub type Result<T> = std::result::Result<T, CountdownError>;

/// Errors reported by the checked countdown event operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownError {
    /// A decrement was attempted while the count was already zero
    ///
    /// This always means increments and decrements are mismatched somewhere
    /// in the caller.
    #[error("countdown event count cannot go below zero")]
    Underflow,
}

impl CountdownError {
    /// Check if error is due to decrementing a zero count
    #[must_use]
    pub fn is_underflow(&self) -> bool {
        matches!(self, CountdownError::Underflow)
    }
}
