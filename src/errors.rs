//! Unified error types for the order desk.
//!
//! Every fallible operation returns [`Result`]. Variants are grouped by how the
//! caller is expected to recover: validation errors are shown to the customer,
//! conflicts are retried, connectivity failures are surfaced as retryable.

use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Input rejected before touching the store
    #[error("{message}")]
    Validation {
        /// Message suitable for the customer
        message: String,
    },

    /// The store refused a write because an order number was already taken
    #[error("Order number already taken for this day")]
    NumberConflict,

    /// Order numbers could not be reserved within the retry budget
    #[error("Could not reserve order numbers after {attempts} attempts, please try again")]
    ConflictExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// No order with this id
    #[error("Order not found: {id}")]
    OrderNotFound {
        /// Repository id that was looked up
        id: i64,
    },

    /// Timeout or network failure talking to a collaborator
    #[error("Connectivity error: {message}")]
    Connectivity {
        /// What timed out or failed
        message: String,
    },

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message formatting failure
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Required environment variable missing
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Discord framework failure
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true for failures a caller may retry without changing input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NumberConflict | Self::Connectivity { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
