//! Error types for the decision engine.
//!
//! Nothing in this crate is fatal to the host process: configuration errors
//! collapse to non-matches at the smallest scope, collaborator failures
//! degrade to "do not respond this turn", and invalid numeric input is
//! rejected before any state mutation.

use thiserror::Error;

/// Errors related to the persistent state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A generic storage operation error.
    #[error("Store operation error: {message}")]
    OperationError { message: String },

    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization error while persisting structured state.
    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level errors surfaced by the decision engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A numeric input (trait value, weight delta) was NaN or infinite.
    #[error("Invalid numeric value for {context}: must be finite")]
    InvalidValue { context: String },

    /// Configuration that could not be loaded or parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A named entity (trait, interest keyword) does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A strategy produced no usable response.
    #[error("Strategy '{strategy}' produced an empty response")]
    EmptyResponse { strategy: String },

    /// Underlying store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Shorthand for an invalid-numeric-input error.
    pub fn invalid_value(context: impl Into<String>) -> Self {
        EngineError::InvalidValue {
            context: context.into(),
        }
    }
}
