//! Error types and result handling for exekit.
//!
//! [`Error`] enumerates everything that can go wrong while provisioning,
//! resetting, or tearing down a working database; [`Result<T>`] is the alias
//! used by all fallible crate APIs.
//!
//! Provisioning and reset failures are hard errors that callers must not
//! swallow: a test suite cannot meaningfully continue without the database it
//! was promised, and a half-applied reset silently breaks isolation between
//! test cases. Teardown failures are reported by the explicit teardown path
//! but are only logged when the manager is dropped.
use thiserror::Error;

/// Result type for exekit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type for heterogeneous error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for exekit operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (SQLx errors)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration field has an invalid value
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    /// Creating the working database failed during test-suite startup
    #[error("Failed to provision test database '{db_name}': {source}")]
    ProvisioningFailed { db_name: String, source: BoxError },

    /// Every generated database name collided with an existing database
    #[error("Gave up provisioning a test database after {attempts} name collisions")]
    NameCollision { attempts: u32 },

    /// Clearing backend state inside the working database failed
    #[error("Failed to reset state in test database '{db_name}': {source}")]
    ResetFailed { db_name: String, source: BoxError },

    /// Operation requires a working database that has already been dropped
    #[error("Test database '{db_name}' has already been torn down")]
    TornDown { db_name: String },

    /// Operation exceeded timeout limit
    #[error("Operation timeout: {operation}")]
    Timeout { operation: String },

    /// Requested backend kind is not supported
    #[error("Unknown test backend '{name}'")]
    UnknownBackend { name: String },
}
