//! Error types for outreach-engine
//!
//! This module provides the error handling for the library:
//! - Domain-specific error types (database, execution control, templates)
//!
//! Per-recipient delivery failures are deliberately *not* part of [`Error`]:
//! they are reported as [`SendError`](crate::channels::SendError) values and
//! folded into dispatch reports, never raised to the caller.

use crate::types::{CampaignId, CampaignStatus};
use thiserror::Error;

/// Result type alias for outreach-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for outreach-engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "SMTP_PORT")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Execution control error (not found, wrong state, already running)
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Template could not be parsed or rendered
    #[error("template error: {0}")]
    Template(String),

    /// Channel client could not be constructed
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new executions
    #[error("shutdown in progress: not accepting new executions")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate response row)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A stored value could not be decoded into its domain type
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Campaign execution control errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Campaign not found in the record store
    #[error("campaign {id} not found")]
    NotFound {
        /// The campaign ID that was not found
        id: CampaignId,
    },

    /// Campaign is not in a state that permits the operation
    #[error("cannot {operation} campaign {id} in state {current_state}")]
    InvalidState {
        /// The campaign that is in an invalid state for the operation
        id: CampaignId,
        /// The operation that was attempted (e.g., "execute")
        operation: String,
        /// The current state that prevents the operation
        current_state: CampaignStatus,
    },

    /// An execution for this campaign is already running in this engine
    #[error("campaign {id} is already executing")]
    AlreadyRunning {
        /// The campaign with an in-flight execution
        id: CampaignId,
    },

    /// No execution for this campaign is running
    #[error("campaign {id} has no running execution")]
    NotRunning {
        /// The campaign without an in-flight execution
        id: CampaignId,
    },

    /// Execution options failed validation
    #[error("invalid execution options: {0}")]
    InvalidOptions(String),
}
