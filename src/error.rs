//! Error taxonomy for the scheduling engine.
//!
//! Validation and not-found failures are rejected before any write reaches
//! the store. Sync failures are additionally recorded in `sync_operations`
//! and surfaced to the caller as retryable. Overbooking is never an error
//! here: the availability calculator reports it as a computed status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("sync failed for event {event_id}: {message}")]
    Sync { event_id: i64, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
