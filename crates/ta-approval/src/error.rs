// error.rs — Error types for the approval store.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request not found: {0}")]
    NotFound(Uuid),

    #[error("approval request {0} has already been decided")]
    AlreadyDecided(Uuid),

    #[error("approval request {0} is not pending")]
    NotPending(Uuid),

    #[error("approval request {0} has expired")]
    RequestExpired(Uuid),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
