// error.rs — Error types for the tool router.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("tool '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("invalid tool definition: {0}")]
    InvalidDefinition(String),
}
