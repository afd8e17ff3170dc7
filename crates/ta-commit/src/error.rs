// error.rs — Error types for the commit boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("approval query failed: {0}")]
    ApprovalQueryFailed(String),

    #[error("no handler registered for commit tool '{0}'")]
    NoHandler(String),

    #[error("commit handler failed: {0}")]
    HandlerFailed(String),
}
