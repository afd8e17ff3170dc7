// error.rs — Error types for the domain adapter registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("domain '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("no adapter registered for domain '{0}'")]
    NotFound(String),

    #[error("adapter for domain '{domain}' failed validation: {errors:?}")]
    Invalid { domain: String, errors: Vec<String> },
}
