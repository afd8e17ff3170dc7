// error.rs — Error types for the sandbox subsystem.

use thiserror::Error;

/// The closed failure-reason enumeration the sandbox returns on denial.
/// Never extended ad hoc — an unrecognized failure mode must map to
/// `UnknownError`, never escape as a raw error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    DockerNotAvailable,
    DockerNotRunning,
    ImagePullFailed,
    BlockedEnvVarRequested,
    InvalidInput,
    NetworkAllowlistInvalid,
    ArtifactsDirCreationFailed,
    ExecutionTimeout,
    ContainerStartupFailed,
    UnknownError,
}

#[derive(Debug, Error)]
pub enum SandboxError {
    /// An env-var blocklist configuration resolves to allowing a blocked
    /// name — a startup-time failure, never silently dropped.
    #[error("fail-closed: blocklist configuration allows blocked env var '{name}'")]
    BlocklistMisconfigured { name: String },

    #[error("fail-closed: invalid env-var blocklist pattern '{pattern}': {reason}")]
    InvalidBlocklistPattern { pattern: String, reason: String },

    #[error("unknown sandbox id: {0}")]
    UnknownSandbox(uuid::Uuid),

    #[error("failed to create artifacts directory at {path}: {source}")]
    ArtifactsDirCreationFailed {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
