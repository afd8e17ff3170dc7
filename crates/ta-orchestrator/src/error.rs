// error.rs — Error types for the workflow orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("fail-closed: workflow invalid: {0}")]
    WorkflowInvalid(String),

    #[error("fail-closed: no agent registered for stage '{0}'")]
    MissingAgent(String),

    #[error("agent turn failed: {0}")]
    TurnFailed(String),
}
