//! The sandbox: process-isolated, resource-limited execution with a
//! staged-change ledger, committed or discarded as a unit.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::config::{IsolationKind, SandboxConfig};
use crate::error::{FailureReason, SandboxError};
use crate::isolation::{
    ContainerIsolation, DenyIsolation, Handler, IsolationOutcome, IsolationStrategy,
    PassthroughIsolation,
};
use crate::ledger::{ChangeType, StagedChange, StagedChangeLedger};

/// A request to stage a change alongside the handler's own result.
pub struct StageSpec {
    pub change_type: ChangeType,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload: serde_json::Value,
}

pub struct ExecuteRequest<'a> {
    pub tool_name: String,
    pub input: serde_json::Value,
    /// Environment variable names the handler wants forwarded; checked
    /// against the blocklist before the handler ever runs.
    pub requested_env: Vec<String>,
    pub stage: Option<StageSpec>,
    pub handler: &'a Handler<'a>,
}

impl<'a> ExecuteRequest<'a> {
    pub fn new(tool_name: impl Into<String>, input: serde_json::Value, handler: &'a Handler<'a>) -> Self {
        Self {
            tool_name: tool_name.into(),
            input,
            requested_env: Vec::new(),
            stage: None,
            handler,
        }
    }

    pub fn with_requested_env(mut self, names: Vec<String>) -> Self {
        self.requested_env = names;
        self
    }

    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// Outcome of an `execute` call. Mirrors spec §4.D's result shape exactly.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub sandbox_id: Uuid,
    pub artifacts: Vec<PathBuf>,
    pub duration_ms: u128,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub stdout_sample: Option<String>,
    pub stderr_sample: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub denied_by_policy: bool,
}

impl ExecutionResult {
    fn denied(sandbox_id: Uuid, reason: FailureReason) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(format!("fail-closed: sandbox denied ({reason:?})")),
            sandbox_id,
            artifacts: Vec::new(),
            duration_ms: 0,
            timed_out: matches!(reason, FailureReason::ExecutionTimeout),
            exit_code: None,
            stdout_sample: None,
            stderr_sample: None,
            failure_reason: Some(reason),
            denied_by_policy: true,
        }
    }
}

struct SandboxArtifacts {
    root: PathBuf,
    dirs: Mutex<std::collections::HashMap<Uuid, PathBuf>>,
}

/// A configured sandbox instance. One per process is typical; the
/// isolation strategy is resolved once at construction from the config
/// and never re-selected per call.
pub struct Sandbox {
    config: SandboxConfig,
    strategy: Box<dyn IsolationStrategy>,
    ledger: StagedChangeLedger,
    artifacts: SandboxArtifacts,
}

impl Sandbox {
    pub fn new(config: SandboxConfig, artifacts_root: impl Into<PathBuf>) -> Self {
        let strategy: Box<dyn IsolationStrategy> = match config.isolation {
            IsolationKind::Container => Box::new(ContainerIsolation::new(config.clone())),
            IsolationKind::Passthrough => Box::new(PassthroughIsolation),
            IsolationKind::Deny => Box::new(DenyIsolation::new(FailureReason::DockerNotAvailable)),
        };
        Self {
            config,
            strategy,
            ledger: StagedChangeLedger::new(),
            artifacts: SandboxArtifacts {
                root: artifacts_root.into(),
                dirs: Mutex::new(std::collections::HashMap::new()),
            },
        }
    }

    /// Executes `request` under this sandbox's isolation strategy,
    /// correlating with `sandbox_id` if given (reuse the id returned by
    /// a prior call to keep staged changes in the same ledger bucket),
    /// or allocating a fresh stable id otherwise.
    pub fn execute(&self, sandbox_id: Option<Uuid>, request: ExecuteRequest<'_>) -> ExecutionResult {
        let sandbox_id = sandbox_id.unwrap_or_else(Uuid::new_v4);

        if request.tool_name.trim().is_empty() {
            return ExecutionResult::denied(sandbox_id, FailureReason::InvalidInput);
        }

        for name in &request.requested_env {
            if self.config.blocklist.is_blocked(name) {
                return ExecutionResult::denied(sandbox_id, FailureReason::BlockedEnvVarRequested);
            }
        }

        for host in &self.config.network_allowlist {
            if host.trim().is_empty() {
                return ExecutionResult::denied(sandbox_id, FailureReason::NetworkAllowlistInvalid);
            }
        }

        let artifacts_dir = match self.ensure_artifacts_dir(sandbox_id) {
            Ok(dir) => dir,
            Err(_) => {
                return ExecutionResult::denied(sandbox_id, FailureReason::ArtifactsDirCreationFailed)
            }
        };

        let stage_spec = request.stage;
        let tool_name = request.tool_name.clone();
        match self.strategy.run(sandbox_id, &request.input, request.handler) {
            IsolationOutcome::Denied { reason } => ExecutionResult::denied(sandbox_id, reason),
            IsolationOutcome::Ran { outcome, duration } => {
                if outcome.success {
                    if let Some(spec) = stage_spec {
                        let mut change = StagedChange::new(
                            sandbox_id,
                            tool_name,
                            spec.change_type,
                            spec.entity_type,
                            spec.payload,
                        );
                        if let Some(entity_id) = spec.entity_id {
                            change = change.with_entity_id(entity_id);
                        }
                        self.ledger.record(change);
                    }
                }
                ExecutionResult {
                    success: outcome.success,
                    result: outcome.result,
                    error: outcome.error,
                    sandbox_id,
                    artifacts: vec![artifacts_dir],
                    duration_ms: duration.as_millis(),
                    timed_out: outcome.timed_out,
                    exit_code: outcome.exit_code,
                    stdout_sample: outcome.stdout_sample,
                    stderr_sample: outcome.stderr_sample,
                    failure_reason: None,
                    denied_by_policy: false,
                }
            }
        }
    }

    pub fn get_staged_changes(&self, sandbox_id: Uuid) -> Vec<StagedChange> {
        self.ledger.get(sandbox_id)
    }

    /// A hook for the commit boundary; materialization is performed by
    /// domain code against the returned changes. The ledger is cleared
    /// once the caller confirms materialization succeeded.
    pub fn commit_changes(&self, sandbox_id: Uuid) -> Vec<StagedChange> {
        let changes = self.ledger.get(sandbox_id);
        self.ledger.discard(sandbox_id);
        changes
    }

    pub fn rollback_changes(&self, sandbox_id: Uuid) {
        self.ledger.discard(sandbox_id);
    }

    pub fn cleanup(&self, sandbox_id: Uuid) -> Result<(), SandboxError> {
        self.ledger.discard(sandbox_id);
        let mut dirs = self.artifacts.dirs.lock().expect("artifacts mutex poisoned");
        if let Some(dir) = dirs.remove(&sandbox_id) {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    fn ensure_artifacts_dir(&self, sandbox_id: Uuid) -> Result<PathBuf, SandboxError> {
        let mut dirs = self.artifacts.dirs.lock().expect("artifacts mutex poisoned");
        if let Some(existing) = dirs.get(&sandbox_id) {
            return Ok(existing.clone());
        }
        let dir = self.artifacts.root.join(sandbox_id.to_string());
        std::fs::create_dir_all(&dir).map_err(|source| SandboxError::ArtifactsDirCreationFailed {
            path: dir.clone(),
            source,
        })?;
        dirs.insert(sandbox_id, dir.clone());
        Ok(dir)
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn artifacts_root(&self) -> &Path {
        &self.artifacts.root
    }

    /// Wall-clock timeout this sandbox enforces, for callers that need
    /// to budget a surrounding cancellation.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::RawOutcome;

    fn tmp_sandbox(isolation: IsolationKind) -> (Sandbox, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SandboxConfig::default();
        config.isolation = isolation;
        (Sandbox::new(config, dir.path()), dir)
    }

    #[test]
    fn passthrough_execute_runs_handler_and_returns_artifacts_dir() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({"ok": true}));
        let request = ExecuteRequest::new("asi.get_bookings", serde_json::json!({}), handler);
        let result = sandbox.execute(None, request);
        assert!(result.success);
        assert!(!result.denied_by_policy);
        assert_eq!(result.artifacts.len(), 1);
    }

    #[test]
    fn deny_isolation_never_invokes_handler_and_sets_denied_flag() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Deny);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({}));
        let request = ExecuteRequest::new("asi.stage_booking_create", serde_json::json!({}), handler);
        let result = sandbox.execute(None, request);
        assert!(!result.success);
        assert!(result.denied_by_policy);
        assert!(result.failure_reason.is_some());
    }

    #[test]
    fn blocked_env_var_is_denied_before_handler_runs() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let invoked = std::sync::atomic::AtomicBool::new(false);
        let handler: &Handler = &|_input| {
            invoked.store(true, std::sync::atomic::Ordering::SeqCst);
            RawOutcome::ok(serde_json::json!({}))
        };
        let request = ExecuteRequest::new("tool", serde_json::json!({}), handler)
            .with_requested_env(vec!["AWS_SECRET_ACCESS_KEY".to_string()]);
        let result = sandbox.execute(None, request);
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(result.failure_reason, Some(FailureReason::BlockedEnvVarRequested));
    }

    #[test]
    fn successful_execute_with_stage_spec_accumulates_staged_change() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({"id": "b1"}));
        let request = ExecuteRequest::new("asi.stage_booking_create", serde_json::json!({}), handler)
            .with_stage(StageSpec {
                change_type: ChangeType::Create,
                entity_type: "booking".to_string(),
                entity_id: Some("b1".to_string()),
                payload: serde_json::json!({"id": "b1"}),
            });
        let result = sandbox.execute(None, request);
        let staged = sandbox.get_staged_changes(result.sandbox_id);
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].entity_id.as_deref(), Some("b1"));
    }

    #[test]
    fn rollback_discards_staged_changes() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({}));
        let request = ExecuteRequest::new("tool", serde_json::json!({}), handler).with_stage(StageSpec {
            change_type: ChangeType::Update,
            entity_type: "booking".to_string(),
            entity_id: None,
            payload: serde_json::json!({}),
        });
        let result = sandbox.execute(None, request);
        sandbox.rollback_changes(result.sandbox_id);
        assert!(sandbox.get_staged_changes(result.sandbox_id).is_empty());
    }

    #[test]
    fn commit_changes_returns_and_clears_ledger() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({}));
        let request = ExecuteRequest::new("tool", serde_json::json!({}), handler).with_stage(StageSpec {
            change_type: ChangeType::Delete,
            entity_type: "booking".to_string(),
            entity_id: None,
            payload: serde_json::json!({}),
        });
        let result = sandbox.execute(None, request);
        let committed = sandbox.commit_changes(result.sandbox_id);
        assert_eq!(committed.len(), 1);
        assert!(sandbox.get_staged_changes(result.sandbox_id).is_empty());
    }

    #[test]
    fn cleanup_removes_artifacts_directory() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({}));
        let request = ExecuteRequest::new("tool", serde_json::json!({}), handler);
        let result = sandbox.execute(None, request);
        let dir = result.artifacts[0].clone();
        assert!(dir.exists());
        sandbox.cleanup(result.sandbox_id).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn reusing_sandbox_id_accumulates_across_calls() {
        let (sandbox, _tmp) = tmp_sandbox(IsolationKind::Passthrough);
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({}));
        let first = sandbox.execute(
            None,
            ExecuteRequest::new("tool", serde_json::json!({}), handler).with_stage(StageSpec {
                change_type: ChangeType::Create,
                entity_type: "e".to_string(),
                entity_id: None,
                payload: serde_json::json!({}),
            }),
        );
        let _second = sandbox.execute(
            Some(first.sandbox_id),
            ExecuteRequest::new("tool", serde_json::json!({}), handler).with_stage(StageSpec {
                change_type: ChangeType::Update,
                entity_type: "e".to_string(),
                entity_id: None,
                payload: serde_json::json!({}),
            }),
        );
        assert_eq!(sandbox.get_staged_changes(first.sandbox_id).len(), 2);
    }
}
