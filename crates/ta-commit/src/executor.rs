//! `executeCommit` — verifies eligibility then dispatches to the
//! action-specific handler. Exactly one audit event is produced per
//! execution, success or failure.

use std::collections::HashMap;

use uuid::Uuid;

use ta_audit::{AuditAction, AuditEvent, AuditLog};
use ta_policy::{Stage, TrustLevel};

use crate::eligibility::{verify_commit_eligibility, CommitApprovalQuery, StagedChangeQuery};
use crate::error::CommitError;
use crate::registry::CommitToolRegistry;

/// What an action-specific handler returns on success.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub changes_applied: u64,
    pub detail: Option<serde_json::Value>,
}

impl CommitOutcome {
    pub fn new(changes_applied: u64) -> Self {
        Self {
            changes_applied,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// A single commit tool's materialization logic. Implementations must be
/// idempotent per commit id — the executor generates a fresh commit id
/// for every `executeCommit` call and hands it to the handler.
pub trait CommitHandler: Send + Sync {
    fn handle(&self, commit_id: Uuid, args: &serde_json::Value) -> Result<CommitOutcome, String>;
}

#[derive(Debug, Clone)]
pub struct CommitExecutionResult {
    pub success: bool,
    pub commit_id: Uuid,
    pub tool_name: String,
    pub reason: Option<String>,
    pub changes_applied: u64,
}

/// Audit-context fields threaded through to the single audit event this
/// execution emits.
pub struct CommitAuditContext<'a> {
    pub domain: &'a str,
    pub workflow: &'a str,
    pub agent: &'a str,
    pub run_id: &'a str,
    pub trust_level: TrustLevel,
    pub intent: &'a str,
}

pub struct CommitExecutor {
    registry: CommitToolRegistry,
    handlers: HashMap<String, Box<dyn CommitHandler>>,
    audit: AuditLog,
}

impl CommitExecutor {
    pub fn new(registry: CommitToolRegistry, audit: AuditLog) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
            audit,
        }
    }

    pub fn register_handler(&mut self, tool_name: impl Into<String>, handler: Box<dyn CommitHandler>) {
        self.handlers.insert(tool_name.into(), handler);
    }

    pub fn execute_commit(
        &self,
        tool_name: &str,
        args: &serde_json::Value,
        context: &CommitAuditContext<'_>,
        approvals: &dyn CommitApprovalQuery,
        staged_changes: Option<&dyn StagedChangeQuery>,
    ) -> CommitExecutionResult {
        let commit_id = Uuid::new_v4();

        let decision = verify_commit_eligibility(
            &self.registry,
            context.run_id,
            tool_name,
            approvals,
            staged_changes,
        );

        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "fail-closed: denied".to_string());
            self.emit(context, tool_name, commit_id, false, Some(reason.clone()), 0);
            return CommitExecutionResult {
                success: false,
                commit_id,
                tool_name: tool_name.to_string(),
                reason: Some(reason),
                changes_applied: 0,
            };
        }

        let Some(handler) = self.handlers.get(tool_name) else {
            let reason = CommitError::NoHandler(tool_name.to_string()).to_string();
            self.emit(context, tool_name, commit_id, false, Some(reason.clone()), 0);
            return CommitExecutionResult {
                success: false,
                commit_id,
                tool_name: tool_name.to_string(),
                reason: Some(reason),
                changes_applied: 0,
            };
        };

        match handler.handle(commit_id, args) {
            Ok(outcome) => {
                self.emit(context, tool_name, commit_id, true, None, outcome.changes_applied);
                CommitExecutionResult {
                    success: true,
                    commit_id,
                    tool_name: tool_name.to_string(),
                    reason: None,
                    changes_applied: outcome.changes_applied,
                }
            }
            Err(error) => {
                self.emit(context, tool_name, commit_id, false, Some(error.clone()), 0);
                CommitExecutionResult {
                    success: false,
                    commit_id,
                    tool_name: tool_name.to_string(),
                    reason: Some(error),
                    changes_applied: 0,
                }
            }
        }
    }

    fn emit(
        &self,
        context: &CommitAuditContext<'_>,
        tool_name: &str,
        commit_id: Uuid,
        success: bool,
        error: Option<String>,
        changes_applied: u64,
    ) {
        let action = if success { AuditAction::Apply } else { AuditAction::Error };
        let mut event = AuditEvent::new(
            context.domain,
            context.workflow,
            context.agent,
            context.run_id,
            context.trust_level,
            Stage::Commit,
            context.intent,
            action,
        )
        .with_tool(tool_name)
        .with_metadata(serde_json::json!({
            "commit_id": commit_id,
            "changes_applied": changes_applied,
        }));

        if let Some(error) = error {
            event = event.with_error(error);
        }

        if let Err(e) = event.validate() {
            tracing::warn!(error = %e, "commit audit event failed validation, dropping");
            return;
        }
        self.audit.append(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::CommitApprovalSnapshot;
    use ta_policy::{ApprovalStatusLite, ReviewerVerdict};

    struct FakeApprovals(Vec<CommitApprovalSnapshot>);
    impl CommitApprovalQuery for FakeApprovals {
        fn requests_by_run_id(&self, _run_id: &str) -> Result<Vec<CommitApprovalSnapshot>, CommitError> {
            Ok(self.0.clone())
        }
    }

    struct EchoHandler;
    impl CommitHandler for EchoHandler {
        fn handle(&self, _commit_id: Uuid, _args: &serde_json::Value) -> Result<CommitOutcome, String> {
            Ok(CommitOutcome::new(1))
        }
    }

    struct FailingHandler;
    impl CommitHandler for FailingHandler {
        fn handle(&self, _commit_id: Uuid, _args: &serde_json::Value) -> Result<CommitOutcome, String> {
            Err("downstream service unavailable".to_string())
        }
    }

    fn approved_snapshot(action_type: &str, trust_level: TrustLevel) -> CommitApprovalSnapshot {
        CommitApprovalSnapshot {
            action_type: action_type.to_string(),
            trust_level,
            status: ApprovalStatusLite::Approved,
            reviewer_verdict: Some(ReviewerVerdict::Pass),
            is_expired: false,
            sandbox_id: None,
        }
    }

    fn executor() -> (CommitExecutor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        let mut executor = CommitExecutor::new(CommitToolRegistry::defaults(), audit);
        executor.register_handler("post_alert", Box::new(EchoHandler));
        executor.register_handler("send_invoice", Box::new(FailingHandler));
        (executor, dir)
    }

    #[test]
    fn successful_commit_applies_changes_and_audits() {
        let (executor, _dir) = executor();
        let approvals = FakeApprovals(vec![approved_snapshot("post_alert", TrustLevel::L3)]);
        let context = CommitAuditContext {
            domain: "asi",
            workflow: "booking_flow",
            agent: "agent-1",
            run_id: "run-1",
            trust_level: TrustLevel::L3,
            intent: "post the daily alert",
        };
        let result = executor.execute_commit(
            "post_alert",
            &serde_json::json!({}),
            &context,
            &approvals,
            None,
        );
        assert!(result.success);
        assert_eq!(result.changes_applied, 1);
    }

    #[test]
    fn ineligible_commit_is_denied_without_invoking_handler() {
        let (executor, _dir) = executor();
        let approvals = FakeApprovals(vec![]);
        let context = CommitAuditContext {
            domain: "asi",
            workflow: "booking_flow",
            agent: "agent-1",
            run_id: "run-1",
            trust_level: TrustLevel::L3,
            intent: "post the daily alert",
        };
        let result = executor.execute_commit(
            "post_alert",
            &serde_json::json!({}),
            &context,
            &approvals,
            None,
        );
        assert!(!result.success);
        assert!(result.reason.unwrap().starts_with("fail-closed:"));
    }

    #[test]
    fn handler_failure_surfaces_as_unsuccessful_result() {
        let (executor, _dir) = executor();
        let approvals = FakeApprovals(vec![approved_snapshot("send_invoice", TrustLevel::L4)]);
        let context = CommitAuditContext {
            domain: "asi",
            workflow: "billing",
            agent: "agent-1",
            run_id: "run-1",
            trust_level: TrustLevel::L4,
            intent: "send the invoice",
        };
        let result = executor.execute_commit(
            "send_invoice",
            &serde_json::json!({}),
            &context,
            &approvals,
            None,
        );
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("downstream service unavailable"));
    }

    #[test]
    fn missing_handler_is_denied() {
        let (executor, _dir) = executor();
        let approvals = FakeApprovals(vec![approved_snapshot("publish_daily_brief", TrustLevel::L3)]);
        let context = CommitAuditContext {
            domain: "asi",
            workflow: "ops",
            agent: "agent-1",
            run_id: "run-1",
            trust_level: TrustLevel::L3,
            intent: "publish the brief",
        };
        let result = executor.execute_commit(
            "publish_daily_brief",
            &serde_json::json!({}),
            &context,
            &approvals,
            None,
        );
        assert!(!result.success);
    }
}
