// runner.rs — Runs a workflow against an input, per spec §4.I: validate,
// then drive each stage in order, threading the reviewer verdict and
// stage output forward, pausing for human approval where the tool
// router signals it's required.

use std::sync::Arc;
use std::time::Instant;

use ta_approval::ApprovalStore;
use ta_audit::{AuditAction, AuditEvent, AuditLog};
use ta_policy::{ReviewerVerdict, Stage, TrustLevel, WorkflowDefinition};

use crate::bare_action_type;
use crate::error::OrchestratorError;
use crate::run_result::{RunResult, RunStatus};
use crate::turn::{AgentTurnDriver, TurnContext};
use crate::verdict::parse_reviewer_verdict;

pub struct Runner {
    domain: String,
    audit: AuditLog,
    approvals: Option<Arc<ApprovalStore>>,
}

impl Runner {
    pub fn new(domain: impl Into<String>, audit: AuditLog) -> Self {
        Self {
            domain: domain.into(),
            audit,
            approvals: None,
        }
    }

    pub fn with_approval_store(mut self, store: Arc<ApprovalStore>) -> Self {
        self.approvals = Some(store);
        self
    }

    pub fn run_workflow(
        &self,
        workflow: &WorkflowDefinition,
        run_id: &str,
        requester: &str,
        initial_input: serde_json::Value,
        driver: &dyn AgentTurnDriver,
    ) -> RunResult {
        let started = Instant::now();

        if let Err(e) = workflow.validate() {
            let reason = OrchestratorError::WorkflowInvalid(e.to_string()).to_string();
            self.audit(workflow, run_id, TrustLevel::L4, Stage::Plan, AuditAction::Error, Some(&reason));
            return self.failed(run_id, started, reason, None);
        }

        let mut reviewer_verdict: Option<ReviewerVerdict> = None;
        let mut stage_input = initial_input;
        let mut last_stage = Stage::Plan;

        for stage in &workflow.stages {
            let stage = *stage;
            last_stage = stage;

            let Some(agent) = workflow.agent_for_stage(stage) else {
                let reason = OrchestratorError::MissingAgent(format!("{stage}")).to_string();
                self.audit(workflow, run_id, TrustLevel::L4, stage, AuditAction::Error, Some(&reason));
                return self.failed(run_id, started, reason, reviewer_verdict);
            };

            let outcome = driver.run_turn(TurnContext {
                run_id,
                agent_name: &agent.name,
                stage,
                input: &stage_input,
                reviewer_verdict,
                max_turns: agent.max_turns,
            });

            if let Some(error) = &outcome.error {
                self.audit(workflow, run_id, TrustLevel::L4, stage, AuditAction::Error, Some(error));
                return self.failed(run_id, started, error.clone(), reviewer_verdict);
            }

            if stage == Stage::Review {
                match parse_reviewer_verdict(&outcome.final_text) {
                    Some(ReviewerVerdict::Pass) => reviewer_verdict = Some(ReviewerVerdict::Pass),
                    Some(ReviewerVerdict::Fail) | None => {
                        let reason = "reviewer FAIL — commit blocked".to_string();
                        self.audit(workflow, run_id, TrustLevel::L4, stage, AuditAction::Error, Some(&reason));
                        return self.failed(run_id, started, reason, Some(ReviewerVerdict::Fail));
                    }
                }
            }

            if let Some(pending) = &outcome.pending_approval {
                let eligible_to_process = self.approvals.is_some() && stage == Stage::Commit;
                if !eligible_to_process {
                    self.audit(workflow, run_id, TrustLevel::L4, stage, AuditAction::Approval, Some("paused: requires human approval"));
                    return RunResult {
                        run_id: run_id.to_string(),
                        status: RunStatus::RequiresApproval,
                        final_result: Some(outcome.final_value.clone()),
                        event_count: 1,
                        duration: started.elapsed(),
                        approval_request_id: None,
                        reviewer_verdict,
                        failure_reason: None,
                    };
                }

                let store = self.approvals.as_ref().expect("checked above");
                let request = match store.create_request(
                    &self.domain,
                    run_id,
                    &workflow.name,
                    requester,
                    TrustLevel::L3,
                    bare_action_type(&pending.tool_name),
                    pending.action_payload.clone(),
                    serde_json::json!({ "sandbox_id": pending.sandbox_id }),
                    reviewer_verdict,
                    None,
                ) {
                    Ok(request) => request,
                    Err(e) => {
                        let reason = format!("fail-closed: could not create approval request: {e}");
                        self.audit(workflow, run_id, TrustLevel::L4, stage, AuditAction::Error, Some(&reason));
                        return self.failed(run_id, started, reason, reviewer_verdict);
                    }
                };

                let auto_approved = request.auto_approve_eligible
                    && reviewer_verdict == Some(ReviewerVerdict::Pass)
                    && matches!(store.auto_approve(request.id), Ok(Some(_)));

                if !auto_approved {
                    self.audit(workflow, run_id, TrustLevel::L4, stage, AuditAction::Approval, Some("paused: requires human approval"));
                    return RunResult {
                        run_id: run_id.to_string(),
                        status: RunStatus::RequiresApproval,
                        final_result: Some(outcome.final_value.clone()),
                        event_count: 1,
                        duration: started.elapsed(),
                        approval_request_id: Some(request.id),
                        reviewer_verdict,
                        failure_reason: None,
                    };
                }

                self.audit(workflow, run_id, TrustLevel::L3, stage, AuditAction::Approval, Some("auto-approved, continuing commit"));
            }

            stage_input = outcome.final_value;
        }

        self.audit(workflow, run_id, TrustLevel::L0, last_stage, AuditAction::ToolCall, None);
        RunResult {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
            final_result: Some(stage_input),
            event_count: workflow.stages.len(),
            duration: started.elapsed(),
            approval_request_id: None,
            reviewer_verdict,
            failure_reason: None,
        }
    }

    fn failed(
        &self,
        run_id: &str,
        started: Instant,
        reason: String,
        reviewer_verdict: Option<ReviewerVerdict>,
    ) -> RunResult {
        RunResult {
            run_id: run_id.to_string(),
            status: RunStatus::Failed,
            final_result: None,
            event_count: 1,
            duration: started.elapsed(),
            approval_request_id: None,
            reviewer_verdict,
            failure_reason: Some(reason),
        }
    }

    fn audit(
        &self,
        workflow: &WorkflowDefinition,
        run_id: &str,
        trust_level: TrustLevel,
        stage: Stage,
        action: AuditAction,
        detail: Option<&str>,
    ) {
        let mut event = AuditEvent::new(
            self.domain.clone(),
            workflow.name.clone(),
            "orchestrator",
            run_id,
            trust_level,
            stage,
            "run workflow",
            action,
        );
        if let Some(detail) = detail {
            event = match action {
                AuditAction::Error => event.with_error(detail),
                _ => event.with_summary(detail),
            };
        }
        if let Err(e) = event.validate() {
            tracing::warn!(error = %e, "orchestrator audit event failed validation, dropping");
            return;
        }
        if let Err(e) = self.audit.append(event) {
            tracing::warn!(error = %e, "orchestrator failed to append audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ta_policy::{AgentDefinition, AgentRole};

    fn workflow(stages: impl IntoIterator<Item = Stage>) -> WorkflowDefinition {
        WorkflowDefinition::new("booking_flow", "asi")
            .with_stages(stages)
            .with_agents([
                AgentDefinition::new("planner", AgentRole::Planner, "plan"),
                AgentDefinition::new("worker", AgentRole::Worker, "work"),
                AgentDefinition::new("reviewer", AgentRole::Reviewer, "review"),
            ])
    }

    fn runner() -> (Runner, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        (Runner::new("asi", audit), dir)
    }

    #[test]
    fn plan_execute_review_pass_completes() {
        let (runner, _dir) = runner();
        let wf = workflow([Stage::Plan, Stage::Execute, Stage::Review]);
        let driver = ScriptedTurnDriver::new()
            .with_stage(Stage::Plan, TurnOutcome::text("plan ready"))
            .with_stage(Stage::Execute, TurnOutcome::text("executed"))
            .with_stage(Stage::Review, TurnOutcome::text("VERDICT: PASS"));
        let result = runner.run_workflow(&wf, "run-1", "alice", serde_json::json!({}), &driver);
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.reviewer_verdict, Some(ReviewerVerdict::Pass));
    }

    #[test]
    fn reviewer_fail_blocks_commit() {
        let (runner, _dir) = runner();
        let wf = workflow([Stage::Plan, Stage::Review, Stage::Commit]);
        let driver = ScriptedTurnDriver::new()
            .with_stage(Stage::Plan, TurnOutcome::text("plan ready"))
            .with_stage(Stage::Review, TurnOutcome::text("VERDICT: FAIL, issues found"));
        let result = runner.run_workflow(&wf, "run-2", "alice", serde_json::json!({}), &driver);
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.failure_reason.unwrap().contains("reviewer FAIL"));
    }

    #[test]
    fn commit_with_no_preceding_review_is_rejected_at_validation() {
        let (runner, _dir) = runner();
        let wf = WorkflowDefinition::new("bad", "asi")
            .with_stages([Stage::Commit])
            .with_agents([AgentDefinition::new("worker", AgentRole::Worker, "work")]);
        let driver = ScriptedTurnDriver::new().with_stage(Stage::Commit, TurnOutcome::text("committing"));
        let result = runner.run_workflow(&wf, "run-3", "alice", serde_json::json!({}), &driver);
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.failure_reason.unwrap().contains("commit requires a preceding review"));
    }

    #[test]
    fn pending_approval_without_store_pauses() {
        let (runner, _dir) = runner();
        let wf = workflow([Stage::Plan, Stage::Review, Stage::Commit]);
        let driver = ScriptedTurnDriver::new()
            .with_stage(Stage::Plan, TurnOutcome::text("plan ready"))
            .with_stage(Stage::Review, TurnOutcome::text("VERDICT: PASS"))
            .with_stage(
                Stage::Commit,
                TurnOutcome::text("committing").with_pending_approval(crate::turn::PendingApproval {
                    tool_name: "asi.apply_changes".to_string(),
                    action_payload: serde_json::json!({}),
                    sandbox_id: None,
                }),
            );
        let result = runner.run_workflow(&wf, "run-4", "alice", serde_json::json!({}), &driver);
        assert_eq!(result.status, RunStatus::RequiresApproval);
        assert!(result.approval_request_id.is_none());
    }

    #[test]
    fn invalid_workflow_fails_without_running_any_stage() {
        let (runner, _dir) = runner();
        // commit with no preceding review violates the §3 invariant.
        let wf = WorkflowDefinition::new("bad", "asi")
            .with_stages([Stage::Commit])
            .with_agents([AgentDefinition::new("worker", AgentRole::Worker, "work")]);
        let driver = ScriptedTurnDriver::new();
        let result = runner.run_workflow(&wf, "run-5", "alice", serde_json::json!({}), &driver);
        assert_eq!(result.status, RunStatus::Failed);
    }
}
