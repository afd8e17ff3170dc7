//! Cross-crate end-to-end scenarios from spec §8 that don't fit cleanly
//! inside a single crate's own test module: a read tool dispatched
//! through the router, and a commit-stage workflow run through the
//! orchestrator with both a passing and a failing reviewer verdict.

use std::collections::HashSet;
use std::sync::Arc;

use ta_approval::ApprovalStore;
use ta_audit::AuditLog;
use ta_orchestrator::{PendingApproval, Runner, RunStatus, ScriptedTurnDriver, TurnOutcome};
use ta_policy::{
    AgentDefinition, AgentRole, Capability, ExecutionMode, ReviewerVerdict, Risk, Stage, ToolDefinition, TrustGateConfig,
    TrustLevel, Verification, WorkflowDefinition,
};
use ta_router::{CallRequest, ToolRouter};

fn workflow() -> WorkflowDefinition {
    WorkflowDefinition::new("ops_alert_flow", "asi")
        .with_stages([Stage::Plan, Stage::Execute, Stage::Review, Stage::Commit])
        .with_agents([
            AgentDefinition::new("planner", AgentRole::Planner, "plan the alert"),
            AgentDefinition::new("worker", AgentRole::Worker, "draft and post the alert"),
            AgentDefinition::new("reviewer", AgentRole::Reviewer, "review the alert before posting"),
        ])
}

/// Scenario 1: an L0 read tool in the plan stage always succeeds, is
/// never sandboxed, and produces exactly one audit event.
#[test]
fn scenario_1_l0_read_in_plan_stage_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::open(dir.path().join("router.jsonl")).unwrap();
    let mut router = ToolRouter::new(TrustGateConfig::default(), audit);
    router
        .register(
            ToolDefinition::new(
                "asi.get_bookings",
                "list current bookings",
                Capability::Read,
                Risk::Low,
                ExecutionMode::Direct,
                Verification::None,
            ),
            Box::new(|_input| Ok(serde_json::json!({"bookings": []}))),
        )
        .unwrap();

    let outcome = router.call(CallRequest {
        tool_name: "asi.get_bookings".to_string(),
        stage: Stage::Plan,
        domain: "asi".to_string(),
        workflow: "ops_alert_flow".to_string(),
        intent: "check current bookings".to_string(),
        context: ta_policy::EvaluateContext::new("planner", "run-scenario-1"),
        input: serde_json::json!({}),
        requested_env: vec![],
    });

    assert!(outcome.success);
    assert!(!outcome.denied);
    assert!(!outcome.sandboxed);
    assert!(!outcome.requires_approval);
    assert_eq!(outcome.trust_level, TrustLevel::L0);
}

/// Scenario 3: an L3 commit with a reviewer PASS and an auto-approve
/// eligible action pauses once to create the approval request, is
/// auto-approved, and the workflow completes.
#[test]
fn scenario_3_reviewer_pass_auto_approves_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::open(dir.path().join("orchestrator.jsonl")).unwrap();
    let approvals = Arc::new(ApprovalStore::in_memory().unwrap());
    let runner = Runner::new("asi", audit).with_approval_store(approvals.clone());

    let driver = ScriptedTurnDriver::new()
        .with_stage(Stage::Plan, TurnOutcome::text("plan: check latency dashboards"))
        .with_stage(Stage::Execute, TurnOutcome::text("executed: alert drafted"))
        .with_stage(Stage::Review, TurnOutcome::text("VERDICT: PASS — alert text is accurate"))
        .with_stage(
            Stage::Commit,
            TurnOutcome::text("committing alert").with_pending_approval(PendingApproval {
                tool_name: "asi.post_alert".to_string(),
                action_payload: serde_json::json!({"message": "latency spike detected"}),
                sandbox_id: None,
            }),
        );

    let result = runner.run_workflow(&workflow(), "run-scenario-3", "worker", serde_json::json!({}), &driver);

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.reviewer_verdict, Some(ReviewerVerdict::Pass));

    let requests = approvals.get_requests_by_run_id("run-scenario-3").unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, ta_approval::ApprovalStatus::Approved);
}

/// Scenario 4: a reviewer FAIL blocks the workflow before it ever
/// reaches the commit stage, and no approval request is created.
#[test]
fn scenario_4_reviewer_fail_blocks_before_commit() {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::open(dir.path().join("orchestrator.jsonl")).unwrap();
    let approvals = Arc::new(ApprovalStore::in_memory().unwrap());
    let runner = Runner::new("asi", audit).with_approval_store(approvals.clone());

    let driver = ScriptedTurnDriver::new()
        .with_stage(Stage::Plan, TurnOutcome::text("plan: check latency dashboards"))
        .with_stage(Stage::Execute, TurnOutcome::text("executed: alert drafted"))
        .with_stage(Stage::Review, TurnOutcome::text("VERDICT: FAIL — alert text is inaccurate"))
        .with_stage(Stage::Commit, TurnOutcome::text("should never run"));

    let result = runner.run_workflow(&workflow(), "run-scenario-4", "worker", serde_json::json!({}), &driver);

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.reviewer_verdict, Some(ReviewerVerdict::Fail));
    assert!(result.failure_reason.unwrap().contains("reviewer FAIL"));

    let requests = approvals.get_requests_by_run_id("run-scenario-4").unwrap();
    assert!(requests.is_empty());
}

/// The router's commit-tool names are domain-specific config; confirm a
/// router with no approval query configured fails closed on a high-risk
/// tool rather than silently allowing it (spec §8's fail-closed invariant).
#[test]
fn unconfigured_high_risk_tool_denies_without_approval_query() {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::open(dir.path().join("router.jsonl")).unwrap();
    let mut config = TrustGateConfig::default();
    config.commit_tool_names = HashSet::from(["asi.post_alert".to_string()]);
    let mut router = ToolRouter::new(config, audit);
    router
        .register(
            ToolDefinition::new(
                "asi.post_alert",
                "post an operational alert",
                Capability::SideEffects,
                Risk::High,
                ExecutionMode::Direct,
                Verification::HumanApproval,
            ),
            Box::new(|_input| Ok(serde_json::json!({}))),
        )
        .unwrap();

    let outcome = router.call(CallRequest {
        tool_name: "asi.post_alert".to_string(),
        stage: Stage::Commit,
        domain: "asi".to_string(),
        workflow: "ops_alert_flow".to_string(),
        intent: "post the alert".to_string(),
        context: ta_policy::EvaluateContext::new("worker", "run-no-approval"),
        input: serde_json::json!({}),
        requested_env: vec![],
    });

    assert!(!outcome.success);
    assert!(outcome.denied || outcome.requires_approval);
}
