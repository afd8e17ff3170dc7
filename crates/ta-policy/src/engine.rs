//! The trust gate: classifies a tool call into a trust level and decides
//! whether it may proceed, must be sandboxed, or needs approval.
//!
//! `evaluate` is synchronous and self-contained. `evaluate_with_approval`
//! additionally consults an [`ApprovalQuery`] — a narrow read-only
//! capability, not the full approval store — so this crate never depends
//! on `ta-approval` (see DESIGN.md's note on breaking the cyclic
//! approval-store / trust-gate / tool-router / commit-boundary reference
//! graph from the source).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::taxonomy::{Capability, ReviewerVerdict, Risk, Stage, TrustLevel};
use crate::tool::ToolDefinition;

/// Per-stage bound on trust level and allowed capabilities, plus
/// sandboxing and reviewer-approval requirements. Defaults match spec
/// §4.E; a domain config may override per stage.
#[derive(Debug, Clone)]
pub struct StagePolicy {
    pub max_trust_level: TrustLevel,
    pub allowed_capabilities: HashSet<Capability>,
    pub sandboxed: bool,
    pub requires_reviewer_approval: bool,
}

impl StagePolicy {
    fn new(
        max_trust_level: TrustLevel,
        allowed_capabilities: &[Capability],
        sandboxed: bool,
        requires_reviewer_approval: bool,
    ) -> Self {
        Self {
            max_trust_level,
            allowed_capabilities: allowed_capabilities.iter().copied().collect(),
            sandboxed,
            requires_reviewer_approval,
        }
    }

    fn defaults() -> HashMap<Stage, StagePolicy> {
        let mut m = HashMap::new();
        m.insert(
            Stage::Plan,
            StagePolicy::new(TrustLevel::L1, &[Capability::Read, Capability::Propose], false, false),
        );
        m.insert(
            Stage::Execute,
            StagePolicy::new(
                TrustLevel::L2,
                &[Capability::Read, Capability::Propose, Capability::Write],
                true,
                false,
            ),
        );
        m.insert(
            Stage::Review,
            StagePolicy::new(TrustLevel::L1, &[Capability::Read, Capability::Propose], false, false),
        );
        m.insert(
            Stage::Commit,
            StagePolicy::new(
                TrustLevel::L4,
                &[
                    Capability::Read,
                    Capability::Propose,
                    Capability::Write,
                    Capability::SideEffects,
                ],
                true,
                true,
            ),
        );
        m
    }
}

/// Domain-level configuration for the trust gate: per-stage policy
/// overrides, per-tool trust-level overrides, whether writes are
/// sandboxed by default, the approval threshold, and which tool names are
/// commit tools (owned by the commit boundary's registry; threaded in here
/// so the gate never depends on `ta-commit`).
#[derive(Debug, Clone)]
pub struct TrustGateConfig {
    pub stage_policies: HashMap<Stage, StagePolicy>,
    pub trust_level_overrides: HashMap<String, TrustLevel>,
    pub sandbox_writes: bool,
    pub approval_threshold: TrustLevel,
    pub commit_tool_names: HashSet<String>,
}

impl Default for TrustGateConfig {
    fn default() -> Self {
        Self {
            stage_policies: StagePolicy::defaults(),
            trust_level_overrides: HashMap::new(),
            sandbox_writes: true,
            approval_threshold: TrustLevel::L2,
            commit_tool_names: HashSet::new(),
        }
    }
}

/// Caller-supplied context for a single evaluation.
#[derive(Debug, Clone)]
pub struct EvaluateContext {
    pub agent_name: String,
    pub run_id: String,
    /// The reviewer verdict captured so far in this run, if any — threaded
    /// in by the orchestrator once the review stage has produced one.
    pub reviewer_verdict: Option<ReviewerVerdict>,
}

impl EvaluateContext {
    pub fn new(agent_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            run_id: run_id.into(),
            reviewer_verdict: None,
        }
    }

    pub fn with_reviewer_verdict(mut self, verdict: ReviewerVerdict) -> Self {
        self.reviewer_verdict = Some(verdict);
        self
    }

    fn validate(&self) -> Result<(), PolicyError> {
        crate::taxonomy::require_non_empty("context.agent_name", &self.agent_name)?;
        crate::taxonomy::require_non_empty("context.run_id", &self.run_id)?;
        Ok(())
    }
}

/// The gate's decision, carrying every flag the caller needs downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub requires_approval: bool,
    pub sandboxed: bool,
    pub trust_level: TrustLevel,
    pub auto_approve_eligible: bool,
    pub reason: Option<String>,
}

impl GateDecision {
    fn deny(trust_level: TrustLevel, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            requires_approval: false,
            sandboxed: false,
            trust_level,
            auto_approve_eligible: false,
            reason: Some(reason.into()),
        }
    }
}

/// One named step in an [`EvaluationTrace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStep {
    pub check: String,
    pub outcome: String,
    pub terminal: bool,
}

/// Full record of how a decision was reached — ambient decision
/// observability, not required by any gate consumer but useful for
/// compliance review and debugging fail-closed denials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub decision: GateDecision,
    pub steps: Vec<EvaluationStep>,
}

fn derive_trust_level(tool: &ToolDefinition, config: &TrustGateConfig) -> TrustLevel {
    if let Some(level) = config.trust_level_overrides.get(&tool.name) {
        return *level;
    }
    match (tool.risk, tool.capability) {
        (Risk::Critical, _) => TrustLevel::L4,
        (Risk::High, Capability::SideEffects) => TrustLevel::L3,
        (Risk::High, _) => TrustLevel::L2,
        (_, Capability::Write) => TrustLevel::L2,
        (_, Capability::Propose) => TrustLevel::L1,
        _ => TrustLevel::L0,
    }
}

/// Synchronous, self-contained evaluation — see spec §4.E for the
/// nine-step fail-closed algorithm this implements.
pub fn evaluate(
    tool: &ToolDefinition,
    stage: Stage,
    context: &EvaluateContext,
    config: &TrustGateConfig,
) -> GateDecision {
    evaluate_with_trace(tool, stage, context, config).decision
}

/// Same algorithm as [`evaluate`], additionally recording each step.
pub fn evaluate_with_trace(
    tool: &ToolDefinition,
    stage: Stage,
    context: &EvaluateContext,
    config: &TrustGateConfig,
) -> EvaluationTrace {
    let mut steps = Vec::new();

    // Step 1: validate tool definition, stage membership, context.
    if let Err(e) = tool.validate() {
        steps.push(EvaluationStep {
            check: "validate_tool".to_string(),
            outcome: e.to_string(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision::deny(TrustLevel::L4, e.to_string()),
            steps,
        };
    }
    let Some(stage_policy) = config.stage_policies.get(&stage) else {
        let reason = format!("fail-closed: no stage policy for {stage}");
        steps.push(EvaluationStep {
            check: "stage_membership".to_string(),
            outcome: reason.clone(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision::deny(TrustLevel::L4, reason),
            steps,
        };
    };
    if let Err(e) = context.validate() {
        steps.push(EvaluationStep {
            check: "validate_context".to_string(),
            outcome: e.to_string(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision::deny(TrustLevel::L4, e.to_string()),
            steps,
        };
    }
    steps.push(EvaluationStep {
        check: "validate_inputs".to_string(),
        outcome: "ok".to_string(),
        terminal: false,
    });

    // Step 2: trust level + commit-tool flag.
    let trust_level = derive_trust_level(tool, config);
    let is_commit_tool = config.commit_tool_names.contains(&tool.name);
    steps.push(EvaluationStep {
        check: "derive_trust_level".to_string(),
        outcome: format!("{trust_level} (commit_tool={is_commit_tool})"),
        terminal: false,
    });

    // Step 3: trust level vs stage maximum.
    if trust_level > stage_policy.max_trust_level {
        let reason = format!(
            "fail-closed: trust level {trust_level} exceeds {stage} maximum {}",
            stage_policy.max_trust_level
        );
        steps.push(EvaluationStep {
            check: "stage_trust_ceiling".to_string(),
            outcome: reason.clone(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision::deny(trust_level, reason),
            steps,
        };
    }

    // Step 4: capability allowed in this stage.
    if !stage_policy.allowed_capabilities.contains(&tool.capability) {
        let reason = format!(
            "fail-closed: capability {:?} not permitted in stage {stage}",
            tool.capability
        );
        steps.push(EvaluationStep {
            check: "stage_capability".to_string(),
            outcome: reason.clone(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision::deny(trust_level, reason),
            steps,
        };
    }

    // Step 5: sandboxed.
    let sandboxed = stage_policy.sandboxed
        || (config.sandbox_writes
            && matches!(tool.capability, Capability::Write | Capability::SideEffects))
        || tool.execution_mode == crate::taxonomy::ExecutionMode::SandboxOnly;

    // Step 6: requires approval.
    let requires_approval = trust_level > config.approval_threshold
        || stage_policy.requires_reviewer_approval
        || is_commit_tool;
    steps.push(EvaluationStep {
        check: "compute_flags".to_string(),
        outcome: format!("sandboxed={sandboxed} requires_approval={requires_approval}"),
        terminal: false,
    });

    // Step 7: L4 always denied pending human approval.
    if trust_level == TrustLevel::L4 {
        let reason = "fail-closed: L4 requires human approval".to_string();
        steps.push(EvaluationStep {
            check: "l4_gate".to_string(),
            outcome: reason.clone(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision {
                allowed: false,
                requires_approval: true,
                sandboxed: true,
                trust_level,
                auto_approve_eligible: false,
                reason: Some(reason),
            },
            steps,
        };
    }

    // Step 8: commit tools in the commit stage always need an approval check.
    if is_commit_tool && stage == Stage::Commit {
        let reason = "requires approval: commit tool in commit stage".to_string();
        steps.push(EvaluationStep {
            check: "commit_tool_gate".to_string(),
            outcome: reason.clone(),
            terminal: true,
        });
        return EvaluationTrace {
            decision: GateDecision {
                allowed: false,
                requires_approval: true,
                sandboxed,
                trust_level,
                auto_approve_eligible: false,
                reason: Some(reason),
            },
            steps,
        };
    }

    // Step 9: allow.
    steps.push(EvaluationStep {
        check: "allow".to_string(),
        outcome: "ok".to_string(),
        terminal: true,
    });
    EvaluationTrace {
        decision: GateDecision {
            allowed: true,
            requires_approval,
            sandboxed,
            trust_level,
            auto_approve_eligible: false,
            reason: None,
        },
        steps,
    }
}

/// Minimal, read-only view of an approval request that the trust gate
/// needs — deliberately not `ta-approval`'s own `ApprovalRequest`, so this
/// crate carries no dependency on the approval store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatusLite {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone)]
pub struct ApprovalSnapshot {
    pub action_type: String,
    pub status: ApprovalStatusLite,
    pub reviewer_verdict: Option<ReviewerVerdict>,
    pub auto_approve_eligible: bool,
}

/// The narrow read capability the trust gate needs from the approval
/// store. `ta-approval::ApprovalStore` implements this.
pub trait ApprovalQuery {
    fn requests_by_run_id(&self, run_id: &str) -> Result<Vec<ApprovalSnapshot>, PolicyError>;
}

/// `evaluate`, then — if approval is required and not already resolved —
/// consults `query` for the matching request. See spec §4.E for the
/// exact response mapping.
pub fn evaluate_with_approval(
    tool: &ToolDefinition,
    stage: Stage,
    context: &EvaluateContext,
    config: &TrustGateConfig,
    query: &dyn ApprovalQuery,
) -> GateDecision {
    let base = evaluate(tool, stage, context, config);
    if !base.requires_approval {
        return base;
    }

    let requests = match query.requests_by_run_id(&context.run_id) {
        Ok(r) => r,
        Err(e) => return GateDecision::deny(base.trust_level, format!("fail-closed: {e}")),
    };

    let Some(matching) = requests.iter().find(|r| r.action_type == tool.name) else {
        return GateDecision {
            requires_approval: true,
            ..GateDecision::deny(base.trust_level, "approval request required")
        };
    };

    match matching.status {
        ApprovalStatusLite::Approved => {
            let verdict_ok = matching.reviewer_verdict == Some(ReviewerVerdict::Pass);
            if !verdict_ok {
                return GateDecision {
                    requires_approval: true,
                    ..GateDecision::deny(base.trust_level, "approved but reviewer verdict is not PASS")
                };
            }
            GateDecision {
                allowed: true,
                requires_approval: false,
                sandboxed: base.sandboxed,
                trust_level: base.trust_level,
                auto_approve_eligible: matching.auto_approve_eligible,
                reason: None,
            }
        }
        ApprovalStatusLite::Pending => {
            let auto =
                matching.auto_approve_eligible && context.reviewer_verdict == Some(ReviewerVerdict::Pass);
            let reason = if auto {
                "awaiting human approval (auto-approve eligible)"
            } else {
                "awaiting human approval"
            };
            GateDecision {
                requires_approval: true,
                auto_approve_eligible: auto,
                ..GateDecision::deny(base.trust_level, reason)
            }
        }
        ApprovalStatusLite::Rejected => GateDecision {
            requires_approval: true,
            ..GateDecision::deny(base.trust_level, "approval request was REJECTED")
        },
        ApprovalStatusLite::Expired => GateDecision {
            requires_approval: true,
            ..GateDecision::deny(base.trust_level, "approval request EXPIRED")
        },
    }
}
