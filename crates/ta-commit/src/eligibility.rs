//! `verifyCommitEligibility` — the eight ordered gates from spec.md §4.F.
//! A second, independent barrier from the trust gate: every gate failure
//! returns a denial naming which gate failed, never an exception.

use uuid::Uuid;

use ta_policy::{ApprovalStatusLite, ReviewerVerdict, TrustLevel};

use crate::error::CommitError;
use crate::registry::CommitToolRegistry;

/// Read-only view of an approval request the commit boundary needs.
/// Deliberately richer than `ta_policy::ApprovalSnapshot` (it also needs
/// trust level, expiry, and an optional sandbox id) but still not
/// `ta-approval`'s own type, so this crate stays decoupled from the store.
#[derive(Debug, Clone)]
pub struct CommitApprovalSnapshot {
    pub action_type: String,
    pub trust_level: TrustLevel,
    pub status: ApprovalStatusLite,
    pub reviewer_verdict: Option<ReviewerVerdict>,
    pub is_expired: bool,
    pub sandbox_id: Option<Uuid>,
}

pub trait CommitApprovalQuery {
    fn requests_by_run_id(&self, run_id: &str) -> Result<Vec<CommitApprovalSnapshot>, CommitError>;
}

/// The narrow read capability the commit boundary needs from the
/// sandbox's staged-change ledger, for gate 8 (`apply_changes` only).
pub trait StagedChangeQuery {
    fn has_staged_changes(&self, sandbox_id: Uuid) -> bool;
}

#[derive(Debug, Clone)]
pub struct CommitDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub matched_trust_level: Option<TrustLevel>,
    pub matched_sandbox_id: Option<Uuid>,
}

impl CommitDecision {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(format!("fail-closed: {}", reason.into())),
            matched_trust_level: None,
            matched_sandbox_id: None,
        }
    }
}

pub fn verify_commit_eligibility(
    registry: &CommitToolRegistry,
    run_id: &str,
    tool_name: &str,
    approvals: &dyn CommitApprovalQuery,
    staged_changes: Option<&dyn StagedChangeQuery>,
) -> CommitDecision {
    // Gate 1: inputs non-empty and well-typed.
    if run_id.trim().is_empty() || tool_name.trim().is_empty() {
        return CommitDecision::deny("run_id and tool_name must be non-empty");
    }

    // Gate 2: tool is in the commit-tool registry.
    let Some(spec) = registry.get(tool_name) else {
        return CommitDecision::deny(format!("'{tool_name}' is not a commit tool"));
    };

    // Gate 3: approval store yields a request matching this run and tool.
    let requests = match approvals.requests_by_run_id(run_id) {
        Ok(r) => r,
        Err(e) => return CommitDecision::deny(format!("approval query failed: {e}")),
    };
    let Some(matched) = requests
        .iter()
        .find(|r| r.action_type == spec.action_type || r.action_type == spec.tool_name)
    else {
        return CommitDecision::deny("no matching approval request for this run and tool");
    };

    // Gate 4: request's trust level at or above the tool's minimum.
    if matched.trust_level < spec.min_trust_level {
        return CommitDecision::deny("approval request trust level below tool minimum");
    }

    // Gate 5: request status = APPROVED.
    if matched.status != ApprovalStatusLite::Approved {
        return CommitDecision::deny("approval request is not APPROVED");
    }

    // Gate 6: reviewer verdict = PASS.
    if matched.reviewer_verdict != Some(ReviewerVerdict::Pass) {
        return CommitDecision::deny("reviewer verdict is not PASS");
    }

    // Gate 7: request not expired.
    if matched.is_expired {
        return CommitDecision::deny("approval request has expired");
    }

    // Gate 8: apply_changes only — associated sandbox has staged changes.
    if spec.tool_name == "apply_changes" {
        let Some(sandbox_id) = matched.sandbox_id else {
            return CommitDecision::deny("apply_changes requires an associated sandbox id");
        };
        let Some(ledger) = staged_changes else {
            return CommitDecision::deny("apply_changes requires a staged-change ledger");
        };
        if !ledger.has_staged_changes(sandbox_id) {
            return CommitDecision::deny("apply_changes sandbox has no staged changes");
        }
    }

    CommitDecision {
        allowed: true,
        reason: None,
        matched_trust_level: Some(matched.trust_level),
        matched_sandbox_id: matched.sandbox_id,
    }
}
