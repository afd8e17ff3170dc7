// commit_boundary.rs — Bridges ta-commit's eligibility check to the
// ta_router::CommitBoundary capability the router re-verifies commit
// tools against. This is the composition point spec §9 anticipates: the
// router never depends on ta-commit, so something above both wires them
// together.

use std::sync::Arc;

use ta_approval::ApprovalStore;
use ta_commit::{
    verify_commit_eligibility, CommitApprovalQuery, CommitApprovalSnapshot, CommitError, CommitToolRegistry,
    StagedChangeQuery,
};
use ta_policy::ApprovalStatusLite;
use ta_router::CommitBoundary;

/// Adapts `ta_approval::ApprovalStore` to the narrow `CommitApprovalQuery`
/// capability the commit boundary needs — kept here rather than on
/// `ApprovalStore` itself so `ta-approval` stays free of a `ta-commit`
/// dependency.
pub struct ApprovalStoreCommitQuery(pub Arc<ApprovalStore>);

impl CommitApprovalQuery for ApprovalStoreCommitQuery {
    fn requests_by_run_id(&self, run_id: &str) -> Result<Vec<CommitApprovalSnapshot>, CommitError> {
        let requests = self
            .0
            .get_requests_by_run_id(run_id)
            .map_err(|e| CommitError::ApprovalQueryFailed(e.to_string()))?;
        Ok(requests
            .into_iter()
            .map(|r| CommitApprovalSnapshot {
                action_type: r.action_type,
                trust_level: r.trust_level,
                status: match r.status {
                    ta_approval::ApprovalStatus::Pending => ApprovalStatusLite::Pending,
                    ta_approval::ApprovalStatus::Approved => ApprovalStatusLite::Approved,
                    ta_approval::ApprovalStatus::Rejected => ApprovalStatusLite::Rejected,
                    ta_approval::ApprovalStatus::Expired => ApprovalStatusLite::Expired,
                },
                reviewer_verdict: r.reviewer_verdict,
                is_expired: r.is_expired(chrono::Utc::now()),
                sandbox_id: r
                    .context
                    .get("sandbox_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| uuid::Uuid::parse_str(s).ok()),
            })
            .collect())
    }
}

pub struct OrchestratorCommitBoundary {
    registry: CommitToolRegistry,
    approvals: Arc<dyn CommitApprovalQuery + Send + Sync>,
    staged_changes: Option<Arc<dyn StagedChangeQuery + Send + Sync>>,
}

impl OrchestratorCommitBoundary {
    pub fn new(
        registry: CommitToolRegistry,
        approvals: Arc<dyn CommitApprovalQuery + Send + Sync>,
        staged_changes: Option<Arc<dyn StagedChangeQuery + Send + Sync>>,
    ) -> Self {
        Self {
            registry,
            approvals,
            staged_changes,
        }
    }
}

impl CommitBoundary for OrchestratorCommitBoundary {
    fn verify_commit_eligibility(&self, run_id: &str, tool_name: &str) -> bool {
        let action_type = crate::bare_action_type(tool_name);
        let staged: Option<&dyn StagedChangeQuery> = self.staged_changes.as_deref();
        verify_commit_eligibility(&self.registry, run_id, action_type, self.approvals.as_ref(), staged).allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ta_commit::CommitApprovalSnapshot;
    use ta_policy::{ApprovalStatusLite, ReviewerVerdict, TrustLevel};

    struct AlwaysApproved;
    impl CommitApprovalQuery for AlwaysApproved {
        fn requests_by_run_id(&self, _run_id: &str) -> Result<Vec<CommitApprovalSnapshot>, ta_commit::CommitError> {
            Ok(vec![CommitApprovalSnapshot {
                action_type: "post_alert".to_string(),
                trust_level: TrustLevel::L3,
                status: ApprovalStatusLite::Approved,
                reviewer_verdict: Some(ReviewerVerdict::Pass),
                is_expired: false,
                sandbox_id: None,
            }])
        }
    }

    #[test]
    fn strips_domain_prefix_before_delegating() {
        let boundary = OrchestratorCommitBoundary::new(CommitToolRegistry::defaults(), Arc::new(AlwaysApproved), None);
        assert!(boundary.verify_commit_eligibility("run-1", "asi.post_alert"));
        assert!(!boundary.verify_commit_eligibility("run-1", "asi.send_invoice"));
    }
}
