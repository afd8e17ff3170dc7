//! Approval request/decision types. Field sets mirror spec.md §6's
//! `approval_requests`/`approval_decisions` tables bit-exactly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ta_policy::{ReviewerVerdict, TrustLevel};

/// Action types that can never be auto-approved, regardless of trust
/// level or reviewer verdict.
pub const AUTO_APPROVE_DENY_SET: &[&str] = &[
    "send_invoice",
    "mark_checkpoint_complete",
    "billing_reconciliation",
    "compliance_audit_pack",
];

/// Action types eligible for auto-approval once the other gates pass.
pub const AUTO_APPROVE_ALLOW_SET: &[&str] = &[
    "post_alert",
    "publish_daily_brief",
    "apply_changes",
    "daily_ops_brief",
    "alert_triage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ApprovalStatus::Pending),
            "APPROVED" => Some(ApprovalStatus::Approved),
            "REJECTED" => Some(ApprovalStatus::Rejected),
            "EXPIRED" => Some(ApprovalStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    Approve,
    Reject,
}

impl DecisionKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DecisionKind::Approve => "APPROVE",
            DecisionKind::Reject => "REJECT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "APPROVE" => Some(DecisionKind::Approve),
            "REJECT" => Some(DecisionKind::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub domain: String,
    pub run_id: String,
    pub workflow: String,
    pub requester: String,
    pub trust_level: TrustLevel,
    pub action_type: String,
    pub action_payload: serde_json::Value,
    pub status: ApprovalStatus,
    pub expires_at: DateTime<Utc>,
    pub context: serde_json::Value,
    pub reviewer_verdict: Option<ReviewerVerdict>,
    pub reviewer_notes: Option<String>,
    pub auto_approve_eligible: bool,
    pub auto_approve_reason: Option<String>,
}

impl ApprovalRequest {
    /// Expiry defaults per spec.md §4.C: 3600s for L3, 86400s for L4.
    /// Requests created below L3 (unusual, but not excluded by the spec)
    /// inherit the L3 window.
    pub fn default_ttl(trust_level: TrustLevel) -> Duration {
        if trust_level == TrustLevel::L4 {
            Duration::seconds(86_400)
        } else {
            Duration::seconds(3_600)
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Computes auto-approve eligibility per spec.md §4.C's ordered rules.
    pub fn compute_auto_approve_eligible(
        trust_level: TrustLevel,
        reviewer_verdict: Option<ReviewerVerdict>,
        action_type: &str,
        workflow: &str,
    ) -> bool {
        if trust_level == TrustLevel::L4 {
            return false;
        }
        if reviewer_verdict != Some(ReviewerVerdict::Pass) {
            return false;
        }
        if AUTO_APPROVE_DENY_SET.contains(&action_type) || AUTO_APPROVE_DENY_SET.contains(&workflow) {
            return false;
        }
        if AUTO_APPROVE_ALLOW_SET.contains(&action_type) || AUTO_APPROVE_ALLOW_SET.contains(&workflow) {
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub approval_request_id: Uuid,
    pub decided_by: String,
    pub decision: DecisionKind,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
}

/// The system identity recorded as `decided_by` for auto-approvals.
pub const AUTO_APPROVE_ACTOR: &str = "system:auto-approve";

/// Filter for `get_pending_requests`.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub domain: Option<String>,
    pub run_id: Option<String>,
    pub workflow: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l4_is_never_auto_approve_eligible() {
        assert!(!ApprovalRequest::compute_auto_approve_eligible(
            TrustLevel::L4,
            Some(ReviewerVerdict::Pass),
            "apply_changes",
            "daily_ops_brief",
        ));
    }

    #[test]
    fn deny_set_wins_over_allow_set_membership_elsewhere() {
        assert!(!ApprovalRequest::compute_auto_approve_eligible(
            TrustLevel::L3,
            Some(ReviewerVerdict::Pass),
            "send_invoice",
            "daily_ops_brief",
        ));
    }

    #[test]
    fn allow_set_action_type_is_eligible() {
        assert!(ApprovalRequest::compute_auto_approve_eligible(
            TrustLevel::L3,
            Some(ReviewerVerdict::Pass),
            "apply_changes",
            "unrelated_workflow",
        ));
    }

    #[test]
    fn non_pass_verdict_is_never_eligible() {
        assert!(!ApprovalRequest::compute_auto_approve_eligible(
            TrustLevel::L3,
            Some(ReviewerVerdict::Fail),
            "apply_changes",
            "daily_ops_brief",
        ));
    }

    #[test]
    fn unknown_action_defaults_to_ineligible() {
        assert!(!ApprovalRequest::compute_auto_approve_eligible(
            TrustLevel::L3,
            Some(ReviewerVerdict::Pass),
            "some_other_action",
            "some_other_workflow",
        ));
    }

    #[test]
    fn default_ttl_matches_spec_windows() {
        assert_eq!(
            ApprovalRequest::default_ttl(TrustLevel::L3),
            Duration::seconds(3_600)
        );
        assert_eq!(
            ApprovalRequest::default_ttl(TrustLevel::L4),
            Duration::seconds(86_400)
        );
    }
}
