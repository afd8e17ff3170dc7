//! # ta-approval
//!
//! Relational approval store: create requests, record decisions, and
//! compute auto-approval eligibility per spec.md §4.C. Implements
//! [`ta_policy::ApprovalQuery`] so the trust gate can consult live
//! approval state without depending on this crate's own types.
//!
//! ## Quick Example
//!
//! ```rust
//! use ta_approval::ApprovalStore;
//! use ta_policy::{ReviewerVerdict, TrustLevel};
//!
//! let store = ApprovalStore::in_memory().unwrap();
//! let request = store
//!     .create_request(
//!         "asi", "run-1", "booking_flow", "agent-1", TrustLevel::L3,
//!         "apply_changes", serde_json::json!({}), serde_json::json!({}),
//!         Some(ReviewerVerdict::Pass), None,
//!     )
//!     .unwrap();
//! let decision = store.auto_approve(request.id).unwrap();
//! assert!(decision.is_some());
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::ApprovalError;
pub use store::ApprovalStore;
pub use types::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, DecisionKind, PendingFilter,
    AUTO_APPROVE_ACTOR, AUTO_APPROVE_ALLOW_SET, AUTO_APPROVE_DENY_SET,
};
