//! # ta-commit
//!
//! The sole legitimate path from an agent to production mutation. Owns
//! the fixed five-tool commit registry, the eight-gate eligibility check,
//! and dispatch to idempotent, audited action handlers.

pub mod eligibility;
pub mod error;
pub mod executor;
pub mod registry;

pub use eligibility::{
    verify_commit_eligibility, CommitApprovalQuery, CommitApprovalSnapshot, CommitDecision,
    StagedChangeQuery,
};
pub use error::CommitError;
pub use executor::{CommitAuditContext, CommitExecutionResult, CommitExecutor, CommitHandler, CommitOutcome};
pub use registry::{CommitToolRegistry, CommitToolSpec};
