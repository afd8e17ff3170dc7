//! # ta-router
//!
//! The tool router: the single place every tool call passes through.
//! Validates the call, evaluates it against the trust gate, optionally
//! re-verifies commit tools against a narrow [`CommitBoundary`]
//! capability, then dispatches directly or through the sandbox. Every
//! outcome — allowed or denied — produces exactly one audit event.
//!
//! The router depends directly on the trust gate (`ta-policy`), the
//! audit log (`ta-audit`), and the sandbox (`ta-sandbox`). It does not
//! depend on `ta-approval` or `ta-commit`: approval lookups go through
//! `ta-policy`'s own [`ta_policy::ApprovalQuery`] trait, and commit
//! re-verification goes through [`CommitBoundary`], defined locally so a
//! concrete commit boundary can be wired in by a higher-level crate
//! without creating a cycle.

pub mod error;
pub mod router;

pub use error::RouterError;
pub use router::{CallOutcome, CallRequest, CommitBoundary, RouterHandler, ToolRouter};
