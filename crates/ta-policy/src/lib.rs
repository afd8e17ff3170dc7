//! # ta-policy
//!
//! Trust taxonomy and trust gate for the agent gateway.
//!
//! [`taxonomy`] defines the closed value types (trust level, capability,
//! risk, stage, ...) every component validates against. [`tool`] defines
//! the static schema a domain adapter registers. [`engine`] implements the
//! trust gate: `evaluate` classifies a tool call and decides whether it
//! may proceed, must be sandboxed, or needs approval, fail-closed at every
//! step.
//!
//! ## Quick Example
//!
//! ```rust
//! use ta_policy::{evaluate, EvaluateContext, ToolDefinition, TrustGateConfig};
//! use ta_policy::{Capability, ExecutionMode, Risk, Stage, Verification};
//!
//! let tool = ToolDefinition::new(
//!     "asi.get_bookings",
//!     "list bookings",
//!     Capability::Read,
//!     Risk::Low,
//!     ExecutionMode::Direct,
//!     Verification::None,
//! );
//! let ctx = EvaluateContext::new("planner-1", "run-1");
//! let decision = evaluate(&tool, Stage::Plan, &ctx, &TrustGateConfig::default());
//! assert!(decision.allowed);
//! ```

pub mod engine;
pub mod error;
pub mod taxonomy;
pub mod tool;

pub use engine::{
    evaluate, evaluate_with_approval, evaluate_with_trace, ApprovalQuery, ApprovalSnapshot,
    ApprovalStatusLite, EvaluateContext, EvaluationStep, EvaluationTrace, GateDecision, StagePolicy,
    TrustGateConfig,
};
pub use error::PolicyError;
pub use taxonomy::{
    AgentRole, Capability, ExecutionMode, ReviewerVerdict, Risk, Stage, TrustLevel, Verification,
};
pub use tool::{AgentDefinition, ToolDefinition, WorkflowDefinition};
