//! Core value types shared by every component: trust levels, capabilities,
//! risk, execution mode, verification, workflow stage, and agent role.
//!
//! Every cross-component boundary validates its inputs against these types
//! and rejects on any missing or malformed field with an explicit
//! `"fail-closed: <field>"` error. Enumerations are closed — an unknown
//! value on the wire is a deserialization error, never silently coerced.

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Ordinal oversight level, L0 (full autonomy) through L4 (irreversible,
/// always requires human approval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrustLevel {
    L0,
    L1,
    L2,
    L3,
    L4,
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrustLevel::L0 => "L0",
            TrustLevel::L1 => "L1",
            TrustLevel::L2 => "L2",
            TrustLevel::L3 => "L3",
            TrustLevel::L4 => "L4",
        };
        f.write_str(s)
    }
}

/// What a tool call may do to the host application's data or services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    Read,
    Propose,
    Write,
    SideEffects,
}

/// Declared risk of a tool, independent of the capability it exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Low,
    Medium,
    High,
    Critical,
}

/// Whether a tool may run directly or must always go through the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    Direct,
    SandboxOnly,
}

/// What kind of verification a tool's result is subject to before it is
/// trusted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verification {
    None,
    Rules,
    MultiAgent,
    HumanApproval,
}

/// Position within a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Execute,
    Review,
    Commit,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Plan => "plan",
            Stage::Execute => "execute",
            Stage::Review => "review",
            Stage::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Role an agent plays within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Worker,
    Reviewer,
}

impl AgentRole {
    /// Role required at a given stage (`plan` → planner, `execute`|`commit`
    /// → worker, `review` → reviewer).
    pub fn required_for(stage: Stage) -> AgentRole {
        match stage {
            Stage::Plan => AgentRole::Planner,
            Stage::Execute | Stage::Commit => AgentRole::Worker,
            Stage::Review => AgentRole::Reviewer,
        }
    }
}

/// PASS/FAIL verdict produced by the reviewer agent in the review stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewerVerdict {
    Pass,
    Fail,
}

/// Rejects an empty or whitespace-only string field, fail-closed.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), PolicyError> {
    if value.trim().is_empty() {
        return Err(PolicyError::FailClosed {
            field: field.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_levels_order_total() {
        assert!(TrustLevel::L0 < TrustLevel::L1);
        assert!(TrustLevel::L1 < TrustLevel::L2);
        assert!(TrustLevel::L2 < TrustLevel::L3);
        assert!(TrustLevel::L3 < TrustLevel::L4);
    }

    #[test]
    fn agent_role_required_for_stage() {
        assert_eq!(AgentRole::required_for(Stage::Plan), AgentRole::Planner);
        assert_eq!(AgentRole::required_for(Stage::Execute), AgentRole::Worker);
        assert_eq!(AgentRole::required_for(Stage::Commit), AgentRole::Worker);
        assert_eq!(AgentRole::required_for(Stage::Review), AgentRole::Reviewer);
    }

    #[test]
    fn serde_trust_level_is_uppercase() {
        let json = serde_json::to_string(&TrustLevel::L3).unwrap();
        assert_eq!(json, "\"L3\"");
    }

    #[test]
    fn serde_rejects_unknown_stage() {
        let result: Result<Stage, _> = serde_json::from_str("\"bogus\"");
        assert!(result.is_err());
    }

    #[test]
    fn require_non_empty_rejects_blank() {
        let err = require_non_empty("agent_id", "   ").unwrap_err();
        assert!(matches!(err, PolicyError::FailClosed { field } if field == "agent_id"));
    }
}
