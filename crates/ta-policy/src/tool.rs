//! Tool, agent, and workflow definitions — the static schema a domain
//! adapter registers at startup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyError;
use crate::taxonomy::{AgentRole, Capability, ExecutionMode, Risk, Stage, Verification};

/// A single registrable tool. Immutable once registered; name convention
/// is `{domain}.{action}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub capability: Capability,
    pub risk: Risk,
    pub execution_mode: ExecutionMode,
    pub verification: Verification,
    /// Opaque JSON schema describing the handler's expected input shape.
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        capability: Capability,
        risk: Risk,
        execution_mode: ExecutionMode,
        verification: Verification,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capability,
            risk,
            execution_mode,
            verification,
            input_schema: Value::Object(Default::default()),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Validates the definition is well-formed: non-empty name and
    /// description, name follows the `{domain}.{action}` convention.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::FailClosed {
                field: "tool.name".to_string(),
            });
        }
        if self.description.trim().is_empty() {
            return Err(PolicyError::FailClosed {
                field: "tool.description".to_string(),
            });
        }
        if !self.name.contains('.') {
            return Err(PolicyError::FailClosed {
                field: "tool.name (expected {domain}.{action})".to_string(),
            });
        }
        Ok(())
    }

    /// The domain tag implied by this tool's name, e.g. `asi` for
    /// `asi.get_bookings`.
    pub fn domain(&self) -> Option<&str> {
        self.name.split('.').next()
    }
}

/// A registrable agent: its role, prompt, and the tools it may invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub role: AgentRole,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub max_turns: u32,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, role: AgentRole, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            system_prompt: system_prompt.into(),
            allowed_tools: Vec::new(),
            max_turns: 10,
        }
    }

    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.allowed_tools = tools.into_iter().collect();
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::FailClosed {
                field: "agent.name".to_string(),
            });
        }
        if self.max_turns == 0 {
            return Err(PolicyError::FailClosed {
                field: "agent.max_turns".to_string(),
            });
        }
        Ok(())
    }
}

/// An ordered sequence of stages with the agent set that may participate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub domain: String,
    pub stages: Vec<Stage>,
    pub agents: Vec<AgentDefinition>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            stages: Vec::new(),
            agents: Vec::new(),
        }
    }

    pub fn with_stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages = stages.into_iter().collect();
        self
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentDefinition>) -> Self {
        self.agents = agents.into_iter().collect();
        self
    }

    pub fn agent_for_stage(&self, stage: Stage) -> Option<&AgentDefinition> {
        let role = AgentRole::required_for(stage);
        self.agents.iter().find(|a| a.role == role)
    }

    /// Validates the §3 workflow invariants: if `commit` is present,
    /// `review` is present and precedes it; every stage has an agent whose
    /// role matches.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::FailClosed {
                field: "workflow.name".to_string(),
            });
        }
        if self.stages.is_empty() {
            return Err(PolicyError::FailClosed {
                field: "workflow.stages".to_string(),
            });
        }

        let commit_idx = self.stages.iter().position(|s| *s == Stage::Commit);
        let review_idx = self.stages.iter().position(|s| *s == Stage::Review);
        if let Some(commit_idx) = commit_idx {
            match review_idx {
                Some(review_idx) if review_idx < commit_idx => {}
                _ => {
                    return Err(PolicyError::FailClosed {
                        field: "workflow.stages (commit requires a preceding review)".to_string(),
                    })
                }
            }
        }

        for stage in &self.stages {
            if self.agent_for_stage(*stage).is_none() {
                return Err(PolicyError::FailClosed {
                    field: format!(
                        "workflow.agents (missing {:?} for stage {})",
                        AgentRole::required_for(*stage),
                        stage
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "desc",
            Capability::Read,
            Risk::Low,
            ExecutionMode::Direct,
            Verification::None,
        )
    }

    #[test]
    fn tool_domain_parses_prefix() {
        assert_eq!(tool("asi.get_bookings").domain(), Some("asi"));
    }

    #[test]
    fn tool_validate_rejects_missing_domain_prefix() {
        assert!(tool("get_bookings").validate().is_err());
    }

    #[test]
    fn tool_validate_rejects_empty_name() {
        assert!(tool("").validate().is_err());
    }

    #[test]
    fn workflow_requires_review_before_commit() {
        let wf = WorkflowDefinition::new("wf", "asi")
            .with_stages([Stage::Plan, Stage::Execute, Stage::Commit])
            .with_agents([
                AgentDefinition::new("planner", AgentRole::Planner, "p"),
                AgentDefinition::new("worker", AgentRole::Worker, "w"),
            ]);
        assert!(wf.validate().is_err());
    }

    #[test]
    fn workflow_with_review_before_commit_is_valid() {
        let wf = WorkflowDefinition::new("wf", "asi")
            .with_stages([Stage::Plan, Stage::Execute, Stage::Review, Stage::Commit])
            .with_agents([
                AgentDefinition::new("planner", AgentRole::Planner, "p"),
                AgentDefinition::new("worker", AgentRole::Worker, "w"),
                AgentDefinition::new("reviewer", AgentRole::Reviewer, "r"),
            ]);
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn workflow_missing_agent_for_stage_fails() {
        let wf = WorkflowDefinition::new("wf", "asi")
            .with_stages([Stage::Plan])
            .with_agents([AgentDefinition::new("worker", AgentRole::Worker, "w")]);
        assert!(wf.validate().is_err());
    }
}
