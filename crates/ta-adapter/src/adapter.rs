// adapter.rs — A domain adapter: a plug-in bundling tools, agents,
// workflows, partial config, and lifecycle hooks for one domain.

use ta_policy::{AgentDefinition, ToolDefinition, WorkflowDefinition};
use ta_router::RouterHandler;

use crate::types::{DomainIdentity, LifecycleHooks, PartialDomainConfig, ValidationOutcome};

/// A single tool entry: the static definition plus its handler.
pub struct ToolEntry {
    pub definition: ToolDefinition,
    pub handler: Box<RouterHandler>,
}

impl ToolEntry {
    pub fn new(definition: ToolDefinition, handler: Box<RouterHandler>) -> Self {
        Self { definition, handler }
    }
}

/// A plug-in supplying everything one domain contributes to the gateway.
#[derive(Default)]
pub struct DomainAdapter {
    pub identity: Option<DomainIdentity>,
    pub tools: Vec<ToolEntry>,
    pub agents: Vec<AgentDefinition>,
    pub workflows: Vec<WorkflowDefinition>,
    pub config: PartialDomainConfig,
    pub hooks: LifecycleHooks,
}

impl DomainAdapter {
    pub fn new(identity: DomainIdentity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    pub fn domain(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.domain.as_str())
    }

    pub fn with_tool(mut self, entry: ToolEntry) -> Self {
        self.tools.push(entry);
        self
    }

    pub fn with_agent(mut self, agent: AgentDefinition) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowDefinition) -> Self {
        self.workflows.push(workflow);
        self
    }

    pub fn with_config(mut self, config: PartialDomainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validates the adapter per spec §4.H: tool names are domain-prefixed,
    /// agent tool references exist, workflow domains match, and every
    /// workflow satisfies the §3 stage/review invariants (delegated to
    /// [`WorkflowDefinition::validate`]).
    pub fn validate(&self) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        let Some(identity) = &self.identity else {
            outcome.push_error("fail-closed: adapter has no identity");
            return outcome;
        };
        if identity.domain.trim().is_empty() {
            outcome.push_error("fail-closed: adapter.domain is empty");
        }

        for entry in &self.tools {
            if let Err(e) = entry.definition.validate() {
                outcome.push_error(format!("tool '{}': {e}", entry.definition.name));
                continue;
            }
            match entry.definition.domain() {
                Some(domain) if domain == identity.domain => {}
                _ => outcome.push_error(format!(
                    "fail-closed: tool '{}' is not prefixed with '{}.'",
                    entry.definition.name, identity.domain
                )),
            }
        }

        let known_tools: Vec<&str> = self.tools.iter().map(|t| t.definition.name.as_str()).collect();
        for agent in &self.agents {
            if let Err(e) = agent.validate() {
                outcome.push_error(format!("agent '{}': {e}", agent.name));
            }
            for tool_ref in &agent.allowed_tools {
                if !known_tools.contains(&tool_ref.as_str()) {
                    outcome.push_warning(format!(
                        "agent '{}' allows tool '{tool_ref}', not found in this adapter's tool set",
                        agent.name
                    ));
                }
            }
        }

        for workflow in &self.workflows {
            if workflow.domain != identity.domain {
                outcome.push_error(format!(
                    "fail-closed: workflow '{}' domain '{}' does not match adapter domain '{}'",
                    workflow.name, workflow.domain, identity.domain
                ));
            }
            if let Err(e) = workflow.validate() {
                outcome.push_error(format!("workflow '{}': {e}", workflow.name));
            }
        }

        outcome
    }
}
