//! The tool router: registers `(ToolDefinition, Handler)` pairs and
//! dispatches calls through trust-gate evaluation, optional commit-
//! boundary re-verification, and direct-or-sandboxed invocation. Every
//! outcome produces exactly one audit event.

use std::collections::HashMap;
use std::sync::Arc;

use ta_audit::{AuditAction, AuditEvent, AuditLog};
use ta_policy::{evaluate, evaluate_with_approval, ApprovalQuery, EvaluateContext, Stage, ToolDefinition, TrustGateConfig, TrustLevel};
use ta_sandbox::{ExecuteRequest, Sandbox};

use crate::error::RouterError;

pub type RouterHandler = dyn Fn(&serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync;

/// The narrow capability the router needs from the commit boundary: a
/// second independent eligibility barrier for commit-tool calls. Defined
/// here (not as a dependency on `ta-commit`) so the router never depends
/// on the commit boundary's concrete types.
pub trait CommitBoundary: Send + Sync {
    fn verify_commit_eligibility(&self, run_id: &str, tool_name: &str) -> bool;
}

pub struct CallRequest {
    pub tool_name: String,
    pub stage: Stage,
    pub domain: String,
    pub workflow: String,
    pub intent: String,
    pub context: EvaluateContext,
    pub input: serde_json::Value,
    pub requested_env: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub denied: bool,
    pub requires_approval: bool,
    pub sandboxed: bool,
    pub trust_level: TrustLevel,
}

impl CallOutcome {
    fn denied(trust_level: TrustLevel, reason: impl Into<String>, requires_approval: bool) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(reason.into()),
            denied: true,
            requires_approval,
            sandboxed: false,
            trust_level,
        }
    }
}

pub struct ToolRouter {
    tools: HashMap<String, ToolDefinition>,
    handlers: HashMap<String, Box<RouterHandler>>,
    config: TrustGateConfig,
    audit: AuditLog,
    approval_query: Option<Box<dyn ApprovalQuery + Send + Sync>>,
    commit_boundary: Option<Box<dyn CommitBoundary>>,
    sandbox: Option<Arc<Sandbox>>,
}

impl ToolRouter {
    pub fn new(config: TrustGateConfig, audit: AuditLog) -> Self {
        Self {
            tools: HashMap::new(),
            handlers: HashMap::new(),
            config,
            audit,
            approval_query: None,
            commit_boundary: None,
            sandbox: None,
        }
    }

    pub fn with_approval_query(mut self, query: Box<dyn ApprovalQuery + Send + Sync>) -> Self {
        self.approval_query = Some(query);
        self
    }

    pub fn with_commit_boundary(mut self, boundary: Box<dyn CommitBoundary>) -> Self {
        self.commit_boundary = Some(boundary);
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Registers a `(ToolDefinition, Handler)` pair. Rejects an ill-formed
    /// definition or a name already taken.
    pub fn register(
        &mut self,
        tool: ToolDefinition,
        handler: Box<RouterHandler>,
    ) -> Result<(), RouterError> {
        tool.validate()
            .map_err(|e| RouterError::InvalidDefinition(e.to_string()))?;
        if self.tools.contains_key(&tool.name) {
            return Err(RouterError::AlreadyRegistered(tool.name));
        }
        self.handlers.insert(tool.name.clone(), handler);
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    pub fn call(&self, request: CallRequest) -> CallOutcome {
        // Step 1: input validation.
        if request.tool_name.trim().is_empty()
            || request.context.agent_name.trim().is_empty()
            || request.context.run_id.trim().is_empty()
        {
            let outcome = CallOutcome::denied(TrustLevel::L4, "fail-closed: tool_name and context must be non-empty", false);
            self.audit(&request, &outcome, None);
            return outcome;
        }

        // Step 2: tool lookup.
        let Some(tool) = self.tools.get(&request.tool_name) else {
            let outcome = CallOutcome::denied(TrustLevel::L4, format!("fail-closed: unknown tool '{}'", request.tool_name), false);
            self.audit(&request, &outcome, None);
            return outcome;
        };

        // Step 3: handler lookup.
        let Some(handler) = self.handlers.get(&request.tool_name) else {
            let outcome = CallOutcome::denied(TrustLevel::L4, format!("fail-closed: no handler registered for '{}'", request.tool_name), false);
            self.audit(&request, &outcome, None);
            return outcome;
        };

        // Step 4: trust-gate evaluation.
        let gate = match &self.approval_query {
            Some(query) => evaluate_with_approval(tool, request.stage, &request.context, &self.config, query.as_ref()),
            None => evaluate(tool, request.stage, &request.context, &self.config),
        };

        if !gate.allowed {
            let reason = gate.reason.clone().unwrap_or_else(|| "fail-closed: denied".to_string());
            let outcome = CallOutcome::denied(gate.trust_level, reason, gate.requires_approval);
            self.audit(&request, &outcome, None);
            return outcome;
        }

        // Step 5 (second independent barrier): commit-tool re-verification.
        if self.config.commit_tool_names.contains(&request.tool_name) {
            if let Some(boundary) = &self.commit_boundary {
                if !boundary.verify_commit_eligibility(&request.context.run_id, &request.tool_name) {
                    let outcome = CallOutcome::denied(
                        gate.trust_level,
                        "fail-closed: commit boundary re-verification failed",
                        false,
                    );
                    self.audit(&request, &outcome, None);
                    return outcome;
                }
            }
        }

        // Step 6: invoke directly or through the sandbox as the gate decided.
        let (success, result, error) = if gate.sandboxed {
            match &self.sandbox {
                Some(sandbox) => {
                    let exec_request = ExecuteRequest::new(request.tool_name.clone(), request.input.clone(), &|input| {
                        match handler(input) {
                            Ok(value) => ta_sandbox::RawOutcome::ok(value),
                            Err(e) => ta_sandbox::RawOutcome::failed(e),
                        }
                    })
                    .with_requested_env(request.requested_env.clone());
                    let exec_result = sandbox.execute(None, exec_request);
                    (exec_result.success, exec_result.result, exec_result.error)
                }
                None => (
                    false,
                    None,
                    Some("fail-closed: tool requires sandboxing but no sandbox is configured".to_string()),
                ),
            }
        } else {
            match handler(&request.input) {
                Ok(value) => (true, Some(value), None),
                Err(e) => (false, None, Some(e)),
            }
        };

        let outcome = CallOutcome {
            success,
            result: result.clone(),
            error: error.clone(),
            denied: false,
            requires_approval: false,
            sandboxed: gate.sandboxed,
            trust_level: gate.trust_level,
        };
        self.audit(&request, &outcome, result);
        outcome
    }

    /// Dispatches a batch of calls concurrently; results are keyed by tool
    /// name. No ordering guarantees beyond what handlers themselves impose.
    pub fn call_parallel(&self, requests: Vec<CallRequest>) -> HashMap<String, CallOutcome> {
        let mut results = HashMap::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = requests
                .into_iter()
                .map(|request| {
                    let tool_name = request.tool_name.clone();
                    let handle = scope.spawn(move || (tool_name, self.call(request)));
                    handle
                })
                .collect();
            for handle in handles {
                let (tool_name, outcome) = handle.join().expect("router worker thread panicked");
                results.insert(tool_name, outcome);
            }
        });
        results
    }

    fn audit(&self, request: &CallRequest, outcome: &CallOutcome, _result: Option<serde_json::Value>) {
        let action = if outcome.requires_approval {
            AuditAction::PolicyDecision
        } else if outcome.denied {
            AuditAction::PolicyDecision
        } else if outcome.success {
            AuditAction::ToolCall
        } else {
            AuditAction::Error
        };

        let mut event = AuditEvent::new(
            request.domain.clone(),
            request.workflow.clone(),
            request.context.agent_name.clone(),
            request.context.run_id.clone(),
            outcome.trust_level,
            request.stage,
            request.intent.clone(),
            action,
        )
        .with_tool(request.tool_name.clone())
        .with_tool_args(request.input.clone());

        if let Some(result) = &outcome.result {
            event = event.with_tool_result(result.clone());
        }
        if let Some(error) = &outcome.error {
            event = if outcome.requires_approval {
                event.with_warning(error.clone())
            } else {
                event.with_error(error.clone())
            };
        }

        if let Err(e) = event.validate() {
            tracing::warn!(error = %e, "router audit event failed validation, dropping");
            return;
        }
        if let Err(e) = self.audit.append(event) {
            tracing::warn!(error = %e, "router failed to append audit event");
        }
    }
}
