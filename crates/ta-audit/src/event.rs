// event.rs — Audit event data model.
//
// Every significant action observed by the gateway (tool call, policy
// decision, approval, commit) is recorded as an AuditEvent. Events form a
// chain: each event includes a `previous_hash` linking it to the prior
// event, enabling tamper detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ta_policy::{Stage, TrustLevel};
use uuid::Uuid;

/// What kind of action this event records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A tool call was routed (allowed or denied).
    ToolCall,
    /// The trust gate made a decision (allow/deny/require_approval).
    PolicyDecision,
    /// A human or auto-approval decided an approval request.
    Approval,
    /// A commit-boundary action executed (apply/send/post/checkpoint).
    Apply,
    /// An error occurred during processing.
    Error,
}

// ── Decision Observability ──

/// An alternative that was considered during a decision.
///
/// Used in `DecisionReasoning` to document what options were evaluated
/// and why they were accepted or rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alternative {
    /// Description of the alternative considered.
    pub description: String,
    /// Optional score or ranking for this alternative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Why this alternative was rejected (empty string if it was the chosen option).
    pub rejected_reason: String,
}

/// Structured reasoning captured for a decision point.
///
/// Extends `AuditEvent` to make every decision in the pipeline observable —
/// not just *what happened*, but *what was considered and why*.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionReasoning {
    /// What alternatives were considered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Alternative>,
    /// Why this outcome was selected.
    pub rationale: String,
    /// Values/principles that informed the decision (e.g., "default-deny", "least-privilege").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_principles: Vec<String>,
}

/// A single audit event — one line in the JSONL audit log.
///
/// Carries the full `AgentActionEvent` shape from the persistence schema
/// (§6) plus the hash-chain fields used for tamper detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,

    pub domain: String,
    pub workflow: String,
    pub agent: String,
    pub run_id: String,
    pub trust_level: TrustLevel,
    pub stage: Stage,
    pub intent: String,

    pub action: AuditAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Confidence in [0, 1], if the emitting component reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_request_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sandbox_artifacts: Vec<String>,

    /// SHA-256 hash of the input to this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_hash: Option<String>,
    /// SHA-256 hash of the output/result of this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    /// Links this event to a parent event (for causal chaining).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<Uuid>,
    /// Hash of the previous event in the log. The first event has `None`.
    pub previous_hash: Option<String>,

    /// Arbitrary additional data not covered by the fixed schema.
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Structured reasoning for this decision, if the caller supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<DecisionReasoning>,
}

impl AuditEvent {
    /// Create a new event with the current timestamp and a random UUID.
    /// The required fields (domain, workflow, agent, run id, trust level,
    /// stage, intent) must be supplied here — `append` fails closed if any
    /// is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain: impl Into<String>,
        workflow: impl Into<String>,
        agent: impl Into<String>,
        run_id: impl Into<String>,
        trust_level: TrustLevel,
        stage: Stage,
        intent: impl Into<String>,
        action: AuditAction,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            domain: domain.into(),
            workflow: workflow.into(),
            agent: agent.into(),
            run_id: run_id.into(),
            trust_level,
            stage,
            intent: intent.into(),
            action,
            tool_name: None,
            tool_args: None,
            tool_result: None,
            artifact_refs: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            summary: None,
            confidence: None,
            approval_request_id: None,
            sandbox_id: None,
            sandbox_artifacts: Vec::new(),
            input_hash: None,
            output_hash: None,
            parent_event_id: None,
            previous_hash: None,
            metadata: serde_json::Value::Null,
            reasoning: None,
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    pub fn with_tool_args(mut self, args: serde_json::Value) -> Self {
        self.tool_args = Some(args);
        self
    }

    pub fn with_tool_result(mut self, result: serde_json::Value) -> Self {
        self.tool_result = Some(result);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_approval_request(mut self, id: Uuid) -> Self {
        self.approval_request_id = Some(id);
        self
    }

    pub fn with_sandbox(mut self, id: Uuid) -> Self {
        self.sandbox_id = Some(id);
        self
    }

    pub fn with_input_hash(mut self, hash: impl Into<String>) -> Self {
        self.input_hash = Some(hash.into());
        self
    }

    pub fn with_output_hash(mut self, hash: impl Into<String>) -> Self {
        self.output_hash = Some(hash.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_event_id = Some(parent_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_reasoning(mut self, reasoning: DecisionReasoning) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    /// Validates the required fields the audit log contract demands:
    /// non-empty domain, workflow, agent, run id, and intent.
    pub fn validate(&self) -> Result<(), crate::error::AuditError> {
        for (field, value) in [
            ("domain", &self.domain),
            ("workflow", &self.workflow),
            ("agent", &self.agent),
            ("run_id", &self.run_id),
            ("intent", &self.intent),
        ] {
            if value.trim().is_empty() {
                return Err(crate::error::AuditError::Validation {
                    field: field.to_string(),
                    event_id: self.event_id,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> AuditEvent {
        AuditEvent::new(
            "asi",
            "booking_flow",
            "worker-1",
            "run-1",
            TrustLevel::L0,
            Stage::Plan,
            "list bookings",
            AuditAction::ToolCall,
        )
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = event()
            .with_tool("asi.get_bookings")
            .with_input_hash("abc123")
            .with_output_hash("def456");

        let json = serde_json::to_string(&event).expect("serialize");
        let restored: AuditEvent = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(event.event_id, restored.event_id);
        assert_eq!(event.agent, restored.agent);
        assert_eq!(event.action, restored.action);
        assert_eq!(event.tool_name, restored.tool_name);
        assert_eq!(event.input_hash, restored.input_hash);
        assert_eq!(event.output_hash, restored.output_hash);
    }

    #[test]
    fn event_ids_are_unique() {
        let e1 = event();
        let e2 = event();
        assert_ne!(e1.event_id, e2.event_id);
    }

    #[test]
    fn action_serializes_as_snake_case() {
        let json = serde_json::to_string(&AuditAction::PolicyDecision).unwrap();
        assert_eq!(json, "\"policy_decision\"");
    }

    #[test]
    fn validate_rejects_empty_intent() {
        let mut e = event();
        e.intent = "  ".to_string();
        assert!(e.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_event() {
        assert!(event().validate().is_ok());
    }

    #[test]
    fn decision_reasoning_serialization_round_trip() {
        let reasoning = DecisionReasoning {
            alternatives: vec![
                Alternative {
                    description: "allow without check".to_string(),
                    score: Some(0.3),
                    rejected_reason: "violates default-deny".to_string(),
                },
                Alternative {
                    description: "sandbox then allow".to_string(),
                    score: None,
                    rejected_reason: "unnecessary for L0 reads".to_string(),
                },
            ],
            rationale: "read-only calls bypass sandboxing".to_string(),
            applied_principles: vec!["default-deny".to_string(), "least-privilege".to_string()],
        };

        let json = serde_json::to_string(&reasoning).unwrap();
        let restored: DecisionReasoning = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.rationale, reasoning.rationale);
        assert_eq!(restored.alternatives.len(), 2);
        assert_eq!(restored.alternatives[0].score, Some(0.3));
    }

    #[test]
    fn event_with_reasoning_round_trip() {
        let reasoning = DecisionReasoning {
            alternatives: vec![],
            rationale: "commit tool requires approval".to_string(),
            applied_principles: vec!["fail-closed".to_string()],
        };

        let event = event().with_reasoning(reasoning);
        let json = serde_json::to_string(&event).unwrap();
        let restored: AuditEvent = serde_json::from_str(&json).unwrap();

        assert!(restored.reasoning.is_some());
        assert!(restored.reasoning.unwrap().rationale.contains("commit tool"));
    }

    #[test]
    fn event_without_reasoning_or_optional_fields_backward_compatible() {
        let json = r#"{
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "timestamp": "2026-02-25T12:00:00Z",
            "domain": "asi",
            "workflow": "booking_flow",
            "agent": "worker-1",
            "run_id": "run-1",
            "trust_level": "L0",
            "stage": "plan",
            "intent": "list bookings",
            "action": "tool_call",
            "previous_hash": null
        }"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert!(event.reasoning.is_none());
        assert!(event.tool_name.is_none());
        assert!(event.artifact_refs.is_empty());
    }
}
