// turn.rs — The agent-turn boundary: driving an LLM up to maxTurns,
// dispatching tool calls through the tool router, and extracting the
// final text. Abstracted as a trait so the orchestrator never depends on
// a concrete LLM client.

use std::collections::HashMap;

use uuid::Uuid;

use ta_policy::{ReviewerVerdict, Stage};

/// A tool call that came back from the router flagged `requiresApproval`.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub tool_name: String,
    pub action_payload: serde_json::Value,
    pub sandbox_id: Option<Uuid>,
}

/// Everything one stage's turn needs.
pub struct TurnContext<'a> {
    pub run_id: &'a str,
    pub agent_name: &'a str,
    pub stage: Stage,
    pub input: &'a serde_json::Value,
    pub reviewer_verdict: Option<ReviewerVerdict>,
    pub max_turns: u32,
}

/// What one stage's turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub final_text: String,
    pub final_value: serde_json::Value,
    pub pending_approval: Option<PendingApproval>,
    pub error: Option<String>,
}

impl TurnOutcome {
    pub fn text(final_text: impl Into<String>) -> Self {
        let final_text = final_text.into();
        Self {
            final_value: serde_json::Value::String(final_text.clone()),
            final_text,
            pending_approval: None,
            error: None,
        }
    }

    pub fn with_pending_approval(mut self, pending: PendingApproval) -> Self {
        self.pending_approval = Some(pending);
        self
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Drives one agent turn for one stage. A real implementation calls an
/// LLM and dispatches its tool calls through [`ta_router::ToolRouter`];
/// [`ScriptedTurnDriver`] below is a deterministic test double.
pub trait AgentTurnDriver: Send + Sync {
    fn run_turn(&self, ctx: TurnContext<'_>) -> TurnOutcome;
}

/// A scripted driver keyed by stage, for tests and demonstrations.
/// Each stage's outcome may only be consumed once unless re-seeded.
#[derive(Default)]
pub struct ScriptedTurnDriver {
    scripts: HashMap<Stage, TurnOutcome>,
}

impl ScriptedTurnDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: Stage, outcome: TurnOutcome) -> Self {
        self.scripts.insert(stage, outcome);
        self
    }
}

impl AgentTurnDriver for ScriptedTurnDriver {
    fn run_turn(&self, ctx: TurnContext<'_>) -> TurnOutcome {
        self.scripts
            .get(&ctx.stage)
            .cloned()
            .unwrap_or_else(|| TurnOutcome::failed(format!("no scripted outcome for stage {}", ctx.stage)))
    }
}
