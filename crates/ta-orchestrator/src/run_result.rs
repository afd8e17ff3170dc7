// run_result.rs — The orchestrator's return value.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ta_policy::ReviewerVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    RequiresApproval,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub final_result: Option<serde_json::Value>,
    pub event_count: usize,
    pub duration: Duration,
    pub approval_request_id: Option<Uuid>,
    pub reviewer_verdict: Option<ReviewerVerdict>,
    pub failure_reason: Option<String>,
}
