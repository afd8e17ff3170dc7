//! Staged-change ledger. Partitioned by sandbox id, never shared across
//! sandboxes (spec §6's "Shared resources" note).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedChange {
    pub id: Uuid,
    pub sandbox_id: Uuid,
    pub originating_tool: String,
    pub change_type: ChangeType,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl StagedChange {
    pub fn new(
        sandbox_id: Uuid,
        originating_tool: impl Into<String>,
        change_type: ChangeType,
        entity_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sandbox_id,
            originating_tool: originating_tool.into(),
            change_type,
            entity_type: entity_type.into(),
            entity_id: None,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// In-memory ledger of staged changes, keyed by sandbox id. Changes are
/// appended in call order and either all committed or all discarded.
#[derive(Default)]
pub struct StagedChangeLedger {
    by_sandbox: Mutex<HashMap<Uuid, Vec<StagedChange>>>,
}

impl StagedChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, change: StagedChange) {
        let mut guard = self.by_sandbox.lock().expect("ledger mutex poisoned");
        guard.entry(change.sandbox_id).or_default().push(change);
    }

    /// Changes for `sandbox_id` in insertion order; empty if none staged.
    pub fn get(&self, sandbox_id: Uuid) -> Vec<StagedChange> {
        let guard = self.by_sandbox.lock().expect("ledger mutex poisoned");
        guard.get(&sandbox_id).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self, sandbox_id: Uuid) -> bool {
        let guard = self.by_sandbox.lock().expect("ledger mutex poisoned");
        guard.get(&sandbox_id).map_or(true, |v| v.is_empty())
    }

    /// Discards the ledger for `sandbox_id` — used by both rollback and
    /// cleanup (commit leaves materialization to domain code and also
    /// discards once applied).
    pub fn discard(&self, sandbox_id: Uuid) {
        let mut guard = self.by_sandbox.lock().expect("ledger mutex poisoned");
        guard.remove(&sandbox_id);
    }
}
