//! `ApprovalStore` — a `rusqlite`-backed store for approval requests and
//! decisions, with real `CHECK`/`UNIQUE` constraints and an `AFTER INSERT`
//! trigger that flips a request's status atomically with its decision, per
//! spec.md §6.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use ta_policy::{ApprovalQuery, ApprovalSnapshot, ApprovalStatusLite, PolicyError, ReviewerVerdict, TrustLevel};

use crate::error::ApprovalError;
use crate::types::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, DecisionKind, PendingFilter,
    AUTO_APPROVE_ACTOR,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS approval_requests (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    domain TEXT NOT NULL,
    run_id TEXT NOT NULL,
    workflow TEXT NOT NULL,
    requester TEXT NOT NULL,
    trust_level TEXT NOT NULL,
    action_type TEXT NOT NULL,
    action_payload TEXT NOT NULL,
    status TEXT NOT NULL CHECK(status IN ('PENDING','APPROVED','REJECTED','EXPIRED')),
    expires_at TEXT NOT NULL,
    context TEXT NOT NULL,
    reviewer_verdict TEXT,
    reviewer_notes TEXT,
    auto_approve_eligible INTEGER NOT NULL,
    auto_approve_reason TEXT
);

CREATE TABLE IF NOT EXISTS approval_decisions (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    approval_request_id TEXT NOT NULL UNIQUE REFERENCES approval_requests(id) ON DELETE CASCADE,
    decided_by TEXT NOT NULL,
    decision TEXT NOT NULL CHECK(decision IN ('APPROVE','REJECT')),
    notes TEXT,
    metadata TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS approval_decision_updates_status
AFTER INSERT ON approval_decisions
BEGIN
    UPDATE approval_requests
    SET status = CASE NEW.decision WHEN 'APPROVE' THEN 'APPROVED' ELSE 'REJECTED' END
    WHERE id = NEW.approval_request_id;
END;

CREATE INDEX IF NOT EXISTS idx_requests_run_id ON approval_requests(run_id);
CREATE INDEX IF NOT EXISTS idx_requests_status_expiry ON approval_requests(status, expires_at);
"#;

pub struct ApprovalStore {
    conn: Mutex<Connection>,
}

impl ApprovalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ApprovalError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, ApprovalError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates a pending request. Expiry and auto-approve eligibility are
    /// computed here per spec.md §4.C; the caller supplies only the facts.
    #[allow(clippy::too_many_arguments)]
    pub fn create_request(
        &self,
        domain: impl Into<String>,
        run_id: impl Into<String>,
        workflow: impl Into<String>,
        requester: impl Into<String>,
        trust_level: TrustLevel,
        action_type: impl Into<String>,
        action_payload: serde_json::Value,
        context: serde_json::Value,
        reviewer_verdict: Option<ReviewerVerdict>,
        reviewer_notes: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let domain = domain.into();
        let run_id = run_id.into();
        let workflow = workflow.into();
        let requester = requester.into();
        let action_type = action_type.into();

        if domain.is_empty() || run_id.is_empty() || workflow.is_empty() || action_type.is_empty() {
            return Err(ApprovalError::Validation(
                "domain, run_id, workflow, and action_type must be non-empty".to_string(),
            ));
        }

        let now = Utc::now();
        let ttl = ApprovalRequest::default_ttl(trust_level);
        let auto_approve_eligible = ApprovalRequest::compute_auto_approve_eligible(
            trust_level,
            reviewer_verdict,
            &action_type,
            &workflow,
        );

        let request = ApprovalRequest {
            id: Uuid::new_v4(),
            created_at: now,
            domain,
            run_id,
            workflow,
            requester,
            trust_level,
            action_type,
            action_payload,
            status: ApprovalStatus::Pending,
            expires_at: now + ttl,
            context,
            reviewer_verdict,
            reviewer_notes,
            auto_approve_eligible,
            auto_approve_reason: None,
        };

        let conn = self.conn.lock().expect("approval store mutex poisoned");
        conn.execute(
            "INSERT INTO approval_requests (
                id, created_at, domain, run_id, workflow, requester, trust_level,
                action_type, action_payload, status, expires_at, context,
                reviewer_verdict, reviewer_notes, auto_approve_eligible, auto_approve_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                request.id.to_string(),
                request.created_at.to_rfc3339(),
                request.domain,
                request.run_id,
                request.workflow,
                request.requester,
                request.trust_level.to_string(),
                request.action_type,
                request.action_payload.to_string(),
                request.status.as_db_str(),
                request.expires_at.to_rfc3339(),
                request.context.to_string(),
                request.reviewer_verdict.map(|v| format!("{v:?}").to_uppercase()),
                request.reviewer_notes,
                request.auto_approve_eligible as i64,
                request.auto_approve_reason,
            ],
        )?;

        Ok(request)
    }

    pub fn get_request(&self, id: Uuid) -> Result<Option<ApprovalRequest>, ApprovalError> {
        let conn = self.conn.lock().expect("approval store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, created_at, domain, run_id, workflow, requester, trust_level,
                action_type, action_payload, status, expires_at, context,
                reviewer_verdict, reviewer_notes, auto_approve_eligible, auto_approve_reason
             FROM approval_requests WHERE id = ?1",
        )?;
        let request = stmt
            .query_row(params![id.to_string()], row_to_request)
            .optional()?;
        Ok(request)
    }

    /// Only PENDING requests whose expiry is still in the future — an
    /// expired but un-swept record must never be returned as pending.
    pub fn get_pending_requests(
        &self,
        filter: &PendingFilter,
    ) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let conn = self.conn.lock().expect("approval store mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, domain, run_id, workflow, requester, trust_level,
                action_type, action_payload, status, expires_at, context,
                reviewer_verdict, reviewer_notes, auto_approve_eligible, auto_approve_reason
             FROM approval_requests WHERE status = 'PENDING' AND expires_at > ?1",
        )?;
        let rows = stmt.query_map(params![now], row_to_request)?;
        let mut out = Vec::new();
        for row in rows {
            let request = row?;
            if filter.domain.as_deref().is_some_and(|d| d != request.domain) {
                continue;
            }
            if filter.run_id.as_deref().is_some_and(|r| r != request.run_id) {
                continue;
            }
            if filter.workflow.as_deref().is_some_and(|w| w != request.workflow) {
                continue;
            }
            out.push(request);
        }
        Ok(out)
    }

    pub fn get_requests_by_run_id(&self, run_id: &str) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let conn = self.conn.lock().expect("approval store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, created_at, domain, run_id, workflow, requester, trust_level,
                action_type, action_payload, status, expires_at, context,
                reviewer_verdict, reviewer_notes, auto_approve_eligible, auto_approve_reason
             FROM approval_requests WHERE run_id = ?1",
        )?;
        let rows = stmt.query_map(params![run_id], row_to_request)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn is_approved(&self, id: Uuid) -> Result<bool, ApprovalError> {
        Ok(self
            .get_request(id)?
            .map(|r| r.status == ApprovalStatus::Approved)
            .unwrap_or(false))
    }

    pub fn is_pending(&self, id: Uuid) -> Result<bool, ApprovalError> {
        let now = Utc::now();
        Ok(self
            .get_request(id)?
            .map(|r| r.status == ApprovalStatus::Pending && !r.is_expired(now))
            .unwrap_or(false))
    }

    /// Transitions every PENDING-but-expired request to EXPIRED; returns
    /// the count transitioned.
    pub fn expire_stale_requests(&self) -> Result<u64, ApprovalError> {
        let conn = self.conn.lock().expect("approval store mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let count = conn.execute(
            "UPDATE approval_requests SET status = 'EXPIRED'
             WHERE status = 'PENDING' AND expires_at <= ?1",
            params![now],
        )?;
        Ok(count as u64)
    }

    /// Verifies the target exists, is PENDING, and has not expired, then
    /// inserts the decision. The trigger flips the request's status
    /// atomically with this insert. A unique-constraint violation on
    /// `approval_request_id` surfaces as [`ApprovalError::AlreadyDecided`].
    pub fn create_decision(
        &self,
        request_id: Uuid,
        decided_by: impl Into<String>,
        decision: DecisionKind,
        notes: Option<String>,
        metadata: serde_json::Value,
    ) -> Result<ApprovalDecision, ApprovalError> {
        let request = self
            .get_request(request_id)?
            .ok_or(ApprovalError::NotFound(request_id))?;
        // Checked ahead of the status guard: a decision already recorded
        // is the distinguishable "already decided" case spec.md §4.C
        // calls for, not a generic "not pending" (the trigger has already
        // flipped the request's status to reflect that first decision).
        if self.get_decision(request_id)?.is_some() {
            return Err(ApprovalError::AlreadyDecided(request_id));
        }
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending(request_id));
        }
        if request.is_expired(Utc::now()) {
            return Err(ApprovalError::RequestExpired(request_id));
        }

        let record = ApprovalDecision {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            approval_request_id: request_id,
            decided_by: decided_by.into(),
            decision,
            notes,
            metadata,
        };

        let conn = self.conn.lock().expect("approval store mutex poisoned");
        let result = conn.execute(
            "INSERT INTO approval_decisions (id, created_at, approval_request_id, decided_by, decision, notes, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.created_at.to_rfc3339(),
                record.approval_request_id.to_string(),
                record.decided_by,
                record.decision.as_db_str(),
                record.notes,
                record.metadata.to_string(),
            ],
        );

        match result {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(ApprovalError::AlreadyDecided(request_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_decision(&self, request_id: Uuid) -> Result<Option<ApprovalDecision>, ApprovalError> {
        let conn = self.conn.lock().expect("approval store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, created_at, approval_request_id, decided_by, decision, notes, metadata
             FROM approval_decisions WHERE approval_request_id = ?1",
        )?;
        let decision = stmt
            .query_row(params![request_id.to_string()], row_to_decision)
            .optional()?;
        Ok(decision)
    }

    /// Runs the six auto-approve gates in order. Any gate failure returns
    /// `Ok(None)` ("no decision produced") — never an error for policy
    /// denial, only for genuine storage failure.
    pub fn auto_approve(&self, request_id: Uuid) -> Result<Option<ApprovalDecision>, ApprovalError> {
        let Some(request) = self.get_request(request_id)? else {
            return Ok(None);
        };
        if request.trust_level == TrustLevel::L4 {
            return Ok(None);
        }
        if request.status != ApprovalStatus::Pending {
            return Ok(None);
        }
        if !request.auto_approve_eligible {
            return Ok(None);
        }
        if request.reviewer_verdict != Some(ReviewerVerdict::Pass) {
            return Ok(None);
        }
        if request.is_expired(Utc::now()) {
            return Ok(None);
        }

        let decision = self.create_decision(
            request_id,
            AUTO_APPROVE_ACTOR,
            DecisionKind::Approve,
            Some("auto-approved: trust level, verdict, and action-type gates passed".to_string()),
            serde_json::json!({}),
        )?;
        Ok(Some(decision))
    }
}

fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<ApprovalRequest> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(1)?;
    let trust_level: String = row.get(6)?;
    let action_payload: String = row.get(8)?;
    let status: String = row.get(9)?;
    let expires_at: String = row.get(10)?;
    let context: String = row.get(11)?;
    let reviewer_verdict: Option<String> = row.get(12)?;

    Ok(ApprovalRequest {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        domain: row.get(2)?,
        run_id: row.get(3)?,
        workflow: row.get(4)?,
        requester: row.get(5)?,
        trust_level: parse_trust_level(&trust_level),
        action_type: row.get(7)?,
        action_payload: serde_json::from_str(&action_payload).unwrap_or(serde_json::Value::Null),
        status: ApprovalStatus::from_db_str(&status).unwrap_or(ApprovalStatus::Expired),
        expires_at: DateTime::parse_from_rfc3339(&expires_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        context: serde_json::from_str(&context).unwrap_or(serde_json::Value::Null),
        reviewer_verdict: reviewer_verdict.and_then(|v| parse_reviewer_verdict(&v)),
        reviewer_notes: row.get(13)?,
        auto_approve_eligible: row.get::<_, i64>(14)? != 0,
        auto_approve_reason: row.get(15)?,
    })
}

fn row_to_decision(row: &rusqlite::Row) -> rusqlite::Result<ApprovalDecision> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(1)?;
    let approval_request_id: String = row.get(2)?;
    let decision: String = row.get(4)?;
    let metadata: String = row.get(6)?;

    Ok(ApprovalDecision {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        approval_request_id: Uuid::parse_str(&approval_request_id).unwrap_or_default(),
        decided_by: row.get(3)?,
        decision: DecisionKind::from_db_str(&decision).unwrap_or(DecisionKind::Reject),
        notes: row.get(5)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_trust_level(s: &str) -> TrustLevel {
    match s {
        "L0" => TrustLevel::L0,
        "L1" => TrustLevel::L1,
        "L2" => TrustLevel::L2,
        "L3" => TrustLevel::L3,
        _ => TrustLevel::L4,
    }
}

fn parse_reviewer_verdict(s: &str) -> Option<ReviewerVerdict> {
    match s {
        "PASS" => Some(ReviewerVerdict::Pass),
        "FAIL" => Some(ReviewerVerdict::Fail),
        _ => None,
    }
}

/// Bridges to the trust gate's narrow read-only approval view, keeping
/// `ta-policy` free of any dependency on this crate.
impl ApprovalQuery for ApprovalStore {
    fn requests_by_run_id(&self, run_id: &str) -> Result<Vec<ApprovalSnapshot>, PolicyError> {
        let requests = self
            .get_requests_by_run_id(run_id)
            .map_err(|e| PolicyError::ApprovalQueryFailed {
                reason: e.to_string(),
            })?;
        Ok(requests
            .into_iter()
            .map(|r| ApprovalSnapshot {
                action_type: r.action_type,
                status: match r.status {
                    ApprovalStatus::Pending => ApprovalStatusLite::Pending,
                    ApprovalStatus::Approved => ApprovalStatusLite::Approved,
                    ApprovalStatus::Rejected => ApprovalStatusLite::Rejected,
                    ApprovalStatus::Expired => ApprovalStatusLite::Expired,
                },
                reviewer_verdict: r.reviewer_verdict,
                auto_approve_eligible: r.auto_approve_eligible,
            })
            .collect())
    }
}
