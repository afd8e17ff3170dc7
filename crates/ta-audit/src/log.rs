// log.rs — Append-only JSONL audit log.
//
// The audit log is stored as a JSONL (JSON Lines) file: one JSON object per
// line. This format is simple, append-friendly, and easy to parse with
// standard tools (jq, grep, etc.).
//
// Each event is linked to the previous one via `previous_hash`, forming a
// hash chain. This means any tampering (inserting, deleting, or modifying
// events) can be detected by verifying the chain.
//
// Two delivery modes are offered: `append` (fire-and-forget, the default)
// hands the event to a background thread over a channel and returns once
// validation passes; `append_sync` blocks until the write is flushed and
// surfaces any persistence error. No async runtime is used here — per the
// workspace convention, library crates stay synchronous; the background
// writer is a plain OS thread.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use ta_policy::{Stage, TrustLevel};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::hasher;

struct Inner {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last event written — used to set `previous_hash` on the next event.
    last_hash: Option<String>,
}

impl Inner {
    fn open(path: PathBuf) -> Result<Self, AuditError> {
        let last_hash = if path.exists() {
            read_last_hash(&path)?
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
        })
    }

    fn append_raw(&mut self, event: &mut AuditEvent) -> Result<(), AuditError> {
        event.previous_hash = self.last_hash.clone();
        let json = serde_json::to_string(event)?;
        self.last_hash = Some(hasher::hash_str(&json));
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    inner: Arc<Mutex<Inner>>,
    path: PathBuf,
    sender: Option<mpsc::Sender<AuditEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl AuditLog {
    /// Open (or create) an audit log at the given path.
    ///
    /// If the file already exists, it reads the last event to recover the
    /// hash chain state so new events link correctly. Spawns the
    /// background writer thread used by the fire-and-forget `append` path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let inner = Arc::new(Mutex::new(Inner::open(path.clone())?));

        let (sender, receiver) = mpsc::channel::<AuditEvent>();
        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::spawn(move || {
            for mut event in receiver {
                let mut guard = match worker_inner.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Err(e) = guard.append_raw(&mut event) {
                    tracing::error!(event_id = %event.event_id, error = %e, "fire-and-forget audit append failed");
                }
            }
        });

        Ok(Self {
            inner,
            path,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Append an event, handing it to the background writer. Returns once
    /// required-field validation passes; persistence failures are logged
    /// but never propagated, because the decision the event records has
    /// semantic priority over its own durability.
    pub fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        event.validate()?;
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::error!("audit log background writer is gone; event dropped");
            }
        }
        Ok(())
    }

    /// Append an event synchronously, blocking until it is flushed to disk
    /// and surfacing any persistence error.
    pub fn append_sync(&self, mut event: AuditEvent) -> Result<(), AuditError> {
        event.validate()?;
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.append_raw(&mut event)
    }

    /// Read all events from a log file, oldest first. Skips blank lines.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(&line)?;
            events.push(event);
        }

        Ok(events)
    }

    /// Verify the integrity of a log file's hash chain.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<bool, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event: AuditEvent = serde_json::from_str(&line)?;

            if event.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: event.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }

            previous_hash = Some(hasher::hash_str(&line));
        }

        Ok(true)
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Query stored events by run, workflow, agent, domain, trust level,
    /// stage, and time window. Always ordered newest-first.
    pub fn query(&self, filter: &EventFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events = Self::read_all(&self.path)?;
        events.retain(|e| filter.matches(e));
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    /// Counts bucketed by trust level, stage, and domain, plus a count of
    /// events carrying a non-empty `errors` array. Scoped to one run when
    /// `run_id` is given.
    pub fn stats(&self, run_id: Option<&str>) -> Result<AuditStats, AuditError> {
        let events = Self::read_all(&self.path)?;
        let mut stats = AuditStats::default();
        for event in events.iter().filter(|e| run_id.map_or(true, |r| e.run_id == r)) {
            *stats.by_trust_level.entry(event.trust_level).or_insert(0) += 1;
            *stats.by_stage.entry(event.stage).or_insert(0) += 1;
            *stats.by_domain.entry(event.domain.clone()).or_insert(0) += 1;
            if !event.errors.is_empty() {
                stats.error_count += 1;
            }
        }
        Ok(stats)
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, which ends the
        // background worker's receive loop; joining it here guarantees
        // every fire-and-forget event sent before this point is flushed
        // by the time the log goes out of scope.
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut last_line: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            last_line = Some(line);
        }
    }

    Ok(last_line.map(|line| hasher::hash_str(&line)))
}

/// Filter applied by [`AuditLog::query`]. All fields are optional; an
/// absent field matches everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub run_id: Option<String>,
    pub workflow: Option<String>,
    pub agent: Option<String>,
    pub domain: Option<String>,
    pub trust_level: Option<TrustLevel>,
    pub stage: Option<Stage>,
    pub after: Option<chrono::DateTime<chrono::Utc>>,
    pub before: Option<chrono::DateTime<chrono::Utc>>,
}

impl EventFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        self.run_id.as_deref().map_or(true, |v| v == event.run_id)
            && self.workflow.as_deref().map_or(true, |v| v == event.workflow)
            && self.agent.as_deref().map_or(true, |v| v == event.agent)
            && self.domain.as_deref().map_or(true, |v| v == event.domain)
            && self.trust_level.map_or(true, |v| v == event.trust_level)
            && self.stage.map_or(true, |v| v == event.stage)
            && self.after.map_or(true, |v| event.timestamp >= v)
            && self.before.map_or(true, |v| event.timestamp < v)
    }
}

/// Aggregate counts returned by [`AuditLog::stats`].
#[derive(Debug, Clone, Default)]
pub struct AuditStats {
    pub by_trust_level: HashMap<TrustLevel, u64>,
    pub by_stage: HashMap<Stage, u64>,
    pub by_domain: HashMap<String, u64>,
    pub error_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditAction;
    use tempfile::tempdir;

    fn event(agent: &str, stage: Stage, action: AuditAction) -> AuditEvent {
        AuditEvent::new("asi", "booking_flow", agent, "run-1", TrustLevel::L0, stage, "intent", action)
    }

    #[test]
    fn append_sync_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&log_path).unwrap();
            log.append_sync(event("agent-1", Stage::Plan, AuditAction::ToolCall))
                .unwrap();
            log.append_sync(event("agent-1", Stage::Plan, AuditAction::PolicyDecision))
                .unwrap();
        }

        let events = AuditLog::read_all(&log_path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::ToolCall);
        assert_eq!(events[1].action, AuditAction::PolicyDecision);
    }

    #[test]
    fn fire_and_forget_flushes_before_drop() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&log_path).unwrap();
            log.append(event("agent-1", Stage::Plan, AuditAction::ToolCall))
                .unwrap();
        }

        let events = AuditLog::read_all(&log_path).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn append_rejects_event_with_empty_required_field() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        let mut bad = event("agent-1", Stage::Plan, AuditAction::ToolCall);
        bad.agent = String::new();
        assert!(log.append(bad).is_err());
    }

    #[test]
    fn hash_chain_is_valid() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&log_path).unwrap();
            for i in 0..5 {
                log.append_sync(event(&format!("agent-{i}"), Stage::Plan, AuditAction::ToolCall))
                    .unwrap();
            }
        }

        assert!(AuditLog::verify_chain(&log_path).unwrap());
    }

    #[test]
    fn first_event_has_no_previous_hash() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&log_path).unwrap();
            log.append_sync(event("agent-1", Stage::Plan, AuditAction::ToolCall))
                .unwrap();
        }

        let events = AuditLog::read_all(&log_path).unwrap();
        assert!(events[0].previous_hash.is_none());
    }

    #[test]
    fn reopen_log_continues_chain() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&log_path).unwrap();
            log.append_sync(event("agent-1", Stage::Plan, AuditAction::ToolCall))
                .unwrap();
        }
        {
            let log = AuditLog::open(&log_path).unwrap();
            log.append_sync(event("agent-1", Stage::Plan, AuditAction::Approval))
                .unwrap();
        }

        assert!(AuditLog::verify_chain(&log_path).unwrap());
        assert_eq!(AuditLog::read_all(&log_path).unwrap().len(), 2);
    }

    #[test]
    fn query_filters_by_run_and_stage_newest_first() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        log.append_sync(event("agent-1", Stage::Plan, AuditAction::ToolCall))
            .unwrap();
        log.append_sync(event("agent-2", Stage::Execute, AuditAction::ToolCall))
            .unwrap();

        let results = log
            .query(&EventFilter {
                stage: Some(Stage::Execute),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].agent, "agent-2");
    }

    #[test]
    fn stats_bucket_by_trust_level_and_count_errors() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        log.append_sync(event("agent-1", Stage::Plan, AuditAction::ToolCall))
            .unwrap();
        log.append_sync(
            event("agent-1", Stage::Execute, AuditAction::Error).with_error("boom"),
        )
        .unwrap();

        let stats = log.stats(None).unwrap();
        assert_eq!(stats.by_trust_level.get(&TrustLevel::L0), Some(&2));
        assert_eq!(stats.error_count, 1);
    }
}
