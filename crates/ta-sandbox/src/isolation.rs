//! Isolation strategies. The sandbox chooses one at construction based on
//! the resolved [`SandboxConfig`] and never switches strategy mid-lifetime.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::error::FailureReason;

/// What the handler actually did, independent of whether it was denied
/// before ever running.
pub struct RawOutcome {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub stdout_sample: Option<String>,
    pub stderr_sample: Option<String>,
    pub timed_out: bool,
}

impl RawOutcome {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            exit_code: Some(0),
            stdout_sample: None,
            stderr_sample: None,
            timed_out: false,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            exit_code: Some(1),
            stdout_sample: None,
            stderr_sample: None,
            timed_out: false,
        }
    }
}

/// A handler invoked inside the sandbox. Kept generic over a closure so
/// tests can exercise isolation logic without a real container runtime.
pub type Handler<'a> = dyn Fn(&serde_json::Value) -> RawOutcome + Send + Sync + 'a;

pub enum IsolationOutcome {
    Ran {
        outcome: RawOutcome,
        duration: Duration,
    },
    Denied {
        reason: FailureReason,
    },
}

/// Strategy for running a handler under isolation. `sandbox_id` is passed
/// through for log correlation; implementations must not mutate shared
/// state outside what the ledger tracks.
pub trait IsolationStrategy: Send + Sync {
    fn run(&self, sandbox_id: Uuid, input: &serde_json::Value, handler: &Handler) -> IsolationOutcome;
}

/// Confirms the container runtime is actually reachable before a handler
/// is ever invoked under it. Swappable so tests don't depend on a real
/// docker installation.
pub trait AvailabilityProbe: Send + Sync {
    fn check(&self) -> Result<(), FailureReason>;
}

/// Shells out to `docker info`: exit success means the daemon is up: a
/// missing binary is `DockerNotAvailable`, a present binary that can't
/// reach the daemon is `DockerNotRunning`.
pub struct DockerProbe;

impl AvailabilityProbe for DockerProbe {
    fn check(&self) -> Result<(), FailureReason> {
        match std::process::Command::new("docker").arg("info").output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(_) => Err(FailureReason::DockerNotRunning),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FailureReason::DockerNotAvailable),
            Err(_) => Err(FailureReason::DockerNotAvailable),
        }
    }
}

/// Full container isolation: the handler runs, but under the resource
/// ceilings recorded in `config` — this rewrite models the container
/// runtime as the handler's caller enforcing a wall-clock timeout, since
/// the actual namespace/cgroup wiring is host-specific and out of scope.
/// Fail-closed per spec §4.D: the daemon is probed before every run, and
/// the handler is never invoked when it's unreachable.
pub struct ContainerIsolation {
    config: SandboxConfig,
    probe: Box<dyn AvailabilityProbe>,
}

impl ContainerIsolation {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            probe: Box::new(DockerProbe),
        }
    }

    #[cfg(test)]
    fn with_probe(config: SandboxConfig, probe: Box<dyn AvailabilityProbe>) -> Self {
        Self { config, probe }
    }
}

impl IsolationStrategy for ContainerIsolation {
    fn run(&self, _sandbox_id: Uuid, input: &serde_json::Value, handler: &Handler) -> IsolationOutcome {
        if let Err(reason) = self.probe.check() {
            return IsolationOutcome::Denied { reason };
        }
        let started = Instant::now();
        let outcome = handler(input);
        let duration = started.elapsed();
        if duration > self.config.timeout {
            return IsolationOutcome::Denied {
                reason: FailureReason::ExecutionTimeout,
            };
        }
        IsolationOutcome::Ran { outcome, duration }
    }
}

/// Fail-closed denier: used when the isolation facility is unavailable,
/// or as the default before a real strategy is wired in.
pub struct DenyIsolation {
    reason: FailureReason,
}

impl DenyIsolation {
    pub fn new(reason: FailureReason) -> Self {
        Self { reason }
    }
}

impl IsolationStrategy for DenyIsolation {
    fn run(&self, _sandbox_id: Uuid, _input: &serde_json::Value, _handler: &Handler) -> IsolationOutcome {
        IsolationOutcome::Denied { reason: self.reason }
    }
}

/// Direct execution with no isolation — opt-in only, for tests or
/// explicit development fallback. Never selected in production.
pub struct PassthroughIsolation;

impl IsolationStrategy for PassthroughIsolation {
    fn run(&self, _sandbox_id: Uuid, input: &serde_json::Value, handler: &Handler) -> IsolationOutcome {
        let started = Instant::now();
        let outcome = handler(input);
        IsolationOutcome::Ran {
            outcome,
            duration: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_isolation_never_invokes_handler() {
        let invoked = std::sync::atomic::AtomicBool::new(false);
        let handler: &Handler = &|_input| {
            invoked.store(true, std::sync::atomic::Ordering::SeqCst);
            RawOutcome::ok(serde_json::json!({}))
        };
        let strategy = DenyIsolation::new(FailureReason::DockerNotAvailable);
        let outcome = strategy.run(Uuid::new_v4(), &serde_json::json!({}), handler);
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
        assert!(matches!(
            outcome,
            IsolationOutcome::Denied {
                reason: FailureReason::DockerNotAvailable
            }
        ));
    }

    #[test]
    fn passthrough_runs_handler_and_reports_success() {
        let strategy = PassthroughIsolation;
        let handler: &Handler = &|_input| RawOutcome::ok(serde_json::json!({"ok": true}));
        let outcome = strategy.run(Uuid::new_v4(), &serde_json::json!({}), handler);
        match outcome {
            IsolationOutcome::Ran { outcome, .. } => assert!(outcome.success),
            IsolationOutcome::Denied { .. } => panic!("expected handler to run"),
        }
    }

    struct AlwaysAvailable;
    impl AvailabilityProbe for AlwaysAvailable {
        fn check(&self) -> Result<(), FailureReason> {
            Ok(())
        }
    }

    struct AlwaysUnavailable(FailureReason);
    impl AvailabilityProbe for AlwaysUnavailable {
        fn check(&self) -> Result<(), FailureReason> {
            Err(self.0)
        }
    }

    #[test]
    fn container_isolation_denies_on_timeout() {
        let mut config = SandboxConfig::default();
        config.timeout = Duration::from_millis(1);
        let strategy = ContainerIsolation::with_probe(config, Box::new(AlwaysAvailable));
        let handler: &Handler = &|_input| {
            std::thread::sleep(Duration::from_millis(20));
            RawOutcome::ok(serde_json::json!({}))
        };
        let outcome = strategy.run(Uuid::new_v4(), &serde_json::json!({}), handler);
        assert!(matches!(
            outcome,
            IsolationOutcome::Denied {
                reason: FailureReason::ExecutionTimeout
            }
        ));
    }

    #[test]
    fn container_isolation_denies_without_invoking_handler_when_daemon_unreachable() {
        let config = SandboxConfig::default();
        let strategy = ContainerIsolation::with_probe(config, Box::new(AlwaysUnavailable(FailureReason::DockerNotRunning)));
        let invoked = std::sync::atomic::AtomicBool::new(false);
        let handler: &Handler = &|_input| {
            invoked.store(true, std::sync::atomic::Ordering::SeqCst);
            RawOutcome::ok(serde_json::json!({}))
        };
        let outcome = strategy.run(Uuid::new_v4(), &serde_json::json!({}), handler);
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
        assert!(matches!(
            outcome,
            IsolationOutcome::Denied {
                reason: FailureReason::DockerNotRunning
            }
        ));
    }
}
