//! Sandbox configuration, resolved once at construction from the process
//! environment and never re-read at call sites (spec §9's note on global
//! mutable state).

use std::time::Duration;

use crate::blocklist::EnvBlocklist;
use crate::error::SandboxError;

/// Which isolation strategy the factory should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationKind {
    /// Full container isolation with resource limits.
    Container,
    /// Direct execution — tests only, or development with sandboxing
    /// explicitly disabled.
    Passthrough,
    /// Refuse everything — the fail-closed default when the isolation
    /// facility is unavailable or `TA_ENV=production`/fail-closed is set
    /// and the facility cannot be reached.
    Deny,
}

/// Resource limits and process-environment policy applied to every
/// sandboxed execution.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub isolation: IsolationKind,
    pub memory_limit_mb: u64,
    pub cpu_limit_millis: u64,
    pub timeout: Duration,
    pub network_allowlist: Vec<String>,
    pub blocklist: EnvBlocklist,
    /// Off by default; in production this must never be set.
    pub fallback_direct_execution: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationKind::Deny,
            memory_limit_mb: 512,
            cpu_limit_millis: 1000,
            timeout: Duration::from_secs(60),
            network_allowlist: Vec::new(),
            blocklist: EnvBlocklist::defaults(),
            fallback_direct_execution: false,
        }
    }
}

impl SandboxConfig {
    /// Validates the network allowlist entries are well-formed hostnames
    /// and that no allowlisted env-var name is itself blocked.
    pub fn validate(&self, allowlisted_env_names: &[String]) -> Result<(), SandboxError> {
        for host in &self.network_allowlist {
            if host.trim().is_empty() || host.contains(char::is_whitespace) {
                return Err(SandboxError::InvalidBlocklistPattern {
                    pattern: host.clone(),
                    reason: "network allowlist entry must be a non-empty hostname".to_string(),
                });
            }
        }
        self.blocklist.validate_not_allowing(allowlisted_env_names)
    }
}

/// Reads `TA_ENV` once and builds the [`SandboxConfig`] the process should
/// use for the rest of its lifetime. Mirrors spec §6's process-environment
/// table (`NODE_ENV` in the source, renamed `TA_ENV` for this rewrite).
pub struct SandboxConfigFactory;

impl SandboxConfigFactory {
    /// `env` is the value of `TA_ENV`; `sandbox_enabled` is an explicit
    /// feature flag; `fail_closed` forces full isolation even outside
    /// production. Read once at construction — never re-read per call.
    pub fn build(env: &str, sandbox_enabled: bool, fail_closed: bool) -> SandboxConfig {
        let mut config = SandboxConfig::default();
        config.isolation = match env {
            "test" => IsolationKind::Passthrough,
            "production" => IsolationKind::Container,
            _ if fail_closed => IsolationKind::Container,
            _ if !sandbox_enabled => {
                config.fallback_direct_execution = true;
                IsolationKind::Passthrough
            }
            _ => IsolationKind::Container,
        };
        config
    }

    /// Build a config from the real process environment (`TA_ENV`,
    /// `TA_SANDBOX_ENABLED`, `TA_SANDBOX_FAIL_CLOSED`).
    pub fn from_process_env() -> SandboxConfig {
        let env = std::env::var("TA_ENV").unwrap_or_default();
        let sandbox_enabled = std::env::var("TA_SANDBOX_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let fail_closed = std::env::var("TA_SANDBOX_FAIL_CLOSED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Self::build(&env, sandbox_enabled, fail_closed)
    }
}
