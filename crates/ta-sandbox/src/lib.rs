//! # ta-sandbox
//!
//! Process-isolated, resource-limited command execution with a
//! staged-change ledger. Mutations performed inside the sandbox are held
//! until the commit boundary applies or discards them as a unit.
//!
//! ## Quick Example
//!
//! ```rust
//! use ta_sandbox::{ExecuteRequest, Sandbox, SandboxConfigFactory};
//!
//! let config = SandboxConfigFactory::build("test", true, false);
//! let sandbox = Sandbox::new(config, std::env::temp_dir().join("ta-sandbox-doctest"));
//! let handler = |_input: &serde_json::Value| ta_sandbox::RawOutcome::ok(serde_json::json!({"ok": true}));
//! let request = ExecuteRequest::new("asi.get_bookings", serde_json::json!({}), &handler);
//! let result = sandbox.execute(None, request);
//! assert!(result.success);
//! ```

pub mod blocklist;
pub mod config;
pub mod error;
pub mod isolation;
pub mod ledger;
pub mod sandbox;

pub use blocklist::EnvBlocklist;
pub use config::{IsolationKind, SandboxConfig, SandboxConfigFactory};
pub use error::{FailureReason, SandboxError};
pub use isolation::{
    AvailabilityProbe, ContainerIsolation, DenyIsolation, DockerProbe, Handler, IsolationOutcome,
    IsolationStrategy, PassthroughIsolation, RawOutcome,
};
pub use ledger::{ChangeType, StagedChange, StagedChangeLedger};
pub use sandbox::{ExecuteRequest, ExecutionResult, Sandbox, StageSpec};
