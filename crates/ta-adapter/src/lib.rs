//! # ta-adapter
//!
//! Domain adapters: plug-ins supplying tools, agents, workflows, partial
//! trust-gate config, and lifecycle hooks for one domain. The registry
//! validates, stores, and merges them.

pub mod adapter;
pub mod error;
pub mod registry;
pub mod types;

pub use adapter::{DomainAdapter, ToolEntry};
pub use error::AdapterError;
pub use registry::AdapterRegistry;
pub use types::{DomainIdentity, LifecycleHooks, PartialDomainConfig, ValidationOutcome};
