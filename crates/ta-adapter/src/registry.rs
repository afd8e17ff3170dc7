// registry.rs — The domain adapter registry: keyed by domain, with a
// merge function for combining adapters that share a domain.

use std::collections::HashMap;

use crate::adapter::DomainAdapter;
use crate::error::AdapterError;
use crate::types::LifecycleHooks;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, DomainAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers an adapter. Rejects invalid definitions and
    /// duplicate domains — callers that want to combine two adapters for
    /// the same domain should [`merge`](Self::merge) them first.
    pub fn register(&mut self, adapter: DomainAdapter) -> Result<(), AdapterError> {
        let outcome = adapter.validate();
        let domain = adapter
            .domain()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Invalid {
                domain: "<unknown>".to_string(),
                errors: outcome.errors.clone(),
            })?;
        if !outcome.is_ok() {
            return Err(AdapterError::Invalid {
                domain,
                errors: outcome.errors,
            });
        }
        for warning in &outcome.warnings {
            tracing::warn!(domain = %domain, "{warning}");
        }
        if self.adapters.contains_key(&domain) {
            return Err(AdapterError::AlreadyRegistered(domain));
        }
        adapter.hooks.initialize();
        self.adapters.insert(domain, adapter);
        Ok(())
    }

    pub fn get(&self, domain: &str) -> Option<&DomainAdapter> {
        self.adapters.get(domain)
    }

    pub fn list(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn unregister(&mut self, domain: &str) -> Result<(), AdapterError> {
        match self.adapters.remove(domain) {
            Some(adapter) => {
                adapter.hooks.shutdown();
                Ok(())
            }
            None => Err(AdapterError::NotFound(domain.to_string())),
        }
    }

    pub fn clear(&mut self) {
        for (_, adapter) in self.adapters.drain() {
            adapter.hooks.shutdown();
        }
    }

    /// Combines two adapters: the first's identity wins, tools/agents/
    /// workflows concatenate, lifecycle hooks chain (initialize runs
    /// `first` then `second`; shutdown runs in reverse, `second` then
    /// `first`).
    pub fn merge(first: DomainAdapter, second: DomainAdapter) -> DomainAdapter {
        let identity = first.identity.clone().or(second.identity.clone());
        let mut tools = first.tools;
        tools.extend(second.tools);
        let mut agents = first.agents;
        agents.extend(second.agents);
        let mut workflows = first.workflows;
        workflows.extend(second.workflows);
        let config = first.config.merge(second.config);

        let first_hooks = first.hooks;
        let second_hooks = second.hooks;
        let hooks = LifecycleHooks {
            on_initialize: chain_void(first_hooks.on_initialize, second_hooks.on_initialize),
            on_shutdown: chain_void_reversed(first_hooks.on_shutdown, second_hooks.on_shutdown),
            on_workflow_start: chain_named(first_hooks.on_workflow_start, second_hooks.on_workflow_start),
            on_workflow_complete: chain_named(first_hooks.on_workflow_complete, second_hooks.on_workflow_complete),
        };

        DomainAdapter {
            identity,
            tools,
            agents,
            workflows,
            config,
            hooks,
        }
    }
}

type VoidHook = Box<dyn Fn() + Send + Sync>;
type WorkflowHook = Box<dyn Fn(&str) + Send + Sync>;

fn chain_void(first: Option<VoidHook>, second: Option<VoidHook>) -> Option<VoidHook> {
    match (first, second) {
        (None, None) => None,
        (Some(f), None) => Some(f),
        (None, Some(s)) => Some(s),
        (Some(f), Some(s)) => Some(Box::new(move || {
            f();
            s();
        })),
    }
}

fn chain_void_reversed(first: Option<VoidHook>, second: Option<VoidHook>) -> Option<VoidHook> {
    match (first, second) {
        (None, None) => None,
        (Some(f), None) => Some(f),
        (None, Some(s)) => Some(s),
        (Some(f), Some(s)) => Some(Box::new(move || {
            s();
            f();
        })),
    }
}

fn chain_named(first: Option<WorkflowHook>, second: Option<WorkflowHook>) -> Option<WorkflowHook> {
    match (first, second) {
        (None, None) => None,
        (Some(f), None) => Some(f),
        (None, Some(s)) => Some(s),
        (Some(f), Some(s)) => Some(Box::new(move |name: &str| {
            f(name);
            s(name);
        })),
    }
}
