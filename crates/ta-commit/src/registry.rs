//! The fixed registry of commit tools. Spec.md §4.F names exactly five —
//! this registry is never extended at runtime.

use std::collections::HashMap;

use ta_policy::TrustLevel;

#[derive(Debug, Clone, Copy)]
pub struct CommitToolSpec {
    pub tool_name: &'static str,
    pub action_type: &'static str,
    pub min_trust_level: TrustLevel,
    pub auto_approve_eligible: bool,
}

pub struct CommitToolRegistry {
    tools: HashMap<&'static str, CommitToolSpec>,
}

impl CommitToolRegistry {
    pub fn defaults() -> Self {
        let specs = [
            CommitToolSpec {
                tool_name: "apply_changes",
                action_type: "apply_changes",
                min_trust_level: TrustLevel::L3,
                auto_approve_eligible: true,
            },
            CommitToolSpec {
                tool_name: "publish_daily_brief",
                action_type: "publish_daily_brief",
                min_trust_level: TrustLevel::L3,
                auto_approve_eligible: true,
            },
            CommitToolSpec {
                tool_name: "post_alert",
                action_type: "post_alert",
                min_trust_level: TrustLevel::L3,
                auto_approve_eligible: true,
            },
            CommitToolSpec {
                tool_name: "mark_checkpoint_complete",
                action_type: "mark_checkpoint_complete",
                min_trust_level: TrustLevel::L3,
                auto_approve_eligible: false,
            },
            CommitToolSpec {
                tool_name: "send_invoice",
                action_type: "send_invoice",
                min_trust_level: TrustLevel::L4,
                auto_approve_eligible: false,
            },
        ];
        let tools = specs.into_iter().map(|s| (s.tool_name, s)).collect();
        Self { tools }
    }

    pub fn get(&self, tool_name: &str) -> Option<&CommitToolSpec> {
        self.tools.get(tool_name)
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }
}

impl Default for CommitToolRegistry {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_exactly_five_tools() {
        let registry = CommitToolRegistry::defaults();
        for name in [
            "apply_changes",
            "publish_daily_brief",
            "post_alert",
            "mark_checkpoint_complete",
            "send_invoice",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(!registry.contains("not_a_commit_tool"));
    }

    #[test]
    fn send_invoice_requires_l4_and_is_never_auto_approve_eligible() {
        let registry = CommitToolRegistry::defaults();
        let spec = registry.get("send_invoice").unwrap();
        assert_eq!(spec.min_trust_level, TrustLevel::L4);
        assert!(!spec.auto_approve_eligible);
    }
}
