//! Environment-variable blocklist, loaded the way `ta-policy`'s
//! `ExemptionPatterns` loads `.gitignore`-style exemption files — glob
//! patterns, one per line, comments and blank lines ignored — but applied
//! to environment variable *names* rather than file paths.

use glob::Pattern;

use crate::error::SandboxError;

/// Names containing any of these substrings are always blocked,
/// regardless of configuration, per spec §4.D.
const DEFAULT_BLOCKED_SUBSTRINGS: &[&str] = &["SECRET", "PASSWORD", "PRIVATE_KEY"];

/// Known credential variable names blocked outright.
const DEFAULT_BLOCKED_NAMES: &str = r#"# Default blocked environment variable names.
# One glob pattern per line; matched against the full variable name.
# Comments and blank lines are ignored.

*API_KEY*
AWS_ACCESS_KEY_ID
AWS_SECRET_ACCESS_KEY
AZURE_CLIENT_SECRET
GCP_SERVICE_ACCOUNT_KEY
GOOGLE_APPLICATION_CREDENTIALS
OAUTH_CLIENT_SECRET
OAUTH_TOKEN
STRIPE_SECRET_KEY
SLACK_BOT_TOKEN
SLACK_WEBHOOK_URL
TWILIO_AUTH_TOKEN
GITHUB_TOKEN
NPM_TOKEN
"#;

/// Blocklist of environment variable names refused outright when building
/// a sandbox's process environment.
#[derive(Debug, Clone)]
pub struct EnvBlocklist {
    patterns: Vec<Pattern>,
    raw_patterns: Vec<String>,
}

impl EnvBlocklist {
    /// The built-in blocklist: the fixed substrings from spec §4.D plus
    /// the named credential variables in [`DEFAULT_BLOCKED_NAMES`].
    pub fn defaults() -> Self {
        Self::parse_content(DEFAULT_BLOCKED_NAMES)
    }

    /// Parse additional blocked-name patterns from a `.gitignore`-style
    /// string, merged with the built-in defaults.
    pub fn parse_content(content: &str) -> Self {
        let mut patterns = Vec::new();
        let mut raw_patterns = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            raw_patterns.push(trimmed.to_string());
            if let Ok(pattern) = Pattern::new(trimmed) {
                patterns.push(pattern);
            }
        }

        Self {
            patterns,
            raw_patterns,
        }
    }

    pub fn with_additional_patterns(
        mut self,
        patterns: impl IntoIterator<Item = String>,
    ) -> Result<Self, SandboxError> {
        for raw in patterns {
            let pattern = Pattern::new(&raw).map_err(|e| SandboxError::InvalidBlocklistPattern {
                pattern: raw.clone(),
                reason: e.to_string(),
            })?;
            self.patterns.push(pattern);
            self.raw_patterns.push(raw);
        }
        Ok(self)
    }

    /// True if `name` is blocked by a fixed substring or a loaded pattern.
    pub fn is_blocked(&self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        DEFAULT_BLOCKED_SUBSTRINGS
            .iter()
            .any(|s| upper.contains(s))
            || self.patterns.iter().any(|p| p.matches(&upper))
    }

    /// Validates that none of `allowlisted_names` is itself blocked — a
    /// configuration that would allow a blocked name through is a
    /// startup-time failure, per spec §4.D.
    pub fn validate_not_allowing(&self, allowlisted_names: &[String]) -> Result<(), SandboxError> {
        for name in allowlisted_names {
            if self.is_blocked(name) {
                return Err(SandboxError::BlocklistMisconfigured { name: name.clone() });
            }
        }
        Ok(())
    }

    pub fn raw_patterns(&self) -> &[String] {
        &self.raw_patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_secret_password_private_key_substrings() {
        let b = EnvBlocklist::defaults();
        assert!(b.is_blocked("MY_SECRET_TOKEN"));
        assert!(b.is_blocked("DB_PASSWORD"));
        assert!(b.is_blocked("TLS_PRIVATE_KEY"));
    }

    #[test]
    fn blocks_known_credential_names() {
        let b = EnvBlocklist::defaults();
        assert!(b.is_blocked("AWS_SECRET_ACCESS_KEY"));
        assert!(b.is_blocked("STRIPE_SECRET_KEY"));
        assert!(b.is_blocked("OPENAI_API_KEY"));
        assert!(b.is_blocked("GITHUB_TOKEN"));
    }

    #[test]
    fn allows_unrelated_names() {
        let b = EnvBlocklist::defaults();
        assert!(!b.is_blocked("PATH"));
        assert!(!b.is_blocked("RUST_LOG"));
    }

    #[test]
    fn validate_not_allowing_rejects_blocked_name() {
        let b = EnvBlocklist::defaults();
        let err = b
            .validate_not_allowing(&["AWS_SECRET_ACCESS_KEY".to_string()])
            .unwrap_err();
        assert!(matches!(err, SandboxError::BlocklistMisconfigured { .. }));
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let b = EnvBlocklist::parse_content("# comment\n\nFOO_*\n");
        assert_eq!(b.raw_patterns().len(), 1);
        assert!(b.is_blocked("FOO_BAR"));
    }
}
