// verdict.rs — Parses a reviewer's free-text turn output for an explicit
// PASS/FAIL verdict.

use ta_policy::ReviewerVerdict;

const FAIL_PHRASES: &[&str] = &["NOT APPROVED FOR DISTRIBUTION", "REJECTED FOR DISTRIBUTION"];
const PASS_PHRASES: &[&str] = &["APPROVED FOR DISTRIBUTION"];

/// Looks for "VERDICT: PASS" / "VERDICT: FAIL" (case-insensitive, optional
/// markdown bold), falling back to a small phrase allowlist. Fail phrases
/// are checked first since some contain a pass phrase as a substring
/// (e.g. "NOT approved for distribution").
pub fn parse_reviewer_verdict(text: &str) -> Option<ReviewerVerdict> {
    let normalized = text.to_uppercase().replace('*', "");

    if normalized.contains("VERDICT: FAIL") || normalized.contains("VERDICT:FAIL") {
        return Some(ReviewerVerdict::Fail);
    }
    if normalized.contains("VERDICT: PASS") || normalized.contains("VERDICT:PASS") {
        return Some(ReviewerVerdict::Pass);
    }
    if FAIL_PHRASES.iter().any(|p| normalized.contains(p)) {
        return Some(ReviewerVerdict::Fail);
    }
    if PASS_PHRASES.iter().any(|p| normalized.contains(p)) {
        return Some(ReviewerVerdict::Pass);
    }
    None
}
