//! Compiled regex patterns for the session log and artifact names.
//!
//! Compiled once on first use. Update these when the runtime's log wording
//! changes.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Session Log Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_SAVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Found \d+ potentially changed").unwrap());
pub static RE_APPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Solution update \d+\.\d+ status:\s*(Ready|ManagedModuleUpdate)").unwrap()
});
pub static RE_RESULT_SUCCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Solution update \d+\.\d+ status:\s*Ready").unwrap());
pub static RE_RESULT_BLOCKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Solution update \d+\.\d+ status:\s*Blocked").unwrap());
pub static RE_LAST_SOLUTION_UPDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Solution update \d+\.\d+ status:\s*\w+").unwrap());
pub static RE_XAML_CODE_BEHIND_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Document changed, added, or deleted:\s*'.*\.xaml\.cs'").unwrap()
});
pub static RE_XAML_CHANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Document changed, added, or deleted:\s*'.*\.xaml'").unwrap());
pub static RE_XAML_APPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(XAML.*Hot Reload|Hot Reload.*XAML).*(applied|apply|updated|update)").unwrap()
});
pub static RE_ENC1008: Lazy<Regex> = Lazy::new(|| Regex::new(r"ENC1008").unwrap());
pub static RE_CONNECTION_LOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)connection has been closed|connection lost").unwrap());

// The other-target-framework pattern is a strict refinement of the general
// one; it is always tested first.
pub static RE_NOT_APPLIED: Lazy<Regex> = Lazy::new(|| Regex::new(r"Changes not applied").unwrap());
pub static RE_NOT_APPLIED_OTHER_TFM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Changes not applied.*not built").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Diff / Artifact Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,\d+)? \+(\d+)(?:,\d+)? @@").unwrap());
pub static RE_ARTIFACT_OLD_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.old\.cs$").unwrap());
pub static RE_ARTIFACT_VERSIONED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\d+\.\d+\.old\.cs$").unwrap());
