//! Environment checks and the `diagnose` report.

use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::json;

use crate::artifacts::{self, DEFAULT_PREVIEW_LINES};
use crate::config::{SentinelPaths, ENC_LOG_DIR_ENV, XAML_LOG_ENV};
use crate::state::SentinelState;
use crate::status::{compute_status, now_epoch_secs, StatusThresholds};

const SESSION_LOG_RECENT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn icon(self) -> &'static str {
        match self {
            CheckStatus::Pass => "✅",
            CheckStatus::Warn => "⚠️",
            CheckStatus::Fail => "❌",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticCheck {
    pub id: &'static str,
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub auto_fixable: bool,
    pub fix_command: Option<String>,
}

fn env_check<F>(
    env: &F,
    var: &str,
    id: &'static str,
    name: &'static str,
    missing: CheckStatus,
    missing_message: &str,
    fix_value: &str,
) -> DiagnosticCheck
where
    F: Fn(&str) -> Option<String>,
{
    let value = env(var);
    DiagnosticCheck {
        id,
        name,
        status: if value.is_some() {
            CheckStatus::Pass
        } else {
            missing
        },
        message: match value {
            Some(value) => format!("Set to: {}", value),
            None => format!("{} not set. {}", var, missing_message),
        },
        auto_fixable: true,
        fix_command: Some(format!(
            "echo 'export {}={}' >> ~/.zshrc && source ~/.zshrc",
            var, fix_value
        )),
    }
}

fn session_log_check(session_log: &Path, now: SystemTime) -> DiagnosticCheck {
    let modified = std::fs::metadata(session_log)
        .ok()
        .map(|meta| meta.modified().unwrap_or(SystemTime::UNIX_EPOCH));

    let (status, message) = match modified {
        None => (
            CheckStatus::Fail,
            "Session.log not found. Ensure ENC LogDir is set and a debug session has been run."
                .to_string(),
        ),
        Some(modified) => {
            let age = now.duration_since(modified).unwrap_or_default();
            if age < SESSION_LOG_RECENT {
                (
                    CheckStatus::Pass,
                    "Session.log found and updated within last 30 minutes.".to_string(),
                )
            } else {
                let stamp: chrono::DateTime<chrono::Utc> = modified.into();
                (
                    CheckStatus::Warn,
                    format!(
                        "Session.log found but stale (last modified: {}).",
                        stamp.format("%Y-%m-%d %H:%M:%SZ")
                    ),
                )
            }
        }
    };

    DiagnosticCheck {
        id: "session_log",
        name: "Session.log Exists and Recent",
        status,
        message,
        auto_fixable: false,
        fix_command: None,
    }
}

fn heartbeat_check(state: &SentinelState) -> DiagnosticCheck {
    DiagnosticCheck {
        id: "heartbeat",
        name: "App Heartbeat Endpoint",
        status: if state.heartbeat_ok {
            CheckStatus::Pass
        } else {
            CheckStatus::Warn
        },
        message: if state.heartbeat_ok {
            format!(
                "Heartbeat reachable at {} (pid={})",
                state.selected_endpoint.as_deref().unwrap_or_default(),
                display_opt(&state.selected_pid)
            )
        } else {
            "No heartbeat endpoint reachable. App may not be running or the diagnostics package is not installed."
                .to_string()
        },
        auto_fixable: false,
        fix_command: None,
    }
}

/// Runs every check with an explicit environment lookup.
pub fn run_checks<F>(paths: &SentinelPaths, state: &SentinelState, env: F) -> Vec<DiagnosticCheck>
where
    F: Fn(&str) -> Option<String>,
{
    vec![
        env_check(
            &env,
            ENC_LOG_DIR_ENV,
            "enc_logdir",
            "Edit and Continue Log Directory",
            CheckStatus::Fail,
            "Session.log and artifact diffs will not be generated.",
            "/tmp/HotReloadLog",
        ),
        env_check(
            &env,
            XAML_LOG_ENV,
            "xaml_logging",
            "XAML Hot Reload Logging",
            CheckStatus::Warn,
            "XAML Hot Reload events may not appear in Session.log.",
            "1",
        ),
        session_log_check(&paths.session_log, SystemTime::now()),
        heartbeat_check(state),
    ]
}

pub fn display_opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Full `diagnose` text. `state` should already carry PID-file liveness.
pub fn render(
    paths: &SentinelPaths,
    state: &SentinelState,
    thresholds: &StatusThresholds,
    checks: &[DiagnosticCheck],
) -> String {
    let status = compute_status(state, now_epoch_secs(), thresholds);
    let counters = &state.counters;
    let mut lines = vec![
        format!("hr_diagnose: status={}", status),
        format!(
            "summary save_count={} apply_count={} result_success={} result_failure={} not_applied={} not_applied_other_tfm={} enc1008={} xaml_change={} xaml_apply={} app_heartbeat_recent={} heartbeat_update_count={}",
            counters.save_count,
            counters.apply_count,
            counters.result_success_count,
            counters.result_failure_count,
            counters.not_applied_count,
            counters.not_applied_other_tfm_count,
            counters.enc1008_count,
            counters.xaml_change_count,
            counters.xaml_apply_count,
            state.heartbeat_ok,
            display_opt(&state.last_heartbeat_update_count),
        ),
        String::new(),
    ];

    for check in checks {
        lines.push(format!(
            "  {} [{}] {}: {}",
            check.status.icon(),
            check.id,
            check.name,
            check.message
        ));
    }

    let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
    let passed = count(CheckStatus::Pass);
    let fixable = checks
        .iter()
        .filter(|c| c.auto_fixable && c.status != CheckStatus::Pass)
        .count();
    lines.push(String::new());
    lines.push(format!(
        "checks: {} passed, {} warnings, {} failed, {} auto-fixable",
        passed,
        count(CheckStatus::Warn),
        count(CheckStatus::Fail),
        fixable
    ));

    let summary = json!({
        "checks": checks,
        "summary": format!("{}/{} checks passed, {} auto-fixable issues", passed, checks.len(), fixable),
        "auto_fix_available": fixable > 0,
    });
    lines.push(format!("diagnose_json={}", summary));

    if let Some(pair) = artifacts::find_latest(&paths.hot_reload_dir, None) {
        lines.push(format!("artifact_file={}", pair.source_file));
        let preview = artifacts::diff_preview(&pair.old_path, &pair.new_path, DEFAULT_PREVIEW_LINES);
        if !preview.is_empty() {
            lines.push(format!("artifact_diff_preview={}", preview));
        }
    }

    lines.join("\n")
}
