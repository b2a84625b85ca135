//! Text and JSON renderings shared by the CLI commands and the stdio tools.

use serde_json::{json, Value};

use crate::config::SentinelPaths;
use crate::diagnose::display_opt;
use crate::process;
use crate::state::{OverallVerdict, SentinelState, VerdictEntry, VerdictStore};
use crate::status::{compute_status, now_epoch_secs, StatusThresholds};

pub const NO_PENDING_MESSAGE: &str = "No unconfirmed atoms.";

/// Reads the state with liveness taken from the PID file. The stored
/// `watcher_alive` flag goes stale when the daemon is killed hard.
pub fn live_state(paths: &SentinelPaths, store: &VerdictStore) -> SentinelState {
    let mut state = store.read();
    state.watcher_alive = process::running_pid(&paths.pid_file).is_some();
    state
}

pub fn status_report(
    paths: &SentinelPaths,
    store: &VerdictStore,
    thresholds: &StatusThresholds,
) -> String {
    let state = live_state(paths, store);
    let status = compute_status(&state, now_epoch_secs(), thresholds);
    format!(
        "hr_status: {}\nwatcher_alive={} last_heartbeat={} last_log_activity={} selected_endpoint={}",
        status,
        state.watcher_alive,
        display_opt(&state.last_heartbeat_ts),
        display_opt(&state.last_log_activity_ts),
        state.selected_endpoint.as_deref().unwrap_or_default(),
    )
}

pub fn hints(state: &SentinelState) -> Vec<&'static str> {
    let counters = &state.counters;
    let mut hints = Vec::new();
    if counters.enc1008_count > 0 {
        hints.push("ENC1008 detected; rebuild solution and restart debug session.");
    }
    if counters.not_applied_count > 0 {
        hints.push("Detected 'changes not applied'; verify target framework/build freshness.");
    }
    if counters.not_applied_other_tfm_count > 0 {
        hints.push("Changes were not applied to a target framework that was not built; check the active target.");
    }
    if counters.apply_count == 0 {
        hints.push("No apply events seen; ensure Session.log is active.");
    }
    if !state.heartbeat_ok {
        hints.push("No live heartbeat endpoint detected; app may be stale or not running.");
    }
    if hints.is_empty() {
        hints.push("No obvious issues found.");
    }
    hints
}

pub fn report_line(state: &SentinelState) -> String {
    format!(
        "hr_report: status={} hints={}",
        state.status_label(),
        hints(state).join("; ")
    )
}

fn entry_json(entry: &VerdictEntry) -> Value {
    let atoms: Vec<Value> = entry
        .atoms
        .iter()
        .enumerate()
        .map(|(index, atom)| {
            json!({
                "index": index,
                "kind": atom.kind,
                "control_hint": atom.control_hint,
                "change_summary": atom.change_summary,
                "file": atom.file,
                "line_hint": atom.line_hint,
            })
        })
        .collect();
    json!({
        "apply_index": entry.apply_index,
        "artifact_pair": entry.artifact_pair,
        "verdict": entry.verdict,
        "atoms": atoms,
    })
}

pub fn pending_atoms_json(pending: &[VerdictEntry]) -> Value {
    let entries: Vec<Value> = pending.iter().map(entry_json).collect();
    let message = pending.is_empty().then_some(NO_PENDING_MESSAGE);
    json!({ "pending": entries, "message": message })
}

pub fn recorded_verdict_json(apply_index: u64, verdict: OverallVerdict) -> Value {
    json!({ "ok": true, "apply_index": apply_index, "verdict": verdict })
}
