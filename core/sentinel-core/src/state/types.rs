use std::collections::BTreeMap;
use std::fmt;

use sentinel_protocol::AtomVerdict;
use serde::{Deserialize, Serialize};

use crate::atoms::{ChangeAtom, ChangeKind};
use crate::logtail::LogMarkers;

/// Overall health derived each watch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentinelStatus {
    Active,
    Degraded,
    Idle,
}

impl SentinelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SentinelStatus::Active => "ACTIVE",
            SentinelStatus::Degraded => "DEGRADED",
            SentinelStatus::Idle => "IDLE",
        }
    }
}

impl fmt::Display for SentinelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative session log counters, accumulated across scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCounters {
    pub save_count: u64,
    pub apply_count: u64,
    pub xaml_code_behind_change_count: u64,
    pub xaml_change_count: u64,
    pub xaml_apply_count: u64,
    pub result_success_count: u64,
    pub result_failure_count: u64,
    pub enc1008_count: u64,
    pub not_applied_count: u64,
    pub not_applied_other_tfm_count: u64,
    pub connection_lost_count: u64,
}

impl LogCounters {
    pub fn absorb(&mut self, markers: &LogMarkers) {
        self.save_count += u64::from(markers.save_count);
        self.apply_count += u64::from(markers.apply_count);
        self.xaml_code_behind_change_count += u64::from(markers.xaml_code_behind_change_count);
        self.xaml_change_count += u64::from(markers.xaml_change_count);
        self.xaml_apply_count += u64::from(markers.xaml_apply_count);
        self.result_success_count += u64::from(markers.result_success_count);
        self.result_failure_count += u64::from(markers.result_failure_count);
        self.enc1008_count += u64::from(markers.enc1008_count);
        self.not_applied_count += u64::from(markers.not_applied_count);
        self.not_applied_other_tfm_count += u64::from(markers.not_applied_other_tfm_count);
        self.connection_lost_count += u64::from(markers.connection_lost_count);
    }
}

/// The shared state document. Every process reads and rewrites it whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelState {
    pub watcher_alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watcher_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_log_activity_ts: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_ts: Option<f64>,
    pub heartbeat_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_poll_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SentinelStatus>,
    pub endpoints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_update_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_update_ts: Option<String>,
    pub session_log_offset: u64,

    #[serde(flatten)]
    pub counters: LogCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_solution_update: Option<String>,

    pub verdicts: Vec<VerdictEntry>,
}

impl SentinelState {
    /// Label for text output; `None` renders as `IDLE`.
    pub fn status_label(&self) -> &'static str {
        self.status.unwrap_or(SentinelStatus::Idle).as_str()
    }
}

/// Aggregate of the per-atom answers for one apply event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallVerdict {
    AllGood,
    AllFailed,
    Mixed,
    Skipped,
}

impl OverallVerdict {
    pub fn from_atom_verdicts(verdicts: &BTreeMap<String, AtomVerdict>) -> Self {
        if verdicts.is_empty() {
            OverallVerdict::Skipped
        } else if verdicts.values().all(|v| *v == AtomVerdict::Yes) {
            OverallVerdict::AllGood
        } else if verdicts.values().all(|v| *v == AtomVerdict::No) {
            OverallVerdict::AllFailed
        } else {
            OverallVerdict::Mixed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverallVerdict::AllGood => "all_good",
            OverallVerdict::AllFailed => "all_failed",
            OverallVerdict::Mixed => "mixed",
            OverallVerdict::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OverallVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted projection of a [`ChangeAtom`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomInfo {
    pub kind: ChangeKind,
    pub control_hint: String,
    pub change_summary: String,
    pub file: String,
    pub line_hint: usize,
}

impl From<&ChangeAtom> for AtomInfo {
    fn from(atom: &ChangeAtom) -> Self {
        Self {
            kind: atom.kind,
            control_hint: atom.control_hint.clone(),
            change_summary: atom.change_summary.clone(),
            file: atom.file.clone(),
            line_hint: atom.line_hint,
        }
    }
}

/// One apply event awaiting (or holding) developer confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictEntry {
    pub apply_index: u64,
    pub artifact_pair: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<OverallVerdict>,
    #[serde(default)]
    pub atoms: Vec<AtomInfo>,
    /// Atom index (as a decimal string) → answer.
    #[serde(default)]
    pub atom_verdicts: BTreeMap<String, AtomVerdict>,
}

impl VerdictEntry {
    pub fn unconfirmed(apply_index: u64, artifact_pair: String, atoms: &[ChangeAtom]) -> Self {
        Self {
            apply_index,
            artifact_pair,
            verdict: None,
            atoms: atoms.iter().map(AtomInfo::from).collect(),
            atom_verdicts: BTreeMap::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.atom_verdicts.is_empty() && !self.atoms.is_empty()
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.verdict,
            Some(OverallVerdict::AllFailed) | Some(OverallVerdict::Mixed)
        )
    }

    pub fn atom_verdict(&self, index: usize) -> Option<AtomVerdict> {
        self.atom_verdicts.get(&index.to_string()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdicts(pairs: &[(&str, AtomVerdict)]) -> BTreeMap<String, AtomVerdict> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn aggregate_rules() {
        use AtomVerdict::*;
        assert_eq!(
            OverallVerdict::from_atom_verdicts(&verdicts(&[("0", Yes), ("1", Yes)])),
            OverallVerdict::AllGood
        );
        assert_eq!(
            OverallVerdict::from_atom_verdicts(&verdicts(&[("0", No), ("1", No)])),
            OverallVerdict::AllFailed
        );
        assert_eq!(
            OverallVerdict::from_atom_verdicts(&verdicts(&[("0", Yes), ("1", No)])),
            OverallVerdict::Mixed
        );
        assert_eq!(
            OverallVerdict::from_atom_verdicts(&verdicts(&[("0", Partial)])),
            OverallVerdict::Mixed
        );
        assert_eq!(
            OverallVerdict::from_atom_verdicts(&BTreeMap::new()),
            OverallVerdict::Skipped
        );
    }

    #[test]
    fn state_serializes_snake_case_and_omits_nulls() {
        let mut state = SentinelState::default();
        state.counters.apply_count = 2;
        state.status = Some(SentinelStatus::Degraded);

        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["apply_count"], 2);
        assert_eq!(json["status"], "DEGRADED");
        assert_eq!(json["watcher_alive"], false);
        assert!(json.get("watcher_pid").is_none());
        assert!(json.get("last_heartbeat_ts").is_none());
        assert!(json.get("counters").is_none());
    }

    #[test]
    fn state_tolerates_missing_and_unknown_fields() {
        let state: SentinelState = serde_json::from_str(
            r#"{"watcher_alive":true,"apply_count":4,"some_future_field":1}"#,
        )
        .unwrap();

        assert!(state.watcher_alive);
        assert_eq!(state.counters.apply_count, 4);
        assert!(state.verdicts.is_empty());
    }

    #[test]
    fn absorb_adds_scan_counts() {
        let mut counters = LogCounters {
            apply_count: 3,
            ..LogCounters::default()
        };
        let markers = LogMarkers {
            apply_count: 2,
            enc1008_count: 1,
            ..LogMarkers::default()
        };

        counters.absorb(&markers);

        assert_eq!(counters.apply_count, 5);
        assert_eq!(counters.enc1008_count, 1);
    }

    #[test]
    fn pending_means_atoms_without_answers() {
        let mut entry = VerdictEntry {
            apply_index: 1,
            artifact_pair: "Page".into(),
            verdict: None,
            atoms: vec![AtomInfo {
                kind: ChangeKind::Modify,
                control_hint: "Label".into(),
                change_summary: "Changed `a` → `b`".into(),
                file: "Page.cs".into(),
                line_hint: 4,
            }],
            atom_verdicts: BTreeMap::new(),
        };
        assert!(entry.is_pending());

        entry.atom_verdicts.insert("0".into(), AtomVerdict::No);
        assert!(!entry.is_pending());
        assert_eq!(entry.atom_verdict(0), Some(AtomVerdict::No));
    }
}
