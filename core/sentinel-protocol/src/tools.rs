//! Tool catalog and typed tool arguments.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_FOLLOW_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    WatchStart,
    WatchStop,
    Status,
    Diagnose,
    Report,
    WatchFollow,
    PendingAtoms,
    RecordVerdict,
    DraftIssue,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::WatchStart,
        ToolName::Status,
        ToolName::Diagnose,
        ToolName::WatchStop,
        ToolName::Report,
        ToolName::WatchFollow,
        ToolName::DraftIssue,
        ToolName::PendingAtoms,
        ToolName::RecordVerdict,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::WatchStart => "hr_watch_start",
            ToolName::WatchStop => "hr_watch_stop",
            ToolName::Status => "hr_status",
            ToolName::Diagnose => "hr_diagnose",
            ToolName::Report => "hr_report",
            ToolName::WatchFollow => "hr_watch_follow",
            ToolName::PendingAtoms => "hr_pending_atoms",
            ToolName::RecordVerdict => "hr_record_verdict",
            ToolName::DraftIssue => "hr_draft_issue",
        }
    }

    fn description(self) -> &'static str {
        match self {
            ToolName::WatchStart => "Start hotreload sentinel background watcher.",
            ToolName::WatchStop => "Stop hotreload sentinel background watcher.",
            ToolName::Status => "Get current hotreload sentinel status.",
            ToolName::Diagnose => "Run hotreload sentinel diagnose summary.",
            ToolName::Report => "Summarize sentinel state file with key hints.",
            ToolName::WatchFollow => {
                "Foreground follow stream for status and alerts. When output contains \
                 'follow_pending_confirmation=true', call hr_pending_atoms to get atoms, \
                 confirm each atom with the developer, then call hr_record_verdict with results."
            }
            ToolName::PendingAtoms => {
                "Return unconfirmed change atoms from recent hot reload apply events. Call this \
                 after detecting a new apply event to get atoms the developer should confirm."
            }
            ToolName::RecordVerdict => {
                "Record per-atom developer verdicts for a specific apply event. Call after asking \
                 the developer about each atom."
            }
            ToolName::DraftIssue => {
                "Generate an issue draft from hot reload verdicts collected during this session. \
                 Returns the draft file path."
            }
        }
    }

    fn input_schema(self) -> Value {
        match self {
            ToolName::WatchFollow => json!({
                "type": "object",
                "properties": {
                    "seconds": { "type": "integer", "minimum": 0, "default": DEFAULT_FOLLOW_SECONDS }
                },
                "additionalProperties": false
            }),
            ToolName::DraftIssue => json!({
                "type": "object",
                "properties": {
                    "include_successful": {
                        "type": "boolean",
                        "description": "When true, include successful verdicts in the draft.",
                        "default": false
                    }
                },
                "additionalProperties": false
            }),
            ToolName::RecordVerdict => json!({
                "type": "object",
                "properties": {
                    "apply_index": {
                        "type": "integer",
                        "description": "The apply_index from pending atoms to record verdicts for."
                    },
                    "verdicts": {
                        "type": "object",
                        "description": "Map of atom index (string) to verdict: 'yes', 'no', or 'partial'.",
                        "additionalProperties": { "type": "string", "enum": ["yes", "no", "partial"] }
                    }
                },
                "required": ["apply_index", "verdicts"],
                "additionalProperties": false
            }),
            _ => json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `tools/list` result body.
pub fn tool_catalog() -> Value {
    let tools: Vec<Value> = ToolName::ALL
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.as_str(),
                "description": tool.description(),
                "inputSchema": tool.input_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

/// A developer's answer for one change atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomVerdict {
    Yes,
    No,
    Partial,
}

impl AtomVerdict {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Some(AtomVerdict::Yes),
            "no" | "n" => Some(AtomVerdict::No),
            "partial" | "p" => Some(AtomVerdict::Partial),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AtomVerdict::Yes => "yes",
            AtomVerdict::No => "no",
            AtomVerdict::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchFollowArgs {
    #[serde(default = "default_follow_seconds")]
    pub seconds: u64,
}

impl Default for WatchFollowArgs {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_FOLLOW_SECONDS,
        }
    }
}

fn default_follow_seconds() -> u64 {
    DEFAULT_FOLLOW_SECONDS
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DraftIssueArgs {
    #[serde(default)]
    pub include_successful: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordVerdictArgs {
    pub apply_index: u64,
    pub verdicts: BTreeMap<String, AtomVerdict>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_round_trips_by_name() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("hr_unknown"), None);
    }

    #[test]
    fn catalog_lists_all_tools_with_schemas() {
        let catalog = tool_catalog();
        let tools = catalog["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), ToolName::ALL.len());
        for tool in tools {
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
        let record = tools
            .iter()
            .find(|tool| tool["name"] == "hr_record_verdict")
            .expect("record verdict tool");
        assert_eq!(
            record["inputSchema"]["required"],
            json!(["apply_index", "verdicts"])
        );
    }

    #[test]
    fn follow_args_default_to_sixty_seconds() {
        let args: WatchFollowArgs = serde_json::from_value(json!({})).expect("parse");
        assert_eq!(args.seconds, 60);
    }

    #[test]
    fn record_verdict_args_reject_unknown_values() {
        let ok: RecordVerdictArgs = serde_json::from_value(json!({
            "apply_index": 3,
            "verdicts": { "0": "yes", "1": "partial" }
        }))
        .expect("parse");
        assert_eq!(ok.verdicts.get("1"), Some(&AtomVerdict::Partial));

        let bad = serde_json::from_value::<RecordVerdictArgs>(json!({
            "apply_index": 3,
            "verdicts": { "0": "maybe" }
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn atom_verdict_accepts_short_answers() {
        assert_eq!(AtomVerdict::parse("Y"), Some(AtomVerdict::Yes));
        assert_eq!(AtomVerdict::parse(" no "), Some(AtomVerdict::No));
        assert_eq!(AtomVerdict::parse("p"), Some(AtomVerdict::Partial));
        assert_eq!(AtomVerdict::parse("skip"), None);
    }
}
