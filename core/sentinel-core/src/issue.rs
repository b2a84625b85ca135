//! Markdown issue drafts built from recorded verdicts.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Utc;
use sentinel_protocol::AtomVerdict;

use crate::config::SentinelPaths;
use crate::error::{Result, SentinelError};
use crate::state::{AtomInfo, OverallVerdict, SentinelState, VerdictEntry, VerdictStore};

const DRAFT_SEPARATOR: &str = "\n\n---\n\n";

fn atom_line(atom: &AtomInfo) -> String {
    format!(
        "- {} on `{}` ({}:{})",
        atom.change_summary, atom.control_hint, atom.file, atom.line_hint
    )
}

fn ui_framework(artifact_pair: &str) -> &'static str {
    if artifact_pair.contains("Reactor") {
        "MauiReactor (MVU)"
    } else {
        "XAML/MVVM"
    }
}

fn title(failing: &[&AtomInfo]) -> String {
    let Some(first) = failing.first() else {
        return "Hot Reload visual sync issue".to_string();
    };
    let summary = first.change_summary.to_ascii_lowercase();
    if summary.contains("shadow") {
        format!(
            "Shadow style not applied to {} control (Hot Reload applied successfully)",
            first.control_hint
        )
    } else if summary.contains("class(") {
        format!(
            "Style class not applied to {} control (Hot Reload applied successfully)",
            first.control_hint
        )
    } else {
        format!(
            "Hot Reload change not reflected on {} (ENC apply succeeded)",
            first.control_hint
        )
    }
}

fn atoms_with<'a>(entry: &'a VerdictEntry, wanted: &[AtomVerdict]) -> Vec<&'a AtomInfo> {
    entry
        .atoms
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            entry
                .atom_verdict(*index)
                .is_some_and(|verdict| wanted.contains(&verdict))
        })
        .map(|(_, atom)| atom)
        .collect()
}

/// One bug report for an entry whose atoms were (partly) rejected.
pub fn build_issue_draft(entry: &VerdictEntry, state: &SentinelState) -> String {
    let working = atoms_with(entry, &[AtomVerdict::Yes]);
    let failing = atoms_with(entry, &[AtomVerdict::No, AtomVerdict::Partial]);
    let rejected = atoms_with(entry, &[AtomVerdict::No]);

    let mut out = String::new();
    let _ = writeln!(out, "# [Bug] {}", title(&rejected));
    let _ = writeln!(out);
    let _ = writeln!(out, "## Environment");
    let _ = writeln!(out, "- UI Framework: {}", ui_framework(&entry.artifact_pair));
    let _ = writeln!(out, "- Tool: .NET MAUI Hot Reload");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(
        out,
        "Hot Reload applied the code changes (ENC status: Ready, delta emitted) but some visual changes were not reflected on screen."
    );
    let _ = writeln!(out);

    if !working.is_empty() {
        let _ = writeln!(out, "## What Worked ✅");
        for atom in &working {
            let _ = writeln!(out, "{}", atom_line(atom));
        }
        let _ = writeln!(out);
    }
    if !failing.is_empty() {
        let _ = writeln!(out, "## What Didn't Work ❌");
        for atom in &failing {
            let _ = writeln!(out, "{}", atom_line(atom));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Steps to Reproduce");
    if let Some(first) = failing.first() {
        let _ = writeln!(out, "1. Create a component with a `{}` control", first.control_hint);
        let _ = writeln!(out, "2. Apply the change: {}", first.change_summary);
        let _ = writeln!(out, "3. Save the file to trigger Hot Reload");
        let _ = writeln!(out, "4. Observe: change not reflected despite Hot Reload reporting success");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Hot Reload Evidence");
    let _ = writeln!(
        out,
        "- ENC Apply Status: `{}`",
        state.last_solution_update.as_deref().unwrap_or("Unknown")
    );
    let _ = writeln!(
        out,
        "- Artifact: `{0}.old.cs` / `{0}.new.cs`",
        entry.artifact_pair
    );
    let heartbeat_advanced = match state.last_heartbeat_update_count {
        Some(count) if count >= entry.apply_index => "Yes",
        Some(_) => "No",
        None => "Unknown",
    };
    let _ = writeln!(out, "- Heartbeat advanced: {}", heartbeat_advanced);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Expected Behavior");
    if let Some(first) = failing.first() {
        let _ = writeln!(
            out,
            "Change should be visually reflected on `{}` after Hot Reload applies successfully.",
            first.control_hint
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Actual Behavior");
    let _ = writeln!(
        out,
        "No visual change observed. ENC apply status was Ready but the UI was not updated."
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Additional Context");
    let _ = writeln!(
        out,
        "- Verdict: `{}`",
        entry.verdict.map(OverallVerdict::as_str).unwrap_or("unconfirmed")
    );
    let _ = writeln!(out, "- Apply index: {}", entry.apply_index);
    for (index, atom) in entry.atoms.iter().enumerate() {
        let (icon, outcome) = match entry.atom_verdict(index) {
            Some(AtomVerdict::Yes) => ("✅", "worked"),
            Some(AtomVerdict::No) => ("❌", "did not work"),
            Some(AtomVerdict::Partial) => ("⚠️", "partially worked"),
            None => ("⚠️", "not confirmed"),
        };
        let _ = writeln!(
            out,
            "- {} {} on `{}`: {}",
            icon, atom.change_summary, atom.control_hint, outcome
        );
    }
    out
}

/// Positive report used when nothing failed.
pub fn build_session_summary(state: &SentinelState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# [Hot Reload] Session Summary: All Changes Applied Successfully");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(
        out,
        "All hot reload changes during this session were applied successfully with visual confirmation."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Hot Reload Metrics");
    let _ = writeln!(out, "- Apply count: {}", state.counters.apply_count);
    let _ = writeln!(out, "- Result success count: {}", state.counters.result_success_count);
    if let Some(line) = &state.last_solution_update {
        let _ = writeln!(out, "- Last solution update: {}", line);
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "_This session had no hot reload failures. This is a positive data point for hot reload working correctly._"
    );
    out
}

fn successful_section(verdicts: &[VerdictEntry]) -> Option<String> {
    let good: Vec<&VerdictEntry> = verdicts
        .iter()
        .filter(|entry| entry.verdict == Some(OverallVerdict::AllGood))
        .collect();
    if good.is_empty() {
        return None;
    }
    let mut out = String::new();
    let _ = writeln!(out, "## Confirmed Working Changes");
    for entry in good {
        let _ = writeln!(out, "### Apply {} (`{}`)", entry.apply_index, entry.artifact_pair);
        for atom in &entry.atoms {
            let _ = writeln!(out, "{}", atom_line(atom));
        }
    }
    Some(out)
}

/// Draft body for the whole verdict history.
pub fn build_draft(state: &SentinelState, include_successful: bool) -> String {
    let failed: Vec<&VerdictEntry> = state.verdicts.iter().filter(|e| e.is_failure()).collect();

    let mut body = if failed.is_empty() {
        build_session_summary(state)
    } else {
        failed
            .iter()
            .map(|entry| build_issue_draft(entry, state))
            .collect::<Vec<_>>()
            .join(DRAFT_SEPARATOR)
    };

    if include_successful {
        if let Some(section) = successful_section(&state.verdicts) {
            body.push_str(DRAFT_SEPARATOR);
            body.push_str(&section);
        }
    }
    body
}

/// Writes a timestamped draft into the temp directory.
pub fn draft_issue(
    store: &VerdictStore,
    paths: &SentinelPaths,
    include_successful: bool,
) -> Result<(PathBuf, String)> {
    let body = build_draft(&store.read(), include_successful);
    let path = paths.issue_draft_path(Utc::now().timestamp());
    fs_err::create_dir_all(&paths.tmp_dir)
        .map_err(|err| SentinelError::io("creating draft dir", err))?;
    fs_err::write(&path, &body).map_err(|err| SentinelError::io("writing issue draft", err))?;
    tracing::info!(path = %path.display(), "Issue draft written");
    Ok((path, body))
}
