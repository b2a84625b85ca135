//! Change atoms: one classified diff hunk each.
//!
//! An artifact pair's diff is split at hunk headers. Each hunk with at least
//! one changed line becomes an atom with a kind, a best-guess UI control it
//! touches, and a one-line summary a developer can confirm or reject.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diff::{self, DEFAULT_CONTEXT};
use crate::patterns::{RE_ARTIFACT_VERSIONED_SUFFIX, RE_HUNK_HEADER};

/// Control names searched for near a hunk, first match wins.
pub const CONTROL_VOCABULARY: &[&str] = &[
    "Border",
    "VStack",
    "HStack",
    "Label",
    "Button",
    "Card",
    "Grid",
    "StackLayout",
    "ScrollView",
    "Frame",
    "Image",
    "Entry",
    "Editor",
    "Picker",
    "Switch",
    "Slider",
    "CheckBox",
    "ContentView",
    "ContentPage",
    "CollectionView",
    "ListView",
    "ActivityIndicator",
    "ProgressBar",
    "BoxView",
    "AbsoluteLayout",
    "WebView",
    "SearchBar",
    "RadioButton",
    "RefreshView",
];

pub const UNKNOWN_CONTROL: &str = "unknown";

/// Lines around a hunk scanned for a control name.
const CONTROL_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Modify,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Modify => "modify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAtom {
    pub kind: ChangeKind,
    pub control_hint: String,
    pub change_summary: String,
    pub file: String,
    pub line_hint: usize,
}

/// Extracts atoms from an old/new artifact pair. Unreadable files yield none.
pub fn extract(old_path: &Path, new_path: &Path) -> Vec<ChangeAtom> {
    let (old_text, new_text) = match (
        fs_err::read_to_string(old_path),
        fs_err::read_to_string(new_path),
    ) {
        (Ok(old), Ok(new)) => (old, new),
        (Err(err), _) | (_, Err(err)) => {
            tracing::debug!(error = %err, "Artifact pair unreadable");
            return Vec::new();
        }
    };

    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();
    let file_name = old_path
        .file_name()
        .map(|name| atom_file_name(&name.to_string_lossy()))
        .unwrap_or_default();

    extract_from_lines(&old_lines, &new_lines, &file_name)
}

/// `Page.1.2.old.cs` → `Page.cs`.
pub fn atom_file_name(old_file_name: &str) -> String {
    RE_ARTIFACT_VERSIONED_SUFFIX
        .replace(old_file_name, ".cs")
        .into_owned()
}

pub fn extract_from_lines(old: &[&str], new: &[&str], file_name: &str) -> Vec<ChangeAtom> {
    let mut atoms = Vec::new();
    let mut hunk: Vec<String> = Vec::new();
    let (mut old_start, mut new_start) = (0usize, 0usize);

    for line in diff::unified(old, new, DEFAULT_CONTEXT) {
        if let Some(caps) = RE_HUNK_HEADER.captures(&line) {
            atoms.extend(classify_hunk(&hunk, old_start, new_start, old, file_name));
            hunk.clear();
            old_start = caps[1].parse().unwrap_or(0);
            new_start = caps[2].parse().unwrap_or(0);
        } else {
            hunk.push(line);
        }
    }
    atoms.extend(classify_hunk(&hunk, old_start, new_start, old, file_name));
    atoms
}

fn classify_hunk(
    hunk: &[String],
    old_start: usize,
    new_start: usize,
    old: &[&str],
    file_name: &str,
) -> Option<ChangeAtom> {
    let removed: Vec<&str> = hunk.iter().filter_map(|l| l.strip_prefix('-')).collect();
    let added: Vec<&str> = hunk.iter().filter_map(|l| l.strip_prefix('+')).collect();

    let kind = match (removed.is_empty(), added.is_empty()) {
        (true, true) => return None,
        (false, false) => ChangeKind::Modify,
        (true, false) => ChangeKind::Add,
        (false, true) => ChangeKind::Remove,
    };

    let line_hint = match kind {
        ChangeKind::Add => new_start,
        ChangeKind::Remove | ChangeKind::Modify => old_start,
    };

    Some(ChangeAtom {
        kind,
        control_hint: control_hint(old, old_start, removed.len(), &added).to_string(),
        change_summary: summarize(kind, &removed, &added),
        file: file_name.to_string(),
        line_hint,
    })
}

fn control_hint(old: &[&str], old_start: usize, removed: usize, added: &[&str]) -> &'static str {
    let lo = old_start.saturating_sub(CONTROL_WINDOW).min(old.len());
    let hi = (old_start + removed + CONTROL_WINDOW).min(old.len());
    let window: Vec<&str> = old[lo..hi].iter().chain(added.iter()).copied().collect();

    CONTROL_VOCABULARY
        .iter()
        .find(|control| window.iter().any(|line| line.contains(*control)))
        .copied()
        .unwrap_or(UNKNOWN_CONTROL)
}

fn join_trimmed(lines: &[&str], limit: usize) -> String {
    lines
        .iter()
        .take(limit)
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("; ")
}

fn summarize(kind: ChangeKind, removed: &[&str], added: &[&str]) -> String {
    match kind {
        ChangeKind::Modify if removed.len() == 1 && added.len() == 1 => format!(
            "Changed `{}` → `{}`",
            removed[0].trim(),
            added[0].trim()
        ),
        ChangeKind::Modify => format!(
            "Changed `{}` → `{}`",
            join_trimmed(removed, 2),
            join_trimmed(added, 2)
        ),
        ChangeKind::Add => format!("Added {}", join_trimmed(added, 3)),
        ChangeKind::Remove => format!("Removed {}", join_trimmed(removed, 3)),
    }
}
