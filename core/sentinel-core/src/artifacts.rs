//! Before/after source snapshots written by the runtime's edit logging.
//!
//! Each applied edit leaves `<Name>.old.cs` next to `<Name>.new.cs`
//! somewhere under the hot reload log directory.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::diff::{self, DEFAULT_CONTEXT};
use crate::patterns::RE_ARTIFACT_OLD_SUFFIX;

const OLD_SUFFIX: &str = ".old.cs";
const NEW_SUFFIX: &str = ".new.cs";
pub const DEFAULT_PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPair {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    /// File name without `.old.cs`.
    pub name: String,
    /// Old file path relative to the hot reload directory.
    pub source_file: String,
    /// Old file mtime, seconds since the epoch.
    pub mtime: f64,
}

fn mtime_secs(path: &Path) -> Option<f64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs_f64())
}

fn pair_for(dir: &Path, old_path: &Path) -> Option<ArtifactPair> {
    let file_name = old_path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(OLD_SUFFIX)?;
    let new_path = old_path.with_file_name(format!("{}{}", stem, NEW_SUFFIX));
    if !new_path.is_file() {
        return None;
    }
    let source_file = old_path
        .strip_prefix(dir)
        .unwrap_or(old_path)
        .to_string_lossy()
        .into_owned();
    Some(ArtifactPair {
        name: RE_ARTIFACT_OLD_SUFFIX.replace(file_name, "").into_owned(),
        old_path: old_path.to_path_buf(),
        new_path,
        source_file,
        mtime: mtime_secs(old_path)?,
    })
}

/// All pairs under `dir` with mtime strictly newer than `after_mtime`,
/// oldest first.
pub fn find_all_since(dir: &Path, after_mtime: Option<f64>) -> Vec<ArtifactPair> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let threshold = after_mtime.unwrap_or(0.0);

    let mut pairs: Vec<ArtifactPair> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| pair_for(dir, entry.path()))
        .filter(|pair| pair.mtime > threshold)
        .collect();
    pairs.sort_by(|a, b| a.mtime.total_cmp(&b.mtime));
    pairs
}

pub fn find_latest(dir: &Path, after_mtime: Option<f64>) -> Option<ArtifactPair> {
    find_all_since(dir, after_mtime).pop()
}

/// First changed diff lines of a pair, joined with ` | `.
pub fn diff_preview(old_path: &Path, new_path: &Path, max_lines: usize) -> String {
    let (Ok(old_text), Ok(new_text)) = (
        fs_err::read_to_string(old_path),
        fs_err::read_to_string(new_path),
    ) else {
        return String::new();
    };
    let old: Vec<&str> = old_text.lines().collect();
    let new: Vec<&str> = new_text.lines().collect();

    diff::unified(&old, &new, DEFAULT_CONTEXT)
        .into_iter()
        .filter(|line| line.starts_with('+') || line.starts_with('-'))
        .take(max_lines)
        .collect::<Vec<_>>()
        .join(" | ")
}
